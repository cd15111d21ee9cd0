//! Oracle interface and the remote inference client.
//!
//! The oracle contract is deliberately narrow: a batch of headline strings
//! in, one raw logit vector per headline out. Tokenization, padding, and the
//! forward pass all live behind it, so the aggregation in
//! [`super::scorer`] can be tested against synthetic logits.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use backoff::ExponentialBackoff;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::scorer::ClassLogits;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRY_ELAPSED: Duration = Duration::from_secs(60);

/// Batch-in, per-item-class-scores-out scoring oracle.
#[async_trait]
pub trait SentimentModel: Send + Sync {
    /// One logit vector per input, in input order.
    async fn class_logits(&self, batch: &[String]) -> Result<Vec<ClassLogits>>;
}

#[async_trait]
impl SentimentModel for Box<dyn SentimentModel> {
    async fn class_logits(&self, batch: &[String]) -> Result<Vec<ClassLogits>> {
        (**self).class_logits(batch).await
    }
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    inputs: &'a [String],
}

#[derive(Deserialize)]
struct ClassifyResponse {
    logits: Vec<ClassLogits>,
}

/// Client for a remote inference service hosting the pretrained classifier.
///
/// The loaded model behind the endpoint is fixed for the process lifetime;
/// transient transport failures and 5xx responses are retried with
/// exponential backoff, anything else surfaces to the caller.
pub struct RemoteModel {
    client: Client,
    endpoint: String,
}

impl RemoteModel {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Build from the `SENTIMENT_API_URL` environment variable.
    pub fn from_env() -> Result<Self> {
        let endpoint = std::env::var("SENTIMENT_API_URL")
            .context("SENTIMENT_API_URL not set; cannot reach the inference service")?;
        Self::new(endpoint)
    }

    /// Single round trip to verify the service is up. Run once at process
    /// start; a failure here is fatal, mirroring a local model-load failure.
    pub async fn probe(&self) -> Result<()> {
        let batch = vec!["startup connectivity check".to_string()];
        self.class_logits(&batch)
            .await
            .context("sentiment inference service unavailable at startup")?;
        Ok(())
    }

    async fn classify_once(
        &self,
        batch: &[String],
    ) -> std::result::Result<Vec<ClassLogits>, backoff::Error<anyhow::Error>> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&ClassifyRequest { inputs: batch })
            .send()
            .await
            .map_err(|e| backoff::Error::transient(anyhow!(e).context("inference request failed")))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(backoff::Error::transient(anyhow!(
                "inference service returned {}",
                status
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(backoff::Error::permanent(anyhow!(
                "inference request rejected: {} - {}",
                status,
                body
            )));
        }

        let body: ClassifyResponse = response
            .json()
            .await
            .map_err(|e| backoff::Error::permanent(anyhow!(e).context("malformed inference response")))?;

        Ok(body.logits)
    }
}

#[async_trait]
impl SentimentModel for RemoteModel {
    async fn class_logits(&self, batch: &[String]) -> Result<Vec<ClassLogits>> {
        debug!(endpoint = %self.endpoint, batch_size = batch.len(), "Requesting class logits");

        let policy = ExponentialBackoff {
            max_elapsed_time: Some(MAX_RETRY_ELAPSED),
            ..ExponentialBackoff::default()
        };

        let logits = backoff::future::retry_notify(
            policy,
            || self.classify_once(batch),
            |err, delay| warn!(error = %err, retry_in = ?delay, "Inference call failed, retrying"),
        )
        .await?;

        Ok(logits)
    }
}

/// Fixed-response oracle for aggregation tests.
#[cfg(test)]
pub struct MockModel {
    responses: Option<Vec<ClassLogits>>,
}

#[cfg(test)]
impl MockModel {
    /// Returns the same logit rows on every call.
    pub fn returning(responses: Vec<ClassLogits>) -> Self {
        Self {
            responses: Some(responses),
        }
    }

    /// Panics if invoked at all.
    pub fn panicking() -> Self {
        Self { responses: None }
    }
}

#[cfg(test)]
#[async_trait]
impl SentimentModel for MockModel {
    async fn class_logits(&self, _batch: &[String]) -> Result<Vec<ClassLogits>> {
        match &self.responses {
            Some(rows) => Ok(rows.clone()),
            None => panic!("oracle was not expected to be called"),
        }
    }
}
