//! Alpaca news API client: ordered headlines for a symbol and date range.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use tracing::debug;

use crate::models::Headline;

use super::types::NewsResponse;

const NEWS_API_BASE: &str = "https://data.alpaca.markets";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const PAGE_SIZE: u32 = 50;

/// Client for the Alpaca news endpoint (read-only).
pub struct NewsClient {
    client: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
}

impl NewsClient {
    /// Build from `APCA_API_KEY_ID` / `APCA_API_SECRET_KEY`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("APCA_API_KEY_ID").context("APCA_API_KEY_ID not set")?;
        let api_secret =
            std::env::var("APCA_API_SECRET_KEY").context("APCA_API_SECRET_KEY not set")?;
        Self::with_base_url(NEWS_API_BASE.to_string(), api_key, api_secret)
    }

    /// Create with a custom base URL (for testing).
    pub fn with_base_url(base_url: String, api_key: String, api_secret: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url,
            api_key,
            api_secret,
        })
    }

    /// Fetch headlines for `symbol` between `start` and `end`, oldest page
    /// first, following `next_page_token` up to `limit` items.
    pub async fn get_news(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Headline>> {
        let mut headlines = Vec::new();
        let mut page_token: Option<String> = None;

        while headlines.len() < limit {
            let mut url = format!(
                "{}/v1beta1/news?symbols={}&start={}&end={}&limit={}&sort=asc",
                self.base_url,
                symbol,
                start.to_rfc3339(),
                end.to_rfc3339(),
                PAGE_SIZE.min(limit as u32),
            );
            if let Some(token) = &page_token {
                url = format!("{}&page_token={}", url, token);
            }

            debug!(url = %url, "Fetching news page");

            let response = self
                .client
                .get(&url)
                .header("APCA-API-KEY-ID", &self.api_key)
                .header("APCA-API-SECRET-KEY", &self.api_secret)
                .send()
                .await
                .context("Failed to fetch news")?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                anyhow::bail!("News request failed: {} - {}", status, body);
            }

            let page: NewsResponse = response
                .json()
                .await
                .context("Failed to parse news response")?;

            for item in page.news {
                headlines.push(Headline {
                    symbol: symbol.to_string(),
                    text: item.headline,
                    source: item.source,
                    created_at: item.created_at,
                });
                if headlines.len() >= limit {
                    break;
                }
            }

            match page.next_page_token {
                Some(token) if headlines.len() < limit => {
                    page_token = Some(token);
                    // Rate limiting
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
                _ => break,
            }
        }

        debug!(symbol = %symbol, count = headlines.len(), "Fetched headlines");
        Ok(headlines)
    }
}
