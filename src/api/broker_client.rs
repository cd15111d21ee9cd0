//! Alpaca trading and market-data client: account state, prices, bracket
//! order submission, and historical bars.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

use crate::models::{Bar, BracketOrder};

use super::types::{AccountResponse, BarsResponse, LatestTradeResponse, OrderResponse, PositionResponse};

const TRADING_API_BASE: &str = "https://paper-api.alpaca.markets";
const DATA_API_BASE: &str = "https://data.alpaca.markets";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the Alpaca trading API (paper by default) and data API.
pub struct BrokerClient {
    client: Client,
    trading_url: String,
    data_url: String,
    api_key: String,
    api_secret: String,
}

#[derive(Serialize)]
struct BracketLeg {
    #[serde(skip_serializing_if = "Option::is_none")]
    limit_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_price: Option<Decimal>,
}

#[derive(Serialize)]
struct OrderRequest<'a> {
    symbol: &'a str,
    qty: String,
    side: &'a str,
    #[serde(rename = "type")]
    order_type: &'a str,
    time_in_force: &'a str,
    order_class: &'a str,
    client_order_id: &'a str,
    take_profit: BracketLeg,
    stop_loss: BracketLeg,
}

impl BrokerClient {
    /// Build from `APCA_API_KEY_ID` / `APCA_API_SECRET_KEY`. An explicit
    /// `APCA_API_BASE_URL` switches between paper and live trading.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("APCA_API_KEY_ID").context("APCA_API_KEY_ID not set")?;
        let api_secret =
            std::env::var("APCA_API_SECRET_KEY").context("APCA_API_SECRET_KEY not set")?;
        let trading_url =
            std::env::var("APCA_API_BASE_URL").unwrap_or_else(|_| TRADING_API_BASE.to_string());
        Self::with_base_urls(trading_url, DATA_API_BASE.to_string(), api_key, api_secret)
    }

    /// Create with custom base URLs (for testing).
    pub fn with_base_urls(
        trading_url: String,
        data_url: String,
        api_key: String,
        api_secret: String,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            trading_url,
            data_url,
            api_key,
            api_secret,
        })
    }

    fn auth(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("APCA-API-KEY-ID", &self.api_key)
            .header("APCA-API-SECRET-KEY", &self.api_secret)
    }

    /// Fetch account state.
    pub async fn get_account(&self) -> Result<AccountResponse> {
        let url = format!("{}/v2/account", self.trading_url);
        let response = self
            .auth(self.client.get(&url))
            .send()
            .await
            .context("Failed to fetch account")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Account request failed: {} - {}", status, body);
        }

        response
            .json()
            .await
            .context("Failed to parse account response")
    }

    /// Available cash.
    pub async fn get_cash(&self) -> Result<Decimal> {
        Ok(self.get_account().await?.cash)
    }

    /// Last traded price for a symbol.
    pub async fn get_latest_price(&self, symbol: &str) -> Result<Decimal> {
        let url = format!("{}/v2/stocks/{}/trades/latest", self.data_url, symbol);
        debug!(url = %url, "Fetching latest trade");

        let response = self
            .auth(self.client.get(&url))
            .send()
            .await
            .context("Failed to fetch latest trade")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Latest trade request failed: {} - {}", status, body);
        }

        let latest: LatestTradeResponse = response
            .json()
            .await
            .context("Failed to parse latest trade response")?;

        Ok(latest.trade.price)
    }

    /// Open position for a symbol, or `None` when flat.
    pub async fn get_open_position(&self, symbol: &str) -> Result<Option<PositionResponse>> {
        let url = format!("{}/v2/positions/{}", self.trading_url, symbol);
        let response = self
            .auth(self.client.get(&url))
            .send()
            .await
            .context("Failed to fetch position")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Position request failed: {} - {}", status, body);
        }

        let position = response
            .json()
            .await
            .context("Failed to parse position response")?;
        Ok(Some(position))
    }

    /// Flatten any open position in a symbol. A missing position is not an
    /// error.
    pub async fn close_position(&self, symbol: &str) -> Result<()> {
        let url = format!("{}/v2/positions/{}", self.trading_url, symbol);
        let response = self
            .auth(self.client.delete(&url))
            .send()
            .await
            .context("Failed to close position")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Close position failed: {} - {}", status, body);
        }

        info!(symbol = %symbol, "Closed open position");
        Ok(())
    }

    /// Submit a bracket order: market entry with take-profit and stop-loss
    /// legs attached.
    pub async fn submit_bracket_order(&self, order: &BracketOrder) -> Result<OrderResponse> {
        let request = OrderRequest {
            symbol: &order.symbol,
            qty: order.quantity.to_string(),
            side: order.side.as_str(),
            order_type: "market",
            time_in_force: "gtc",
            order_class: "bracket",
            client_order_id: &order.client_order_id,
            take_profit: BracketLeg {
                limit_price: Some(order.take_profit),
                stop_price: None,
            },
            stop_loss: BracketLeg {
                limit_price: None,
                stop_price: Some(order.stop_loss),
            },
        };

        let url = format!("{}/v2/orders", self.trading_url);
        debug!(symbol = %order.symbol, side = %order.side, qty = order.quantity, "Submitting bracket order");

        let response = self
            .auth(self.client.post(&url).json(&request))
            .send()
            .await
            .context("Failed to submit order")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Order submission failed: {} - {}", status, body);
        }

        let ack: OrderResponse = response
            .json()
            .await
            .context("Failed to parse order response")?;

        info!(
            order_id = %ack.id,
            status = %ack.status,
            "Bracket order accepted"
        );
        Ok(ack)
    }

    /// Daily bars for a symbol over a date range, oldest first.
    pub async fn get_daily_bars(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>> {
        let mut bars = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = format!(
                "{}/v2/stocks/{}/bars?timeframe=1Day&start={}&end={}&limit=1000&adjustment=raw",
                self.data_url,
                symbol,
                start.to_rfc3339(),
                end.to_rfc3339(),
            );
            if let Some(token) = &page_token {
                url = format!("{}&page_token={}", url, token);
            }

            debug!(url = %url, "Fetching bars page");

            let response = self
                .auth(self.client.get(&url))
                .send()
                .await
                .context("Failed to fetch bars")?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                anyhow::bail!("Bars request failed: {} - {}", status, body);
            }

            let page: BarsResponse = response
                .json()
                .await
                .context("Failed to parse bars response")?;

            bars.extend(page.bars.into_iter().map(|b| Bar {
                timestamp: b.timestamp,
                open: b.open,
                high: b.high,
                low: b.low,
                close: b.close,
                volume: b.volume,
            }));

            match page.next_page_token {
                Some(token) => {
                    page_token = Some(token);
                    // Rate limiting
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
                None => break,
            }
        }

        Ok(bars)
    }
}
