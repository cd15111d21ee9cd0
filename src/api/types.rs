//! Wire types for the Alpaca news, trading, and market-data APIs.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Page of news items from /v1beta1/news.
#[derive(Debug, Clone, Deserialize)]
pub struct NewsResponse {
    pub news: Vec<NewsItem>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Single article from the news endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct NewsItem {
    pub headline: String,
    #[serde(default)]
    pub source: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub symbols: Vec<String>,
    #[serde(default)]
    pub summary: String,
}

/// Account state from /v2/account. Alpaca serializes money as strings.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountResponse {
    #[serde(with = "rust_decimal::serde::str")]
    pub cash: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub portfolio_value: Decimal,
    pub status: String,
}

/// Open position from /v2/positions/{symbol}.
#[derive(Debug, Clone, Deserialize)]
pub struct PositionResponse {
    pub symbol: String,
    /// "long" or "short"
    pub side: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub qty: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub avg_entry_price: Decimal,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub unrealized_pl: Option<Decimal>,
}

/// Order acknowledgement from /v2/orders.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderResponse {
    pub id: String,
    pub client_order_id: String,
    pub symbol: String,
    pub status: String,
    #[serde(default)]
    pub side: String,
    /// Bracket legs (take-profit, stop-loss) echoed back by the API
    #[serde(default)]
    pub legs: Option<Vec<OrderResponse>>,
}

/// Latest trade from /v2/stocks/{symbol}/trades/latest.
#[derive(Debug, Clone, Deserialize)]
pub struct LatestTradeResponse {
    pub trade: LatestTrade,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LatestTrade {
    #[serde(rename = "p")]
    pub price: Decimal,
    #[serde(rename = "t")]
    pub timestamp: DateTime<Utc>,
}

/// Page of bars from /v2/stocks/{symbol}/bars.
#[derive(Debug, Clone, Deserialize)]
pub struct BarsResponse {
    #[serde(default)]
    pub bars: Vec<BarItem>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BarItem {
    #[serde(rename = "t")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "o")]
    pub open: Decimal,
    #[serde(rename = "h")]
    pub high: Decimal,
    #[serde(rename = "l")]
    pub low: Decimal,
    #[serde(rename = "c")]
    pub close: Decimal,
    #[serde(rename = "v")]
    pub volume: u64,
}
