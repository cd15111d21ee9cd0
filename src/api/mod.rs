//! Alpaca API clients for news retrieval and order execution.

mod broker_client;
mod news_client;
mod types;

pub use broker_client::BrokerClient;
pub use news_client::NewsClient;
pub use types::*;
