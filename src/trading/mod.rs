//! Trading logic: configuration, position sizing, and the entry policy.

mod config;
mod policy;

pub use config::TradingConfig;
pub use policy::{position_size, OrderIntent, Policy, PositionSide};
