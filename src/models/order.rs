//! Order models for bracket order submission.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }

    /// The side that flattens a position opened with this side.
    pub fn opposite(&self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bracket order: market entry plus take-profit and stop-loss legs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BracketOrder {
    /// Client-generated idempotency key
    pub client_order_id: String,

    /// Ticker symbol
    pub symbol: String,

    /// Entry direction
    pub side: OrderSide,

    /// Whole-share quantity
    pub quantity: u64,

    /// Take-profit limit price
    pub take_profit: Decimal,

    /// Stop-loss trigger price
    pub stop_loss: Decimal,

    /// When the order was created locally
    pub submitted_at: DateTime<Utc>,
}

impl BracketOrder {
    pub fn new(
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: u64,
        take_profit: Decimal,
        stop_loss: Decimal,
    ) -> Self {
        Self {
            client_order_id: uuid::Uuid::new_v4().to_string(),
            symbol: symbol.into(),
            side,
            quantity,
            take_profit,
            stop_loss,
            submitted_at: Utc::now(),
        }
    }

    /// Dollar value of the entry leg at a given fill price.
    pub fn notional(&self, fill_price: Decimal) -> Decimal {
        Decimal::from(self.quantity) * fill_price
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_opposite_side() {
        assert_eq!(OrderSide::Buy.opposite(), OrderSide::Sell);
        assert_eq!(OrderSide::Sell.opposite(), OrderSide::Buy);
    }

    #[test]
    fn test_notional() {
        let order = BracketOrder::new("SPY", OrderSide::Buy, 10, dec!(575), dec!(475));
        assert_eq!(order.notional(dec!(500)), dec!(5000));
    }

    #[test]
    fn test_unique_client_order_ids() {
        let a = BracketOrder::new("SPY", OrderSide::Buy, 1, dec!(1.15), dec!(0.95));
        let b = BracketOrder::new("SPY", OrderSide::Buy, 1, dec!(1.15), dec!(0.95));
        assert_ne!(a.client_order_id, b.client_order_id);
    }
}
