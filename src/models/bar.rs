//! Daily OHLCV bar used for backtesting.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One aggregated price bar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
}

impl Bar {
    /// Whether the bar's range crossed the given price level.
    pub fn touches(&self, price: Decimal) -> bool {
        self.low <= price && price <= self.high
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bar(low: Decimal, high: Decimal) -> Bar {
        Bar {
            timestamp: Utc::now(),
            open: low,
            high,
            low,
            close: high,
            volume: 1_000,
        }
    }

    #[test]
    fn test_touches() {
        let b = bar(dec!(95), dec!(105));
        assert!(b.touches(dec!(100)));
        assert!(b.touches(dec!(95)));
        assert!(b.touches(dec!(105)));
        assert!(!b.touches(dec!(110)));
    }
}
