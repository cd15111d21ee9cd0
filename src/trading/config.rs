//! Trading configuration.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Configuration for the sentiment trading policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Ticker symbol to trade
    pub symbol: String,

    /// Fraction of available cash to commit per entry (0.0 to 1.0)
    pub cash_at_risk: Decimal,

    /// Minimum aggregate confidence before acting on a verdict
    pub confidence_threshold: f64,

    /// Trailing news window, in days, ending at the tick's clock
    pub news_lookback_days: i64,

    /// Take-profit above entry for bracket buys (0.15 = +15%)
    pub buy_take_profit_pct: Decimal,

    /// Stop-loss below entry for bracket buys (0.05 = -5%)
    pub buy_stop_loss_pct: Decimal,

    /// Take-profit below entry for bracket sells (0.20 = -20%)
    pub sell_take_profit_pct: Decimal,

    /// Stop-loss above entry for bracket sells (0.05 = +5%)
    pub sell_stop_loss_pct: Decimal,

    /// Seconds between trading iterations
    pub tick_interval_secs: u64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            symbol: "SPY".to_string(),
            cash_at_risk: dec!(0.5),          // Commit half of cash per entry
            confidence_threshold: 0.98,       // Only act on near-certain verdicts
            news_lookback_days: 4,            // Trailing 4-day headline window
            buy_take_profit_pct: dec!(0.15),  // +15% target on longs
            buy_stop_loss_pct: dec!(0.05),    // -5% stop on longs
            sell_take_profit_pct: dec!(0.20), // -20% target on shorts
            sell_stop_loss_pct: dec!(0.05),   // +5% stop on shorts
            tick_interval_secs: 43_200,       // Every 12 hours
        }
    }
}
