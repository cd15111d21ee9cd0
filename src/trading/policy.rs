//! Sentiment trading policy: position sizing and the entry decision.
//!
//! Pure functions over tick inputs (cash, last price, verdict, open
//! position), so the rules are testable without a broker. Order execution
//! lives in the bot.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::debug;

use crate::models::OrderSide;
use crate::sentiment::{Sentiment, Verdict};

use super::TradingConfig;

/// Side of the currently open bracket position, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionSide {
    Long,
    Short,
}

/// A decided-but-unsubmitted bracket order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderIntent {
    pub side: OrderSide,

    /// Whole-share quantity
    pub quantity: u64,

    /// Take-profit limit price
    pub take_profit: Decimal,

    /// Stop-loss trigger price
    pub stop_loss: Decimal,

    /// Whether an opposite open position must be flattened first
    pub close_open_position: bool,
}

/// Target order quantity: `floor(cash * cash_at_risk / last_price)`.
pub fn position_size(cash: Decimal, last_price: Decimal, cash_at_risk: Decimal) -> u64 {
    if last_price <= Decimal::ZERO {
        return 0;
    }
    (cash * cash_at_risk / last_price)
        .floor()
        .to_u64()
        .unwrap_or(0)
}

/// The trading policy engine.
pub struct Policy {
    config: TradingConfig,
}

impl Policy {
    pub fn new(config: TradingConfig) -> Self {
        Self { config }
    }

    /// Decide the action for one tick.
    ///
    /// Returns `None` unless cash exceeds the last price, the verdict clears
    /// the confidence threshold, the label is directional, and the sized
    /// quantity is at least one share.
    pub fn decide(
        &self,
        cash: Decimal,
        last_price: Decimal,
        verdict: &Verdict,
        open_position: Option<PositionSide>,
    ) -> Option<OrderIntent> {
        if cash <= last_price {
            debug!(%cash, %last_price, "Insufficient cash for a single share");
            return None;
        }
        if !verdict.is_actionable(self.config.confidence_threshold) {
            debug!(
                confidence = verdict.confidence,
                threshold = self.config.confidence_threshold,
                "Verdict below confidence threshold"
            );
            return None;
        }

        let quantity = position_size(cash, last_price, self.config.cash_at_risk);
        if quantity == 0 {
            return None;
        }

        match verdict.label {
            Sentiment::Positive => Some(OrderIntent {
                side: OrderSide::Buy,
                quantity,
                take_profit: last_price * (Decimal::ONE + self.config.buy_take_profit_pct),
                stop_loss: last_price * (Decimal::ONE - self.config.buy_stop_loss_pct),
                close_open_position: open_position == Some(PositionSide::Short),
            }),
            Sentiment::Negative => Some(OrderIntent {
                side: OrderSide::Sell,
                quantity,
                take_profit: last_price * (Decimal::ONE - self.config.sell_take_profit_pct),
                stop_loss: last_price * (Decimal::ONE + self.config.sell_stop_loss_pct),
                close_open_position: open_position == Some(PositionSide::Long),
            }),
            Sentiment::Neutral => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn verdict(confidence: f64, label: Sentiment) -> Verdict {
        Verdict { confidence, label }
    }

    #[test]
    fn test_position_size_floors() {
        // 1000 * 0.5 / 300 = 1.66... -> 1 share
        assert_eq!(position_size(dec!(1000), dec!(300), dec!(0.5)), 1);
        assert_eq!(position_size(dec!(1000), dec!(100), dec!(0.5)), 5);
        assert_eq!(position_size(dec!(100), dec!(300), dec!(0.5)), 0);
        assert_eq!(position_size(dec!(1000), dec!(0), dec!(0.5)), 0);
    }

    #[test]
    fn test_confident_positive_emits_bracket_buy() {
        let policy = Policy::new(TradingConfig::default());
        let intent = policy
            .decide(dec!(10000), dec!(100), &verdict(0.99, Sentiment::Positive), None)
            .unwrap();

        assert_eq!(intent.side, OrderSide::Buy);
        assert_eq!(intent.quantity, 50);
        assert_eq!(intent.take_profit, dec!(115.00));
        assert_eq!(intent.stop_loss, dec!(95.00));
        assert!(!intent.close_open_position);
    }

    #[test]
    fn test_confident_negative_emits_bracket_sell() {
        let policy = Policy::new(TradingConfig::default());
        let intent = policy
            .decide(dec!(10000), dec!(100), &verdict(0.99, Sentiment::Negative), None)
            .unwrap();

        assert_eq!(intent.side, OrderSide::Sell);
        assert_eq!(intent.take_profit, dec!(80.00));
        assert_eq!(intent.stop_loss, dec!(105.00));
    }

    #[test]
    fn test_opposite_position_is_flattened_first() {
        let policy = Policy::new(TradingConfig::default());

        let buy = policy
            .decide(
                dec!(10000),
                dec!(100),
                &verdict(0.99, Sentiment::Positive),
                Some(PositionSide::Short),
            )
            .unwrap();
        assert!(buy.close_open_position);

        let sell = policy
            .decide(
                dec!(10000),
                dec!(100),
                &verdict(0.99, Sentiment::Negative),
                Some(PositionSide::Long),
            )
            .unwrap();
        assert!(sell.close_open_position);

        // Same-side position does not force a close.
        let add = policy
            .decide(
                dec!(10000),
                dec!(100),
                &verdict(0.99, Sentiment::Positive),
                Some(PositionSide::Long),
            )
            .unwrap();
        assert!(!add.close_open_position);
    }

    #[test]
    fn test_threshold_is_strict() {
        let policy = Policy::new(TradingConfig::default());
        // Exactly at the threshold is not enough.
        assert!(policy
            .decide(dec!(10000), dec!(100), &verdict(0.98, Sentiment::Positive), None)
            .is_none());
    }

    #[test]
    fn test_neutral_never_trades() {
        let policy = Policy::new(TradingConfig::default());
        assert!(policy
            .decide(dec!(10000), dec!(100), &verdict(0.999, Sentiment::Neutral), None)
            .is_none());
    }

    #[test]
    fn test_cash_must_exceed_last_price() {
        let policy = Policy::new(TradingConfig::default());
        assert!(policy
            .decide(dec!(100), dec!(100), &verdict(0.99, Sentiment::Positive), None)
            .is_none());
    }

    #[test]
    fn test_empty_batch_verdict_never_trades() {
        let policy = Policy::new(TradingConfig::default());
        assert!(policy
            .decide(dec!(10000), dec!(100), &Verdict::empty_batch(), None)
            .is_none());
    }
}
