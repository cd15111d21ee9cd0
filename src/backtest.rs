//! Backtesting engine: replay the sentiment policy over historical daily bars.
//!
//! One policy tick per trading day, using that day's close as the last price
//! and the trailing news window ending at the bar's timestamp. Bracket fills
//! are simulated against subsequent bars.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use statrs::statistics::Statistics;
use tracing::{debug, info};

use crate::api::{BrokerClient, NewsClient};
use crate::models::{Bar, OrderSide};
use crate::sentiment::{Scorer, SentimentModel};
use crate::trading::{Policy, PositionSide, TradingConfig};

/// Backtesting configuration.
#[derive(Debug, Clone)]
pub struct BacktestConfig {
    /// Starting capital
    pub initial_capital: Decimal,

    /// Trading policy configuration
    pub trading: TradingConfig,

    /// First day of the simulation
    pub start: DateTime<Utc>,

    /// Last day of the simulation
    pub end: DateTime<Utc>,
}

/// An open simulated bracket position.
#[derive(Debug, Clone)]
pub struct SimulatedBracket {
    pub side: OrderSide,
    pub quantity: u64,
    pub entry_price: Decimal,
    pub take_profit: Decimal,
    pub stop_loss: Decimal,
    pub entry_time: DateTime<Utc>,
}

impl SimulatedBracket {
    /// P&L if closed at the given price.
    pub fn pnl_at(&self, price: Decimal) -> Decimal {
        let qty = Decimal::from(self.quantity);
        match self.side {
            OrderSide::Buy => (price - self.entry_price) * qty,
            OrderSide::Sell => (self.entry_price - price) * qty,
        }
    }

    /// Check whether this bar triggers a bracket leg.
    ///
    /// When a bar's range crosses both legs, the stop-loss wins: intraday
    /// ordering is unknowable from daily bars, so fills are assumed
    /// pessimistic.
    pub fn exit_on(&self, bar: &Bar) -> Option<(Decimal, &'static str)> {
        if bar.touches(self.stop_loss) {
            return Some((self.stop_loss, "stop_loss"));
        }
        if bar.touches(self.take_profit) {
            return Some((self.take_profit, "take_profit"));
        }
        None
    }

    fn position_side(&self) -> PositionSide {
        match self.side {
            OrderSide::Buy => PositionSide::Long,
            OrderSide::Sell => PositionSide::Short,
        }
    }
}

/// A completed trade in the backtest.
#[derive(Debug, Clone)]
pub struct BacktestTrade {
    pub side: OrderSide,
    pub quantity: u64,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub pnl: Decimal,
    pub return_pct: Decimal,
    pub exit_reason: String,
}

/// Backtest results summary.
#[derive(Debug, Clone)]
pub struct BacktestResults {
    pub initial_capital: Decimal,
    pub final_capital: Decimal,
    pub total_return_pct: Decimal,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub avg_win: Decimal,
    pub avg_loss: Decimal,
    pub profit_factor: f64,
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: f64,
    pub trades: Vec<BacktestTrade>,
    pub equity_curve: Vec<(DateTime<Utc>, Decimal)>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl std::fmt::Display for BacktestResults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n{:=^60}", " BACKTEST RESULTS ")?;
        writeln!(f)?;
        writeln!(
            f,
            "Period: {} to {}",
            self.start_time.format("%Y-%m-%d"),
            self.end_time.format("%Y-%m-%d")
        )?;
        writeln!(f)?;
        writeln!(f, "--- Capital ---")?;
        writeln!(f, "Initial:     ${:.2}", self.initial_capital)?;
        writeln!(f, "Final:       ${:.2}", self.final_capital)?;
        writeln!(f, "Return:      {:.2}%", self.total_return_pct * dec!(100))?;
        writeln!(f)?;
        writeln!(f, "--- Trades ---")?;
        writeln!(f, "Total:       {}", self.total_trades)?;
        writeln!(f, "Winners:     {} ({:.1}%)", self.winning_trades, self.win_rate * 100.0)?;
        writeln!(f, "Losers:      {}", self.losing_trades)?;
        writeln!(f, "Avg Win:     ${:.2}", self.avg_win)?;
        writeln!(f, "Avg Loss:    ${:.2}", self.avg_loss)?;
        writeln!(f, "Profit Factor: {:.2}", self.profit_factor)?;
        writeln!(f)?;
        writeln!(f, "--- Risk Metrics ---")?;
        writeln!(f, "Max Drawdown: {:.2}%", self.max_drawdown_pct * 100.0)?;
        writeln!(f, "Sharpe Ratio: {:.2}", self.sharpe_ratio)?;
        writeln!(f, "{:=^60}", "")?;
        Ok(())
    }
}

/// Backtesting engine.
pub struct Backtester<M> {
    config: BacktestConfig,
    news: NewsClient,
    broker: BrokerClient,
    scorer: Scorer<M>,
    policy: Policy,
}

impl<M: SentimentModel> Backtester<M> {
    /// Create a new backtester with an injected scoring oracle.
    pub fn new(config: BacktestConfig, model: M) -> Result<Self> {
        let news = NewsClient::from_env()?;
        let broker = BrokerClient::from_env()?;
        let scorer = Scorer::new(model);
        let policy = Policy::new(config.trading.clone());

        Ok(Self {
            config,
            news,
            broker,
            scorer,
            policy,
        })
    }

    /// Run the simulation over the configured date range.
    pub async fn run(&self) -> Result<BacktestResults> {
        let symbol = &self.config.trading.symbol;
        info!(
            symbol = %symbol,
            start = %self.config.start.format("%Y-%m-%d"),
            end = %self.config.end.format("%Y-%m-%d"),
            "Starting backtest"
        );

        let bars = self
            .broker
            .get_daily_bars(symbol, self.config.start, self.config.end)
            .await
            .context("Failed to fetch historical bars")?;

        if bars.is_empty() {
            anyhow::bail!("No historical bars found for {}", symbol);
        }
        info!(count = bars.len(), "Fetched historical bars");

        let mut cash = self.config.initial_capital;
        let mut open: Option<SimulatedBracket> = None;
        let mut trades: Vec<BacktestTrade> = Vec::new();
        let mut equity_curve: Vec<(DateTime<Utc>, Decimal)> = Vec::new();

        for bar in &bars {
            // 1. Manage the open bracket first, so an entry is never exited
            //    on its own entry bar.
            if let Some(bracket) = &open {
                if let Some((exit_price, reason)) = bracket.exit_on(bar) {
                    let trade = close_bracket(bracket, exit_price, bar.timestamp, reason);
                    cash += trade.pnl;
                    debug!(
                        reason = reason,
                        pnl = %trade.pnl,
                        "Bracket closed"
                    );
                    trades.push(trade);
                    open = None;
                }
            }

            // 2. Policy tick at this bar's close
            let window_start =
                bar.timestamp - Duration::days(self.config.trading.news_lookback_days);
            let headlines = self
                .news
                .get_news(symbol, window_start, bar.timestamp, 50)
                .await?;
            let texts: Vec<String> = headlines.iter().map(|h| h.text.clone()).collect();
            let verdict = self.scorer.estimate(&texts).await?;

            let open_side = open.as_ref().map(|b| b.position_side());
            if let Some(intent) = self.policy.decide(cash, bar.close, &verdict, open_side) {
                if intent.close_open_position {
                    if let Some(bracket) = &open {
                        let trade =
                            close_bracket(bracket, bar.close, bar.timestamp, "reversal");
                        cash += trade.pnl;
                        trades.push(trade);
                        open = None;
                    }
                }

                if open.is_none() {
                    debug!(
                        side = %intent.side,
                        qty = intent.quantity,
                        price = %bar.close,
                        "Opening simulated bracket"
                    );
                    open = Some(SimulatedBracket {
                        side: intent.side,
                        quantity: intent.quantity,
                        entry_price: bar.close,
                        take_profit: intent.take_profit,
                        stop_loss: intent.stop_loss,
                        entry_time: bar.timestamp,
                    });
                }
            }

            // 3. Mark equity at the close
            let unrealized = open.as_ref().map(|b| b.pnl_at(bar.close)).unwrap_or(Decimal::ZERO);
            equity_curve.push((bar.timestamp, cash + unrealized));
        }

        // Liquidate anything still open at the final close
        if let (Some(bracket), Some(last)) = (&open, bars.last()) {
            let trade = close_bracket(bracket, last.close, last.timestamp, "end_of_backtest");
            cash += trade.pnl;
            trades.push(trade);
        }

        let start_time = bars.first().map(|b| b.timestamp).unwrap_or(self.config.start);
        let end_time = bars.last().map(|b| b.timestamp).unwrap_or(self.config.end);

        Ok(compute_results(
            self.config.initial_capital,
            cash,
            trades,
            equity_curve,
            start_time,
            end_time,
        ))
    }
}

fn close_bracket(
    bracket: &SimulatedBracket,
    exit_price: Decimal,
    exit_time: DateTime<Utc>,
    reason: &str,
) -> BacktestTrade {
    let pnl = bracket.pnl_at(exit_price);
    let return_pct = if bracket.entry_price.is_zero() {
        Decimal::ZERO
    } else {
        pnl / (bracket.entry_price * Decimal::from(bracket.quantity))
    };

    BacktestTrade {
        side: bracket.side,
        quantity: bracket.quantity,
        entry_price: bracket.entry_price,
        exit_price,
        entry_time: bracket.entry_time,
        exit_time,
        pnl,
        return_pct,
        exit_reason: reason.to_string(),
    }
}

/// Summarize a finished simulation.
fn compute_results(
    initial_capital: Decimal,
    final_capital: Decimal,
    trades: Vec<BacktestTrade>,
    equity_curve: Vec<(DateTime<Utc>, Decimal)>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) -> BacktestResults {
    let (wins, losses): (Vec<_>, Vec<_>) =
        trades.iter().partition(|t| t.pnl > Decimal::ZERO);

    let win_rate = if trades.is_empty() {
        0.0
    } else {
        wins.len() as f64 / trades.len() as f64
    };

    let avg_win = if wins.is_empty() {
        Decimal::ZERO
    } else {
        wins.iter().map(|t| t.pnl).sum::<Decimal>() / Decimal::from(wins.len() as u32)
    };
    let avg_loss = if losses.is_empty() {
        Decimal::ZERO
    } else {
        losses.iter().map(|t| t.pnl.abs()).sum::<Decimal>() / Decimal::from(losses.len() as u32)
    };

    let gross_profit: Decimal = wins.iter().map(|t| t.pnl).sum();
    let gross_loss: Decimal = losses.iter().map(|t| t.pnl.abs()).sum();
    let profit_factor = if gross_loss > Decimal::ZERO {
        gross_profit.to_f64().unwrap_or(0.0) / gross_loss.to_f64().unwrap_or(1.0)
    } else {
        0.0
    };

    let total_return_pct = if initial_capital.is_zero() {
        Decimal::ZERO
    } else {
        (final_capital - initial_capital) / initial_capital
    };

    BacktestResults {
        initial_capital,
        final_capital,
        total_return_pct,
        total_trades: trades.len(),
        winning_trades: wins.len(),
        losing_trades: losses.len(),
        win_rate,
        avg_win,
        avg_loss,
        profit_factor,
        max_drawdown_pct: max_drawdown(&equity_curve),
        sharpe_ratio: sharpe_ratio(&equity_curve),
        trades,
        equity_curve,
        start_time,
        end_time,
    }
}

/// Maximum peak-to-trough drawdown over the equity curve, as a fraction.
fn max_drawdown(equity_curve: &[(DateTime<Utc>, Decimal)]) -> f64 {
    let mut peak = Decimal::MIN;
    let mut max_dd = 0.0f64;

    for &(_, equity) in equity_curve {
        if equity > peak {
            peak = equity;
        }
        if peak > Decimal::ZERO {
            let dd = ((peak - equity) / peak).to_f64().unwrap_or(0.0);
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Annualized Sharpe ratio from daily equity points (0% risk-free rate,
/// 252 trading days).
fn sharpe_ratio(equity_curve: &[(DateTime<Utc>, Decimal)]) -> f64 {
    if equity_curve.len() < 3 {
        return 0.0;
    }

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .filter_map(|w| {
            let prev = w[0].1.to_f64()?;
            let curr = w[1].1.to_f64()?;
            if prev != 0.0 {
                Some(curr / prev - 1.0)
            } else {
                None
            }
        })
        .collect();

    if returns.len() < 2 {
        return 0.0;
    }

    let mean = returns.clone().mean();
    let std_dev = returns.std_dev();

    if std_dev > 0.0 {
        (mean / std_dev) * (252.0_f64).sqrt()
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(ts: DateTime<Utc>, low: Decimal, high: Decimal, close: Decimal) -> Bar {
        Bar {
            timestamp: ts,
            open: close,
            high,
            low,
            close,
            volume: 1_000,
        }
    }

    fn long_bracket(entry: Decimal, tp: Decimal, sl: Decimal) -> SimulatedBracket {
        SimulatedBracket {
            side: OrderSide::Buy,
            quantity: 10,
            entry_price: entry,
            take_profit: tp,
            stop_loss: sl,
            entry_time: Utc::now(),
        }
    }

    #[test]
    fn test_take_profit_fill() {
        let bracket = long_bracket(dec!(100), dec!(115), dec!(95));
        let b = bar(Utc::now(), dec!(110), dec!(116), dec!(114));
        let (price, reason) = bracket.exit_on(&b).unwrap();
        assert_eq!(price, dec!(115));
        assert_eq!(reason, "take_profit");
        assert_eq!(bracket.pnl_at(price), dec!(150));
    }

    #[test]
    fn test_stop_loss_fill() {
        let bracket = long_bracket(dec!(100), dec!(115), dec!(95));
        let b = bar(Utc::now(), dec!(92), dec!(101), dec!(93));
        let (price, reason) = bracket.exit_on(&b).unwrap();
        assert_eq!(price, dec!(95));
        assert_eq!(reason, "stop_loss");
        assert_eq!(bracket.pnl_at(price), dec!(-50));
    }

    #[test]
    fn test_stop_wins_when_bar_crosses_both_legs() {
        let bracket = long_bracket(dec!(100), dec!(115), dec!(95));
        let b = bar(Utc::now(), dec!(90), dec!(120), dec!(100));
        let (_, reason) = bracket.exit_on(&b).unwrap();
        assert_eq!(reason, "stop_loss");
    }

    #[test]
    fn test_no_fill_inside_brackets() {
        let bracket = long_bracket(dec!(100), dec!(115), dec!(95));
        let b = bar(Utc::now(), dec!(98), dec!(104), dec!(101));
        assert!(bracket.exit_on(&b).is_none());
    }

    #[test]
    fn test_short_bracket_pnl() {
        let bracket = SimulatedBracket {
            side: OrderSide::Sell,
            quantity: 10,
            entry_price: dec!(100),
            take_profit: dec!(80),
            stop_loss: dec!(105),
            entry_time: Utc::now(),
        };
        assert_eq!(bracket.pnl_at(dec!(80)), dec!(200));
        assert_eq!(bracket.pnl_at(dec!(105)), dec!(-50));
    }

    #[test]
    fn test_compute_results_stats() {
        let now = Utc::now();
        let bracket = long_bracket(dec!(100), dec!(115), dec!(95));

        let winner = close_bracket(&bracket, dec!(115), now, "take_profit");
        let loser = close_bracket(&bracket, dec!(95), now, "stop_loss");

        let equity = vec![
            (now, dec!(10000)),
            (now, dec!(10150)),
            (now, dec!(10100)),
        ];
        let results = compute_results(dec!(10000), dec!(10100), vec![winner, loser], equity, now, now);

        assert_eq!(results.total_trades, 2);
        assert_eq!(results.winning_trades, 1);
        assert_eq!(results.losing_trades, 1);
        assert!((results.win_rate - 0.5).abs() < 1e-9);
        assert_eq!(results.avg_win, dec!(150));
        assert_eq!(results.avg_loss, dec!(50));
        assert!((results.profit_factor - 3.0).abs() < 1e-9);
        assert_eq!(results.total_return_pct, dec!(0.01));
    }

    #[test]
    fn test_max_drawdown() {
        let now = Utc::now();
        let curve = vec![
            (now, dec!(10000)),
            (now, dec!(12000)),
            (now, dec!(9000)),
            (now, dec!(11000)),
        ];
        // Peak 12000 -> trough 9000 = 25%
        assert!((max_drawdown(&curve) - 0.25).abs() < 1e-9);
    }
}
