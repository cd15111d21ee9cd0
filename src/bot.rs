//! Bot runner: the live/paper trading loop.
//!
//! Each scheduled tick:
//! - Fetch available cash and the last traded price
//! - Fetch headlines for the trailing lookback window
//! - Score the batch into one aggregate verdict
//! - Ask the policy for an order intent and execute it (or log it in dry-run)
//! - Persist the signal, order, and equity point

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::api::{BrokerClient, NewsClient};
use crate::db::Database;
use crate::models::BracketOrder;
use crate::sentiment::{Scorer, SentimentModel, Verdict};
use crate::trading::{OrderIntent, Policy, PositionSide, TradingConfig};

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Trading policy configuration
    pub trading: TradingConfig,

    /// Whether to actually submit orders or just log them
    pub dry_run: bool,

    /// Database URL
    pub database_url: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            trading: TradingConfig::default(),
            dry_run: true,
            database_url: "sqlite:finsent.db?mode=rwc".to_string(),
        }
    }
}

/// Main bot runner.
pub struct Bot<M> {
    config: BotConfig,
    db: Database,
    news: NewsClient,
    broker: BrokerClient,
    scorer: Scorer<M>,
    policy: Policy,

    // Shutdown signal
    shutdown: Arc<AtomicBool>,
}

impl<M: SentimentModel> Bot<M> {
    /// Create a new bot instance. The scoring oracle is injected so live
    /// runs, offline runs, and tests share the same loop.
    pub async fn new(config: BotConfig, model: M) -> Result<Self> {
        let db = Database::new(&config.database_url).await?;
        let news = NewsClient::from_env()?;
        let broker = BrokerClient::from_env()?;
        let scorer = Scorer::new(model);
        let policy = Policy::new(config.trading.clone());

        Ok(Self {
            config,
            db,
            news,
            broker,
            scorer,
            policy,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Get shutdown signal for external control.
    pub fn shutdown_signal(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Main run loop.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            symbol = %self.config.trading.symbol,
            dry_run = self.config.dry_run,
            interval_secs = self.config.trading.tick_interval_secs,
            "Starting trading loop"
        );

        self.db.init_bot_state(&self.config.trading.symbol).await?;

        let mut tick_interval =
            interval(Duration::from_secs(self.config.trading.tick_interval_secs));

        // Register shutdown handler
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown signal received");
            shutdown.store(true, Ordering::SeqCst);
        });

        while !self.shutdown.load(Ordering::SeqCst) {
            tick_interval.tick().await;

            if let Err(e) = self.tick().await {
                // A failed tick is skipped, not fatal; the next interval
                // gets a fresh attempt.
                error!(error = %e, "Error in trading tick");
            }
        }

        self.db.mark_bot_stopped().await?;
        info!("Bot shutdown complete");
        Ok(())
    }

    /// Single trading iteration.
    async fn tick(&mut self) -> Result<()> {
        debug!("Trading tick");
        let symbol = self.config.trading.symbol.clone();

        // 1. Account state and last price, fetched concurrently
        let (cash, last_price) = futures::future::try_join(
            self.broker.get_cash(),
            self.broker.get_latest_price(&symbol),
        )
        .await?;

        // 2. Headlines for the trailing window ending now
        let now = Utc::now();
        let window_start = now - chrono::Duration::days(self.config.trading.news_lookback_days);
        let headlines = self.news.get_news(&symbol, window_start, now, 50).await?;
        // The API already bounds the range; the local check guards against
        // clock skew in article timestamps.
        let texts: Vec<String> = headlines
            .iter()
            .filter(|h| h.within_window(now, self.config.trading.news_lookback_days))
            .map(|h| h.text.clone())
            .collect();

        // 3. Aggregate verdict
        let verdict = self.scorer.estimate(&texts).await?;
        info!(
            symbol = %symbol,
            headlines = texts.len(),
            label = %verdict.label,
            confidence = verdict.confidence,
            cash = %cash,
            last_price = %last_price,
            "Scored news window"
        );

        // 4. Policy decision
        let open_side = self.open_position_side(&symbol).await?;
        let intent = self.policy.decide(cash, last_price, &verdict, open_side);

        let action = intent
            .as_ref()
            .map(|i| i.side.as_str())
            .unwrap_or("hold");
        self.db
            .record_signal(&symbol, texts.len(), verdict.label.as_str(), verdict.confidence, action)
            .await?;

        // 5. Execution
        if let Some(intent) = intent {
            self.execute_intent(&symbol, intent, &verdict).await?;
        }

        // 6. Bookkeeping
        let position_qty = self.position_quantity(&symbol).await?;
        let equity = cash + position_qty * last_price;
        self.db
            .record_equity_point(
                equity.to_f64().unwrap_or(0.0),
                cash.to_f64().unwrap_or(0.0),
                position_qty.to_f64().unwrap_or(0.0),
            )
            .await?;
        self.db
            .record_tick(cash.to_f64().unwrap_or(0.0), last_price.to_f64().unwrap_or(0.0))
            .await?;

        Ok(())
    }

    /// Execute an order intent: flatten the opposite position if required,
    /// then submit the bracket (or log it in dry-run).
    async fn execute_intent(
        &mut self,
        symbol: &str,
        intent: OrderIntent,
        verdict: &Verdict,
    ) -> Result<()> {
        if intent.close_open_position {
            if self.config.dry_run {
                info!(symbol = %symbol, "[DRY RUN] Would close opposite position");
            } else {
                self.broker
                    .close_position(symbol)
                    .await
                    .context("Failed to flatten opposite position")?;
            }
        }

        let order = BracketOrder::new(
            symbol,
            intent.side,
            intent.quantity,
            intent.take_profit,
            intent.stop_loss,
        );

        if self.config.dry_run {
            info!(
                symbol = %symbol,
                side = %order.side,
                qty = order.quantity,
                take_profit = %order.take_profit,
                stop_loss = %order.stop_loss,
                verdict = %verdict,
                "[DRY RUN] Would submit bracket order"
            );
            self.save_order(&order, "simulated").await?;
            return Ok(());
        }

        match self.broker.submit_bracket_order(&order).await {
            Ok(ack) => {
                info!(
                    order_id = %ack.id,
                    symbol = %symbol,
                    side = %order.side,
                    qty = order.quantity,
                    "Bracket order submitted"
                );
                self.save_order(&order, &ack.status).await?;
            }
            Err(e) => {
                error!(error = %e, symbol = %symbol, "Order submission failed");
                self.save_order(&order, "failed").await?;
            }
        }

        Ok(())
    }

    async fn save_order(&self, order: &BracketOrder, status: &str) -> Result<()> {
        self.db
            .save_order(
                &order.client_order_id,
                &order.symbol,
                order.side.as_str(),
                order.quantity as i64,
                order.take_profit.to_f64().unwrap_or(0.0),
                order.stop_loss.to_f64().unwrap_or(0.0),
                status,
            )
            .await
    }

    /// Side of the currently open position, if any.
    async fn open_position_side(&self, symbol: &str) -> Result<Option<PositionSide>> {
        let Some(position) = self.broker.get_open_position(symbol).await? else {
            return Ok(None);
        };

        match position.side.as_str() {
            "long" => Ok(Some(PositionSide::Long)),
            "short" => Ok(Some(PositionSide::Short)),
            other => {
                warn!(side = %other, "Unknown position side");
                Ok(None)
            }
        }
    }

    /// Signed position quantity (negative when short).
    async fn position_quantity(&self, symbol: &str) -> Result<Decimal> {
        Ok(self
            .broker
            .get_open_position(symbol)
            .await?
            .map(|p| p.qty)
            .unwrap_or(Decimal::ZERO))
    }

    /// Current stats for display.
    pub async fn get_stats(&self) -> BotStats {
        let state = self.db.get_bot_state().await.ok();
        let (total, submitted, failed) = self.db.get_order_stats().await.unwrap_or((0, 0, 0));
        let max_dd = self.db.calculate_max_drawdown().await.unwrap_or(0.0);

        BotStats {
            symbol: self.config.trading.symbol.clone(),
            total_ticks: state.as_ref().map(|s| s.total_ticks).unwrap_or(0),
            total_orders: total,
            submitted_orders: submitted,
            failed_orders: failed,
            max_drawdown: max_dd,
            is_running: !self.shutdown.load(Ordering::SeqCst),
            dry_run: self.config.dry_run,
        }
    }
}

/// Bot statistics.
#[derive(Debug, Clone)]
pub struct BotStats {
    pub symbol: String,
    pub total_ticks: i64,
    pub total_orders: i64,
    pub submitted_orders: i64,
    pub failed_orders: i64,
    pub max_drawdown: f64,
    pub is_running: bool,
    pub dry_run: bool,
}

impl std::fmt::Display for BotStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Bot Statistics ===")?;
        writeln!(f, "Symbol:        {}", self.symbol)?;
        writeln!(f, "Ticks:         {}", self.total_ticks)?;
        writeln!(
            f,
            "Orders:        {} (Submitted: {}, Failed: {})",
            self.total_orders, self.submitted_orders, self.failed_orders
        )?;
        writeln!(f, "Max Drawdown:  {:.2}%", self.max_drawdown * 100.0)?;
        writeln!(
            f,
            "Status:        {} {}",
            if self.is_running { "Running" } else { "Stopped" },
            if self.dry_run { "(Dry Run)" } else { "" }
        )?;
        Ok(())
    }
}
