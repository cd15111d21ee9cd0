//! News-Sentiment Trading Bot
//!
//! Scores recent financial headlines with a three-class sentiment oracle and
//! places bracket orders through the Alpaca paper-trading API when the
//! aggregate signal is confident enough.

mod api;
mod backtest;
mod bot;
mod db;
mod models;
mod sentiment;
mod trading;

use std::io::Read;

use anyhow::{Context, Result};
use chrono::{NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::backtest::{BacktestConfig, Backtester};
use crate::bot::{Bot, BotConfig};
use crate::db::Database;
use crate::sentiment::{
    decode_headlines, LexiconModel, RemoteModel, Scorer, SentimentModel,
};
use crate::trading::TradingConfig;

/// News-sentiment trading bot CLI.
#[derive(Parser)]
#[command(name = "finsent")]
#[command(about = "Trade on aggregated news sentiment", long_about = None)]
struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "sqlite:./finsent.db?mode=rwc")]
    database: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a batch of headlines and print the aggregate verdict
    Score {
        /// Headlines to score (one verdict over the whole batch)
        headlines: Vec<String>,

        /// Read headlines from stdin, one per line
        #[arg(long)]
        stdin: bool,

        /// Use the offline lexicon oracle instead of the inference API
        #[arg(long)]
        offline: bool,
    },

    /// Start the live trading bot
    Run {
        /// Ticker symbol to trade
        #[arg(short, long, default_value = "SPY")]
        symbol: String,

        /// Fraction of cash to risk per trade (0-1)
        #[arg(long, default_value = "0.5")]
        cash_at_risk: f64,

        /// Tick interval in seconds
        #[arg(short, long, default_value = "43200")]
        interval: u64,

        /// Dry run (don't submit orders)
        #[arg(long)]
        dry_run: bool,

        /// Use the offline lexicon oracle instead of the inference API
        #[arg(long)]
        offline: bool,
    },

    /// Run a historical backtest over daily bars
    Backtest {
        /// Ticker symbol to trade
        #[arg(short, long, default_value = "SPY")]
        symbol: String,

        /// First day of the simulation (YYYY-MM-DD)
        #[arg(long)]
        start: String,

        /// Last day of the simulation (YYYY-MM-DD)
        #[arg(long)]
        end: String,

        /// Initial capital for simulation
        #[arg(short, long, default_value = "10000")]
        capital: f64,

        /// Fraction of cash to risk per trade (0-1)
        #[arg(long, default_value = "0.5")]
        cash_at_risk: f64,

        /// Use the offline lexicon oracle instead of the inference API
        #[arg(long)]
        offline: bool,
    },

    /// Show current configuration
    Config,

    /// Show bot status and statistics
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Score {
            headlines,
            stdin,
            offline,
        } => {
            let batch = if stdin {
                let mut raw = Vec::new();
                std::io::stdin()
                    .read_to_end(&mut raw)
                    .context("Failed to read headlines from stdin")?;
                let lines: Vec<Vec<u8>> = raw
                    .split(|&b| b == b'\n')
                    .filter(|line| !line.is_empty())
                    .map(|line| line.to_vec())
                    .collect();
                decode_headlines(&lines)?
            } else {
                headlines
            };

            let model = build_model(offline).await?;
            let scorer = Scorer::new(model);
            let verdict = scorer.estimate(&batch).await?;

            println!("\n=== Sentiment Verdict ===");
            println!("Headlines:  {}", batch.len());
            println!("Label:      {}", verdict.label);
            println!("Confidence: {:.4}", verdict.confidence);
        }

        Commands::Run {
            symbol,
            cash_at_risk,
            interval,
            dry_run,
            offline,
        } => {
            info!(
                symbol = %symbol,
                cash_at_risk = cash_at_risk,
                interval = interval,
                dry_run = dry_run,
                "Starting sentiment trading bot"
            );

            let trading = TradingConfig {
                symbol: symbol.clone(),
                cash_at_risk: Decimal::try_from(cash_at_risk)?,
                tick_interval_secs: interval,
                ..TradingConfig::default()
            };
            let bot_config = BotConfig {
                trading,
                dry_run,
                database_url: cli.database.clone(),
            };

            let model = build_model(offline).await?;
            let mut bot = Bot::new(bot_config, model).await?;

            println!("\n=== News-Sentiment Trading Bot ===");
            println!("Symbol: {}", symbol);
            println!("Cash at risk: {}%", cash_at_risk * 100.0);
            println!("Tick interval: {}s", interval);
            println!(
                "Mode: {}",
                if dry_run { "DRY RUN (no real orders)" } else { "PAPER TRADING" }
            );
            println!("\nPress Ctrl+C to stop.\n");

            if let Err(e) = bot.run().await {
                tracing::error!(error = %e, "Bot error");
            }

            let stats = bot.get_stats().await;
            println!("\n{}", stats);
        }

        Commands::Backtest {
            symbol,
            start,
            end,
            capital,
            cash_at_risk,
            offline,
        } => {
            info!(
                symbol = %symbol,
                start = %start,
                end = %end,
                capital = capital,
                "Starting backtest"
            );

            let trading = TradingConfig {
                symbol: symbol.clone(),
                cash_at_risk: Decimal::try_from(cash_at_risk)?,
                ..TradingConfig::default()
            };
            let backtest_config = BacktestConfig {
                initial_capital: Decimal::try_from(capital)?,
                trading,
                start: parse_day(&start)?,
                end: parse_day(&end)?,
            };

            println!("\n=== Sentiment Backtest ===");
            println!("Symbol: {}", symbol);
            println!("Period: {} to {}", start, end);
            println!("Capital: ${}", capital);
            println!("\nFetching historical data...\n");

            let model = build_model(offline).await?;
            let backtester = Backtester::new(backtest_config, model)?;
            let results = backtester.run().await?;
            println!("{}", results);

            if !results.trades.is_empty() {
                println!("\n--- Trades ---");
                for trade in &results.trades {
                    println!(
                        "  {} {} {} @ {:.2} -> {:.2} | P&L: ${:.2} ({:.1}%) [{}]",
                        trade.entry_time.format("%Y-%m-%d"),
                        trade.side,
                        trade.quantity,
                        trade.entry_price,
                        trade.exit_price,
                        trade.pnl,
                        trade.return_pct * dec!(100),
                        trade.exit_reason
                    );
                }
            }
        }

        Commands::Config => {
            let config = TradingConfig::default();

            println!("\n=== Trading Configuration ===\n");
            println!("Symbol:               {}", config.symbol);
            println!("Cash at Risk:         {}%", config.cash_at_risk * dec!(100));
            println!("Confidence Threshold: {}", config.confidence_threshold);
            println!("News Lookback:        {} days", config.news_lookback_days);
            println!("Tick Interval:        {}s", config.tick_interval_secs);

            println!("\nBracket Orders (buy):");
            println!("  Take Profit:  +{}%", config.buy_take_profit_pct * dec!(100));
            println!("  Stop Loss:    -{}%", config.buy_stop_loss_pct * dec!(100));

            println!("\nBracket Orders (sell):");
            println!("  Take Profit:  -{}%", config.sell_take_profit_pct * dec!(100));
            println!("  Stop Loss:    +{}%", config.sell_stop_loss_pct * dec!(100));
        }

        Commands::Status => {
            let db = Database::new(&cli.database).await?;

            let bot_state = match db.get_bot_state().await {
                Ok(state) => state,
                Err(_) => {
                    println!("No bot session found. Run 'finsent run' to start the bot.");
                    return Ok(());
                }
            };

            let (total, submitted, failed) = db.get_order_stats().await.unwrap_or((0, 0, 0));
            let max_dd = db.calculate_max_drawdown().await.unwrap_or(0.0);

            println!("\n=== Bot Status ===");
            println!("Symbol:       {}", bot_state.symbol);
            println!("Running:      {}", if bot_state.is_running { "Yes" } else { "No" });
            println!("Started:      {}", bot_state.started_at);
            println!(
                "Last Tick:    {}",
                bot_state.last_tick_at.unwrap_or_else(|| "Never".to_string())
            );

            println!("\n=== Account ===");
            println!("Cash:         ${:.2}", bot_state.cash);
            println!("Last Price:   ${:.2}", bot_state.last_price);
            println!("Max Drawdown: {:.2}%", max_dd * 100.0);

            println!("\n=== Activity ===");
            println!("Total Ticks:  {}", bot_state.total_ticks);
            println!("Orders:       {}", total);
            println!("Submitted:    {}", submitted);
            println!("Failed:       {}", failed);

            let orders = db.recent_orders(5).await?;
            if !orders.is_empty() {
                println!("\n=== Recent Orders ===");
                for order in &orders {
                    println!(
                        "  {} {} {} x{} tp {:.2} sl {:.2} [{}]",
                        order.submitted_at,
                        order.symbol,
                        order.side,
                        order.quantity,
                        order.take_profit,
                        order.stop_loss,
                        order.status
                    );
                }
            }

            let signals = db.recent_signals(5).await?;
            if !signals.is_empty() {
                println!("\n=== Recent Signals ===");
                for sig in &signals {
                    println!(
                        "  {} {} {} ({:.4}) -> {} [{} headlines]",
                        sig.timestamp,
                        sig.symbol,
                        sig.label,
                        sig.confidence,
                        sig.action,
                        sig.headline_count
                    );
                }
            }
        }
    }

    Ok(())
}

/// Pick the sentiment oracle for this invocation.
///
/// Offline runs and missing endpoint configuration both fall back to the
/// deterministic lexicon model. A configured endpoint is probed before use so
/// a dead inference service fails the command instead of every later tick.
async fn build_model(offline: bool) -> Result<Box<dyn SentimentModel>> {
    if offline {
        info!("Using offline lexicon sentiment model");
        return Ok(Box::new(LexiconModel::new()));
    }

    match std::env::var("SENTIMENT_API_URL") {
        Ok(_) => {
            let model = RemoteModel::from_env()?;
            model
                .probe()
                .await
                .context("Sentiment inference endpoint is unreachable")?;
            info!("Using remote sentiment inference endpoint");
            Ok(Box::new(model))
        }
        Err(_) => {
            warn!("SENTIMENT_API_URL not set, falling back to lexicon model");
            Ok(Box::new(LexiconModel::new()))
        }
    }
}

/// Parse a YYYY-MM-DD date into a UTC timestamp at midnight.
fn parse_day(s: &str) -> Result<chrono::DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", s))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .context("Invalid midnight timestamp")?;
    Ok(Utc.from_utc_datetime(&midnight))
}
