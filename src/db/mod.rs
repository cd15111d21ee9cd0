//! Database persistence for bot state and tick history.
//!
//! Stores everything needed to inspect or resume a session:
//! - Bot state (symbol, last seen cash/price, tick counters)
//! - Per-tick sentiment signals and the action taken
//! - Submitted bracket orders
//! - Equity curve

use anyhow::{Context, Result};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

/// Database connection pool with session state management.
pub struct Database {
    pool: SqlitePool,
}

/// Bot state stored in database.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BotState {
    pub id: i64,
    pub symbol: String,
    pub cash: f64,
    pub last_price: f64,
    pub total_ticks: i64,
    pub total_orders: i64,
    pub is_running: bool,
    pub last_tick_at: Option<String>,
    pub started_at: String,
    pub updated_at: String,
}

/// Stored per-tick sentiment signal.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredSignal {
    pub id: i64,
    pub timestamp: String,
    pub symbol: String,
    pub headline_count: i64,
    pub label: String,
    pub confidence: f64,
    pub action: String,
}

/// Stored bracket order record.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredOrder {
    pub client_order_id: String,
    pub symbol: String,
    pub side: String,
    pub quantity: i64,
    pub take_profit: f64,
    pub stop_loss: f64,
    pub status: String,
    pub submitted_at: String,
}

/// Equity curve point.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EquityPoint {
    pub id: i64,
    pub timestamp: String,
    pub equity: f64,
    pub cash: f64,
    pub position_qty: f64,
}

impl Database {
    /// Create a new database connection.
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("Failed to connect to database")?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run all database migrations.
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bot_state (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                symbol TEXT NOT NULL DEFAULT '',
                cash REAL NOT NULL DEFAULT 0,
                last_price REAL NOT NULL DEFAULT 0,
                total_ticks INTEGER NOT NULL DEFAULT 0,
                total_orders INTEGER NOT NULL DEFAULT 0,
                is_running INTEGER NOT NULL DEFAULT 0,
                last_tick_at TEXT,
                started_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS signals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                symbol TEXT NOT NULL,
                headline_count INTEGER NOT NULL,
                label TEXT NOT NULL,
                confidence REAL NOT NULL,
                action TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                client_order_id TEXT PRIMARY KEY,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                take_profit REAL NOT NULL,
                stop_loss REAL NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                submitted_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS equity_curve (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                equity REAL NOT NULL,
                cash REAL NOT NULL DEFAULT 0,
                position_qty REAL NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_signals_time ON signals(timestamp)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_orders_symbol ON orders(symbol)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_equity_curve_time ON equity_curve(timestamp)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // ==================== Bot State ====================

    /// Initialize the single bot state row, or mark an existing session as
    /// running again.
    pub async fn init_bot_state(&self, symbol: &str) -> Result<BotState> {
        sqlx::query(
            r#"
            INSERT INTO bot_state (id, symbol, is_running, started_at, updated_at)
            VALUES (1, ?, 1, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
            ON CONFLICT(id) DO UPDATE SET
                symbol = excluded.symbol,
                is_running = 1,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(symbol)
        .execute(&self.pool)
        .await?;

        self.get_bot_state().await
    }

    pub async fn get_bot_state(&self) -> Result<BotState> {
        sqlx::query_as::<_, BotState>("SELECT * FROM bot_state WHERE id = 1")
            .fetch_one(&self.pool)
            .await
            .context("No bot state found")
    }

    /// Update cash/price snapshot and bump the tick counter.
    pub async fn record_tick(&self, cash: f64, last_price: f64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE bot_state SET
                cash = ?,
                last_price = ?,
                total_ticks = total_ticks + 1,
                last_tick_at = CURRENT_TIMESTAMP,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = 1
            "#,
        )
        .bind(cash)
        .bind(last_price)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_bot_stopped(&self) -> Result<()> {
        sqlx::query(
            "UPDATE bot_state SET is_running = 0, updated_at = CURRENT_TIMESTAMP WHERE id = 1",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ==================== Signals ====================

    pub async fn record_signal(
        &self,
        symbol: &str,
        headline_count: usize,
        label: &str,
        confidence: f64,
        action: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO signals (symbol, headline_count, label, confidence, action)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(symbol)
        .bind(headline_count as i64)
        .bind(label)
        .bind(confidence)
        .bind(action)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn recent_signals(&self, limit: i64) -> Result<Vec<StoredSignal>> {
        let signals = sqlx::query_as::<_, StoredSignal>(
            "SELECT * FROM signals ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(signals)
    }

    // ==================== Orders ====================

    pub async fn save_order(
        &self,
        client_order_id: &str,
        symbol: &str,
        side: &str,
        quantity: i64,
        take_profit: f64,
        stop_loss: f64,
        status: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (client_order_id, symbol, side, quantity, take_profit, stop_loss, status)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(client_order_id)
        .bind(symbol)
        .bind(side)
        .bind(quantity)
        .bind(take_profit)
        .bind(stop_loss)
        .bind(status)
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "UPDATE bot_state SET total_orders = total_orders + 1, updated_at = CURRENT_TIMESTAMP WHERE id = 1",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn recent_orders(&self, limit: i64) -> Result<Vec<StoredOrder>> {
        let orders = sqlx::query_as::<_, StoredOrder>(
            "SELECT * FROM orders ORDER BY submitted_at DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }

    /// Counts of (total, submitted, failed) orders.
    pub async fn get_order_stats(&self) -> Result<(i64, i64, i64)> {
        let row: (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN status NOT IN ('failed') THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0)
            FROM orders
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    // ==================== Equity Curve ====================

    pub async fn record_equity_point(
        &self,
        equity: f64,
        cash: f64,
        position_qty: f64,
    ) -> Result<()> {
        sqlx::query("INSERT INTO equity_curve (equity, cash, position_qty) VALUES (?, ?, ?)")
            .bind(equity)
            .bind(cash)
            .bind(position_qty)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Maximum drawdown over the recorded equity curve, as a fraction.
    pub async fn calculate_max_drawdown(&self) -> Result<f64> {
        let points: Vec<(f64,)> =
            sqlx::query_as("SELECT equity FROM equity_curve ORDER BY id ASC")
                .fetch_all(&self.pool)
                .await?;

        let mut peak = f64::MIN;
        let mut max_dd = 0.0f64;
        for (equity,) in points {
            if equity > peak {
                peak = equity;
            }
            if peak > 0.0 {
                let dd = (peak - equity) / peak;
                if dd > max_dd {
                    max_dd = dd;
                }
            }
        }
        Ok(max_dd)
    }
}
