use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// SQLite database handle with schema bootstrap.
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if missing) the database at the given path and
    /// ensures the schema exists.
    ///
    /// # Errors
    /// Returns an error if the parent directory cannot be created, the
    /// database cannot be opened, or schema creation fails.
    pub async fn connect(path: &str, max_connections: u32) -> Result<Self> {
        if let Some(dir) = Path::new(path).parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create data directory {}", dir.display()))?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{path}"))
            .context("Invalid database path")?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .context("Failed to open SQLite database")?;

        Self::init_schema(&pool).await?;
        tracing::info!("Database ready at {}", path);

        Ok(Self { pool })
    }

    /// Opens an in-memory database, used by tests.
    ///
    /// The pool is capped at one connection: each SQLite `:memory:`
    /// connection is a separate database.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or schema creation
    /// fails.
    pub async fn connect_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory SQLite database")?;

        Self::init_schema(&pool).await?;
        Ok(Self { pool })
    }

    async fn init_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS ohlcv (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                coin TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume REAL NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(coin, timestamp)
            )
            ",
        )
        .execute(pool)
        .await
        .context("Failed to create ohlcv table")?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS etl_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                coin TEXT NOT NULL,
                status TEXT NOT NULL,
                message TEXT,
                records_processed INTEGER NOT NULL DEFAULT 0,
                timestamp TEXT NOT NULL
            )
            ",
        )
        .execute(pool)
        .await
        .context("Failed to create etl_logs table")?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS anomalies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                coin TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                anomaly_type TEXT NOT NULL,
                value REAL NOT NULL,
                zscore REAL NOT NULL,
                threshold REAL NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(coin, timestamp, anomaly_type)
            )
            ",
        )
        .execute(pool)
        .await
        .context("Failed to create anomalies table")?;

        for statement in [
            "CREATE INDEX IF NOT EXISTS idx_ohlcv_coin_timestamp ON ohlcv(coin, timestamp)",
            "CREATE INDEX IF NOT EXISTS idx_etl_logs_coin_timestamp ON etl_logs(coin, timestamp)",
            "CREATE INDEX IF NOT EXISTS idx_anomalies_coin_timestamp ON anomalies(coin, timestamp)",
        ] {
            sqlx::query(statement)
                .execute(pool)
                .await
                .context("Failed to create index")?;
        }

        Ok(())
    }

    /// Returns a clone of the underlying pool for repository construction.
    #[must_use]
    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    /// Collects row counts and coverage statistics across all tables.
    ///
    /// # Errors
    /// Returns an error if any of the aggregate queries fail.
    pub async fn stats(&self) -> Result<DatabaseStats> {
        let (ohlcv_count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ohlcv")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count ohlcv rows")?;
        let (etl_log_count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM etl_logs")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count etl_logs rows")?;
        let (anomaly_count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM anomalies")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count anomalies rows")?;
        let (unique_coins,): (i64,) = sqlx::query_as("SELECT COUNT(DISTINCT coin) FROM ohlcv")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count distinct coins")?;

        let bounds: (Option<DateTime<Utc>>, Option<DateTime<Utc>>) =
            sqlx::query_as("SELECT MIN(timestamp), MAX(timestamp) FROM ohlcv")
                .fetch_one(&self.pool)
                .await
                .context("Failed to query data bounds")?;

        Ok(DatabaseStats {
            ohlcv_count,
            etl_log_count,
            anomaly_count,
            unique_coins,
            earliest: bounds.0,
            latest: bounds.1,
        })
    }
}

/// Row counts and date coverage across the store.
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStats {
    pub ohlcv_count: i64,
    pub etl_log_count: i64,
    pub anomaly_count: i64,
    pub unique_coins: i64,
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
}
