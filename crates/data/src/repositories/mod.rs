//! Database repositories for the MarketFlow store.
//!
//! Each repository provides typed access to a specific table with
//! transactional batch writes and time-range queries.

pub mod anomaly_repo;
pub mod candle_repo;
pub mod etl_log_repo;

pub use anomaly_repo::{AnomalyRepository, DailyAnomalyCount};
pub use candle_repo::CandleRepository;
pub use etl_log_repo::EtlLogRepository;

use sqlx::SqlitePool;

/// Creates all repositories from a single database pool.
pub struct Repositories {
    pub candles: CandleRepository,
    pub etl_logs: EtlLogRepository,
    pub anomalies: AnomalyRepository,
}

impl Repositories {
    /// Creates a new set of repositories from a database pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            candles: CandleRepository::new(pool.clone()),
            etl_logs: EtlLogRepository::new(pool.clone()),
            anomalies: AnomalyRepository::new(pool),
        }
    }
}

#[cfg(test)]
mod tests {
    // Integration tests live in the individual repository modules, which
    // run against an in-memory database.
}
