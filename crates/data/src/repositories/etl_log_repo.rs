//! ETL log repository.
//!
//! Append-only audit trail: one entry per ingestion or standardization run
//! per coin.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;

use crate::models::{EtlLogRecord, EtlStatus};

/// Repository for ETL audit log operations.
#[derive(Debug, Clone)]
pub struct EtlLogRepository {
    pool: SqlitePool,
}

impl EtlLogRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Appends one log entry stamped with the current time.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert(
        &self,
        coin: &str,
        status: EtlStatus,
        message: &str,
        records_processed: i64,
    ) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO etl_logs (coin, status, message, records_processed, timestamp)
            VALUES (?, ?, ?, ?, ?)
            ",
        )
        .bind(coin)
        .bind(status)
        .bind(message)
        .bind(records_processed)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to insert ETL log entry")?;

        Ok(())
    }

    /// Queries the most recent entries, optionally restricted to one coin.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn query_latest(&self, coin: Option<&str>, limit: i64) -> Result<Vec<EtlLogRecord>> {
        let records = match coin {
            Some(coin) => {
                sqlx::query_as::<_, EtlLogRecord>(
                    r"
                    SELECT coin, status, message, records_processed, timestamp
                    FROM etl_logs
                    WHERE coin = ?
                    ORDER BY timestamp DESC
                    LIMIT ?
                    ",
                )
                .bind(coin)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, EtlLogRecord>(
                    r"
                    SELECT coin, status, message, records_processed, timestamp
                    FROM etl_logs
                    ORDER BY timestamp DESC
                    LIMIT ?
                    ",
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
        }
        .context("Failed to query ETL logs")?;

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;

    async fn repo() -> EtlLogRepository {
        let db = Database::connect_in_memory().await.unwrap();
        EtlLogRepository::new(db.pool())
    }

    #[tokio::test]
    async fn test_insert_and_query_latest() {
        let repo = repo().await;
        repo.insert("bitcoin", EtlStatus::Success, "Processed 48 records", 48)
            .await
            .unwrap();
        repo.insert("ethereum", EtlStatus::Error, "request timeout", 0)
            .await
            .unwrap();

        let all = repo.query_latest(None, 10).await.unwrap();
        assert_eq!(all.len(), 2);

        let bitcoin_only = repo.query_latest(Some("bitcoin"), 10).await.unwrap();
        assert_eq!(bitcoin_only.len(), 1);
        assert_eq!(bitcoin_only[0].status, EtlStatus::Success);
        assert_eq!(bitcoin_only[0].records_processed, 48);
    }

    #[tokio::test]
    async fn test_entries_are_append_only() {
        let repo = repo().await;
        for _ in 0..3 {
            repo.insert("bitcoin", EtlStatus::Success, "run", 10)
                .await
                .unwrap();
        }
        assert_eq!(repo.query_latest(Some("bitcoin"), 10).await.unwrap().len(), 3);
    }
}
