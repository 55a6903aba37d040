//! Anomaly event repository.
//!
//! Events are durable audit records. The (coin, timestamp, anomaly_type)
//! unique key makes re-running detection over the same window idempotent:
//! a conflicting insert refreshes the stored score instead of duplicating
//! the event.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::models::{AnomalyRecord, AnomalyType};

/// Anomaly counts for one day, used by trend queries.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DailyAnomalyCount {
    /// Day in `YYYY-MM-DD` form.
    pub day: String,
    pub count: i64,
}

/// Repository for anomaly event operations.
#[derive(Debug, Clone)]
pub struct AnomalyRepository {
    pool: SqlitePool,
}

impl AnomalyRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Upserts one anomaly event.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn upsert(&self, record: &AnomalyRecord) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO anomalies (coin, timestamp, anomaly_type, value, zscore, threshold)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (coin, timestamp, anomaly_type) DO UPDATE SET
                value = excluded.value,
                zscore = excluded.zscore,
                threshold = excluded.threshold
            ",
        )
        .bind(&record.coin)
        .bind(record.timestamp)
        .bind(record.anomaly_type)
        .bind(record.value)
        .bind(record.zscore)
        .bind(record.threshold)
        .execute(&self.pool)
        .await
        .context("Failed to upsert anomaly event")?;

        Ok(())
    }

    /// Upserts a batch of events inside a single transaction.
    ///
    /// # Errors
    /// Returns an error if the transaction fails; no partial batch survives.
    pub async fn upsert_batch(&self, records: &[AnomalyRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;
        let mut written = 0u64;

        for record in records {
            let result = sqlx::query(
                r"
                INSERT INTO anomalies (coin, timestamp, anomaly_type, value, zscore, threshold)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT (coin, timestamp, anomaly_type) DO UPDATE SET
                    value = excluded.value,
                    zscore = excluded.zscore,
                    threshold = excluded.threshold
                ",
            )
            .bind(&record.coin)
            .bind(record.timestamp)
            .bind(record.anomaly_type)
            .bind(record.value)
            .bind(record.zscore)
            .bind(record.threshold)
            .execute(&mut *tx)
            .await
            .context("Failed to upsert anomaly event")?;

            written += result.rows_affected();
        }

        tx.commit().await.context("Failed to commit transaction")?;
        Ok(written)
    }

    /// Queries the most recent events, optionally restricted to one coin.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn query_latest(&self, coin: Option<&str>, limit: i64) -> Result<Vec<AnomalyRecord>> {
        let records = match coin {
            Some(coin) => {
                sqlx::query_as::<_, AnomalyRecord>(
                    r"
                    SELECT coin, timestamp, anomaly_type, value, zscore, threshold
                    FROM anomalies
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
                sqlx::query_as::<_, AnomalyRecord>(
                    r"
                    SELECT coin, timestamp, anomaly_type, value, zscore, threshold
                    FROM anomalies
                    ORDER BY timestamp DESC
                    LIMIT ?
                    ",
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
        }
        .context("Failed to query anomalies")?;

        Ok(records)
    }

    /// Counts events grouped by type.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn counts_by_type(&self) -> Result<Vec<(AnomalyType, i64)>> {
        let rows: Vec<(AnomalyType, i64)> = sqlx::query_as(
            r"
            SELECT anomaly_type, COUNT(*)
            FROM anomalies
            GROUP BY anomaly_type
            ORDER BY anomaly_type
            ",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to count anomalies by type")?;

        Ok(rows)
    }

    /// Counts events grouped by coin.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn counts_by_coin(&self) -> Result<Vec<(String, i64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r"
            SELECT coin, COUNT(*)
            FROM anomalies
            GROUP BY coin
            ORDER BY coin
            ",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to count anomalies by coin")?;

        Ok(rows)
    }

    /// Daily event counts for one coin over a trailing window.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn daily_counts(
        &self,
        coin: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<DailyAnomalyCount>> {
        let rows = sqlx::query_as::<_, DailyAnomalyCount>(
            r"
            SELECT date(timestamp) AS day, COUNT(*) AS count
            FROM anomalies
            WHERE coin = ? AND timestamp >= ?
            GROUP BY date(timestamp)
            ORDER BY day ASC
            ",
        )
        .bind(coin)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .context("Failed to query daily anomaly counts")?;

        Ok(rows)
    }

    /// Mean absolute z-score across a coin's events since a timestamp.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn average_zscore(&self, coin: &str, since: DateTime<Utc>) -> Result<Option<f64>> {
        let row: (Option<f64>,) = sqlx::query_as(
            r"
            SELECT AVG(ABS(zscore))
            FROM anomalies
            WHERE coin = ? AND timestamp >= ?
            ",
        )
        .bind(coin)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .context("Failed to query average zscore")?;

        Ok(row.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use chrono::TimeZone;

    fn event(coin: &str, hour: u32, anomaly_type: AnomalyType, zscore: f64) -> AnomalyRecord {
        AnomalyRecord {
            coin: coin.to_string(),
            timestamp: Utc.with_ymd_and_hms(2022, 1, 1, hour, 0, 0).unwrap(),
            anomaly_type,
            value: 1_000_000.0,
            zscore,
            threshold: 3.0,
        }
    }

    async fn repo() -> AnomalyRepository {
        let db = Database::connect_in_memory().await.unwrap();
        AnomalyRepository::new(db.pool())
    }

    // ============================================
    // Idempotency Tests
    // ============================================

    #[tokio::test]
    async fn test_upsert_is_idempotent_per_natural_key() {
        let repo = repo().await;
        let first = event("bitcoin", 0, AnomalyType::Volume, 3.5);
        let mut second = first.clone();
        second.zscore = 4.1;

        repo.upsert(&first).await.unwrap();
        repo.upsert(&second).await.unwrap();

        let stored = repo.query_latest(Some("bitcoin"), 10).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert!((stored[0].zscore - 4.1).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_same_timestamp_different_type_kept_separately() {
        let repo = repo().await;
        repo.upsert(&event("bitcoin", 0, AnomalyType::Volume, 3.5))
            .await
            .unwrap();
        repo.upsert(&event("bitcoin", 0, AnomalyType::Price, 2.9))
            .await
            .unwrap();

        assert_eq!(repo.query_latest(Some("bitcoin"), 10).await.unwrap().len(), 2);
    }

    // ============================================
    // Aggregate Tests
    // ============================================

    #[tokio::test]
    async fn test_counts_by_type_and_coin() {
        let repo = repo().await;
        repo.upsert_batch(&[
            event("bitcoin", 0, AnomalyType::Volume, 3.5),
            event("bitcoin", 1, AnomalyType::Volume, 3.7),
            event("bitcoin", 2, AnomalyType::Price, 2.9),
            event("ethereum", 0, AnomalyType::Volatility, 3.1),
        ])
        .await
        .unwrap();

        let by_type = repo.counts_by_type().await.unwrap();
        assert!(by_type.contains(&(AnomalyType::Volume, 2)));
        assert!(by_type.contains(&(AnomalyType::Price, 1)));
        assert!(by_type.contains(&(AnomalyType::Volatility, 1)));

        let by_coin = repo.counts_by_coin().await.unwrap();
        assert!(by_coin.contains(&("bitcoin".to_string(), 3)));
        assert!(by_coin.contains(&("ethereum".to_string(), 1)));
    }

    #[tokio::test]
    async fn test_daily_counts_grouped_by_day() {
        let repo = repo().await;
        let mut late = event("bitcoin", 3, AnomalyType::Volume, 3.5);
        late.timestamp = Utc.with_ymd_and_hms(2022, 1, 2, 3, 0, 0).unwrap();

        repo.upsert_batch(&[
            event("bitcoin", 0, AnomalyType::Volume, 3.5),
            event("bitcoin", 1, AnomalyType::Price, 2.9),
            late,
        ])
        .await
        .unwrap();

        let since = Utc.with_ymd_and_hms(2021, 12, 31, 0, 0, 0).unwrap();
        let daily = repo.daily_counts("bitcoin", since).await.unwrap();
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].day, "2022-01-01");
        assert_eq!(daily[0].count, 2);
        assert_eq!(daily[1].day, "2022-01-02");
        assert_eq!(daily[1].count, 1);
    }

    #[tokio::test]
    async fn test_average_zscore_none_when_empty() {
        let repo = repo().await;
        let since = Utc.with_ymd_and_hms(2021, 12, 31, 0, 0, 0).unwrap();
        assert!(repo.average_zscore("bitcoin", since).await.unwrap().is_none());
    }
}
