//! Candle repository.
//!
//! Provides idempotent batch upsert and time-range query operations for
//! OHLCV candles. The natural key is (coin, timestamp); re-inserting an
//! existing key replaces the row.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::models::CandleRecord;

/// Repository for OHLCV candle operations.
#[derive(Debug, Clone)]
pub struct CandleRepository {
    pool: SqlitePool,
}

impl CandleRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Upserts a batch of candles inside a single transaction.
    ///
    /// Conflicts on (coin, timestamp) replace the stored row, so the table
    /// never holds more rows per coin than distinct timestamps seen. NaN
    /// volume is coerced to 0.0 at this boundary.
    ///
    /// # Returns
    /// The number of rows written.
    ///
    /// # Errors
    /// Returns an error if the transaction fails; no partial batch survives.
    pub async fn upsert_batch(&self, records: &[CandleRecord]) -> Result<u64> {
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
                INSERT INTO ohlcv (coin, timestamp, open, high, low, close, volume)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT (coin, timestamp) DO UPDATE SET
                    open = excluded.open,
                    high = excluded.high,
                    low = excluded.low,
                    close = excluded.close,
                    volume = excluded.volume
                ",
            )
            .bind(&record.coin)
            .bind(record.timestamp)
            .bind(record.open)
            .bind(record.high)
            .bind(record.low)
            .bind(record.close)
            .bind(record.persisted_volume())
            .execute(&mut *tx)
            .await
            .context("Failed to upsert candle")?;

            written += result.rows_affected();
        }

        tx.commit().await.context("Failed to commit transaction")?;
        Ok(written)
    }

    /// Queries candles for a coin within a time range, ascending.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn query_by_time_range(
        &self,
        coin: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CandleRecord>> {
        let records = sqlx::query_as::<_, CandleRecord>(
            r"
            SELECT coin, timestamp, open, high, low, close, volume
            FROM ohlcv
            WHERE coin = ? AND timestamp >= ? AND timestamp <= ?
            ORDER BY timestamp ASC
            ",
        )
        .bind(coin)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .context("Failed to query candles")?;

        Ok(records)
    }

    /// Queries the most recent `limit` candles for a coin, ascending.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn query_latest(&self, coin: &str, limit: i64) -> Result<Vec<CandleRecord>> {
        let records = sqlx::query_as::<_, CandleRecord>(
            r"
            SELECT coin, timestamp, open, high, low, close, volume
            FROM (
                SELECT coin, timestamp, open, high, low, close, volume
                FROM ohlcv
                WHERE coin = ?
                ORDER BY timestamp DESC
                LIMIT ?
            )
            ORDER BY timestamp ASC
            ",
        )
        .bind(coin)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to query latest candles")?;

        Ok(records)
    }

    /// Gets the earliest and latest stored timestamps for a coin.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn data_bounds(
        &self,
        coin: &str,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>> {
        let row: (Option<DateTime<Utc>>, Option<DateTime<Utc>>) = sqlx::query_as(
            r"
            SELECT MIN(timestamp), MAX(timestamp)
            FROM ohlcv
            WHERE coin = ?
            ",
        )
        .bind(coin)
        .fetch_one(&self.pool)
        .await
        .context("Failed to query data bounds")?;

        match row {
            (Some(min), Some(max)) => Ok(Some((min, max))),
            _ => Ok(None),
        }
    }

    /// Counts stored candles for a coin.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn count_records(&self, coin: &str) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ohlcv WHERE coin = ?")
            .bind(coin)
            .fetch_one(&self.pool)
            .await
            .context("Failed to count candles")?;

        Ok(row.0)
    }

    /// Lists the distinct coins present in the store.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn list_coins(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT DISTINCT coin FROM ohlcv ORDER BY coin ASC")
                .fetch_all(&self.pool)
                .await
                .context("Failed to list coins")?;

        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    /// Deletes a coin's entire candle history, returning rows removed.
    ///
    /// Used by standardization's delete-then-insert rebuild.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn delete_coin(&self, coin: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM ohlcv WHERE coin = ?")
            .bind(coin)
            .execute(&self.pool)
            .await
            .context("Failed to delete coin history")?;

        Ok(result.rows_affected())
    }

    /// Deletes a coin's candles at or after the given timestamp.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn delete_since(&self, coin: &str, since: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM ohlcv WHERE coin = ? AND timestamp >= ?")
            .bind(coin)
            .bind(since)
            .execute(&self.pool)
            .await
            .context("Failed to delete candles since timestamp")?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use chrono::TimeZone;

    fn sample_timestamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap()
    }

    fn candle(coin: &str, timestamp: DateTime<Utc>, close: f64) -> CandleRecord {
        CandleRecord::new(coin, timestamp, close - 10.0, close + 20.0, close - 30.0, close, 500.0)
    }

    async fn repo() -> CandleRepository {
        let db = Database::connect_in_memory().await.unwrap();
        CandleRepository::new(db.pool())
    }

    // ============================================
    // Upsert Invariant Tests
    // ============================================

    #[tokio::test]
    async fn test_upsert_replaces_existing_key() {
        let repo = repo().await;
        let ts = sample_timestamp();

        repo.upsert_batch(&[candle("bitcoin", ts, 47000.0)])
            .await
            .unwrap();
        repo.upsert_batch(&[candle("bitcoin", ts, 48000.0)])
            .await
            .unwrap();

        assert_eq!(repo.count_records("bitcoin").await.unwrap(), 1);
        let rows = repo.query_latest("bitcoin", 10).await.unwrap();
        assert!((rows[0].close - 48000.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_row_count_never_exceeds_distinct_timestamps() {
        let repo = repo().await;
        let base = sample_timestamp();
        let records: Vec<CandleRecord> = (0..5i64)
            .map(|i| {
                candle(
                    "bitcoin",
                    base + chrono::Duration::minutes(30 * (i % 3)),
                    100.0 + i as f64,
                )
            })
            .collect();

        repo.upsert_batch(&records).await.unwrap();
        assert_eq!(repo.count_records("bitcoin").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_upsert_coerces_nan_volume_to_zero() {
        let repo = repo().await;
        let mut record = candle("bitcoin", sample_timestamp(), 47000.0);
        record.volume = f64::NAN;

        repo.upsert_batch(&[record]).await.unwrap();
        let rows = repo.query_latest("bitcoin", 1).await.unwrap();
        assert!((rows[0].volume - 0.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let repo = repo().await;
        assert_eq!(repo.upsert_batch(&[]).await.unwrap(), 0);
    }

    // ============================================
    // Query Tests
    // ============================================

    #[tokio::test]
    async fn test_time_range_query_ascending_and_inclusive() {
        let repo = repo().await;
        let base = sample_timestamp();
        let records: Vec<CandleRecord> = (0..4)
            .map(|i| candle("bitcoin", base + chrono::Duration::hours(i), 100.0 + i as f64))
            .collect();
        repo.upsert_batch(&records).await.unwrap();

        let rows = repo
            .query_by_time_range("bitcoin", base, base + chrono::Duration::hours(2))
            .await
            .unwrap();

        assert_eq!(rows.len(), 3);
        assert!(rows.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[tokio::test]
    async fn test_query_latest_returns_most_recent_ascending() {
        let repo = repo().await;
        let base = sample_timestamp();
        let records: Vec<CandleRecord> = (0..5)
            .map(|i| candle("bitcoin", base + chrono::Duration::hours(i), 100.0 + i as f64))
            .collect();
        repo.upsert_batch(&records).await.unwrap();

        let rows = repo.query_latest("bitcoin", 2).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!((rows[0].close - 103.0).abs() < f64::EPSILON);
        assert!((rows[1].close - 104.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_data_bounds() {
        let repo = repo().await;
        assert!(repo.data_bounds("bitcoin").await.unwrap().is_none());

        let base = sample_timestamp();
        repo.upsert_batch(&[
            candle("bitcoin", base, 100.0),
            candle("bitcoin", base + chrono::Duration::days(1), 101.0),
        ])
        .await
        .unwrap();

        let (earliest, latest) = repo.data_bounds("bitcoin").await.unwrap().unwrap();
        assert_eq!(earliest, base);
        assert_eq!(latest, base + chrono::Duration::days(1));
    }

    #[tokio::test]
    async fn test_queries_are_scoped_per_coin() {
        let repo = repo().await;
        let ts = sample_timestamp();
        repo.upsert_batch(&[candle("bitcoin", ts, 100.0), candle("ethereum", ts, 4000.0)])
            .await
            .unwrap();

        assert_eq!(repo.count_records("bitcoin").await.unwrap(), 1);
        assert_eq!(
            repo.list_coins().await.unwrap(),
            vec!["bitcoin".to_string(), "ethereum".to_string()]
        );
    }

    // ============================================
    // Delete Tests
    // ============================================

    #[tokio::test]
    async fn test_delete_coin_clears_only_that_coin() {
        let repo = repo().await;
        let ts = sample_timestamp();
        repo.upsert_batch(&[candle("bitcoin", ts, 100.0), candle("ethereum", ts, 4000.0)])
            .await
            .unwrap();

        assert_eq!(repo.delete_coin("bitcoin").await.unwrap(), 1);
        assert_eq!(repo.count_records("bitcoin").await.unwrap(), 0);
        assert_eq!(repo.count_records("ethereum").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_since_is_inclusive() {
        let repo = repo().await;
        let base = sample_timestamp();
        let records: Vec<CandleRecord> = (0..3)
            .map(|i| candle("bitcoin", base + chrono::Duration::hours(i), 100.0))
            .collect();
        repo.upsert_batch(&records).await.unwrap();

        let removed = repo
            .delete_since("bitcoin", base + chrono::Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(repo.count_records("bitcoin").await.unwrap(), 1);
    }
}
