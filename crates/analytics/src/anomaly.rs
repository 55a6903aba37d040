//! Z-score anomaly detection over candle history.
//!
//! Scoring is stateless: each call recomputes z-scores against the whole
//! supplied window (whole-series mean and sample stddev, not rolling).
//! Detection persists every flagged row as a durable anomaly event; the
//! (coin, timestamp, anomaly_type) key in the store makes repeated runs
//! over the same window idempotent.

use crate::{metrics, series};
use anyhow::Result;
use chrono::{Duration, Utc};
use marketflow_data::{
    AnomalyRecord, AnomalyRepository, AnomalyType, CandleRecord, DailyAnomalyCount,
};
use serde::Serialize;

/// Thresholds and window parameters for detection.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// |z| threshold for volume anomalies.
    pub volume_threshold: f64,
    /// |z| threshold for price (returns) and volatility anomalies.
    pub price_threshold: f64,
    /// Rolling window for the volatility series.
    pub volatility_window: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            volume_threshold: 3.0,
            price_threshold: 2.5,
            volatility_window: 24,
        }
    }
}

/// Z-scores and flags for one metric series.
#[derive(Debug, Clone)]
pub struct SeriesScore {
    pub zscores: Vec<f64>,
    pub flags: Vec<bool>,
    pub mean: f64,
    pub std: f64,
}

/// Computes whole-series z-scores and threshold flags.
///
/// A series whose standard deviation is exactly zero scores 0 everywhere
/// and flags nothing; NaN inputs score NaN and flag nothing.
#[must_use]
pub fn score_series(values: &[f64], threshold: f64, label: &str) -> SeriesScore {
    let mean = series::mean(values);
    let std = series::std_dev(values);

    if std == 0.0 {
        tracing::warn!("Standard deviation is 0 for {} series", label);
        return SeriesScore {
            zscores: vec![0.0; values.len()],
            flags: vec![false; values.len()],
            mean,
            std,
        };
    }

    let zscores: Vec<f64> = values.iter().map(|v| (v - mean) / std).collect();
    let flags: Vec<bool> = zscores
        .iter()
        .map(|z| !z.is_nan() && z.abs() > threshold)
        .collect();

    SeriesScore {
        zscores,
        flags,
        mean,
        std,
    }
}

/// Full scoring output for one candle slice.
#[derive(Debug, Clone)]
pub struct AnomalyReport {
    pub volume: SeriesScore,
    pub price: SeriesScore,
    pub volatility: SeriesScore,
    /// Logical OR of the three per-row flag vectors.
    pub any_anomaly: Vec<bool>,
    /// One event per flagged row, in input order.
    pub events: Vec<AnomalyRecord>,
}

impl AnomalyReport {
    /// Total number of flagged rows across all three metrics.
    #[must_use]
    pub fn total_flagged(&self) -> usize {
        self.events.len()
    }
}

/// Counts of persisted events grouped for the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct AnomalySummary {
    pub total_anomalies: i64,
    pub by_type: Vec<(AnomalyType, i64)>,
    pub by_coin: Vec<(String, i64)>,
    pub recent_anomalies: Vec<AnomalyRecord>,
}

/// Daily trend of one coin's persisted events.
#[derive(Debug, Clone, Serialize)]
pub struct AnomalyTrends {
    pub daily_counts: Vec<DailyAnomalyCount>,
    pub total_anomalies: i64,
    pub average_zscore: Option<f64>,
}

/// Detects anomalies and persists flagged rows as durable events.
pub struct AnomalyDetector {
    repo: AnomalyRepository,
    config: DetectorConfig,
}

impl AnomalyDetector {
    /// Creates a new detector writing through the given repository.
    #[must_use]
    pub fn new(repo: AnomalyRepository, config: DetectorConfig) -> Self {
        Self { repo, config }
    }

    /// Scores a candle slice without touching the store.
    ///
    /// Volume anomalies score the volume column, price anomalies score the
    /// returns column, volatility anomalies score the rolling-volatility
    /// column against its own whole-series statistics.
    #[must_use]
    pub fn evaluate(&self, coin: &str, candles: &[CandleRecord]) -> AnomalyReport {
        let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let returns = metrics::returns(&closes);
        let volatility = metrics::volatility(&returns, self.config.volatility_window);

        let volume_score = score_series(&volumes, self.config.volume_threshold, "volume");
        let price_score = score_series(&returns, self.config.price_threshold, "returns");
        let volatility_score =
            score_series(&volatility, self.config.price_threshold, "volatility");

        let any_anomaly: Vec<bool> = (0..candles.len())
            .map(|i| volume_score.flags[i] || price_score.flags[i] || volatility_score.flags[i])
            .collect();

        let mut events = Vec::new();
        for (i, candle) in candles.iter().enumerate() {
            if volume_score.flags[i] {
                events.push(AnomalyRecord {
                    coin: coin.to_string(),
                    timestamp: candle.timestamp,
                    anomaly_type: AnomalyType::Volume,
                    value: candle.volume,
                    zscore: volume_score.zscores[i],
                    threshold: self.config.volume_threshold,
                });
            }
            if price_score.flags[i] {
                events.push(AnomalyRecord {
                    coin: coin.to_string(),
                    timestamp: candle.timestamp,
                    anomaly_type: AnomalyType::Price,
                    value: candle.close,
                    zscore: price_score.zscores[i],
                    threshold: self.config.price_threshold,
                });
            }
            if volatility_score.flags[i] {
                events.push(AnomalyRecord {
                    coin: coin.to_string(),
                    timestamp: candle.timestamp,
                    anomaly_type: AnomalyType::Volatility,
                    value: volatility[i],
                    zscore: volatility_score.zscores[i],
                    threshold: self.config.price_threshold,
                });
            }
        }

        AnomalyReport {
            volume: volume_score,
            price: price_score,
            volatility: volatility_score,
            any_anomaly,
            events,
        }
    }

    /// Runs all detection methods and persists every flagged row.
    ///
    /// # Errors
    /// Returns an error if writing events to the store fails.
    pub async fn detect_all(&self, coin: &str, candles: &[CandleRecord]) -> Result<AnomalyReport> {
        tracing::info!("Running anomaly detection for {}", coin);
        let report = self.evaluate(coin, candles);

        self.repo.upsert_batch(&report.events).await?;
        tracing::info!(
            "Detected {} anomalies for {} ({} rows flagged)",
            report.events.len(),
            coin,
            report.any_anomaly.iter().filter(|f| **f).count()
        );

        Ok(report)
    }

    /// Summarizes persisted events, optionally for one coin.
    ///
    /// # Errors
    /// Returns an error if the store queries fail.
    pub async fn summary(&self, coin: Option<&str>, limit: i64) -> Result<AnomalySummary> {
        let recent = self.repo.query_latest(coin, limit).await?;
        let by_type = self.repo.counts_by_type().await?;
        let by_coin = self.repo.counts_by_coin().await?;
        let total_anomalies = by_type.iter().map(|(_, n)| n).sum();

        Ok(AnomalySummary {
            total_anomalies,
            by_type,
            by_coin,
            recent_anomalies: recent.into_iter().take(10).collect(),
        })
    }

    /// Daily event counts for one coin over a trailing window of days.
    ///
    /// # Errors
    /// Returns an error if the store queries fail.
    pub async fn trends(&self, coin: &str, days: i64) -> Result<AnomalyTrends> {
        let since = Utc::now() - Duration::days(days);
        let daily_counts = self.repo.daily_counts(coin, since).await?;
        let total_anomalies = daily_counts.iter().map(|d| d.count).sum();
        let average_zscore = self.repo.average_zscore(coin, since).await?;

        Ok(AnomalyTrends {
            daily_counts,
            total_anomalies,
            average_zscore,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use marketflow_data::Database;

    fn base_time() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap()
    }

    fn candles_with_volumes(volumes: &[f64]) -> Vec<CandleRecord> {
        volumes
            .iter()
            .enumerate()
            .map(|(i, &volume)| {
                CandleRecord::new(
                    "bitcoin",
                    base_time() + Duration::hours(i as i64),
                    100.0,
                    101.0,
                    99.0,
                    100.0,
                    volume,
                )
            })
            .collect()
    }

    async fn detector() -> (AnomalyDetector, AnomalyRepository) {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = AnomalyRepository::new(db.pool());
        (
            AnomalyDetector::new(repo.clone(), DetectorConfig::default()),
            repo,
        )
    }

    // ============================================
    // Scoring Tests
    // ============================================

    #[test]
    fn test_degenerate_variance_scores_zero() {
        let score = score_series(&[5.0; 50], 3.0, "volume");
        assert!(score.zscores.iter().all(|z| *z == 0.0));
        assert!(score.flags.iter().all(|f| !f));
    }

    #[test]
    fn test_outlier_is_flagged() {
        let mut values = vec![10.0, 11.0, 9.0, 10.5, 9.5];
        values.extend(vec![10.0, 11.0, 9.0, 10.5, 9.5]);
        values.push(100.0);
        let score = score_series(&values, 3.0, "volume");
        assert!(score.flags[values.len() - 1]);
        assert_eq!(score.flags.iter().filter(|f| **f).count(), 1);
    }

    #[test]
    fn test_nan_positions_never_flag() {
        let values = [f64::NAN, 1.0, 2.0, 3.0, 2.0, 1.0];
        let score = score_series(&values, 0.1, "returns");
        assert!(score.zscores[0].is_nan());
        assert!(!score.flags[0]);
    }

    // ============================================
    // Detection + Persistence Tests
    // ============================================

    #[tokio::test]
    async fn test_volume_outlier_persists_one_event() {
        let (detector, repo) = detector().await;
        let mut volumes = vec![10.0, 11.0, 9.0, 10.5, 9.5, 10.2, 9.8, 10.1, 9.9, 10.3];
        volumes.extend_from_slice(&[10.0, 11.0, 9.0, 10.5, 9.5, 10.2, 9.8, 10.1, 9.9]);
        volumes.push(200.0);
        let candles = candles_with_volumes(&volumes);

        let report = detector.detect_all("bitcoin", &candles).await.unwrap();
        let volume_events: Vec<_> = report
            .events
            .iter()
            .filter(|e| e.anomaly_type == AnomalyType::Volume)
            .collect();
        assert_eq!(volume_events.len(), 1);
        assert_eq!(volume_events[0].timestamp, candles.last().unwrap().timestamp);
        assert!((volume_events[0].value - 200.0).abs() < f64::EPSILON);

        let stored = repo.query_latest(Some("bitcoin"), 100).await.unwrap();
        let stored_volume: Vec<_> = stored
            .iter()
            .filter(|e| e.anomaly_type == AnomalyType::Volume)
            .collect();
        assert_eq!(stored_volume.len(), 1);
    }

    #[tokio::test]
    async fn test_constant_series_produces_no_events() {
        let (detector, repo) = detector().await;
        let candles = candles_with_volumes(&vec![10.0; 48]);

        let report = detector.detect_all("bitcoin", &candles).await.unwrap();
        assert_eq!(report.total_flagged(), 0);
        assert!(report.any_anomaly.iter().all(|f| !f));
        assert!(repo.query_latest(None, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rerun_does_not_duplicate_events() {
        let (detector, repo) = detector().await;
        let mut volumes = vec![10.0; 30];
        volumes.push(500.0);
        let candles = candles_with_volumes(&volumes);

        detector.detect_all("bitcoin", &candles).await.unwrap();
        detector.detect_all("bitcoin", &candles).await.unwrap();

        let stored = repo.query_latest(Some("bitcoin"), 100).await.unwrap();
        let volume_events: Vec<_> = stored
            .iter()
            .filter(|e| e.anomaly_type == AnomalyType::Volume)
            .collect();
        assert_eq!(volume_events.len(), 1);
    }

    #[tokio::test]
    async fn test_any_anomaly_is_or_of_flags() {
        let (detector, _repo) = detector().await;
        let mut volumes = vec![10.0; 30];
        volumes.push(500.0);
        let candles = candles_with_volumes(&volumes);

        let report = detector.evaluate("bitcoin", &candles);
        for i in 0..candles.len() {
            assert_eq!(
                report.any_anomaly[i],
                report.volume.flags[i] || report.price.flags[i] || report.volatility.flags[i]
            );
        }
    }

    // ============================================
    // Summary / Trend Tests
    // ============================================

    #[tokio::test]
    async fn test_summary_reads_back_persisted_events() {
        let (detector, _repo) = detector().await;
        let mut volumes = vec![10.0; 30];
        volumes.push(500.0);
        let candles = candles_with_volumes(&volumes);
        detector.detect_all("bitcoin", &candles).await.unwrap();

        let summary = detector.summary(None, 100).await.unwrap();
        assert!(summary.total_anomalies >= 1);
        assert!(summary
            .by_type
            .iter()
            .any(|(t, n)| *t == AnomalyType::Volume && *n >= 1));
        assert!(summary.recent_anomalies.len() <= 10);
    }

    #[tokio::test]
    async fn test_trends_empty_without_events() {
        let (detector, _repo) = detector().await;
        let trends = detector.trends("bitcoin", 7).await.unwrap();
        assert_eq!(trends.total_anomalies, 0);
        assert!(trends.daily_counts.is_empty());
        assert!(trends.average_zscore.is_none());
    }
}
