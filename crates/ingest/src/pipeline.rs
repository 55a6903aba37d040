//! Per-coin ETL orchestration.
//!
//! One run walks the configured coin list: fetch OHLC history, normalize,
//! compute metrics, detect (and persist) anomalies, upsert candles, and
//! record an ETL log entry. A coin's failure is recorded and the run moves
//! on to the next coin; there is no global retry or circuit breaker.

use crate::normalizer::normalize_ohlc;
use anyhow::{Context, Result};
use marketflow_analytics::{compute_all, AnomalyDetector, MetricsConfig};
use marketflow_coingecko::CoinGeckoClient;
use marketflow_data::{EtlStatus, Repositories};
use serde::Serialize;
use std::sync::Arc;

/// Outcome of one coin within a pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct CoinRunOutcome {
    pub coin: String,
    pub status: EtlStatus,
    pub records_processed: u64,
    pub anomalies_flagged: usize,
    pub message: String,
}

/// Outcome of a full pipeline run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub outcomes: Vec<CoinRunOutcome>,
}

impl RunReport {
    /// Number of coins that completed successfully.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == EtlStatus::Success)
            .count()
    }

    /// Number of coins that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// The ingestion pipeline: client, store, and detector wired together.
pub struct EtlPipeline {
    client: Arc<CoinGeckoClient>,
    repos: Arc<Repositories>,
    detector: AnomalyDetector,
    metrics_config: MetricsConfig,
    coins: Vec<String>,
    lookback_days: u32,
}

impl EtlPipeline {
    /// Creates a new pipeline.
    #[must_use]
    pub fn new(
        client: Arc<CoinGeckoClient>,
        repos: Arc<Repositories>,
        detector: AnomalyDetector,
        metrics_config: MetricsConfig,
        coins: Vec<String>,
        lookback_days: u32,
    ) -> Self {
        Self {
            client,
            repos,
            detector,
            metrics_config,
            coins,
            lookback_days,
        }
    }

    /// Runs ingestion for every configured coin.
    ///
    /// # Errors
    /// Returns an error if the upstream API is unreachable before any coin
    /// is processed, or if recording a failure log entry itself fails.
    pub async fn run(&self) -> Result<RunReport> {
        tracing::info!("Starting MarketFlow data pipeline");

        if !self.client.health_check().await {
            anyhow::bail!("Upstream API is not accessible");
        }
        tracing::info!("Upstream API health check passed");

        let mut report = RunReport::default();
        for coin in &self.coins {
            let outcome = self.run_coin_logged(coin).await?;
            report.outcomes.push(outcome);
        }

        tracing::info!(
            "Pipeline run complete: {} succeeded, {} failed",
            report.succeeded(),
            report.failed()
        );
        Ok(report)
    }

    /// Runs ingestion for a single coin and records the ETL log entry.
    ///
    /// # Errors
    /// Returns an error only if writing the log entry fails; per-coin
    /// ingestion failures become `error` outcomes.
    pub async fn run_coin_logged(&self, coin: &str) -> Result<CoinRunOutcome> {
        tracing::info!("Processing {}", coin);
        match self.run_coin(coin).await {
            Ok((records, anomalies)) => {
                let message = format!("Processed {records} records");
                self.repos
                    .etl_logs
                    .insert(coin, EtlStatus::Success, &message, records as i64)
                    .await?;
                tracing::info!("Successfully processed {} records for {}", records, coin);
                Ok(CoinRunOutcome {
                    coin: coin.to_string(),
                    status: EtlStatus::Success,
                    records_processed: records,
                    anomalies_flagged: anomalies,
                    message,
                })
            }
            Err(e) => {
                let message = format!("{e:#}");
                tracing::error!("Error processing {}: {}", coin, message);
                self.repos
                    .etl_logs
                    .insert(coin, EtlStatus::Error, &message, 0)
                    .await?;
                Ok(CoinRunOutcome {
                    coin: coin.to_string(),
                    status: EtlStatus::Error,
                    records_processed: 0,
                    anomalies_flagged: 0,
                    message,
                })
            }
        }
    }

    async fn run_coin(&self, coin: &str) -> Result<(u64, usize)> {
        let raw = self
            .client
            .ohlc(coin, "usd", self.lookback_days)
            .await
            .context("Failed to fetch OHLC data")?;
        if raw.is_empty() {
            tracing::warn!("No OHLC data received for {}", coin);
            return Ok((0, 0));
        }

        let candles = normalize_ohlc(coin, &raw).context("Failed to normalize OHLC data")?;
        if candles.is_empty() {
            tracing::warn!("No data to process for {}", coin);
            return Ok((0, 0));
        }

        let metrics = compute_all(&candles, &self.metrics_config);
        tracing::debug!(
            "Computed {} metric rows for {}",
            metrics.len(),
            coin
        );

        let anomaly_report = self
            .detector
            .detect_all(coin, &candles)
            .await
            .context("Anomaly detection failed")?;

        let inserted = self.repos.candles.upsert_batch(&candles).await?;

        Ok((inserted, anomaly_report.total_flagged()))
    }
}
