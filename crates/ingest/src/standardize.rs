//! Standardization: rebuild a coin's stored history at one fixed candle
//! width from tick-level price/volume data.
//!
//! The rebuild window is `[earliest stored timestamp, now]`, falling back
//! to a bounded lookback when the coin has no rows. The window is fetched
//! in chunks to respect upstream range limits, resampled, then swapped in
//! with delete-then-insert: re-running after a partial success reproduces
//! the same candles.

use crate::normalizer::join_ticks;
use crate::resampler::resample_ticks;
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use marketflow_coingecko::CoinGeckoClient;
use marketflow_data::{EtlStatus, Repositories};

/// Seconds per fetch chunk (7 days), matching upstream range limits.
pub const CHUNK_SECONDS: i64 = 7 * 24 * 3600;

/// Result of one coin's standardization pass.
#[derive(Debug, Clone, Copy)]
pub struct StandardizeOutcome {
    pub deleted: u64,
    pub inserted: u64,
}

/// Splits `[start, end]` (unix seconds) into contiguous chunk ranges.
///
/// Ranges cover the window without gaps or overlap; an empty window yields
/// no chunks.
#[must_use]
pub fn chunk_ranges(start: i64, end: i64, chunk: i64) -> Vec<(i64, i64)> {
    let mut ranges = Vec::new();
    let mut cursor = start;
    while cursor < end {
        let chunk_end = (cursor + chunk).min(end);
        ranges.push((cursor, chunk_end));
        cursor = chunk_end;
    }
    ranges
}

/// Rebuilds one coin's candle history at `interval_minutes` width.
///
/// Returns `None` when the upstream returned no ticks for the window (the
/// coin is skipped, existing rows untouched).
///
/// # Errors
/// Returns an error if fetching or persistence fails; the store is only
/// modified after all chunks fetched successfully.
pub async fn standardize_coin(
    client: &CoinGeckoClient,
    repos: &Repositories,
    coin: &str,
    interval_minutes: u32,
    lookback_days: u32,
) -> Result<Option<StandardizeOutcome>> {
    tracing::info!("Standardizing {} to {}-minute candles", coin, interval_minutes);

    let now = Utc::now();
    let start = match repos.candles.data_bounds(coin).await? {
        Some((earliest, _)) => earliest.timestamp(),
        None => (now - Duration::days(i64::from(lookback_days))).timestamp(),
    };
    let end = now.timestamp();

    let mut ticks = Vec::new();
    for (from, to) in chunk_ranges(start, end, CHUNK_SECONDS) {
        let chart = client
            .market_chart_range(coin, "usd", from, to)
            .await
            .with_context(|| format!("Failed to fetch price range for {coin}"))?;
        let part = join_ticks(&chart.prices, &chart.total_volumes)
            .context("Failed to join tick series")?;
        ticks.extend(part);
    }

    if ticks.is_empty() {
        tracing::warn!("No data returned for {}; skipping", coin);
        return Ok(None);
    }

    ticks.sort_by_key(|t| t.timestamp);
    ticks.dedup_by_key(|t| t.timestamp);

    let width_ms = i64::from(interval_minutes) * 60 * 1000;
    let candles = resample_ticks(coin, &ticks, width_ms);

    let deleted = repos.candles.delete_coin(coin).await?;
    let inserted = repos.candles.upsert_batch(&candles).await?;
    repos
        .etl_logs
        .insert(
            coin,
            EtlStatus::Success,
            &format!("standardize_{interval_minutes}m: deleted {deleted}, inserted {inserted}"),
            inserted as i64,
        )
        .await?;

    tracing::info!("{} standardized: deleted={}, inserted={}", coin, deleted, inserted);
    Ok(Some(StandardizeOutcome { deleted, inserted }))
}

/// Standardizes every configured coin, isolating failures per coin.
///
/// # Errors
/// Never fails on a per-coin error (those are recorded as ETL log entries);
/// only returns an error if writing an error log entry itself fails.
pub async fn standardize_all(
    client: &CoinGeckoClient,
    repos: &Repositories,
    coins: &[String],
    interval_minutes: u32,
    lookback_days: u32,
) -> Result<()> {
    for coin in coins {
        match standardize_coin(client, repos, coin, interval_minutes, lookback_days).await {
            Ok(_) => {}
            Err(e) => {
                tracing::error!("Failed to standardize {}: {:#}", coin, e);
                repos
                    .etl_logs
                    .insert(coin, EtlStatus::Error, &format!("{e:#}"), 0)
                    .await?;
            }
        }
    }
    tracing::info!("Standardization complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // ============================================
    // Chunking Tests
    // ============================================

    #[test]
    fn test_chunks_cover_window_without_gaps() {
        let ranges = chunk_ranges(0, 20 * 24 * 3600, CHUNK_SECONDS);
        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[0], (0, CHUNK_SECONDS));
        assert_eq!(ranges[1], (CHUNK_SECONDS, 2 * CHUNK_SECONDS));
        assert_eq!(ranges[2], (2 * CHUNK_SECONDS, 20 * 24 * 3600));
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].1, pair[1].0);
        }
    }

    #[test]
    fn test_short_window_is_single_chunk() {
        let ranges = chunk_ranges(100, 200, CHUNK_SECONDS);
        assert_eq!(ranges, vec![(100, 200)]);
    }

    #[test]
    fn test_empty_window_yields_no_chunks() {
        assert!(chunk_ranges(500, 500, CHUNK_SECONDS).is_empty());
        assert!(chunk_ranges(500, 400, CHUNK_SECONDS).is_empty());
    }

    #[test]
    fn test_exact_multiple_has_no_stub_chunk() {
        let ranges = chunk_ranges(0, 2 * CHUNK_SECONDS, CHUNK_SECONDS);
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[1].1, 2 * CHUNK_SECONDS);
    }
}
