//! OHLC backfill: purge a coin's history and reload it from the upstream
//! OHLC endpoint.
//!
//! The endpoint carries no volume (stored as 0.0) and labels candles by
//! their close time. Used to seed the store with 4-hour candles before a
//! standardization pass narrows the granularity.

use crate::normalizer::normalize_ohlc;
use anyhow::{Context, Result};
use marketflow_coingecko::CoinGeckoClient;
use marketflow_data::{EtlStatus, Repositories};

/// Result of one coin's backfill.
#[derive(Debug, Clone, Copy)]
pub struct BackfillOutcome {
    pub deleted: u64,
    pub inserted: u64,
}

/// Replaces one coin's stored history with `days` of OHLC candles.
///
/// Returns `None` when the upstream returned no rows (existing rows
/// untouched).
///
/// # Errors
/// Returns an error if fetching, normalization, or persistence fails.
pub async fn backfill_coin(
    client: &CoinGeckoClient,
    repos: &Repositories,
    coin: &str,
    days: u32,
) -> Result<Option<BackfillOutcome>> {
    tracing::info!("Backfilling {} days of OHLC candles for {}", days, coin);

    let raw = client
        .ohlc(coin, "usd", days)
        .await
        .with_context(|| format!("Failed to fetch OHLC data for {coin}"))?;
    if raw.is_empty() {
        tracing::warn!("No OHLC data for {}", coin);
        return Ok(None);
    }

    let candles = normalize_ohlc(coin, &raw).context("Failed to normalize OHLC rows")?;

    let deleted = repos.candles.delete_coin(coin).await?;
    let inserted = repos.candles.upsert_batch(&candles).await?;
    repos
        .etl_logs
        .insert(
            coin,
            EtlStatus::Success,
            &format!("backfill_ohlc: deleted {deleted}, inserted {inserted}"),
            inserted as i64,
        )
        .await?;

    tracing::info!("{}: deleted={} inserted={}", coin, deleted, inserted);
    Ok(Some(BackfillOutcome { deleted, inserted }))
}

/// Backfills every configured coin, isolating failures per coin.
///
/// # Errors
/// Only returns an error if writing an error log entry itself fails.
pub async fn backfill_all(
    client: &CoinGeckoClient,
    repos: &Repositories,
    coins: &[String],
    days: u32,
) -> Result<()> {
    for coin in coins {
        match backfill_coin(client, repos, coin, days).await {
            Ok(_) => {}
            Err(e) => {
                tracing::error!("Failed to backfill {}: {:#}", coin, e);
                repos
                    .etl_logs
                    .insert(coin, EtlStatus::Error, &format!("{e:#}"), 0)
                    .await?;
            }
        }
    }
    tracing::info!("Backfill complete");
    Ok(())
}
