//! Normalization of raw API payloads into canonical candles.
//!
//! Two input shapes exist: tagged OHLC rows (volume optional) and parallel
//! price/volume tick series. Both normalize to ascending-by-time output;
//! re-running over the same payload yields identical rows.

use chrono::{DateTime, TimeZone, Utc};
use marketflow_coingecko::RawCandle;
use marketflow_data::CandleRecord;
use thiserror::Error;

/// Errors distinguishing a rejected payload from a valid empty one.
///
/// Callers that see `Ok(vec![])` have a valid, empty result; a
/// `NormalizeError` means the payload was rejected and the coin should be
/// skipped for this run.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// A row carried a timestamp outside the representable range.
    #[error("unrepresentable timestamp: {timestamp_ms} ms")]
    BadTimestamp { timestamp_ms: i64 },
}

/// One joined price/volume observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    /// NaN when the volume series had no match for this timestamp.
    pub volume: f64,
}

fn from_millis(timestamp_ms: i64) -> Result<DateTime<Utc>, NormalizeError> {
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .ok_or(NormalizeError::BadTimestamp { timestamp_ms })
}

/// Converts tagged OHLC rows into canonical candles for one coin.
///
/// Rows with non-finite prices are dropped; NaN volume is tolerated (the
/// store coerces it to 0.0). Output is sorted ascending by timestamp.
///
/// # Errors
/// Returns [`NormalizeError::BadTimestamp`] if a row's timestamp cannot be
/// represented.
pub fn normalize_ohlc(coin: &str, rows: &[RawCandle]) -> Result<Vec<CandleRecord>, NormalizeError> {
    let mut candles = Vec::with_capacity(rows.len());

    for row in rows {
        let (open, high, low, close) = row.ohlc();
        if !(open.is_finite() && high.is_finite() && low.is_finite() && close.is_finite()) {
            tracing::debug!("Dropping candle row with non-finite price for {}", coin);
            continue;
        }
        candles.push(CandleRecord::new(
            coin,
            from_millis(row.timestamp_ms())?,
            open,
            high,
            low,
            close,
            row.volume(),
        ));
    }

    candles.sort_by_key(|c| c.timestamp);
    tracing::info!("Normalized {} OHLC records for {}", candles.len(), coin);
    Ok(candles)
}

/// Joins parallel price and volume tick series on exact timestamp.
///
/// The price series drives the output; volume defaults to NaN where
/// unmatched. Non-finite prices are dropped, duplicates collapse to the
/// first occurrence, and output is ascending.
///
/// # Errors
/// Returns [`NormalizeError::BadTimestamp`] if a tick timestamp cannot be
/// represented.
pub fn join_ticks(
    prices: &[(f64, f64)],
    volumes: &[(f64, f64)],
) -> Result<Vec<Tick>, NormalizeError> {
    use std::collections::HashMap;

    let volume_by_ts: HashMap<i64, f64> = volumes
        .iter()
        .map(|&(ts, volume)| (ts as i64, volume))
        .collect();

    let mut ticks = Vec::with_capacity(prices.len());
    for &(ts, price) in prices {
        if !price.is_finite() {
            continue;
        }
        let timestamp_ms = ts as i64;
        ticks.push(Tick {
            timestamp: from_millis(timestamp_ms)?,
            price,
            volume: volume_by_ts.get(&timestamp_ms).copied().unwrap_or(f64::NAN),
        });
    }

    ticks.sort_by_key(|t| t.timestamp);
    ticks.dedup_by_key(|t| t.timestamp);
    Ok(ticks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ohlc_row(ts_ms: i64, close: f64) -> RawCandle {
        RawCandle::from_row(&[ts_ms as f64, close - 10.0, close + 20.0, close - 30.0, close])
            .unwrap()
    }

    // ============================================
    // OHLC Normalization Tests
    // ============================================

    #[test]
    fn test_reference_payload_yields_two_rows() {
        let rows = vec![
            RawCandle::from_row(&[
                1_640_995_200_000.0,
                47000.0,
                48000.0,
                46000.0,
                47500.0,
                1_000_000.0,
            ])
            .unwrap(),
            RawCandle::from_row(&[
                1_640_998_800_000.0,
                47500.0,
                48500.0,
                47000.0,
                48000.0,
                1_200_000.0,
            ])
            .unwrap(),
        ];

        let candles = normalize_ohlc("bitcoin", &rows).unwrap();
        assert_eq!(candles.len(), 2);
        assert!(candles.iter().all(|c| c.coin == "bitcoin"));
        assert_eq!(
            candles[0].timestamp,
            Utc.timestamp_millis_opt(1_640_995_200_000).unwrap()
        );
        assert!((candles[1].close - 48000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_payload_is_valid_empty_result() {
        let candles = normalize_ohlc("bitcoin", &[]).unwrap();
        assert!(candles.is_empty());
    }

    #[test]
    fn test_output_is_sorted_ascending() {
        let rows = vec![
            ohlc_row(1_641_000_000_000, 101.0),
            ohlc_row(1_640_995_200_000, 100.0),
        ];
        let candles = normalize_ohlc("bitcoin", &rows).unwrap();
        assert!(candles[0].timestamp < candles[1].timestamp);
        assert!((candles[0].close - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let rows = vec![
            ohlc_row(1_641_000_000_000, 101.0),
            ohlc_row(1_640_995_200_000, 100.0),
        ];
        let first = normalize_ohlc("bitcoin", &rows).unwrap();
        let second = normalize_ohlc("bitcoin", &rows).unwrap();
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.timestamp, b.timestamp);
            assert_eq!(a.close.to_bits(), b.close.to_bits());
        }
    }

    #[test]
    fn test_non_finite_price_rows_are_dropped() {
        let rows = vec![
            RawCandle::from_row(&[1_640_995_200_000.0, f64::NAN, 1.0, 1.0, 1.0]).unwrap(),
            ohlc_row(1_640_998_800_000, 100.0),
        ];
        let candles = normalize_ohlc("bitcoin", &rows).unwrap();
        assert_eq!(candles.len(), 1);
    }

    #[test]
    fn test_ohlc_only_rows_carry_nan_volume() {
        let rows = vec![ohlc_row(1_640_995_200_000, 100.0)];
        let candles = normalize_ohlc("bitcoin", &rows).unwrap();
        assert!(candles[0].volume.is_nan());
    }

    // ============================================
    // Tick Join Tests
    // ============================================

    #[test]
    fn test_join_matches_on_exact_timestamp() {
        let prices = vec![(1_000_000.0, 10.0), (2_000_000.0, 11.0)];
        let volumes = vec![(1_000_000.0, 500.0)];
        let ticks = join_ticks(&prices, &volumes).unwrap();
        assert_eq!(ticks.len(), 2);
        assert!((ticks[0].volume - 500.0).abs() < f64::EPSILON);
        assert!(ticks[1].volume.is_nan());
    }

    #[test]
    fn test_join_sorts_and_dedups() {
        let prices = vec![
            (2_000_000.0, 11.0),
            (1_000_000.0, 10.0),
            (1_000_000.0, 99.0),
        ];
        let ticks = join_ticks(&prices, &[]).unwrap();
        assert_eq!(ticks.len(), 2);
        assert!((ticks[0].price - 10.0).abs() < f64::EPSILON);
    }
}
