//! Tick-to-candle resampling with fixed, right-labeled buckets.
//!
//! A tick at time `t` lands in the bucket labeled `ceil(t/width)*width`;
//! the bucket covers `(label - width, label]`, so labels are candle-close
//! instants, matching how the exchange presents candle times. Buckets with
//! no ticks are dropped, never interpolated.

use crate::normalizer::Tick;
use chrono::{TimeZone, Utc};
use marketflow_data::CandleRecord;

/// Right-closed/right-labeled bucket label for a millisecond timestamp.
///
/// A tick exactly on a boundary belongs to that boundary's bucket.
#[must_use]
pub fn bucket_label_ms(timestamp_ms: i64, width_ms: i64) -> i64 {
    let quotient = timestamp_ms.div_euclid(width_ms);
    if timestamp_ms.rem_euclid(width_ms) == 0 {
        timestamp_ms
    } else {
        (quotient + 1) * width_ms
    }
}

/// Aggregates ticks into fixed-width candles for one coin.
///
/// Each tick contributes a synthetic OHLC of `open = high = low = close =
/// price` before aggregation (a documented approximation when no intrabar
/// range exists), so a bucket's candle is `open = first, high = max, low =
/// min, close = last, volume = sum` of its ticks. NaN volumes are skipped
/// by the sum; an all-NaN bucket stores 0.0.
#[must_use]
pub fn resample_ticks(coin: &str, ticks: &[Tick], width_ms: i64) -> Vec<CandleRecord> {
    use std::collections::BTreeMap;

    struct Bucket {
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    }

    let mut buckets: BTreeMap<i64, Bucket> = BTreeMap::new();

    let mut ordered: Vec<&Tick> = ticks.iter().collect();
    ordered.sort_by_key(|t| t.timestamp);

    for tick in ordered {
        let label = bucket_label_ms(tick.timestamp.timestamp_millis(), width_ms);
        let volume = if tick.volume.is_nan() { 0.0 } else { tick.volume };

        buckets
            .entry(label)
            .and_modify(|b| {
                b.high = b.high.max(tick.price);
                b.low = b.low.min(tick.price);
                b.close = tick.price;
                b.volume += volume;
            })
            .or_insert(Bucket {
                open: tick.price,
                high: tick.price,
                low: tick.price,
                close: tick.price,
                volume,
            });
    }

    let candles: Vec<CandleRecord> = buckets
        .into_iter()
        .map(|(label, b)| {
            CandleRecord::new(
                coin,
                Utc.timestamp_millis_opt(label).unwrap(),
                b.open,
                b.high,
                b.low,
                b.close,
                b.volume,
            )
        })
        .collect();

    tracing::info!(
        "Resampled {} ticks into {} candles for {}",
        ticks.len(),
        candles.len(),
        coin
    );
    candles
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    const THIRTY_MIN_MS: i64 = 30 * 60 * 1000;

    fn tick(ts_ms: i64, price: f64, volume: f64) -> Tick {
        Tick {
            timestamp: Utc.timestamp_millis_opt(ts_ms).unwrap(),
            price,
            volume,
        }
    }

    // ============================================
    // Bucket Labeling Tests
    // ============================================

    #[test]
    fn test_label_rounds_up_to_close_instant() {
        assert_eq!(bucket_label_ms(1, THIRTY_MIN_MS), THIRTY_MIN_MS);
        assert_eq!(
            bucket_label_ms(THIRTY_MIN_MS - 1, THIRTY_MIN_MS),
            THIRTY_MIN_MS
        );
        assert_eq!(
            bucket_label_ms(THIRTY_MIN_MS + 1, THIRTY_MIN_MS),
            2 * THIRTY_MIN_MS
        );
    }

    #[test]
    fn test_boundary_tick_belongs_to_its_own_bucket() {
        // Right-closed: a tick exactly on a label is that bucket's last tick.
        assert_eq!(
            bucket_label_ms(THIRTY_MIN_MS, THIRTY_MIN_MS),
            THIRTY_MIN_MS
        );
    }

    // ============================================
    // Aggregation Tests
    // ============================================

    #[test]
    fn test_single_bucket_ohlc_aggregation() {
        // Reference: ticks [(t0,10),(t1,12),(t2,8)] in one bucket.
        let ticks = vec![
            tick(60_000, 10.0, 1.0),
            tick(120_000, 12.0, 2.0),
            tick(180_000, 8.0, 3.0),
        ];
        let candles = resample_ticks("bitcoin", &ticks, THIRTY_MIN_MS);

        assert_eq!(candles.len(), 1);
        let candle = &candles[0];
        assert!((candle.open - 10.0).abs() < f64::EPSILON);
        assert!((candle.high - 12.0).abs() < f64::EPSILON);
        assert!((candle.low - 8.0).abs() < f64::EPSILON);
        assert!((candle.close - 8.0).abs() < f64::EPSILON);
        assert!((candle.volume - 6.0).abs() < f64::EPSILON);
        assert_eq!(candle.timestamp.timestamp_millis(), THIRTY_MIN_MS);
    }

    #[test]
    fn test_empty_buckets_are_dropped() {
        // Two ticks three hours apart: only two candles, no interpolation.
        let ticks = vec![
            tick(60_000, 10.0, 1.0),
            tick(3 * 3_600_000 + 60_000, 11.0, 1.0),
        ];
        let candles = resample_ticks("bitcoin", &ticks, THIRTY_MIN_MS);
        assert_eq!(candles.len(), 2);
    }

    #[test]
    fn test_nan_volume_skipped_by_sum() {
        let ticks = vec![
            tick(60_000, 10.0, f64::NAN),
            tick(120_000, 11.0, 4.0),
        ];
        let candles = resample_ticks("bitcoin", &ticks, THIRTY_MIN_MS);
        assert!((candles[0].volume - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_all_nan_volume_bucket_stores_zero() {
        let ticks = vec![tick(60_000, 10.0, f64::NAN)];
        let candles = resample_ticks("bitcoin", &ticks, THIRTY_MIN_MS);
        assert!((candles[0].volume - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_output_is_ascending_even_for_unsorted_ticks() {
        let ticks = vec![
            tick(2 * 3_600_000, 11.0, 1.0),
            tick(60_000, 10.0, 1.0),
        ];
        let candles = resample_ticks("bitcoin", &ticks, THIRTY_MIN_MS);
        assert_eq!(candles.len(), 2);
        assert!(candles[0].timestamp < candles[1].timestamp);
        assert!((candles[0].close - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_resampling_is_deterministic() {
        let ticks: Vec<Tick> = (0..100)
            .map(|i| tick(i64::from(i) * 60_000, 10.0 + f64::from(i % 7), 1.0))
            .collect();
        let a = resample_ticks("bitcoin", &ticks, THIRTY_MIN_MS);
        let b = resample_ticks("bitcoin", &ticks, THIRTY_MIN_MS);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.timestamp, y.timestamp);
            assert_eq!(x.close.to_bits(), y.close.to_bits());
        }
    }

    #[test]
    fn test_labels_parse_as_utc_instants() {
        let ticks = vec![tick(60_000, 10.0, 1.0)];
        let candles = resample_ticks("bitcoin", &ticks, THIRTY_MIN_MS);
        let expected: DateTime<Utc> = Utc.timestamp_millis_opt(THIRTY_MIN_MS).unwrap();
        assert_eq!(candles[0].timestamp, expected);
    }
}
