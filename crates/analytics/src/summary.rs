//! Compact market summaries for the LLM boundary and dashboard.

use crate::metrics::MetricSet;
use chrono::{DateTime, Utc};
use marketflow_data::CandleRecord;
use serde::Serialize;

/// Min/max/mean/std/current statistics of one column.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
    pub current: f64,
}

impl ColumnStats {
    fn from_values(values: &[f64]) -> Self {
        Self {
            min: crate::series::min(values),
            max: crate::series::max(values),
            mean: crate::series::mean(values),
            std: crate::series::std_dev(values),
            current: values.last().copied().unwrap_or(f64::NAN),
        }
    }
}

/// A trailing candle included in the summary payload.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryCandle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Compact JSON-serializable summary of one coin's recent history.
///
/// Non-finite values serialize as JSON null.
#[derive(Debug, Clone, Serialize)]
pub struct MarketSummary {
    pub coin: String,
    pub record_count: usize,
    pub span_start: Option<DateTime<Utc>>,
    pub span_end: Option<DateTime<Utc>>,
    pub price: ColumnStats,
    pub volume: ColumnStats,
    pub returns: ColumnStats,
    pub last_volatility: f64,
    pub last_rsi: f64,
    pub last_sma_30: f64,
    /// Most recent candles, oldest first.
    pub recent_candles: Vec<SummaryCandle>,
}

impl MarketSummary {
    /// Builds a summary from candles and their computed metric set.
    ///
    /// `recent` bounds how many trailing candles are embedded.
    #[must_use]
    pub fn build(coin: &str, candles: &[CandleRecord], metrics: &MetricSet, recent: usize) -> Self {
        let tail_start = candles.len().saturating_sub(recent);
        let recent_candles = candles[tail_start..]
            .iter()
            .map(|c| SummaryCandle {
                timestamp: c.timestamp,
                open: c.open,
                high: c.high,
                low: c.low,
                close: c.close,
                volume: c.volume,
            })
            .collect();

        Self {
            coin: coin.to_string(),
            record_count: candles.len(),
            span_start: candles.first().map(|c| c.timestamp),
            span_end: candles.last().map(|c| c.timestamp),
            price: ColumnStats::from_values(&metrics.close),
            volume: ColumnStats::from_values(&metrics.volume),
            returns: ColumnStats::from_values(&metrics.returns),
            last_volatility: metrics.volatility.last().copied().unwrap_or(f64::NAN),
            last_rsi: metrics.rsi.last().copied().unwrap_or(f64::NAN),
            last_sma_30: metrics
                .sma
                .get(&30)
                .and_then(|col| col.last().copied())
                .unwrap_or(f64::NAN),
            recent_candles,
        }
    }
}
