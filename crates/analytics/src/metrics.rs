//! Metric transforms over a canonical candle slice.
//!
//! Every transform is a pure function of an ascending-by-time slice and its
//! window parameters: same input, same output. Rolling metrics are NaN for
//! the first `window - 1` positions; cumulative metrics cover the whole
//! prefix.

use crate::series;
use chrono::{DateTime, Utc};
use marketflow_data::CandleRecord;
use serde::Serialize;
use std::collections::BTreeMap;

/// Annualization factor for volatility, assuming daily candles.
pub const ANNUALIZATION_DAYS: f64 = 365.0;

/// Window parameters for the full metric set.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub volatility_window: usize,
    pub ma_windows: Vec<usize>,
    pub bb_window: usize,
    pub bb_num_std: f64,
    pub rsi_window: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            volatility_window: 24,
            ma_windows: vec![7, 30, 90],
            bb_window: 20,
            bb_num_std: 2.0,
            rsi_window: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
        }
    }
}

/// Simple returns: `close[t]/close[t-1] - 1`; index 0 is NaN.
#[must_use]
pub fn returns(closes: &[f64]) -> Vec<f64> {
    let mut out = vec![f64::NAN; closes.len()];
    for i in 1..closes.len() {
        out[i] = closes[i] / closes[i - 1] - 1.0;
    }
    out
}

/// Log returns: `ln(close[t]/close[t-1])`; index 0 is NaN.
#[must_use]
pub fn log_returns(closes: &[f64]) -> Vec<f64> {
    let mut out = vec![f64::NAN; closes.len()];
    for i in 1..closes.len() {
        out[i] = (closes[i] / closes[i - 1]).ln();
    }
    out
}

/// Cumulative returns: `(1 + returns).cumprod() - 1`.
#[must_use]
pub fn cumulative_returns(returns: &[f64]) -> Vec<f64> {
    let grown: Vec<f64> = returns.iter().map(|r| 1.0 + r).collect();
    series::cumprod(&grown)
        .into_iter()
        .map(|v| v - 1.0)
        .collect()
}

/// Rolling volatility: sample standard deviation of returns over `window`.
#[must_use]
pub fn volatility(returns: &[f64], window: usize) -> Vec<f64> {
    series::rolling_std(returns, window)
}

/// Annualizes a volatility series by `sqrt(365)`.
#[must_use]
pub fn annualize(volatility: &[f64]) -> Vec<f64> {
    let factor = ANNUALIZATION_DAYS.sqrt();
    volatility.iter().map(|v| v * factor).collect()
}

/// Simple moving average of `values` over `window`.
#[must_use]
pub fn sma(values: &[f64], window: usize) -> Vec<f64> {
    series::rolling_mean(values, window)
}

/// Exponential moving average with span semantics.
#[must_use]
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    series::ewm_mean(values, span)
}

/// Bollinger Bands columns.
#[derive(Debug, Clone)]
pub struct BollingerBands {
    pub middle: Vec<f64>,
    pub std: Vec<f64>,
    pub upper: Vec<f64>,
    pub lower: Vec<f64>,
    /// `(close - lower) / (upper - lower)`; unbounded when the band width
    /// is zero, mirroring the raw division.
    pub position: Vec<f64>,
}

/// Computes Bollinger Bands over the close series.
#[must_use]
pub fn bollinger_bands(closes: &[f64], window: usize, num_std: f64) -> BollingerBands {
    let middle = series::rolling_mean(closes, window);
    let std = series::rolling_std(closes, window);
    let upper: Vec<f64> = middle
        .iter()
        .zip(&std)
        .map(|(m, s)| m + num_std * s)
        .collect();
    let lower: Vec<f64> = middle
        .iter()
        .zip(&std)
        .map(|(m, s)| m - num_std * s)
        .collect();
    let position: Vec<f64> = closes
        .iter()
        .zip(upper.iter().zip(&lower))
        .map(|(close, (u, l))| (close - l) / (u - l))
        .collect();

    BollingerBands {
        middle,
        std,
        upper,
        lower,
        position,
    }
}

/// Relative Strength Index over `window` periods.
///
/// Uses simple rolling means of gains and losses (Wilder's original
/// smoothing, not exponential). When the average loss is exactly zero the
/// ratio is unbounded; by convention the result clamps to 100 while a flat
/// window (no gains either) stays NaN.
#[must_use]
pub fn rsi(closes: &[f64], window: usize) -> Vec<f64> {
    let change = series::diff(closes);
    let gains: Vec<f64> = change
        .iter()
        .map(|c| if c.is_nan() { f64::NAN } else { c.max(0.0) })
        .collect();
    let losses: Vec<f64> = change
        .iter()
        .map(|c| if c.is_nan() { f64::NAN } else { (-c).max(0.0) })
        .collect();

    let avg_gains = series::rolling_mean(&gains, window);
    let avg_losses = series::rolling_mean(&losses, window);

    avg_gains
        .iter()
        .zip(&avg_losses)
        .map(|(&gain, &loss)| {
            if gain.is_nan() || loss.is_nan() {
                f64::NAN
            } else if loss == 0.0 {
                if gain > 0.0 {
                    100.0
                } else {
                    f64::NAN
                }
            } else {
                100.0 - 100.0 / (1.0 + gain / loss)
            }
        })
        .collect()
}

/// MACD columns.
#[derive(Debug, Clone)]
pub struct Macd {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

/// Computes MACD: `EMA(fast) - EMA(slow)`, signal = EMA of the MACD line.
#[must_use]
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal_span: usize) -> Macd {
    let ema_fast = series::ewm_mean(closes, fast);
    let ema_slow = series::ewm_mean(closes, slow);
    let line: Vec<f64> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| f - s)
        .collect();
    let signal = series::ewm_mean(&line, signal_span);
    let histogram: Vec<f64> = line.iter().zip(&signal).map(|(m, s)| m - s).collect();

    Macd {
        macd: line,
        signal,
        histogram,
    }
}

/// Volume-derived columns.
#[derive(Debug, Clone)]
pub struct VolumeMetrics {
    pub volume_sma_7: Vec<f64>,
    pub volume_sma_30: Vec<f64>,
    /// Current volume relative to its 30-period average.
    pub volume_ratio: Vec<f64>,
    /// Whole-history cumulative VWAP, not session-reset.
    pub vwap: Vec<f64>,
}

/// Computes volume SMAs, volume ratio, and cumulative VWAP.
#[must_use]
pub fn volume_metrics(candles: &[CandleRecord]) -> VolumeMetrics {
    let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();
    let volume_sma_7 = series::rolling_mean(&volumes, 7);
    let volume_sma_30 = series::rolling_mean(&volumes, 30);
    let volume_ratio: Vec<f64> = volumes
        .iter()
        .zip(&volume_sma_30)
        .map(|(v, avg)| v / avg)
        .collect();

    let weighted: Vec<f64> = candles
        .iter()
        .map(|c| c.volume * c.typical_price())
        .collect();
    let cum_weighted = series::cumsum(&weighted);
    let cum_volume = series::cumsum(&volumes);
    let vwap: Vec<f64> = cum_weighted
        .iter()
        .zip(&cum_volume)
        .map(|(w, v)| w / v)
        .collect();

    VolumeMetrics {
        volume_sma_7,
        volume_sma_30,
        volume_ratio,
        vwap,
    }
}

/// The full derived metric set for one coin's candle slice.
#[derive(Debug, Clone)]
pub struct MetricSet {
    pub timestamps: Vec<DateTime<Utc>>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<f64>,
    pub returns: Vec<f64>,
    pub log_returns: Vec<f64>,
    pub cumulative_returns: Vec<f64>,
    pub volatility: Vec<f64>,
    pub volatility_annualized: Vec<f64>,
    pub sma: BTreeMap<usize, Vec<f64>>,
    pub ema: BTreeMap<usize, Vec<f64>>,
    pub bollinger: BollingerBands,
    pub rsi: Vec<f64>,
    pub macd: Macd,
    pub volume_metrics: VolumeMetrics,
}

/// One fully-derived row, for serialization to the dashboard.
///
/// Non-finite values serialize as JSON null.
#[derive(Debug, Clone, Serialize)]
pub struct MetricRow {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub returns: f64,
    pub log_returns: f64,
    pub cumulative_returns: f64,
    pub volatility: f64,
    pub volatility_annualized: f64,
    pub sma_7: f64,
    pub sma_30: f64,
    pub sma_90: f64,
    pub ema_7: f64,
    pub ema_30: f64,
    pub ema_90: f64,
    pub bb_middle: f64,
    pub bb_upper: f64,
    pub bb_lower: f64,
    pub bb_position: f64,
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_histogram: f64,
    pub volume_sma_7: f64,
    pub volume_sma_30: f64,
    pub volume_ratio: f64,
    pub vwap: f64,
}

impl MetricSet {
    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// True when the set holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    fn column(map: &BTreeMap<usize, Vec<f64>>, window: usize, i: usize) -> f64 {
        map.get(&window).map_or(f64::NAN, |col| col[i])
    }

    /// Flattens the column set into serializable rows.
    #[must_use]
    pub fn to_rows(&self) -> Vec<MetricRow> {
        (0..self.len())
            .map(|i| MetricRow {
                timestamp: self.timestamps[i],
                open: self.open[i],
                high: self.high[i],
                low: self.low[i],
                close: self.close[i],
                volume: self.volume[i],
                returns: self.returns[i],
                log_returns: self.log_returns[i],
                cumulative_returns: self.cumulative_returns[i],
                volatility: self.volatility[i],
                volatility_annualized: self.volatility_annualized[i],
                sma_7: Self::column(&self.sma, 7, i),
                sma_30: Self::column(&self.sma, 30, i),
                sma_90: Self::column(&self.sma, 90, i),
                ema_7: Self::column(&self.ema, 7, i),
                ema_30: Self::column(&self.ema, 30, i),
                ema_90: Self::column(&self.ema, 90, i),
                bb_middle: self.bollinger.middle[i],
                bb_upper: self.bollinger.upper[i],
                bb_lower: self.bollinger.lower[i],
                bb_position: self.bollinger.position[i],
                rsi: self.rsi[i],
                macd: self.macd.macd[i],
                macd_signal: self.macd.signal[i],
                macd_histogram: self.macd.histogram[i],
                volume_sma_7: self.volume_metrics.volume_sma_7[i],
                volume_sma_30: self.volume_metrics.volume_sma_30[i],
                volume_ratio: self.volume_metrics.volume_ratio[i],
                vwap: self.volume_metrics.vwap[i],
            })
            .collect()
    }
}

/// Applies every transform once over an ascending candle slice, sharing the
/// returns column.
#[must_use]
pub fn compute_all(candles: &[CandleRecord], config: &MetricsConfig) -> MetricSet {
    let timestamps: Vec<DateTime<Utc>> = candles.iter().map(|c| c.timestamp).collect();
    let open: Vec<f64> = candles.iter().map(|c| c.open).collect();
    let high: Vec<f64> = candles.iter().map(|c| c.high).collect();
    let low: Vec<f64> = candles.iter().map(|c| c.low).collect();
    let close: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let volume: Vec<f64> = candles.iter().map(|c| c.volume).collect();

    let returns_col = returns(&close);
    let log_returns_col = log_returns(&close);
    let cumulative = cumulative_returns(&returns_col);
    let volatility_col = volatility(&returns_col, config.volatility_window);
    let annualized = annualize(&volatility_col);

    let mut sma_map = BTreeMap::new();
    let mut ema_map = BTreeMap::new();
    for &window in &config.ma_windows {
        sma_map.insert(window, sma(&close, window));
        ema_map.insert(window, ema(&close, window));
    }

    let bollinger = bollinger_bands(&close, config.bb_window, config.bb_num_std);
    let rsi_col = rsi(&close, config.rsi_window);
    let macd_cols = macd(&close, config.macd_fast, config.macd_slow, config.macd_signal);
    let volume_cols = volume_metrics(candles);

    MetricSet {
        timestamps,
        open,
        high,
        low,
        close,
        volume,
        returns: returns_col,
        log_returns: log_returns_col,
        cumulative_returns: cumulative,
        volatility: volatility_col,
        volatility_annualized: annualized,
        sma: sma_map,
        ema: ema_map,
        bollinger,
        rsi: rsi_col,
        macd: macd_cols,
        volume_metrics: volume_cols,
    }
}
