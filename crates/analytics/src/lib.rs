//! Statistical analytics for MarketFlow.
//!
//! This crate provides:
//! - Rolling/cumulative series primitives with tabular NaN semantics
//! - The full metric set (returns through VWAP) as pure transforms
//! - Whole-series z-score anomaly detection with durable events
//! - Compact market summaries for the LLM and dashboard boundaries

pub mod anomaly;
pub mod metrics;
pub mod series;
pub mod summary;

pub use anomaly::{
    AnomalyDetector, AnomalyReport, AnomalySummary, AnomalyTrends, DetectorConfig, SeriesScore,
};
pub use metrics::{
    compute_all, BollingerBands, Macd, MetricRow, MetricSet, MetricsConfig, VolumeMetrics,
};
pub use summary::{ColumnStats, MarketSummary, SummaryCandle};
