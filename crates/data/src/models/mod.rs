//! Data models for the MarketFlow store.

pub mod anomaly;
pub mod candle;
pub mod etl_log;

pub use anomaly::{AnomalyRecord, AnomalyType};
pub use candle::CandleRecord;
pub use etl_log::{EtlLogRecord, EtlStatus};
