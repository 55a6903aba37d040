//! Canonical OHLCV candle model.
//!
//! One fixed-interval record per (coin, timestamp). Volume may be NaN in
//! memory when the source endpoint omits it; persistence coerces NaN to 0.0.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single OHLCV candle for one coin.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CandleRecord {
    pub coin: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl CandleRecord {
    /// Creates a new candle record.
    #[must_use]
    pub fn new(
        coin: impl Into<String>,
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            coin: coin.into(),
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Typical price used by VWAP: (high + low + close) / 3.
    #[must_use]
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// Volume as stored: NaN coerced to 0.0.
    #[must_use]
    pub fn persisted_volume(&self) -> f64 {
        if self.volume.is_nan() {
            0.0
        } else {
            self.volume
        }
    }
}
