//! Anomaly event model.
//!
//! Durable audit records written by the anomaly detector. Keyed by
//! (coin, timestamp, anomaly_type) so repeated detection over the same
//! window refreshes an event instead of duplicating it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which metric the z-score threshold was exceeded on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AnomalyType {
    Volume,
    Price,
    Volatility,
}

impl AnomalyType {
    /// Returns the type as stored in the database.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyType::Volume => "volume",
            AnomalyType::Price => "price",
            AnomalyType::Volatility => "volatility",
        }
    }
}

/// One flagged observation.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AnomalyRecord {
    pub coin: String,
    pub timestamp: DateTime<Utc>,
    pub anomaly_type: AnomalyType,
    /// The raw metric value that was flagged (volume, close, or volatility).
    pub value: f64,
    pub zscore: f64,
    pub threshold: f64,
}
