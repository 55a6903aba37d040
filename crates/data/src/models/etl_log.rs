//! ETL run audit log model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one ingestion or standardization run for one coin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EtlStatus {
    Success,
    Error,
}

impl EtlStatus {
    /// Returns the status as stored in the database.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EtlStatus::Success => "success",
            EtlStatus::Error => "error",
        }
    }
}

/// One append-only ETL audit entry.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EtlLogRecord {
    pub coin: String,
    pub status: EtlStatus,
    pub message: String,
    pub records_processed: i64,
    pub timestamp: DateTime<Utc>,
}
