//! Data storage and management for the MarketFlow ETL pipeline.
//!
//! This crate provides:
//! - SQLite database handle with schema bootstrap
//! - Data models for candles, ETL logs, and anomaly events
//! - Repositories for typed database access

pub mod database;
pub mod models;
pub mod repositories;

// Re-export commonly used types
pub use database::{Database, DatabaseStats};

// Re-export models
pub use models::{AnomalyRecord, AnomalyType, CandleRecord, EtlLogRecord, EtlStatus};

// Re-export repositories
pub use repositories::{
    AnomalyRepository, CandleRepository, DailyAnomalyCount, EtlLogRepository, Repositories,
};
