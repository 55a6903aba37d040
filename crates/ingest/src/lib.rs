//! Ingestion and maintenance passes for MarketFlow.
//!
//! This crate provides:
//! - Normalization of raw API payloads into canonical candles
//! - Tick-to-candle resampling with right-labeled buckets
//! - Standardization (full-history rebuild at one candle width)
//! - OHLC backfill
//! - The per-coin ETL pipeline

pub mod backfill;
pub mod normalizer;
pub mod pipeline;
pub mod resampler;
pub mod standardize;

pub use backfill::{backfill_all, backfill_coin, BackfillOutcome};
pub use normalizer::{join_ticks, normalize_ohlc, NormalizeError, Tick};
pub use pipeline::{CoinRunOutcome, EtlPipeline, RunReport};
pub use resampler::{bucket_label_ms, resample_ticks};
pub use standardize::{
    chunk_ranges, standardize_all, standardize_coin, StandardizeOutcome, CHUNK_SECONDS,
};
