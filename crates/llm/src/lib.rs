//! LLM analysis boundary for MarketFlow.
//!
//! Wraps a chat-completions API behind three operations (analyze,
//! summarize, detect patterns) over the compact market summary. Failures
//! surface as user-visible text and never break the pipeline.

pub mod client;
pub mod error;
pub mod prompts;

pub use client::{LlmClient, LlmClientConfig};
pub use error::{LlmError, Result};
