//! Chat-completions client for market analysis.
//!
//! The LLM is an opaque text-generation boundary: every public operation
//! returns display text, and failures collapse to a user-visible message
//! instead of propagating. Nothing downstream depends on the content.

use crate::error::{LlmError, Result};
use crate::prompts;
use marketflow_analytics::MarketSummary;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SYSTEM_ANALYST: &str =
    "You are a crypto market analyst. Provide clear, concise, and trader-friendly insights.";
const SYSTEM_SUMMARIZER: &str =
    "You are a crypto market analyst. Provide a clear and insightful market summary.";

/// Configuration for the LLM client.
#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub timeout_secs: u64,
}

impl Default for LlmClientConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            max_tokens: 1000,
            temperature: 0.7,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Client for chat-completions style LLM APIs.
pub struct LlmClient {
    http: Client,
    config: LlmClientConfig,
}

impl LlmClient {
    /// Creates a new client from the given configuration.
    ///
    /// # Errors
    /// Returns an error if the API key is not a valid header value or the
    /// HTTP client cannot be built.
    pub fn new(config: LlmClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|_| LlmError::Configuration("invalid API key".to_string()))?;
        headers.insert(AUTHORIZATION, bearer);

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| LlmError::Configuration(e.to_string()))?;

        Ok(Self { http, config })
    }

    async fn chat(&self, system: &'static str, user: String) -> Result<String> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let url = format!("{}/chat/completions", self.config.base_url);
        let response = self.http.post(&url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status_code: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(LlmError::EmptyResponse)
    }

    /// Answers a free-text question about the summarized market data.
    ///
    /// Failures are surfaced as a user-visible message, never as an error.
    pub async fn analyze_market_data(&self, summary: &MarketSummary, question: &str) -> String {
        match self
            .chat(SYSTEM_ANALYST, prompts::analysis_prompt(summary, question))
            .await
        {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Error analyzing market data: {}", e);
                format!("Sorry, I encountered an error while analyzing the data: {e}")
            }
        }
    }

    /// Generates a market summary narrative.
    pub async fn generate_market_summary(&self, summary: &MarketSummary) -> String {
        match self
            .chat(SYSTEM_SUMMARIZER, prompts::summary_prompt(summary))
            .await
        {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Error generating market summary: {}", e);
                format!("Sorry, I encountered an error while generating the summary: {e}")
            }
        }
    }

    /// Describes notable patterns in the summarized data.
    pub async fn detect_patterns(&self, summary: &MarketSummary) -> String {
        match self
            .chat(SYSTEM_ANALYST, prompts::pattern_prompt(summary))
            .await
        {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Error detecting patterns: {}", e);
                format!("Sorry, I encountered an error while detecting patterns: {e}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use marketflow_analytics::{compute_all, MetricsConfig};
    use marketflow_data::CandleRecord;

    fn sample_summary() -> MarketSummary {
        let base = chrono::Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap();
        let candles: Vec<CandleRecord> = (0..10)
            .map(|i| {
                CandleRecord::new(
                    "bitcoin",
                    base + chrono::Duration::hours(i),
                    100.0,
                    101.0,
                    99.0,
                    100.5,
                    1000.0,
                )
            })
            .collect();
        let metrics = compute_all(&candles, &MetricsConfig::default());
        MarketSummary::build("bitcoin", &candles, &metrics, 3)
    }

    #[test]
    fn test_default_config() {
        let config = LlmClientConfig::default();
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert_eq!(config.model, "gpt-3.5-turbo");
        assert_eq!(config.max_tokens, 1000);
    }

    #[test]
    fn test_response_parsing() {
        let json = r#"{"choices": [{"message": {"role": "assistant",
            "content": "Volume looks elevated."}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("Volume looks elevated.")
        );
    }

    #[tokio::test]
    async fn test_unreachable_api_yields_apology_text() {
        let config = LlmClientConfig {
            api_key: "sk-test".to_string(),
            base_url: "http://127.0.0.1:1/v1".to_string(),
            timeout_secs: 2,
            ..LlmClientConfig::default()
        };
        let client = LlmClient::new(config).unwrap();
        let text = client
            .analyze_market_data(&sample_summary(), "Is volume unusual?")
            .await;
        assert!(text.starts_with("Sorry, I encountered an error"));
    }
}
