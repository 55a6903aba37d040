use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub etl: EtlConfig,
    pub anomaly: AnomalyConfig,
    pub llm: LlmConfig,
    pub server: ServerConfig,
}

/// Upstream market-data API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    /// Pro API key, sent as `x-cg-pro-api-key` when set.
    pub api_key: Option<String>,
    pub rate_limit_per_minute: u32,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtlConfig {
    /// Coin identifiers processed by ingestion and standardization runs.
    pub coins: Vec<String>,
    /// Days of history fetched per ingestion run.
    pub lookback_days: u32,
    /// Candle width used when standardizing stored history.
    pub standard_interval_minutes: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyConfig {
    pub volume_zscore_threshold: f64,
    pub price_zscore_threshold: f64,
    /// Rolling window for the volatility series fed to the detector.
    pub volatility_window: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.coingecko.com/api/v3".to_string(),
            api_key: None,
            rate_limit_per_minute: 10,
            request_timeout_secs: 30,
            max_retries: 3,
            retry_delay_secs: 1,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/market_data.db".to_string(),
            max_connections: 10,
        }
    }
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            coins: vec![
                "bitcoin".to_string(),
                "ethereum".to_string(),
                "solana".to_string(),
                "cardano".to_string(),
                "binancecoin".to_string(),
            ],
            lookback_days: 7,
            standard_interval_minutes: 30,
        }
    }
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            volume_zscore_threshold: 3.0,
            price_zscore_threshold: 2.5,
            volatility_window: 24,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            max_tokens: 1000,
            temperature: 0.7,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl AppConfig {
    /// Validates settings that must be present before any coin is processed.
    ///
    /// # Errors
    /// Returns an error if the LLM API key is missing, the API base URL is
    /// empty, or no coins are configured.
    pub fn validate(&self) -> Result<()> {
        if self.llm.api_key.trim().is_empty() {
            bail!("llm.api_key is required (set MARKETFLOW_LLM__API_KEY)");
        }
        if self.api.base_url.trim().is_empty() {
            bail!("api.base_url is required");
        }
        if self.etl.coins.is_empty() {
            bail!("etl.coins must list at least one coin");
        }
        Ok(())
    }
}
