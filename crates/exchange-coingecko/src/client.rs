//! CoinGecko REST API client with rate limiting and retries.
//!
//! Provides typed access to the read-only CoinGecko endpoints used by the
//! pipeline. Requests are spaced by a governor rate limiter and retried
//! with exponential backoff on transient failures (429, 5xx, network,
//! timeout); client errors fail immediately.
//!
//! # Example
//!
//! ```ignore
//! use marketflow_coingecko::{CoinGeckoClient, CoinGeckoClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = CoinGeckoClient::new(CoinGeckoClientConfig::default())?;
//!
//!     let candles = client.ohlc("bitcoin", "usd", 7).await?;
//!     println!("Fetched {} candles", candles.len());
//!
//!     Ok(())
//! }
//! ```

use crate::error::{CoinGeckoError, Result};
use crate::types::{
    CoinListEntry, CoinMarket, GlobalData, GlobalResponse, MarketChart, PingResponse, RawCandle,
    SearchResponse, TrendingResponse,
};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Constants
// =============================================================================

/// CoinGecko public API base URL.
pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

/// Header carrying the Pro API key.
const PRO_API_KEY_HEADER: &str = "x-cg-pro-api-key";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the CoinGecko client.
#[derive(Debug, Clone)]
pub struct CoinGeckoClientConfig {
    /// Base URL for the API.
    pub base_url: String,

    /// Pro API key, sent as `x-cg-pro-api-key` when set.
    pub api_key: Option<String>,

    /// Requests per minute limit.
    pub requests_per_minute: NonZeroU32,

    /// Request timeout in seconds.
    pub timeout_secs: u64,

    /// Maximum retry attempts for transient failures.
    pub max_retries: u32,

    /// Base retry delay in seconds, doubled per attempt.
    pub retry_delay_secs: u64,
}

impl Default for CoinGeckoClientConfig {
    fn default() -> Self {
        Self {
            base_url: COINGECKO_API_URL.to_string(),
            api_key: None,
            requests_per_minute: nonzero!(10u32),
            timeout_secs: 30,
            max_retries: 3,
            retry_delay_secs: 1,
        }
    }
}

impl CoinGeckoClientConfig {
    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the Pro API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the rate limit.
    #[must_use]
    pub fn with_rate_limit(mut self, requests_per_minute: NonZeroU32) -> Self {
        self.requests_per_minute = requests_per_minute;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retries(mut self, max_retries: u32, retry_delay_secs: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_delay_secs = retry_delay_secs;
        self
    }

    /// Backoff before retry `attempt` (0-based): `retry_delay * 2^attempt`.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        Duration::from_secs(self.retry_delay_secs.saturating_mul(1u64 << attempt.min(16)))
    }
}

// =============================================================================
// Client
// =============================================================================

/// CoinGecko REST API client.
pub struct CoinGeckoClient {
    http: Client,
    config: CoinGeckoClientConfig,
    rate_limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl CoinGeckoClient {
    /// Creates a new client from the given configuration.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built or the API key
    /// is not a valid header value.
    pub fn new(config: CoinGeckoClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("marketflow/0.1.0"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(key) = &config.api_key {
            let value = HeaderValue::from_str(key)
                .map_err(|_| CoinGeckoError::Configuration("invalid API key".to_string()))?;
            headers.insert(PRO_API_KEY_HEADER, value);
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| CoinGeckoError::Configuration(e.to_string()))?;

        let quota = Quota::per_minute(config.requests_per_minute);
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        Ok(Self {
            http,
            config,
            rate_limiter,
        })
    }

    /// Issues a rate-limited GET with bounded exponential-backoff retries.
    async fn request<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}/{}", self.config.base_url, endpoint);
        let mut last_error = String::new();

        for attempt in 0..self.config.max_retries {
            self.rate_limiter.until_ready().await;

            let outcome = self.issue(&url, params).await;
            match outcome {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() => {
                    let delay = self.config.backoff_delay(attempt);
                    tracing::warn!(
                        "Request to {} failed (attempt {}): {}; retrying in {:?}",
                        endpoint,
                        attempt + 1,
                        err,
                        delay
                    );
                    last_error = err.to_string();
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }

        Err(CoinGeckoError::RetriesExhausted {
            attempts: self.config.max_retries,
            last_error,
        })
    }

    async fn issue<T: DeserializeOwned>(&self, url: &str, params: &[(&str, String)]) -> Result<T> {
        let response = self.http.get(url).query(params).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(self.config.retry_delay_secs);
            return Err(CoinGeckoError::rate_limit(retry_after));
        }

        let message = response.text().await.unwrap_or_default();
        Err(CoinGeckoError::api(status.as_u16(), message))
    }

    // =========================================================================
    // Endpoints
    // =========================================================================

    /// Checks API reachability via `ping`.
    pub async fn health_check(&self) -> bool {
        match self.request::<PingResponse>("ping", &[]).await {
            Ok(_) => true,
            Err(e) => {
                tracing::error!("Health check failed: {}", e);
                false
            }
        }
    }

    /// Lists all supported coins.
    ///
    /// # Errors
    /// Returns an error if the request fails after retries.
    pub async fn coin_list(&self) -> Result<Vec<CoinListEntry>> {
        tracing::info!("Fetching coin list");
        self.request("coins/list", &[]).await
    }

    /// Fetches market snapshots for the given coin ids.
    ///
    /// # Errors
    /// Returns an error if the request fails after retries.
    pub async fn coin_markets(&self, coin_ids: &[String], vs_currency: &str) -> Result<Vec<CoinMarket>> {
        tracing::info!("Fetching market data for {} coins", coin_ids.len());
        let params = [
            ("ids", coin_ids.join(",")),
            ("vs_currency", vs_currency.to_string()),
            ("order", "market_cap_desc".to_string()),
            ("per_page", "100".to_string()),
            ("page", "1".to_string()),
            ("sparkline", "false".to_string()),
            ("price_change_percentage", "24h,7d,30d".to_string()),
        ];
        self.request("coins/markets", &params).await
    }

    /// Fetches OHLC candles for a coin, decoded into tagged rows.
    ///
    /// Timestamps are candle close times; the endpoint carries no volume.
    ///
    /// # Errors
    /// Returns an error if the request fails after retries or any row is
    /// malformed.
    pub async fn ohlc(&self, coin_id: &str, vs_currency: &str, days: u32) -> Result<Vec<RawCandle>> {
        tracing::info!("Fetching OHLC data for {} ({} days)", coin_id, days);
        let params = [
            ("vs_currency", vs_currency.to_string()),
            ("days", days.to_string()),
        ];
        let rows: Vec<Vec<f64>> = self
            .request(&format!("coins/{coin_id}/ohlc"), &params)
            .await?;
        RawCandle::from_rows(&rows)
    }

    /// Fetches price/volume tick history for the last `days` days.
    ///
    /// # Errors
    /// Returns an error if the request fails after retries.
    pub async fn market_chart(
        &self,
        coin_id: &str,
        vs_currency: &str,
        days: u32,
    ) -> Result<MarketChart> {
        tracing::info!("Fetching price history for {} ({} days)", coin_id, days);
        let params = [
            ("vs_currency", vs_currency.to_string()),
            ("days", days.to_string()),
        ];
        self.request(&format!("coins/{coin_id}/market_chart"), &params)
            .await
    }

    /// Fetches price/volume tick history for an explicit unix-second range.
    ///
    /// # Errors
    /// Returns an error if the request fails after retries.
    pub async fn market_chart_range(
        &self,
        coin_id: &str,
        vs_currency: &str,
        from_unix: i64,
        to_unix: i64,
    ) -> Result<MarketChart> {
        tracing::debug!(
            "Fetching price history range for {} [{} .. {}]",
            coin_id,
            from_unix,
            to_unix
        );
        let params = [
            ("vs_currency", vs_currency.to_string()),
            ("from", from_unix.to_string()),
            ("to", to_unix.to_string()),
        ];
        self.request(&format!("coins/{coin_id}/market_chart/range"), &params)
            .await
    }

    /// Searches coins by name or symbol.
    ///
    /// # Errors
    /// Returns an error if the request fails after retries.
    pub async fn search(&self, query: &str) -> Result<SearchResponse> {
        tracing::info!("Searching for coins matching: {}", query);
        let params = [("query", query.to_string())];
        self.request("search", &params).await
    }

    /// Fetches trending coins.
    ///
    /// # Errors
    /// Returns an error if the request fails after retries.
    pub async fn trending(&self) -> Result<TrendingResponse> {
        tracing::info!("Fetching trending coins");
        self.request("search/trending", &[]).await
    }

    /// Fetches global market statistics.
    ///
    /// # Errors
    /// Returns an error if the request fails after retries.
    pub async fn global(&self) -> Result<GlobalData> {
        tracing::info!("Fetching global market data");
        let response: GlobalResponse = self.request("global", &[]).await?;
        Ok(response.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Configuration Tests ====================

    #[test]
    fn test_default_config() {
        let config = CoinGeckoClientConfig::default();
        assert_eq!(config.base_url, COINGECKO_API_URL);
        assert_eq!(config.requests_per_minute.get(), 10);
        assert_eq!(config.max_retries, 3);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = CoinGeckoClientConfig::default()
            .with_base_url("http://localhost:9999")
            .with_api_key("cg-test")
            .with_rate_limit(nonzero!(30u32))
            .with_timeout_secs(5)
            .with_retries(5, 2);
        assert_eq!(config.base_url, "http://localhost:9999");
        assert_eq!(config.api_key.as_deref(), Some("cg-test"));
        assert_eq!(config.requests_per_minute.get(), 30);
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_delay_secs, 2);
    }

    // ==================== Backoff Tests ====================

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let config = CoinGeckoClientConfig::default().with_retries(4, 1);
        assert_eq!(config.backoff_delay(0), Duration::from_secs(1));
        assert_eq!(config.backoff_delay(1), Duration::from_secs(2));
        assert_eq!(config.backoff_delay(2), Duration::from_secs(4));
        assert_eq!(config.backoff_delay(3), Duration::from_secs(8));
    }

    #[test]
    fn test_backoff_scales_with_base_delay() {
        let config = CoinGeckoClientConfig::default().with_retries(3, 3);
        assert_eq!(config.backoff_delay(1), Duration::from_secs(6));
    }

    #[test]
    fn test_client_builds_with_api_key() {
        let config = CoinGeckoClientConfig::default().with_api_key("cg-test");
        assert!(CoinGeckoClient::new(config).is_ok());
    }
}
