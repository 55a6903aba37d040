//! CoinGecko exchange integration for MarketFlow.
//!
//! Read-only, rate-limited REST client with typed responses and a tagged
//! decoding of positional OHLC rows.

pub mod client;
pub mod error;
pub mod types;

pub use client::{CoinGeckoClient, CoinGeckoClientConfig, COINGECKO_API_URL};
pub use error::{CoinGeckoError, Result};
pub use types::{
    CoinListEntry, CoinMarket, GlobalData, MarketChart, RawCandle, SearchCoin, SearchResponse,
    TrendingCoin, TrendingItem, TrendingResponse,
};
