//! Typed CoinGecko API responses.
//!
//! OHLC rows arrive as positional JSON arrays whose length varies by
//! endpoint: the OHLC endpoint emits 5 elements, some sources append volume
//! as a 6th. Rows are decoded into a tagged [`RawCandle`] at this boundary
//! so downstream code never dispatches on array length.

use crate::error::{CoinGeckoError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One raw candle row, tagged by whether the source provided volume.
///
/// Timestamps are millisecond epoch and mark the candle's close time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawCandle {
    /// `[ts_ms, open, high, low, close]`
    OhlcOnly {
        timestamp_ms: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },
    /// `[ts_ms, open, high, low, close, volume]`
    OhlcWithVolume {
        timestamp_ms: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    },
}

impl RawCandle {
    /// Decodes one positional row.
    ///
    /// # Errors
    /// Returns [`CoinGeckoError::MalformedRow`] for any length other than
    /// 5 or 6.
    pub fn from_row(row: &[f64]) -> Result<Self> {
        match *row {
            [ts, open, high, low, close] => Ok(Self::OhlcOnly {
                timestamp_ms: ts as i64,
                open,
                high,
                low,
                close,
            }),
            [ts, open, high, low, close, volume] => Ok(Self::OhlcWithVolume {
                timestamp_ms: ts as i64,
                open,
                high,
                low,
                close,
                volume,
            }),
            _ => Err(CoinGeckoError::malformed_row(row.len())),
        }
    }

    /// Decodes a full payload of positional rows.
    ///
    /// An empty payload decodes to an empty vector; any malformed row
    /// rejects the whole payload.
    ///
    /// # Errors
    /// Returns [`CoinGeckoError::MalformedRow`] if any row has an
    /// unexpected length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Vec<Self>> {
        rows.iter().map(|row| Self::from_row(row)).collect()
    }

    /// Candle close time in millisecond epoch.
    #[must_use]
    pub fn timestamp_ms(&self) -> i64 {
        match self {
            Self::OhlcOnly { timestamp_ms, .. } | Self::OhlcWithVolume { timestamp_ms, .. } => {
                *timestamp_ms
            }
        }
    }

    /// OHLC prices as (open, high, low, close).
    #[must_use]
    pub fn ohlc(&self) -> (f64, f64, f64, f64) {
        match self {
            Self::OhlcOnly {
                open,
                high,
                low,
                close,
                ..
            }
            | Self::OhlcWithVolume {
                open,
                high,
                low,
                close,
                ..
            } => (*open, *high, *low, *close),
        }
    }

    /// Volume when provided, NaN otherwise.
    #[must_use]
    pub fn volume(&self) -> f64 {
        match self {
            Self::OhlcOnly { .. } => f64::NAN,
            Self::OhlcWithVolume { volume, .. } => *volume,
        }
    }
}

/// Entry from `coins/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinListEntry {
    pub id: String,
    pub symbol: String,
    pub name: String,
}

/// Market snapshot row from `coins/markets`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinMarket {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub current_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub market_cap_rank: Option<u32>,
    pub total_volume: Option<f64>,
    pub price_change_percentage_24h: Option<f64>,
    pub last_updated: Option<String>,
}

/// Price/volume tick history from `coins/{id}/market_chart[/range]`.
///
/// Each point is `[ts_ms, value]`; timestamps arrive as JSON numbers and may
/// be fractional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketChart {
    #[serde(default)]
    pub prices: Vec<(f64, f64)>,
    #[serde(default)]
    pub market_caps: Vec<(f64, f64)>,
    #[serde(default)]
    pub total_volumes: Vec<(f64, f64)>,
}

/// Response from `search`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub coins: Vec<SearchCoin>,
}

/// One coin hit from `search`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCoin {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub market_cap_rank: Option<u32>,
}

/// Response from `search/trending`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrendingResponse {
    #[serde(default)]
    pub coins: Vec<TrendingItem>,
}

/// Wrapper object around each trending coin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendingItem {
    pub item: TrendingCoin,
}

/// One trending coin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendingCoin {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub market_cap_rank: Option<u32>,
}

/// Envelope around `global` data.
#[derive(Debug, Clone, Deserialize)]
pub struct GlobalResponse {
    pub data: GlobalData,
}

/// Global market statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalData {
    pub active_cryptocurrencies: Option<u64>,
    pub markets: Option<u64>,
    #[serde(default)]
    pub total_market_cap: HashMap<String, f64>,
    #[serde(default)]
    pub total_volume: HashMap<String, f64>,
    #[serde(default)]
    pub market_cap_percentage: HashMap<String, f64>,
    pub market_cap_change_percentage_24h_usd: Option<f64>,
}

/// Response from `ping`.
#[derive(Debug, Clone, Deserialize)]
pub struct PingResponse {
    pub gecko_says: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== RawCandle Decoding Tests ====================

    #[test]
    fn test_decode_five_element_row() {
        let row = vec![1_640_995_200_000.0, 47000.0, 48000.0, 46000.0, 47500.0];
        let candle = RawCandle::from_row(&row).unwrap();
        assert_eq!(candle.timestamp_ms(), 1_640_995_200_000);
        assert_eq!(candle.ohlc(), (47000.0, 48000.0, 46000.0, 47500.0));
        assert!(candle.volume().is_nan());
    }

    #[test]
    fn test_decode_six_element_row() {
        let row = vec![
            1_640_995_200_000.0,
            47000.0,
            48000.0,
            46000.0,
            47500.0,
            1_000_000.0,
        ];
        let candle = RawCandle::from_row(&row).unwrap();
        assert!(matches!(candle, RawCandle::OhlcWithVolume { .. }));
        assert!((candle.volume() - 1_000_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_decode_rejects_unexpected_length() {
        let err = RawCandle::from_row(&[1.0, 2.0, 3.0, 4.0]).unwrap_err();
        assert!(matches!(err, CoinGeckoError::MalformedRow { len: 4 }));
    }

    #[test]
    fn test_empty_payload_decodes_empty() {
        let candles = RawCandle::from_rows(&[]).unwrap();
        assert!(candles.is_empty());
    }

    #[test]
    fn test_one_malformed_row_rejects_payload() {
        let rows = vec![
            vec![1_640_995_200_000.0, 1.0, 2.0, 0.5, 1.5],
            vec![1.0, 2.0],
        ];
        assert!(RawCandle::from_rows(&rows).is_err());
    }

    // ==================== Response Parsing Tests ====================

    #[test]
    fn test_market_chart_parses_tick_arrays() {
        let json = r#"{
            "prices": [[1640995200000, 47000.5], [1640998800000, 47500.0]],
            "total_volumes": [[1640995200000, 1000000.0]]
        }"#;
        let chart: MarketChart = serde_json::from_str(json).unwrap();
        assert_eq!(chart.prices.len(), 2);
        assert!((chart.prices[0].1 - 47000.5).abs() < f64::EPSILON);
        assert_eq!(chart.total_volumes.len(), 1);
        assert!(chart.market_caps.is_empty());
    }

    #[test]
    fn test_global_response_envelope() {
        let json = r#"{"data": {"active_cryptocurrencies": 12000,
            "total_market_cap": {"usd": 2.1e12}}}"#;
        let global: GlobalResponse = serde_json::from_str(json).unwrap();
        assert_eq!(global.data.active_cryptocurrencies, Some(12000));
        assert!(global.data.total_market_cap.contains_key("usd"));
    }

    #[test]
    fn test_trending_nested_item() {
        let json = r#"{"coins": [{"item": {"id": "bitcoin", "symbol": "btc",
            "name": "Bitcoin", "market_cap_rank": 1}}]}"#;
        let trending: TrendingResponse = serde_json::from_str(json).unwrap();
        assert_eq!(trending.coins[0].item.id, "bitcoin");
    }
}
