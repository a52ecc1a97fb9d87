//! Binance REST client for spot and futures markets

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::warn;

use async_trait::async_trait;

use crate::shared::errors::FeedError;
use crate::shared::types::Candle;

use super::MarketData;

const SPOT_REST_URL: &str = "https://api.binance.com/api/v3";
const FUTURES_REST_URL: &str = "https://fapi.binance.com/fapi/v1";

const KLINE_LIMIT: u32 = 5;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// REST client shared by the spot and USDT-margined futures APIs; the two
/// differ only in base URL, the payload shapes are identical.
pub struct BinanceRest {
    base_url: String,
    client: reqwest::Client,
}

impl BinanceRest {
    pub fn spot() -> Self {
        Self::with_base(SPOT_REST_URL)
    }

    pub fn futures() -> Self {
        Self::with_base(FUTURES_REST_URL)
    }

    fn with_base(base_url: &str) -> Self {
        // Bounded timeouts keep a stalled upstream from pinning poll
        // tasks past teardown.
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.to_string(),
            client,
        }
    }

    async fn get_json(&self, url: &str) -> Result<Value, FeedError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FeedError::Request(format!("GET {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(FeedError::Request(format!(
                "GET {}: HTTP {}",
                url,
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| FeedError::Payload(format!("GET {}: {}", url, e)))
    }
}

#[async_trait]
impl MarketData for BinanceRest {
    async fn latest_prices(&self, tickers: &[String]) -> Result<Vec<(String, f64)>, FeedError> {
        // One bulk call for the whole exchange, filtered locally. Binance
        // rejects the request outright if any symbol in a filtered query is
        // unknown, which a user-added instrument could easily be.
        let url = format!("{}/ticker/price", self.base_url);
        let payload = self.get_json(&url).await?;

        let wanted: HashSet<&str> = tickers.iter().map(String::as_str).collect();
        Ok(parse_price_list(&payload, &wanted))
    }

    async fn daily_candles(&self, ticker: &str) -> Result<Vec<Candle>, FeedError> {
        let url = format!(
            "{}/klines?symbol={}&interval=1d&limit={}",
            self.base_url, ticker, KLINE_LIMIT
        );
        let payload = self.get_json(&url).await?;
        Ok(parse_klines(&payload, ticker))
    }
}

/// Ticker-price payload is `[{"symbol": "...", "price": "..."}, ...]`.
/// Anything else (error objects included) yields no prices.
fn parse_price_list(payload: &Value, wanted: &HashSet<&str>) -> Vec<(String, f64)> {
    let rows = match payload.as_array() {
        Some(rows) => rows,
        None => return Vec::new(),
    };

    rows.iter()
        .filter_map(|row| {
            let symbol = row.get("symbol")?.as_str()?;
            if !wanted.contains(symbol) {
                return None;
            }
            let price: f64 = row.get("price")?.as_str()?.parse().ok()?;
            Some((symbol.to_string(), price))
        })
        .collect()
}

/// Klines arrive as rows of `[open_time, "open", "high", "low", "close", ...]`.
/// A non-array payload (error object) yields an empty set; malformed rows
/// are dropped individually.
fn parse_klines(payload: &Value, ticker: &str) -> Vec<Candle> {
    let rows = match payload.as_array() {
        Some(rows) => rows,
        None => {
            warn!(ticker, "klines payload is not an array");
            return Vec::new();
        }
    };

    rows.iter().filter_map(parse_kline_row).collect()
}

fn parse_kline_row(row: &Value) -> Option<Candle> {
    let fields = row.as_array()?;
    let open_time_ms = fields.first()?.as_i64()?;
    let time = DateTime::<Utc>::from_timestamp_millis(open_time_ms)?;

    let field = |i: usize| -> Option<f64> { fields.get(i)?.as_str()?.parse().ok() };

    Some(Candle {
        time,
        open: field(1)?,
        high: field(2)?,
        low: field(3)?,
        close: field(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn price_list_filters_to_requested_symbols() {
        let payload = json!([
            {"symbol": "BTCUSDT", "price": "50123.45"},
            {"symbol": "ETHUSDT", "price": "3000.00"},
            {"symbol": "OTHER", "price": "1.0"},
        ]);
        let wanted: HashSet<&str> = ["BTCUSDT", "ETHUSDT"].into_iter().collect();
        let prices = parse_price_list(&payload, &wanted);
        assert_eq!(prices.len(), 2);
        assert!(prices.contains(&("BTCUSDT".to_string(), 50123.45)));
    }

    #[test]
    fn non_array_price_payload_yields_nothing() {
        let payload = json!({"code": -1121, "msg": "Invalid symbol."});
        let wanted: HashSet<&str> = ["BTCUSDT"].into_iter().collect();
        assert!(parse_price_list(&payload, &wanted).is_empty());
    }

    #[test]
    fn klines_parse_ohlc_strings() {
        let payload = json!([
            [1700000000000i64, "100.0", "110.0", "90.0", "105.0", "123", 1700086399999i64],
            [1700086400000i64, "105.0", "115.0", "95.0", "112.0", "456", 1700172799999i64],
        ]);
        let candles = parse_klines(&payload, "BTCUSDT");
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].open, 100.0);
        assert_eq!(candles[1].close, 112.0);
        assert!(candles[0].time < candles[1].time);
    }

    #[test]
    fn non_array_klines_payload_yields_nothing() {
        let payload = json!({"code": -1121, "msg": "Invalid symbol."});
        assert!(parse_klines(&payload, "NOPE").is_empty());
    }

    #[test]
    fn malformed_kline_rows_are_dropped() {
        let payload = json!([
            [1700000000000i64, "100.0", "110.0", "90.0", "105.0"],
            ["not-a-row"],
            [1700086400000i64, "bad", "115.0", "95.0", "112.0"],
        ]);
        assert_eq!(parse_klines(&payload, "BTCUSDT").len(), 1);
    }
}
