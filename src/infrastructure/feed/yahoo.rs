//! Yahoo Finance chart API client for poll-only instruments

use std::time::Duration;

use chrono::DateTime;
use serde::Deserialize;
use tracing::warn;

use async_trait::async_trait;

use crate::shared::errors::FeedError;
use crate::shared::types::Candle;

use super::MarketData;

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

// Yahoo serves a 429 page to clients without a browser-ish user agent.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<Quote>,
}

/// OHLC arrays are index-aligned with `timestamp`; closed-market rows
/// arrive as nulls.
#[derive(Debug, Deserialize)]
struct Quote {
    open: Option<Vec<Option<f64>>>,
    high: Option<Vec<Option<f64>>>,
    low: Option<Vec<Option<f64>>>,
    close: Option<Vec<Option<f64>>>,
}

pub struct YahooClient {
    client: reqwest::Client,
}

impl Default for YahooClient {
    fn default() -> Self {
        Self::new()
    }
}

impl YahooClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    async fn fetch_chart(&self, ticker: &str, range: &str) -> Result<ChartResult, FeedError> {
        let url = format!("{}/{}", CHART_URL, urlencode(ticker));
        let response = self
            .client
            .get(&url)
            .query(&[("interval", "1d"), ("range", range)])
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

        let parsed: ChartResponse = response
            .json()
            .await
            .map_err(|e| FeedError::Payload(format!("GET {}: {}", url, e)))?;

        parsed
            .chart
            .result
            .and_then(|mut results| {
                if results.is_empty() {
                    None
                } else {
                    Some(results.remove(0))
                }
            })
            .ok_or_else(|| FeedError::Payload(format!("{}: empty chart result", ticker)))
    }
}

#[async_trait]
impl MarketData for YahooClient {
    async fn latest_prices(&self, tickers: &[String]) -> Result<Vec<(String, f64)>, FeedError> {
        // One chart call per ticker; a failing ticker must not starve the
        // rest of the channel, so failures are logged and skipped.
        let mut prices = Vec::with_capacity(tickers.len());
        for ticker in tickers {
            match self.fetch_chart(ticker, "1d").await {
                Ok(result) => {
                    if let Some(price) = result.meta.regular_market_price {
                        prices.push((ticker.clone(), price));
                    }
                }
                Err(e) => warn!(ticker = %ticker, error = %e, "yahoo quote failed"),
            }
        }
        Ok(prices)
    }

    async fn daily_candles(&self, ticker: &str) -> Result<Vec<Candle>, FeedError> {
        let result = self.fetch_chart(ticker, "5d").await?;
        Ok(candles_from_chart(result))
    }
}

fn candles_from_chart(result: ChartResult) -> Vec<Candle> {
    let timestamps = result.timestamp.unwrap_or_default();
    let quote = match result.indicators.quote.into_iter().next() {
        Some(quote) => quote,
        None => return Vec::new(),
    };

    let opens = quote.open.unwrap_or_default();
    let highs = quote.high.unwrap_or_default();
    let lows = quote.low.unwrap_or_default();
    let closes = quote.close.unwrap_or_default();

    let at = |col: &[Option<f64>], i: usize| col.get(i).copied().flatten();

    timestamps
        .iter()
        .enumerate()
        .filter_map(|(i, &ts)| {
            Some(Candle {
                time: DateTime::from_timestamp(ts, 0)?,
                open: at(&opens, i)?,
                high: at(&highs, i)?,
                low: at(&lows, i)?,
                close: at(&closes, i)?,
            })
        })
        .collect()
}

/// Tickers like `^VIX` are not valid raw in a URL path segment.
fn urlencode(ticker: &str) -> String {
    ticker
        .chars()
        .map(|c| match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '.' | '_' | '=' => c.to_string(),
            other => format!("%{:02X}", other as u32),
        })
        .collect()
}
