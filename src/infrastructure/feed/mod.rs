//! Market-data feed - WebSocket push with REST polling fallback

pub mod adapter;
pub mod binance;
pub mod ws;
pub mod yahoo;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::shared::config::{FeedBackend, FeedConfig};
use crate::shared::errors::FeedError;
use crate::shared::types::Candle;

pub use adapter::{FeedAdapter, FeedHandle};

/// REST surface of one upstream market-data source.
///
/// The adapter only depends on this trait, so poll and key-level behavior
/// can be exercised against stub backends.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Latest trade price for each requested ticker, as (ticker, price).
    /// Tickers the upstream does not know are simply absent.
    async fn latest_prices(&self, tickers: &[String]) -> Result<Vec<(String, f64)>, FeedError>;

    /// Recent daily candles for one ticker, oldest first.
    async fn daily_candles(&self, ticker: &str) -> Result<Vec<Candle>, FeedError>;
}

/// Production client for each backend named in the channel config.
pub fn default_clients(config: &FeedConfig) -> HashMap<String, Arc<dyn MarketData>> {
    let mut clients: HashMap<String, Arc<dyn MarketData>> = HashMap::new();
    for channel in &config.channels {
        let client: Arc<dyn MarketData> = match channel.backend {
            FeedBackend::BinanceSpot => Arc::new(binance::BinanceRest::spot()),
            FeedBackend::BinanceFutures => Arc::new(binance::BinanceRest::futures()),
            FeedBackend::Yahoo => Arc::new(yahoo::YahooClient::new()),
        };
        clients.insert(channel.name.clone(), client);
    }
    clients
}
