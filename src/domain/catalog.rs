//! Built-in instrument catalog and upstream symbol resolution

use std::collections::HashMap;

use crate::shared::errors::StoreError;
use crate::shared::types::{Instrument, InstrumentKind};

/// Default watchlist. New deployments start from this set; persisted state
/// can extend it but catalog entries are always re-merged on load.
pub fn default_catalog() -> Vec<Instrument> {
    use InstrumentKind::*;

    vec![
        // Binance spot pairs
        Instrument::new("btc", "BTC", "Bitcoin", "BTCUSDT", Crypto, "spot"),
        Instrument::new("eth", "ETH", "Ethereum", "ETHUSDT", Crypto, "spot"),
        Instrument::new("bnb", "BNB", "BNB", "BNBUSDT", Crypto, "spot"),
        Instrument::new("sol", "SOL", "Solana", "SOLUSDT", Crypto, "spot"),
        Instrument::new("xrp", "XRP", "Ripple", "XRPUSDT", Crypto, "spot"),
        Instrument::new("doge", "DOGE", "Dogecoin", "DOGEUSDT", Crypto, "spot"),
        Instrument::new("ada", "ADA", "Cardano", "ADAUSDT", Crypto, "spot"),
        // Commodities, one gold quote per venue
        Instrument::new("gold", "GC=F", "Gold (Yahoo)", "GC=F", Commodity, "yahoo"),
        Instrument::new("gold_binance", "XAU/USD", "Gold (Binance)", "XAUUSDT", Commodity, "futures"),
        Instrument::new("silver", "SI=F", "Silver (Yahoo)", "SI=F", Commodity, "yahoo"),
        Instrument::new("dxy", "DX-Y.NYB", "US Dollar Index", "DX-Y.NYB", Forex, "yahoo"),
        // US index futures trade near 24/5, unlike the cash indices
        Instrument::new("sp500", "ES=F", "S&P 500 (Fut)", "ES=F", Index, "yahoo"),
        Instrument::new("dji", "YM=F", "Dow Jones (Fut)", "YM=F", Index, "yahoo"),
        Instrument::new("ixic", "NQ=F", "Nasdaq (Fut)", "NQ=F", Index, "yahoo"),
        Instrument::new("vix", "^VIX", "Volatility Index", "^VIX", Index, "yahoo"),
    ]
}

/// Maps an upstream ticker back to an instrument id, scoped per channel.
///
/// Built once from the tracked instruments instead of hard-coding a match
/// per symbol, so user-added instruments resolve the same way catalog ones
/// do. Construction fails on a duplicate (channel, ticker) pair rather
/// than silently routing two instruments to one stream.
#[derive(Debug, Clone, Default)]
pub struct SymbolMap {
    by_ticker: HashMap<(String, String), String>,
}

impl SymbolMap {
    pub fn from_instruments<'a, I>(instruments: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = &'a Instrument>,
    {
        let mut by_ticker = HashMap::new();
        for inst in instruments {
            let key = (inst.channel.clone(), inst.ticker.to_uppercase());
            if let Some(existing) = by_ticker.insert(key, inst.id.clone()) {
                return Err(StoreError::DuplicateSymbol(format!(
                    "{} on channel {} (already mapped to {})",
                    inst.ticker, inst.channel, existing
                )));
            }
        }
        Ok(Self { by_ticker })
    }

    /// Resolve an upstream ticker as it appears on the wire.
    pub fn resolve(&self, channel: &str, ticker: &str) -> Option<&str> {
        self.by_ticker
            .get(&(channel.to_string(), ticker.to_uppercase()))
            .map(String::as_str)
    }

    /// Tickers subscribed on one channel, for building stream URLs.
    pub fn tickers_for(&self, channel: &str) -> Vec<String> {
        let mut tickers: Vec<String> = self
            .by_ticker
            .keys()
            .filter(|(ch, _)| ch == channel)
            .map(|(_, ticker)| ticker.clone())
            .collect();
        tickers.sort();
        tickers
    }
}
