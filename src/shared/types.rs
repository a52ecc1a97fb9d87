//! Common types used across the application

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Instrument classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstrumentKind {
    Crypto,
    Commodity,
    Forex,
    Index,
}

impl InstrumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstrumentKind::Crypto => "CRYPTO",
            InstrumentKind::Commodity => "COMMODITY",
            InstrumentKind::Forex => "FOREX",
            InstrumentKind::Index => "INDEX",
        }
    }
}

/// Reference prices derived from daily candles, used as alert trigger lines
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyLevels {
    pub yesterday_high: f64,
    pub yesterday_low: f64,
    pub yesterday_close: f64,
    pub today_open: f64,
    pub fib618: f64,
    pub fib786: f64,
}

/// One-shot enables for key-level crossing alerts; each clears after firing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelFlags {
    pub touch_high: bool,
    pub touch_low: bool,
    pub touch_close: bool,
    pub touch_open: bool,
    pub touch_fib618: bool,
    pub touch_fib786: bool,
}

impl LevelFlags {
    pub fn any(&self) -> bool {
        self.touch_high
            || self.touch_low
            || self.touch_close
            || self.touch_open
            || self.touch_fib618
            || self.touch_fib786
    }
}

/// Repeated "moved by X" alert with a floating baseline price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalAlert {
    pub step: f64,
    pub enabled: bool,
    /// Last-triggered price; volatile, never persisted
    #[serde(skip)]
    pub baseline: Option<f64>,
}

/// Per-instrument alert configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub flags: LevelFlags,
    pub interval: Option<IntervalAlert>,
}

/// A tracked instrument with its live quote state and alert configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Instrument {
    pub id: String,
    /// Display symbol, e.g. "BTC"
    pub symbol: String,
    pub name: String,
    /// Upstream ticker, e.g. "BTCUSDT" or "GC=F"
    pub ticker: String,
    pub kind: InstrumentKind,
    /// Feed channel name this instrument is subscribed on
    pub channel: String,
    pub price: f64,
    pub open_price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub high: f64,
    pub low: f64,
    /// True once a real price has been observed; gates alert evaluation
    /// so the 0 -> first-price transition never fires
    pub is_initialized: bool,
    pub key_levels: Option<KeyLevels>,
    pub alerts: AlertConfig,
}

impl Instrument {
    pub fn new(
        id: impl Into<String>,
        symbol: impl Into<String>,
        name: impl Into<String>,
        ticker: impl Into<String>,
        kind: InstrumentKind,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            name: name.into(),
            ticker: ticker.into(),
            kind,
            channel: channel.into(),
            price: 0.0,
            open_price: 0.0,
            change: 0.0,
            change_percent: 0.0,
            high: 0.0,
            low: 0.0,
            is_initialized: false,
            key_levels: None,
            alerts: AlertConfig::default(),
        }
    }

    /// Zero out live quote state so the next tick is treated as the first.
    /// Identity and alert configuration are untouched.
    pub fn reset_volatile(&mut self) {
        self.price = 0.0;
        self.open_price = 0.0;
        self.change = 0.0;
        self.change_percent = 0.0;
        self.high = 0.0;
        self.low = 0.0;
        self.is_initialized = false;
        self.key_levels = None;
        if let Some(interval) = &mut self.alerts.interval {
            interval.baseline = None;
        }
    }
}

/// One price update for an instrument
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTick {
    pub instrument_id: String,
    pub price: f64,
}

impl PriceTick {
    pub fn new(instrument_id: impl Into<String>, price: f64) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            price,
        }
    }
}

/// One OHLC record; fetchers return these ordered oldest to newest
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}
