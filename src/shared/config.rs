//! Application configuration loaded from Config.toml

use std::path::{Path, PathBuf};
use std::{fs, time::Duration};

use serde::{Deserialize, Serialize};

use crate::shared::errors::AppError;

/// Upstream market-data source a channel reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeedBackend {
    BinanceSpot,
    BinanceFutures,
    Yahoo,
}

impl FeedBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedBackend::BinanceSpot => "binance-spot",
            FeedBackend::BinanceFutures => "binance-futures",
            FeedBackend::Yahoo => "yahoo",
        }
    }
}

/// One logical feed channel (e.g. spot crypto, futures gold, yahoo indices)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub name: String,
    pub backend: FeedBackend,
    /// Push updates over WebSocket; poll-only channels leave this false
    #[serde(default)]
    pub streaming: bool,
    /// Poll cadence override for poll-only channels
    pub poll_interval_secs: Option<u64>,
}

/// Feed timing and channel layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Fixed backoff before a WebSocket reconnect attempt
    pub reconnect_delay_secs: u64,
    /// Cadence of the staleness check on streaming channels
    pub poll_interval_secs: u64,
    /// Max silence on a push channel before the poll fallback engages
    pub staleness_secs: u64,
    pub key_level_refresh_secs: u64,
    pub channels: Vec<ChannelConfig>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_secs: 3,
            poll_interval_secs: 3,
            staleness_secs: 5,
            key_level_refresh_secs: 60,
            channels: vec![
                ChannelConfig {
                    name: "spot".to_string(),
                    backend: FeedBackend::BinanceSpot,
                    streaming: true,
                    poll_interval_secs: None,
                },
                ChannelConfig {
                    name: "futures".to_string(),
                    backend: FeedBackend::BinanceFutures,
                    streaming: true,
                    poll_interval_secs: None,
                },
                ChannelConfig {
                    name: "yahoo".to_string(),
                    backend: FeedBackend::Yahoo,
                    streaming: false,
                    poll_interval_secs: Some(10),
                },
            ],
        }
    }
}

impl FeedConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn staleness(&self) -> Duration {
        Duration::from_secs(self.staleness_secs)
    }

    /// Effective poll cadence for a channel
    pub fn poll_interval(&self, channel: &ChannelConfig) -> Duration {
        Duration::from_secs(channel.poll_interval_secs.unwrap_or(self.poll_interval_secs))
    }
}

/// Outbound message relay credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub state_path: PathBuf,
    pub feed: FeedConfig,
    pub telegram: Option<TelegramConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            state_path: PathBuf::from("priceguard_state.json"),
            feed: FeedConfig::default(),
            telegram: None,
        }
    }
}

impl AppConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| AppError::Config(format!("failed to read config file: {}", e)))?;

        let config: AppConfig = toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("failed to parse config file: {}", e)))?;

        Ok(config)
    }

    pub fn channel(&self, name: &str) -> Option<&ChannelConfig> {
        self.feed.channels.iter().find(|c| c.name == name)
    }
}
