//! CLI commands and handlers

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::infrastructure::feed::default_clients;
use crate::shared::config::AppConfig;
use crate::shared::errors::{AppError, FeedError, StoreError};
use crate::shared::types::{Instrument, InstrumentKind, KeyLevels, LevelFlags};

use super::store::InstrumentStore;
use super::watch::WatchService;

#[derive(Parser)]
#[command(name = "priceguard")]
#[command(about = "Price watcher with threshold, key-level, and interval alerts")]
pub struct Cli {
    /// Path to a Config.toml (built-in defaults when omitted)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the state-file path from the config
    #[arg(short, long)]
    pub state: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Watch all feeds and dispatch alerts as they fire
    Watch {
        /// Stop after this many seconds (runs until interrupted if unset)
        #[arg(short, long)]
        duration: Option<u64>,
    },

    /// List tracked instruments
    List {
        /// Include alert configuration per instrument
        #[arg(short, long)]
        detailed: bool,
    },

    /// Track a new instrument
    Add {
        /// Store id, e.g. "link"
        id: String,

        /// Upstream ticker, e.g. "LINKUSDT" or "CL=F"
        #[arg(long)]
        ticker: String,

        /// Display symbol (defaults to the ticker)
        #[arg(long)]
        symbol: Option<String>,

        /// Display name (defaults to the symbol)
        #[arg(long)]
        name: Option<String>,

        /// crypto, commodity, forex, or index
        #[arg(long, default_value = "crypto")]
        kind: String,

        /// Feed channel to subscribe on
        #[arg(long, default_value = "spot")]
        channel: String,
    },

    /// Stop tracking an instrument
    Remove { id: String },

    /// Configure alerts on an instrument
    Alert {
        id: String,

        /// Fire when the price rises to or above this level
        #[arg(long)]
        high: Option<f64>,

        /// Fire when the price falls to or below this level
        #[arg(long)]
        low: Option<f64>,

        /// Fire on every move of this size from a floating baseline
        #[arg(long)]
        step: Option<f64>,

        /// Arm one-shot alerts on all six key levels
        #[arg(long)]
        levels: bool,

        /// Disarm all key-level alerts
        #[arg(long)]
        clear_levels: bool,

        /// Remove thresholds and the interval alert
        #[arg(long)]
        clear: bool,
    },

    /// Fetch and show current key levels for an instrument
    Levels { id: String },
}

pub struct CommandExecutor {
    config: AppConfig,
}

impl CommandExecutor {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub async fn execute(&self, command: Commands) -> Result<(), AppError> {
        match command {
            Commands::Watch { duration } => {
                WatchService::new(self.config.clone()).run(duration).await
            }
            Commands::List { detailed } => self.list(detailed),
            Commands::Add {
                id,
                ticker,
                symbol,
                name,
                kind,
                channel,
            } => self.add(id, ticker, symbol, name, &kind, channel).await,
            Commands::Remove { id } => self.remove(&id),
            Commands::Alert {
                id,
                high,
                low,
                step,
                levels,
                clear_levels,
                clear,
            } => self.alert(&id, high, low, step, levels, clear_levels, clear),
            Commands::Levels { id } => self.levels(&id).await,
        }
    }

    fn list(&self, detailed: bool) -> Result<(), AppError> {
        let store = InstrumentStore::load(&self.config.state_path);
        println!("📋 Tracked instruments ({}):", store.instruments().len());

        for inst in store.instruments() {
            println!(
                "  {:<14} {:<10} {:<10} {:<9} channel={}",
                inst.id,
                inst.symbol,
                inst.ticker,
                inst.kind.as_str(),
                inst.channel
            );
            if detailed {
                print_alert_config(inst);
            }
        }
        Ok(())
    }

    async fn add(
        &self,
        id: String,
        ticker: String,
        symbol: Option<String>,
        name: Option<String>,
        kind: &str,
        channel: String,
    ) -> Result<(), AppError> {
        if self.config.channel(&channel).is_none() {
            return Err(AppError::Config(format!(
                "channel {} is not configured",
                channel
            )));
        }

        // The upstream must actually know this ticker before we start
        // evaluating alerts against it.
        let clients = default_clients(&self.config.feed);
        let client = clients
            .get(&channel)
            .ok_or_else(|| FeedError::UnknownChannel(channel.clone()))?;
        if client.daily_candles(&ticker).await?.is_empty() {
            return Err(StoreError::UnresolvableSymbol(ticker).into());
        }

        let symbol = symbol.unwrap_or_else(|| ticker.clone());
        let name = name.unwrap_or_else(|| symbol.clone());
        let inst = Instrument::new(id.clone(), symbol, name, ticker, parse_kind(kind)?, channel);

        let mut store = InstrumentStore::load(&self.config.state_path);
        store.add_instrument(inst)?;
        println!("✅ Now tracking {}", id);
        Ok(())
    }

    fn remove(&self, id: &str) -> Result<(), AppError> {
        let mut store = InstrumentStore::load(&self.config.state_path);
        let removed = store.remove_instrument(id)?;
        println!("🗑️ Stopped tracking {} ({})", removed.id, removed.name);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn alert(
        &self,
        id: &str,
        high: Option<f64>,
        low: Option<f64>,
        step: Option<f64>,
        levels: bool,
        clear_levels: bool,
        clear: bool,
    ) -> Result<(), AppError> {
        let mut store = InstrumentStore::load(&self.config.state_path);
        let current = store
            .get(id)
            .ok_or_else(|| {
                StoreError::UnknownInstrument(id.to_string())
            })?
            .alerts
            .clone();

        if clear {
            store.set_thresholds(id, None, None)?;
            store.set_interval(id, None)?;
        } else {
            // Unspecified thresholds keep their existing values.
            store.set_thresholds(id, high.or(current.high), low.or(current.low))?;
            if let Some(step) = step {
                store.set_interval(id, Some(step))?;
            }
        }

        if levels {
            store.set_level_flags(
                id,
                LevelFlags {
                    touch_high: true,
                    touch_low: true,
                    touch_close: true,
                    touch_open: true,
                    touch_fib618: true,
                    touch_fib786: true,
                },
            )?;
        } else if clear_levels {
            store.set_level_flags(id, LevelFlags::default())?;
        }

        if let Some(inst) = store.get(id) {
            println!("🔧 Alert config for {}:", id);
            print_alert_config(inst);
        }
        Ok(())
    }

    async fn levels(&self, id: &str) -> Result<(), AppError> {
        let store = InstrumentStore::load(&self.config.state_path);
        let inst = store.get(id).ok_or_else(|| {
            StoreError::UnknownInstrument(id.to_string())
        })?;

        let clients = default_clients(&self.config.feed);
        let client = clients.get(&inst.channel).ok_or_else(|| {
            FeedError::UnknownChannel(inst.channel.clone())
        })?;

        let candles = client.daily_candles(&inst.ticker).await?;
        match KeyLevels::from_daily_candles(&candles) {
            Some(levels) => {
                println!("📐 Key levels for {} ({}):", inst.name, inst.ticker);
                println!("  yesterday high   {:>12.2}", levels.yesterday_high);
                println!("  yesterday low    {:>12.2}", levels.yesterday_low);
                println!("  yesterday close  {:>12.2}", levels.yesterday_close);
                println!("  today open       {:>12.2}", levels.today_open);
                println!("  fib 0.618        {:>12.2}", levels.fib618);
                println!("  fib 0.786        {:>12.2}", levels.fib786);
            }
            None => {
                println!(
                    "⚠️ Not enough valid daily candles for {} (need 2, got {})",
                    inst.ticker,
                    candles.iter().filter(|c| c.is_valid()).count()
                );
            }
        }
        Ok(())
    }
}

fn parse_kind(kind: &str) -> Result<InstrumentKind, AppError> {
    match kind.to_lowercase().as_str() {
        "crypto" => Ok(InstrumentKind::Crypto),
        "commodity" => Ok(InstrumentKind::Commodity),
        "forex" => Ok(InstrumentKind::Forex),
        "index" => Ok(InstrumentKind::Index),
        other => Err(AppError::Config(format!(
            "unknown instrument kind: {} (expected crypto, commodity, forex, or index)",
            other
        ))),
    }
}

fn print_alert_config(inst: &Instrument) {
    let alerts = &inst.alerts;
    if let Some(high) = alerts.high {
        println!("    high threshold  {:.2}", high);
    }
    if let Some(low) = alerts.low {
        println!("    low threshold   {:.2}", low);
    }
    if let Some(interval) = &alerts.interval {
        println!(
            "    interval step   {:.2} ({})",
            interval.step,
            if interval.enabled { "enabled" } else { "disabled" }
        );
    }
    if alerts.flags.any() {
        let mut armed = Vec::new();
        if alerts.flags.touch_high {
            armed.push("high");
        }
        if alerts.flags.touch_low {
            armed.push("low");
        }
        if alerts.flags.touch_close {
            armed.push("close");
        }
        if alerts.flags.touch_open {
            armed.push("open");
        }
        if alerts.flags.touch_fib618 {
            armed.push("fib618");
        }
        if alerts.flags.touch_fib786 {
            armed.push("fib786");
        }
        println!("    armed levels    {}", armed.join(", "));
    }
    if alerts.high.is_none()
        && alerts.low.is_none()
        && alerts.interval.is_none()
        && !alerts.flags.any()
    {
        println!("    (no alerts configured)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parsing_accepts_known_kinds() {
        assert_eq!(parse_kind("crypto").unwrap(), InstrumentKind::Crypto);
        assert_eq!(parse_kind("INDEX").unwrap(), InstrumentKind::Index);
        assert!(parse_kind("equity").is_err());
    }

    #[test]
    fn cli_parses_watch_with_duration() {
        let cli = Cli::try_parse_from(["priceguard", "watch", "--duration", "30"]).unwrap();
        match cli.command {
            Commands::Watch { duration } => assert_eq!(duration, Some(30)),
            _ => panic!("expected watch command"),
        }
    }

    #[test]
    fn cli_parses_alert_flags() {
        let cli = Cli::try_parse_from([
            "priceguard", "alert", "btc", "--high", "70000", "--step", "500", "--levels",
        ])
        .unwrap();
        match cli.command {
            Commands::Alert {
                id, high, step, levels, ..
            } => {
                assert_eq!(id, "btc");
                assert_eq!(high, Some(70_000.0));
                assert_eq!(step, Some(500.0));
                assert!(levels);
            }
            _ => panic!("expected alert command"),
        }
    }
}
