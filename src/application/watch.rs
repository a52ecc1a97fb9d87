//! Watch service - run the feed, evaluate ticks, dispatch alerts

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::infrastructure::feed::{default_clients, FeedAdapter, MarketData};
use crate::infrastructure::notify::Dispatcher;
use crate::shared::config::AppConfig;
use crate::shared::errors::AppError;
use crate::shared::types::KeyLevels;

use super::store::InstrumentStore;

const TICK_QUEUE_DEPTH: usize = 256;

/// Long-running watch loop. Owns the store for its whole lifetime; every
/// mutation flows through this single task, so tick handling needs no
/// locking.
pub struct WatchService {
    config: AppConfig,
}

impl WatchService {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Run until interrupted, or for `duration` seconds when given.
    pub async fn run(&self, duration: Option<u64>) -> Result<(), AppError> {
        let mut store = InstrumentStore::load(&self.config.state_path);
        let symbols = store.symbol_map()?;
        let dispatcher = Dispatcher::from_config(&self.config);
        let clients = default_clients(&self.config.feed);

        let (tx, mut rx) = mpsc::channel(TICK_QUEUE_DEPTH);
        let feed = FeedAdapter::spawn(&self.config.feed, &symbols, clients.clone(), tx);
        info!(
            instruments = store.instruments().len(),
            channels = self.config.feed.channels.len(),
            "watch started"
        );

        let mut level_refresh = tokio::time::interval(Duration::from_secs(
            self.config.feed.key_level_refresh_secs,
        ));
        level_refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let deadline = async {
            match duration {
                Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                Some(tick) = rx.recv() => {
                    match store.apply_tick(&tick) {
                        Ok(messages) if !messages.is_empty() => {
                            dispatcher.dispatch(&messages).await;
                        }
                        Ok(_) => {}
                        Err(e) => warn!(instrument = %tick.instrument_id, error = %e, "tick rejected"),
                    }
                }
                _ = level_refresh.tick() => {
                    refresh_key_levels(&mut store, &clients).await;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupt received, shutting down");
                    break;
                }
                _ = &mut deadline => {
                    info!("watch duration elapsed");
                    break;
                }
            }
        }

        feed.shutdown().await;
        store.save()?;
        Ok(())
    }
}

/// Re-derive key levels for every instrument from fresh daily candles.
/// Instruments whose upstream cannot produce two valid candles keep no
/// levels at all rather than stale or partial ones.
async fn refresh_key_levels(
    store: &mut InstrumentStore,
    clients: &HashMap<String, Arc<dyn MarketData>>,
) {
    let targets: Vec<(String, String, String)> = store
        .instruments()
        .iter()
        .map(|i| (i.id.clone(), i.channel.clone(), i.ticker.clone()))
        .collect();

    for (id, channel, ticker) in targets {
        let Some(client) = clients.get(&channel) else {
            continue;
        };
        match client.daily_candles(&ticker).await {
            Ok(candles) => {
                let levels = KeyLevels::from_daily_candles(&candles);
                if levels.is_none() {
                    debug!(instrument = %id, "not enough valid candles for key levels");
                }
                if let Err(e) = store.set_key_levels(&id, levels) {
                    warn!(instrument = %id, error = %e, "key-level update failed");
                }
            }
            Err(e) => warn!(instrument = %id, error = %e, "key-level fetch failed"),
        }
    }
}
