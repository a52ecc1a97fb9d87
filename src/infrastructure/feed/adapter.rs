//! Feed adapter - wires streams and poll fallbacks into one tick pipeline

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::domain::catalog::SymbolMap;
use crate::shared::config::FeedConfig;
use crate::shared::types::PriceTick;

use super::{ws, MarketData};

/// Running feed tasks plus the switch that stops them.
pub struct FeedHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl FeedHandle {
    /// Stop every stream and poll task and wait for them to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

pub struct FeedAdapter;

impl FeedAdapter {
    /// Spawn one stream task (where the backend has one) and one poll task
    /// per configured channel. All resolved ticks funnel into `tx`.
    ///
    /// On a streaming channel the poll task only fetches while the stream
    /// has been silent past the staleness window; on a poll-only channel it
    /// fetches every interval. Only pushed messages count as liveness, so
    /// a dead stream keeps falling back even while REST succeeds.
    pub fn spawn(
        config: &FeedConfig,
        symbols: &SymbolMap,
        clients: HashMap<String, Arc<dyn MarketData>>,
        tx: mpsc::Sender<PriceTick>,
    ) -> FeedHandle {
        let (shutdown, _) = watch::channel(false);
        let mut tasks = Vec::new();

        for channel in &config.channels {
            let tickers = symbols.tickers_for(&channel.name);
            if tickers.is_empty() {
                info!(channel = %channel.name, "no instruments on channel, skipping");
                continue;
            }
            let Some(client) = clients.get(&channel.name).cloned() else {
                warn!(channel = %channel.name, "no market-data client for channel");
                continue;
            };

            let last_push: Arc<Mutex<Option<Instant>>> = Arc::new(Mutex::new(None));

            if channel.streaming {
                if let Some(url) = ws::stream_url(channel.backend, &tickers) {
                    tasks.push(tokio::spawn(ws::run_stream(
                        channel.name.clone(),
                        url,
                        symbols.clone(),
                        tx.clone(),
                        last_push.clone(),
                        config.reconnect_delay(),
                        shutdown.subscribe(),
                    )));
                } else {
                    warn!(
                        channel = %channel.name,
                        backend = channel.backend.as_str(),
                        "channel marked streaming but backend has no stream"
                    );
                }
            }

            tasks.push(tokio::spawn(run_poll(
                channel.name.clone(),
                channel.streaming,
                client,
                tickers,
                symbols.clone(),
                tx.clone(),
                last_push,
                config.poll_interval(channel),
                config.staleness(),
                shutdown.subscribe(),
            )));
        }

        FeedHandle { shutdown, tasks }
    }
}

fn is_fresh(last_push: &Mutex<Option<Instant>>, staleness: Duration) -> bool {
    last_push
        .lock()
        .expect("liveness lock poisoned")
        .map(|at| at.elapsed() < staleness)
        .unwrap_or(false)
}

#[allow(clippy::too_many_arguments)]
async fn run_poll(
    channel: String,
    streaming: bool,
    client: Arc<dyn MarketData>,
    tickers: Vec<String>,
    symbols: SymbolMap,
    tx: mpsc::Sender<PriceTick>,
    last_push: Arc<Mutex<Option<Instant>>>,
    poll_interval: Duration,
    staleness: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.changed() => return,
            _ = ticker.tick() => {}
        }

        if streaming && is_fresh(&last_push, staleness) {
            continue;
        }

        // A stalled upstream must not block teardown.
        let fetched = tokio::select! {
            _ = shutdown.changed() => return,
            result = client.latest_prices(&tickers) => result,
        };

        match fetched {
            Ok(prices) => {
                if streaming && !prices.is_empty() {
                    debug!(channel = %channel, count = prices.len(), "stream stale, served via REST");
                }
                for (wire_symbol, price) in prices {
                    let Some(id) = symbols.resolve(&channel, &wire_symbol) else {
                        continue;
                    };
                    if tx.send(PriceTick::new(id, price)).await.is_err() {
                        return;
                    }
                }
            }
            Err(e) => warn!(channel = %channel, error = %e, "poll failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::shared::config::{ChannelConfig, FeedBackend};
    use crate::shared::errors::FeedError;
    use crate::shared::types::{Candle, Instrument, InstrumentKind};

    struct StubMarket {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl MarketData for StubMarket {
        async fn latest_prices(
            &self,
            _tickers: &[String],
        ) -> Result<Vec<(String, f64)>, FeedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![("STUBUSDT".to_string(), 123.0)])
        }

        async fn daily_candles(&self, _ticker: &str) -> Result<Vec<Candle>, FeedError> {
            Ok(Vec::new())
        }
    }

    /// Upstream whose fetches never complete.
    struct StalledMarket;

    #[async_trait]
    impl MarketData for StalledMarket {
        async fn latest_prices(
            &self,
            _tickers: &[String],
        ) -> Result<Vec<(String, f64)>, FeedError> {
            std::future::pending().await
        }

        async fn daily_candles(&self, _ticker: &str) -> Result<Vec<Candle>, FeedError> {
            std::future::pending().await
        }
    }

    fn test_setup(calls: Arc<AtomicUsize>) -> (FeedConfig, SymbolMap, HashMap<String, Arc<dyn MarketData>>) {
        let config = FeedConfig {
            poll_interval_secs: 1,
            staleness_secs: 5,
            channels: vec![ChannelConfig {
                name: "test".to_string(),
                backend: FeedBackend::Yahoo,
                streaming: false,
                poll_interval_secs: Some(1),
            }],
            ..FeedConfig::default()
        };

        let instruments = vec![Instrument::new(
            "stub",
            "STUB",
            "Stub",
            "STUBUSDT",
            InstrumentKind::Crypto,
            "test",
        )];
        let symbols = SymbolMap::from_instruments(&instruments).unwrap();

        let mut clients: HashMap<String, Arc<dyn MarketData>> = HashMap::new();
        clients.insert("test".to_string(), Arc::new(StubMarket { calls }));

        (config, symbols, clients)
    }

    #[tokio::test(start_paused = true)]
    async fn poll_only_channel_fetches_every_interval() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (config, symbols, clients) = test_setup(calls.clone());
        let (tx, mut rx) = mpsc::channel(64);

        let handle = FeedAdapter::spawn(&config, &symbols, clients, tx);

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert!(calls.load(Ordering::SeqCst) >= 3);

        let tick = rx.recv().await.unwrap();
        assert_eq!(tick.instrument_id, "stub");
        assert_eq!(tick.price, 123.0);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_all_fetching() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (config, symbols, clients) = test_setup(calls.clone());
        let (tx, mut rx) = mpsc::channel(64);
        // Keep the pipe drained so sends never block on capacity.
        tokio::spawn(async move { while rx.recv().await.is_some() {} });

        let handle = FeedAdapter::spawn(&config, &symbols, clients, tx);
        tokio::time::sleep(Duration::from_secs(3)).await;
        handle.shutdown().await;

        let after_shutdown = calls.load(Ordering::SeqCst);
        assert!(after_shutdown > 0);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(calls.load(Ordering::SeqCst), after_shutdown);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_an_in_flight_fetch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (_, symbols, _) = test_setup(calls);
        let client: Arc<dyn MarketData> = Arc::new(StalledMarket);
        let (tx, _rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(run_poll(
            "test".to_string(),
            false,
            client,
            vec!["STUBUSDT".to_string()],
            symbols,
            tx,
            Arc::new(Mutex::new(None)),
            Duration::from_secs(1),
            Duration::from_secs(5),
            shutdown_rx,
        ));

        // First fetch starts immediately and hangs forever.
        tokio::time::sleep(Duration::from_millis(500)).await;
        shutdown_tx.send(true).unwrap();

        // Without racing the fetch against shutdown this never returns.
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("poll task still running after shutdown")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn streaming_channel_skips_poll_while_stream_is_fresh() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (_, symbols, _) = test_setup(calls.clone());
        let client: Arc<dyn MarketData> = Arc::new(StubMarket { calls: calls.clone() });
        let (tx, mut rx) = mpsc::channel(64);
        tokio::spawn(async move { while rx.recv().await.is_some() {} });

        let last_push = Arc::new(Mutex::new(Some(Instant::now())));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(run_poll(
            "test".to_string(),
            true,
            client,
            vec!["STUBUSDT".to_string()],
            symbols,
            tx,
            last_push,
            Duration::from_secs(1),
            Duration::from_secs(5),
            shutdown_rx,
        ));

        // Stream pushed just now: freshness suppresses REST entirely.
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        // Past the staleness window the fallback engages.
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(calls.load(Ordering::SeqCst) > 0);

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }
}
