//! Binance WebSocket trade streams with fixed-delay reconnect

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, info, warn};

use crate::domain::catalog::SymbolMap;
use crate::shared::config::FeedBackend;
use crate::shared::types::PriceTick;

const SPOT_WS_URL: &str = "wss://stream.binance.com:9443";
const FUTURES_WS_URL: &str = "wss://fstream.binance.com";

/// Combined-stream envelope; aggTrade events carry the symbol in `s` and
/// the price as a decimal string in `p`.
#[derive(Debug, Deserialize)]
struct StreamEnvelope {
    data: TradeEvent,
}

#[derive(Debug, Deserialize)]
struct TradeEvent {
    s: String,
    p: String,
}

/// Combined-stream URL for a channel, or `None` when the backend has no
/// push interface and the channel runs on polling alone.
pub fn stream_url(backend: FeedBackend, tickers: &[String]) -> Option<String> {
    let base = match backend {
        FeedBackend::BinanceSpot => SPOT_WS_URL,
        FeedBackend::BinanceFutures => FUTURES_WS_URL,
        FeedBackend::Yahoo => return None,
    };
    if tickers.is_empty() {
        return None;
    }

    let streams = tickers
        .iter()
        .map(|t| format!("{}@aggTrade", t.to_lowercase()))
        .collect::<Vec<_>>()
        .join("/");
    Some(format!("{}/stream?streams={}", base, streams))
}

fn parse_tick(text: &str) -> Option<(String, f64)> {
    let envelope: StreamEnvelope = serde_json::from_str(text).ok()?;
    let price: f64 = envelope.data.p.parse().ok()?;
    Some((envelope.data.s, price))
}

/// Hold a WebSocket open for one channel, forwarding resolved ticks until
/// shutdown. Every disconnect, clean or not, is retried after a fixed
/// delay. Each delivered message refreshes `last_push` so the poll task
/// can tell a live stream from a silent one.
#[allow(clippy::too_many_arguments)]
pub async fn run_stream(
    channel: String,
    url: String,
    symbols: SymbolMap,
    tx: mpsc::Sender<PriceTick>,
    last_push: Arc<Mutex<Option<Instant>>>,
    reconnect_delay: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            return;
        }

        // A hung connect must not outlive the handle, so it races shutdown.
        let connected = tokio::select! {
            _ = shutdown.changed() => return,
            result = connect_async(&url) => result,
        };

        match connected {
            Ok((mut stream, _)) => {
                info!(channel = %channel, "websocket connected");
                loop {
                    tokio::select! {
                        _ = shutdown.changed() => {
                            let _ = stream.close(None).await;
                            return;
                        }
                        message = stream.next() => match message {
                            Some(Ok(Message::Text(text))) => {
                                let Some((ticker, price)) = parse_tick(&text) else {
                                    debug!(channel = %channel, "unparseable stream message");
                                    continue;
                                };
                                *last_push.lock().expect("liveness lock poisoned") = Some(Instant::now());
                                let Some(id) = symbols.resolve(&channel, &ticker) else {
                                    continue;
                                };
                                if tx.send(PriceTick::new(id, price)).await.is_err() {
                                    return;
                                }
                            }
                            Some(Ok(Message::Ping(payload))) => {
                                let _ = stream.send(Message::Pong(payload)).await;
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                warn!(channel = %channel, "websocket closed by remote");
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                warn!(channel = %channel, error = %e, "websocket error");
                                break;
                            }
                        }
                    }
                }
            }
            Err(e) => {
                warn!(channel = %channel, error = %e, "websocket connect failed");
            }
        }

        info!(channel = %channel, delay_secs = reconnect_delay.as_secs(), "reconnecting");
        tokio::select! {
            _ = shutdown.changed() => return,
            _ = tokio::time::sleep(reconnect_delay) => {}
        }
    }
}
