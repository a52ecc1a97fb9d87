//! Notification dispatch - fan alert messages out to configured channels

pub mod telegram;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::shared::config::AppConfig;
use crate::shared::errors::NotifyError;

pub use telegram::TelegramChannel;

/// One outbound notification sink.
#[async_trait]
pub trait NotifyChannel: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, text: &str) -> Result<(), NotifyError>;
}

/// Sends every message to every channel. Delivery failures are logged and
/// swallowed; an unreachable relay must never stall price processing.
pub struct Dispatcher {
    channels: Vec<Box<dyn NotifyChannel>>,
}

impl Dispatcher {
    pub fn new(channels: Vec<Box<dyn NotifyChannel>>) -> Self {
        Self { channels }
    }

    /// Dispatcher with every channel the config enables. The log channel
    /// is always present so alerts are visible without any relay set up.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut channels: Vec<Box<dyn NotifyChannel>> = vec![Box::new(LogChannel)];
        if let Some(telegram) = &config.telegram {
            channels.push(Box::new(TelegramChannel::new(telegram.clone())));
        }
        Self::new(channels)
    }

    pub async fn dispatch(&self, messages: &[String]) {
        for message in messages {
            for channel in &self.channels {
                if let Err(e) = channel.send(message).await {
                    warn!(channel = channel.name(), error = %e, "notification failed");
                }
            }
        }
    }
}

/// Fallback sink that just writes alerts to the log.
pub struct LogChannel;

#[async_trait]
impl NotifyChannel for LogChannel {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        info!("ALERT: {}", text);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct RecordingChannel {
        sent: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl NotifyChannel for RecordingChannel {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&self, text: &str) -> Result<(), NotifyError> {
            if self.fail {
                return Err(NotifyError::Status(500));
            }
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn every_message_reaches_every_channel() {
        let a = Arc::new(Mutex::new(Vec::new()));
        let b = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = Dispatcher::new(vec![
            Box::new(RecordingChannel { sent: a.clone(), fail: false }),
            Box::new(RecordingChannel { sent: b.clone(), fail: false }),
        ]);

        dispatcher
            .dispatch(&["one".to_string(), "two".to_string()])
            .await;

        assert_eq!(a.lock().unwrap().len(), 2);
        assert_eq!(b.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn one_failing_channel_does_not_block_the_rest() {
        let ok = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = Dispatcher::new(vec![
            Box::new(RecordingChannel { sent: Arc::new(Mutex::new(Vec::new())), fail: true }),
            Box::new(RecordingChannel { sent: ok.clone(), fail: false }),
        ]);

        dispatcher.dispatch(&["ping".to_string()]).await;
        assert_eq!(ok.lock().unwrap().as_slice(), ["ping"]);
    }
}
