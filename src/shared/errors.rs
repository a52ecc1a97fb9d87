//! Error handling for the application

use thiserror::Error;

/// Feed-related errors
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("malformed upstream payload: {0}")]
    Payload(String),

    #[error("unknown channel: {0}")]
    UnknownChannel(String),
}

/// Notification dispatch errors
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("relay request failed: {0}")]
    Request(String),

    #[error("relay rejected message: HTTP {0}")]
    Status(u16),
}

/// State store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("state file io: {0}")]
    Io(String),

    #[error("state file parse: {0}")]
    Parse(String),

    #[error("unknown instrument: {0}")]
    UnknownInstrument(String),

    #[error("symbol already tracked: {0}")]
    DuplicateSymbol(String),

    #[error("symbol not resolvable upstream: {0}")]
    UnresolvableSymbol(String),
}

/// General application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("notification error: {0}")]
    Notify(#[from] NotifyError),
}
