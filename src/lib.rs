//! Priceguard - market price watcher with configurable alerts
//! Built with Domain-Driven Design principles

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;

// Re-export main types for convenience
pub use application::{CommandExecutor, InstrumentStore, WatchService};
pub use domain::alert::Evaluation;
pub use domain::catalog::SymbolMap;
pub use shared::config::AppConfig;
