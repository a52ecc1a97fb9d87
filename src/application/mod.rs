//! Application layer - use cases and services

pub mod commands;
pub mod store;
pub mod watch;

pub use commands::{Cli, CommandExecutor, Commands};
pub use store::InstrumentStore;
pub use watch::WatchService;
