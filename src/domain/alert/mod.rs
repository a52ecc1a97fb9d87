//! Alert domain - pure evaluation of price moves against configured alerts

pub mod evaluator;
pub mod key_levels;

pub use evaluator::{evaluate, Evaluation};
