//! Domain layer - core business logic and entities

pub mod alert;
pub mod catalog;
