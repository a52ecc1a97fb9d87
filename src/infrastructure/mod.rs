//! Infrastructure layer - upstream feeds and outbound notifications

pub mod feed;
pub mod notify;
