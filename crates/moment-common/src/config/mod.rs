//! Configuration structs

mod feed_config;

pub use feed_config::{ConfigError, FeedConfig};
