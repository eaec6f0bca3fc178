//! # moment-core
//!
//! Domain layer for ephemeral moments: entities, identifiers, clocks and
//! domain errors. This crate has no dependency on an async runtime or on any
//! backend collaborator.

pub mod clock;
pub mod entities;
pub mod error;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use entities::{Moment, Reaction, ReactionCount};
pub use error::DomainError;
pub use value_objects::{Snowflake, SnowflakeParseError};
