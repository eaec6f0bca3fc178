//! Domain errors - error types for the domain layer

use thiserror::Error;

use crate::value_objects::Snowflake;

/// Domain layer errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    // =========================================================================
    // Lifetime Errors
    // =========================================================================
    #[error("Moment {id} expires at or before its creation time")]
    DegenerateInterval { id: Snowflake },

    // =========================================================================
    // Ordering Errors
    // =========================================================================
    #[error("Base collection out of order at index {index}: {next} is newer than {previous}")]
    InvalidOrder {
        index: usize,
        previous: Snowflake,
        next: Snowflake,
    },
}

impl DomainError {
    /// Get a stable error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::DegenerateInterval { .. } => "DEGENERATE_INTERVAL",
            Self::InvalidOrder { .. } => "INVALID_ORDER",
        }
    }

    /// Check if this error means the item should be treated as expired
    pub fn is_degenerate(&self) -> bool {
        matches!(self, Self::DegenerateInterval { .. })
    }

    /// Check if this is an ordering error
    pub fn is_ordering(&self) -> bool {
        matches!(self, Self::InvalidOrder { .. })
    }
}
