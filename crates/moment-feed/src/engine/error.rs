//! Feed engine errors

use std::time::Duration;

use moment_core::DomainError;

use super::state::SyncState;
use crate::source::SourceError;

/// Error type for feed engine operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] SourceError),

    #[error("Fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("Bulk result rejected: {0}")]
    InvalidOrder(#[source] DomainError),

    #[error("Cannot {operation} while {state}")]
    InvalidTransition {
        state: SyncState,
        operation: &'static str,
    },

    #[error("Feed engine disposed")]
    Disposed,

    #[error("Feed engine stopped")]
    EngineStopped,
}

impl FeedError {
    /// Get the error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "FETCH_FAILED",
            Self::Timeout(_) => "FETCH_TIMEOUT",
            Self::InvalidOrder(_) => "INVALID_ORDER",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::Disposed => "DISPOSED",
            Self::EngineStopped => "ENGINE_STOPPED",
        }
    }

    /// Whether the bulk fetch failed (including timeouts and rejected results)
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            Self::Fetch(_) | Self::Timeout(_) | Self::InvalidOrder(_)
        )
    }

    /// Whether retrying the same call later might succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Fetch(source) => source.is_transient(),
            Self::Timeout(_) => true,
            _ => false,
        }
    }

    /// Whether the engine is gone
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Disposed | Self::EngineStopped)
    }
}

/// Result type for feed engine operations
pub type FeedResult<T> = Result<T, FeedError>;
