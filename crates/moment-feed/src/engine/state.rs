//! Engine lifecycle state and published snapshots

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use moment_core::{Moment, Snowflake};

/// Lifecycle state of the feed engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncState {
    /// Nothing loaded yet, or the initial load failed
    Idle,
    /// Initial bulk fetch outstanding
    Loading,
    /// Working set loaded and live
    Ready,
    /// Refresh fetch outstanding, previous working set still served
    Refreshing,
    /// Terminal
    Disposed,
}

impl SyncState {
    /// Get the state name as a string
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Refreshing => "refreshing",
            Self::Disposed => "disposed",
        }
    }

    /// Whether a bulk fetch is outstanding
    pub fn is_fetching(self) -> bool {
        matches!(self, Self::Loading | Self::Refreshing)
    }

    /// Whether a working set has been loaded
    pub fn has_data(self) -> bool {
        matches!(self, Self::Ready | Self::Refreshing)
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable view of the working set at one point in time
///
/// Cloning is cheap; the moments are shared.
#[derive(Debug, Clone)]
pub struct FeedSnapshot {
    /// Working set in display order
    pub moments: Arc<[Moment]>,
    /// Engine state when the snapshot was taken
    pub state: SyncState,
    /// Whether the live event subscription was open
    pub subscribed: bool,
    /// Bumped on every published change
    pub version: u64,
    /// Clock reading when the snapshot was taken
    pub taken_at: DateTime<Utc>,
}

impl FeedSnapshot {
    /// Empty snapshot in the `Idle` state
    pub fn initial(now: DateTime<Utc>) -> Self {
        Self {
            moments: Arc::from(Vec::new()),
            state: SyncState::Idle,
            subscribed: false,
            version: 0,
            taken_at: now,
        }
    }

    pub fn len(&self) -> usize {
        self.moments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moments.is_empty()
    }

    /// Ids in display order
    pub fn ids(&self) -> Vec<Snowflake> {
        self.moments.iter().map(|m| m.id).collect()
    }

    pub fn contains(&self, id: Snowflake) -> bool {
        self.moments.iter().any(|m| m.id == id)
    }

    pub fn get(&self, id: Snowflake) -> Option<&Moment> {
        self.moments.iter().find(|m| m.id == id)
    }
}
