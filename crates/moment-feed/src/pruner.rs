//! Expiry pruning
//!
//! Removes moments whose lifetime has elapsed. Runs on the engine's fixed
//! interval and before every snapshot, so an expired moment stays visible
//! for at most one interval.

use chrono::{DateTime, Utc};
use moment_core::Snowflake;
use tracing::debug;

use crate::index::MergeIndex;

/// Counters for pruning activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneStats {
    /// Number of prune passes
    pub runs: u64,
    /// Total moments removed across all passes
    pub removed_total: u64,
    /// When the last pass ran
    pub last_run: Option<DateTime<Utc>>,
}

/// Expiry pruner
#[derive(Debug, Clone, Default)]
pub struct ExpiryPruner {
    stats: PruneStats,
}

impl ExpiryPruner {
    /// Create a new pruner
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every entry with `expires_at <= now`
    ///
    /// Deterministic in `now`; a second call with the same `now` removes
    /// nothing.
    pub fn prune(&mut self, index: &mut MergeIndex, now: DateTime<Utc>) -> Vec<Snowflake> {
        let removed = index.remove_expired(now);

        self.stats.runs += 1;
        self.stats.removed_total += removed.len() as u64;
        self.stats.last_run = Some(now);

        if !removed.is_empty() {
            debug!(
                removed = removed.len(),
                remaining = index.len(),
                at = %now,
                "Pruned expired moments"
            );
        }
        removed
    }

    /// Pruning counters so far
    pub fn stats(&self) -> PruneStats {
        self.stats
    }
}
