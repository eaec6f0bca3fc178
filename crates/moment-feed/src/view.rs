//! Presentation-agnostic per-moment view
//!
//! Combines the time projection and the reaction display set for each
//! moment of a snapshot, so a renderer only has to draw.

use chrono::{DateTime, Duration, Utc};
use moment_core::{Moment, Snowflake};

use crate::projector;
use crate::reactions;

/// Derived display data for one moment
#[derive(Debug, Clone, PartialEq)]
pub struct MomentView {
    pub id: Snowflake,
    /// Discrete progress level, `levels` when fresh down to 0 when expired
    pub level: u32,
    /// Continuous counterpart of `level`, `1.0` when fresh
    pub fraction: f64,
    pub remaining: Duration,
    /// Distinct emojis in first-seen order, capped
    pub emojis: Vec<String>,
    /// Total reactions attached, duplicates included
    pub reaction_count: usize,
}

impl MomentView {
    /// Build the view of a single moment, `None` if its lifetime is degenerate
    pub fn of(moment: &Moment, now: DateTime<Utc>, levels: u32, emoji_cap: usize) -> Option<Self> {
        let level = projector::project_moment(moment, now, levels).ok()?;
        let fraction =
            projector::remaining_fraction(moment.created_at, moment.expires_at, now).ok()?;
        Some(Self {
            id: moment.id,
            level,
            fraction,
            remaining: moment.remaining(now),
            emojis: reactions::unique_emojis(&moment.reactions, emoji_cap),
            reaction_count: moment.reactions.len(),
        })
    }
}

/// Views for every moment in display order, skipping degenerate ones
pub fn build_views(
    moments: &[Moment],
    now: DateTime<Utc>,
    levels: u32,
    emoji_cap: usize,
) -> Vec<MomentView> {
    moments
        .iter()
        .filter_map(|m| MomentView::of(m, now, levels, emoji_cap))
        .collect()
}
