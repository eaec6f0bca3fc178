//! Reaction entity - an emoji reaction on a moment

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::Snowflake;

/// Reaction entity
///
/// Storage does not enforce uniqueness of `(moment_id, user_id, emoji)`,
/// so repeated taps may show up as separate reactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub id: Snowflake,
    pub moment_id: Snowflake,
    pub user_id: Snowflake,
    pub emoji: String,
    pub created_at: DateTime<Utc>,
}

impl Reaction {
    /// Create a new Reaction
    pub fn new(
        id: Snowflake,
        moment_id: Snowflake,
        user_id: Snowflake,
        emoji: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            moment_id,
            user_id,
            emoji: emoji.into(),
            created_at,
        }
    }
}

/// Aggregated reaction count for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReactionCount {
    pub emoji: String,
    /// Distinct users who reacted with this emoji
    pub count: usize,
    /// Whether the viewing user is one of them
    pub me: bool,
}

impl ReactionCount {
    /// Create a new ReactionCount
    pub fn new(emoji: impl Into<String>, count: usize, me: bool) -> Self {
        Self {
            emoji: emoji.into(),
            count,
            me,
        }
    }
}
