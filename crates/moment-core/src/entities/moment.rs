//! Moment entity - a photo post that vanishes after a fixed lifetime

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::Reaction;
use crate::error::DomainError;
use crate::value_objects::Snowflake;

/// Moment entity
///
/// Created once by its author and never edited afterwards; the only
/// mutation the feed core performs is appending reactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Moment {
    pub id: Snowflake,
    pub author_id: Snowflake,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Reference to externally stored media, never interpreted here
    pub payload_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
}

impl Moment {
    /// Create a new Moment that lives for `lifetime` from `created_at`
    pub fn new(
        id: Snowflake,
        author_id: Snowflake,
        created_at: DateTime<Utc>,
        lifetime: Duration,
        payload_ref: impl Into<String>,
    ) -> Self {
        Self {
            id,
            author_id,
            created_at,
            expires_at: created_at + lifetime,
            payload_ref: payload_ref.into(),
            caption: None,
            reactions: Vec::new(),
        }
    }

    /// Attach a caption
    #[must_use]
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    /// Total lifetime of the moment (may be non-positive for bad rows)
    #[inline]
    pub fn lifetime(&self) -> Duration {
        self.expires_at - self.created_at
    }

    /// Whether `expires_at <= created_at`
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.expires_at <= self.created_at
    }

    /// Whether the moment is no longer valid at `now`
    ///
    /// Degenerate moments count as expired at any time.
    #[inline]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.is_degenerate() || self.expires_at <= now
    }

    /// Time left before expiry, zero once expired
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        if self.is_expired(now) {
            Duration::zero()
        } else {
            self.expires_at - now
        }
    }

    /// Check the lifetime invariant
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.is_degenerate() {
            return Err(DomainError::DegenerateInterval { id: self.id });
        }
        Ok(())
    }

    /// Check if a reaction with this id is already attached
    pub fn has_reaction(&self, reaction_id: Snowflake) -> bool {
        self.reactions.iter().any(|r| r.id == reaction_id)
    }
}
