//! Test fixtures and data generators
//!
//! Provides reusable moments and reactions for integration tests. All
//! times are offsets in seconds from [`epoch`].

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, TimeZone, Utc};
use moment_core::{Moment, Reaction, Snowflake};

/// Counter for unique reaction ids
static COUNTER: AtomicI64 = AtomicI64::new(1_000_000);

/// Get a unique id for test data
pub fn unique_id() -> Snowflake {
    Snowflake::new(COUNTER.fetch_add(1, Ordering::SeqCst))
}

/// Fixed origin for fixture timestamps
pub fn epoch() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0)
        .single()
        .unwrap_or_default()
}

/// Instant `secs` after [`epoch`]
pub fn at(secs: i64) -> DateTime<Utc> {
    epoch() + Duration::seconds(secs)
}

/// Moment created at `created` living for `lifetime` seconds
pub fn moment(id: i64, created: i64, lifetime: i64) -> Moment {
    Moment::new(
        Snowflake::new(id),
        Snowflake::new(42),
        at(created),
        Duration::seconds(lifetime),
        format!("moments/{id}.jpg"),
    )
}

/// Moment whose expiry equals its creation time
pub fn degenerate_moment(id: i64, created: i64) -> Moment {
    let mut moment = moment(id, created, 1);
    moment.expires_at = moment.created_at;
    moment
}

/// Reaction by `user` on `moment_id`
pub fn reaction(moment_id: i64, user: i64, emoji: &str) -> Reaction {
    Reaction::new(
        unique_id(),
        Snowflake::new(moment_id),
        Snowflake::new(user),
        emoji,
        epoch(),
    )
}

/// Bulk payload the way the backend serializes it, newest first
pub const FEED_JSON: &str = r#"[
    {
        "id": "3",
        "author_id": "42",
        "created_at": "2023-11-14T22:15:00Z",
        "expires_at": "2023-11-15T22:15:00Z",
        "payload_ref": "moments/3.jpg",
        "caption": "sunset",
        "reactions": [
            {"id": "31", "moment_id": "3", "user_id": "7", "emoji": "❤️", "created_at": "2023-11-14T22:16:00Z"},
            {"id": "32", "moment_id": "3", "user_id": "8", "emoji": "✨", "created_at": "2023-11-14T22:17:00Z"},
            {"id": "33", "moment_id": "3", "user_id": "9", "emoji": "❤️", "created_at": "2023-11-14T22:18:00Z"}
        ]
    },
    {
        "id": "2",
        "author_id": 43,
        "created_at": "2023-11-14T22:14:00Z",
        "expires_at": "2023-11-15T22:14:00Z",
        "payload_ref": "moments/2.jpg"
    }
]"#;

/// Parse [`FEED_JSON`]
pub fn feed_from_json() -> serde_json::Result<Vec<Moment>> {
    serde_json::from_str(FEED_JSON)
}
