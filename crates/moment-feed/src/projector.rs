//! Time projection
//!
//! Maps a moment's position inside its lifetime onto a small number of
//! discrete levels (a ring with N segments, a bar with N cells, ...). The
//! result only ever goes down as time moves forward.

use chrono::{DateTime, Duration, Utc};
use moment_core::{DomainError, Moment, Snowflake};

/// Project remaining lifetime onto `[0, total_levels]`
///
/// `total_levels` is returned at or before creation, `0` at or after
/// expiry, and `round(remaining / lifetime * total_levels)` in between
/// (ties round up).
///
/// # Errors
/// Returns [`DomainError::DegenerateInterval`] when `expires_at <= created_at`;
/// callers treat such items as already expired.
pub fn project(
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
    total_levels: u32,
) -> Result<u32, DomainError> {
    project_with_id(Snowflake::default(), created_at, expires_at, now, total_levels)
}

/// Project a moment's remaining lifetime
///
/// Fails exactly when [`Moment::validate`] does.
pub fn project_moment(
    moment: &Moment,
    now: DateTime<Utc>,
    total_levels: u32,
) -> Result<u32, DomainError> {
    moment.validate()?;
    project_with_id(
        moment.id,
        moment.created_at,
        moment.expires_at,
        now,
        total_levels,
    )
}

/// Fraction of the lifetime still remaining, in `[0.0, 1.0]`
pub fn remaining_fraction(
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<f64, DomainError> {
    let (remaining, duration) = split(Snowflake::default(), created_at, expires_at, now)?;
    Ok(remaining as f64 / duration as f64)
}

fn project_with_id(
    id: Snowflake,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
    total_levels: u32,
) -> Result<u32, DomainError> {
    let (remaining, duration) = split(id, created_at, expires_at, now)?;

    // round(remaining * levels / duration) in integer space, half up
    let numerator = remaining * i128::from(total_levels) * 2 + duration;
    let level = numerator / (duration * 2);

    Ok(level.clamp(0, i128::from(total_levels)) as u32)
}

/// Returns `(remaining, duration)` in nanoseconds with `0 <= remaining <= duration`
fn split(
    id: Snowflake,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(i128, i128), DomainError> {
    let duration = nanos(expires_at - created_at);
    if duration <= 0 {
        return Err(DomainError::DegenerateInterval { id });
    }
    let elapsed = nanos(now - created_at).clamp(0, duration);
    Ok((duration - elapsed, duration))
}

fn nanos(delta: Duration) -> i128 {
    i128::from(delta.num_seconds()) * 1_000_000_000 + i128::from(delta.subsec_nanos())
}
