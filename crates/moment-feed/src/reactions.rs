//! Reaction aggregation
//!
//! Folds the reactions attached to a moment into what the feed shows: a
//! short row of distinct emojis, per-emoji counts, and the full "who
//! reacted" detail. All functions are pure and accept reactions in any
//! order; output order follows first appearance in the input.

use std::collections::HashSet;

use indexmap::IndexMap;
use moment_core::{Reaction, ReactionCount, Snowflake};

/// Distinct emojis in first-seen order, at most `cap` of them
pub fn unique_emojis(reactions: &[Reaction], cap: usize) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut unique = Vec::new();

    for reaction in reactions {
        if unique.len() >= cap {
            break;
        }
        if seen.insert(reaction.emoji.as_str()) {
            unique.push(reaction.emoji.clone());
        }
    }
    unique
}

/// Group reactions by emoji without deduplicating
///
/// Groups are ordered by the first appearance of each emoji; reactions
/// inside a group keep their input order.
pub fn group_by_emoji(reactions: &[Reaction]) -> IndexMap<String, Vec<Reaction>> {
    let mut groups: IndexMap<String, Vec<Reaction>> = IndexMap::new();
    for reaction in reactions {
        groups
            .entry(reaction.emoji.clone())
            .or_default()
            .push(reaction.clone());
    }
    groups
}

/// Per-emoji counts of distinct users, flagging the viewer's own reactions
pub fn summarize(reactions: &[Reaction], viewer: Option<Snowflake>) -> Vec<ReactionCount> {
    group_by_emoji(&dedup_taps(reactions))
        .into_iter()
        .map(|(emoji, taps)| {
            let me = viewer.is_some_and(|v| taps.iter().any(|r| r.user_id == v));
            ReactionCount::new(emoji, taps.len(), me)
        })
        .collect()
}

/// Drop repeated taps of the same emoji by the same user, keeping the first
pub fn dedup_taps(reactions: &[Reaction]) -> Vec<Reaction> {
    let mut seen: HashSet<(Snowflake, &str)> = HashSet::new();
    reactions
        .iter()
        .filter(|r| seen.insert((r.user_id, r.emoji.as_str())))
        .cloned()
        .collect()
}
