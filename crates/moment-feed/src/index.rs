//! Dedup merge index
//!
//! The working set: moments keyed by id, kept in display order. Bulk loads
//! replace (or additively reload) the base order; single-item arrivals are
//! inserted at most once, at the front.
//!
//! Each moment's reactions are kept sorted by `(created_at, id)`, whatever
//! order they were delivered in.

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use moment_core::{DomainError, Moment, Reaction, Snowflake};

/// How an entry entered the working set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// Part of the most recent bulk load (or carried from an older one)
    Base,
    /// Delivered on the event stream and not yet seen in a bulk load
    Arrival,
}

#[derive(Debug, Clone)]
struct Entry {
    moment: Moment,
    origin: Origin,
}

/// Result of a single-item merge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// New id, placed at the front
    Inserted,
    /// Id already present; nothing changed
    Duplicate,
    /// Already past its expiry
    Expired,
    /// `expires_at <= created_at`, treated as expired
    Degenerate,
    /// Id was pruned earlier and may not come back
    Tombstoned,
}

impl MergeOutcome {
    /// Whether the working set changed
    #[inline]
    pub fn is_inserted(self) -> bool {
        matches!(self, Self::Inserted)
    }
}

/// Bookkeeping for one bulk load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Entries taken from the bulk result
    pub loaded: usize,
    /// Repeated ids inside the bulk result
    pub duplicates: usize,
    /// Degenerate moments that were skipped
    pub degenerate: Vec<Snowflake>,
    /// Ids skipped because they were pruned before
    pub tombstoned: usize,
    /// Earlier entries kept although absent from the bulk result
    pub carried: usize,
}

/// Bounded memory of pruned ids
#[derive(Debug, Clone)]
struct Tombstones {
    ids: HashSet<Snowflake>,
    order: VecDeque<Snowflake>,
    capacity: usize,
}

impl Tombstones {
    fn new(capacity: usize) -> Self {
        Self {
            ids: HashSet::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    fn insert(&mut self, id: Snowflake) {
        if self.capacity == 0 || !self.ids.insert(id) {
            return;
        }
        self.order.push_back(id);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
    }

    fn contains(&self, id: Snowflake) -> bool {
        self.ids.contains(&id)
    }
}

/// Ordered, id-keyed working set
#[derive(Debug, Clone)]
pub struct MergeIndex {
    entries: IndexMap<Snowflake, Entry>,
    tombstones: Tombstones,
    verify_order: bool,
}

impl MergeIndex {
    /// Create an empty index
    ///
    /// `verify_order` rejects bulk input that is not sorted newest-first;
    /// `tombstone_capacity` bounds how many pruned ids are remembered.
    pub fn new(verify_order: bool, tombstone_capacity: usize) -> Self {
        Self {
            entries: IndexMap::new(),
            tombstones: Tombstones::new(tombstone_capacity),
            verify_order,
        }
    }

    /// Replace the entire working set with `items`
    ///
    /// `items` must already be sorted by `created_at` descending. On an
    /// ordering error the index is left untouched.
    pub fn load_base(&mut self, items: Vec<Moment>) -> Result<LoadReport, DomainError> {
        let (entries, report) = self.build_base(items)?;
        self.entries = entries;
        Ok(report)
    }

    /// Load a fresh bulk result without dropping still-valid entries
    ///
    /// Entries absent from `items` survive unless expired at `now`. Those
    /// that arrived on the event stream stay in front in arrival order;
    /// leftovers from an older base are merged into the new base by
    /// creation time.
    pub fn reload_base(
        &mut self,
        items: Vec<Moment>,
        now: DateTime<Utc>,
    ) -> Result<LoadReport, DomainError> {
        let (mut base, mut report) = self.build_base(items)?;

        let mut arrivals = Vec::new();
        let mut stale = Vec::new();
        for (id, entry) in self.entries.drain(..) {
            if let Some(fresh) = base.get_mut(&id) {
                merge_reactions(&mut fresh.moment, entry.moment.reactions);
                continue;
            }
            if entry.moment.is_expired(now) {
                continue;
            }
            match entry.origin {
                Origin::Arrival => arrivals.push((id, entry)),
                Origin::Base => stale.push((id, entry)),
            }
        }
        report.carried = arrivals.len() + stale.len();

        let mut merged = IndexMap::with_capacity(arrivals.len() + base.len() + stale.len());
        merged.extend(arrivals);
        merged.extend(merge_by_recency(base.into_iter().collect(), stale));
        self.entries = merged;
        Ok(report)
    }

    /// Insert a single arrived moment at the front, at most once per id
    pub fn merge_incoming(&mut self, item: Moment, now: DateTime<Utc>) -> MergeOutcome {
        if item.is_degenerate() {
            return MergeOutcome::Degenerate;
        }
        if self.entries.contains_key(&item.id) {
            return MergeOutcome::Duplicate;
        }
        if self.tombstones.contains(item.id) {
            return MergeOutcome::Tombstoned;
        }
        if item.is_expired(now) {
            self.tombstones.insert(item.id);
            return MergeOutcome::Expired;
        }

        let entry = Entry {
            moment: with_sorted_reactions(item),
            origin: Origin::Arrival,
        };
        self.entries.shift_insert(0, entry.moment.id, entry);
        MergeOutcome::Inserted
    }

    /// Remove every entry with `expires_at <= now`, returning removed ids
    ///
    /// Removed ids are tombstoned so a late duplicate cannot bring them back.
    pub fn remove_expired(&mut self, now: DateTime<Utc>) -> Vec<Snowflake> {
        let mut removed = Vec::new();
        self.entries.retain(|id, entry| {
            if entry.moment.is_expired(now) {
                removed.push(*id);
                false
            } else {
                true
            }
        });
        for id in &removed {
            self.tombstones.insert(*id);
        }
        removed
    }

    /// Attach a reaction to its moment if present and not already attached
    pub fn append_reaction(&mut self, reaction: Reaction) -> bool {
        let Some(entry) = self.entries.get_mut(&reaction.moment_id) else {
            return false;
        };
        insert_reaction(&mut entry.moment.reactions, reaction)
    }

    /// Copy of the working set in display order
    pub fn snapshot(&self) -> Vec<Moment> {
        self.entries.values().map(|e| e.moment.clone()).collect()
    }

    /// Look up a moment by id
    pub fn get(&self, id: Snowflake) -> Option<&Moment> {
        self.entries.get(&id).map(|e| &e.moment)
    }

    /// Check if an id is in the working set
    pub fn contains(&self, id: Snowflake) -> bool {
        self.entries.contains_key(&id)
    }

    /// Ids in display order
    pub fn ids(&self) -> impl Iterator<Item = Snowflake> + '_ {
        self.entries.keys().copied()
    }

    /// Check if an id was pruned and is still remembered
    pub fn is_tombstoned(&self, id: Snowflake) -> bool {
        self.tombstones.contains(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn build_base(
        &self,
        items: Vec<Moment>,
    ) -> Result<(IndexMap<Snowflake, Entry>, LoadReport), DomainError> {
        if self.verify_order {
            verify_descending(&items)?;
        }

        let mut report = LoadReport::default();
        let mut entries = IndexMap::with_capacity(items.len());
        for moment in items {
            if moment.is_degenerate() {
                report.degenerate.push(moment.id);
                continue;
            }
            if self.tombstones.contains(moment.id) {
                report.tombstoned += 1;
                continue;
            }
            if entries.contains_key(&moment.id) {
                report.duplicates += 1;
                continue;
            }
            entries.insert(
                moment.id,
                Entry {
                    moment: with_sorted_reactions(moment),
                    origin: Origin::Base,
                },
            );
        }
        report.loaded = entries.len();
        Ok((entries, report))
    }
}

fn verify_descending(items: &[Moment]) -> Result<(), DomainError> {
    for (index, pair) in items.windows(2).enumerate() {
        if pair[1].created_at > pair[0].created_at {
            return Err(DomainError::InvalidOrder {
                index: index + 1,
                previous: pair[0].id,
                next: pair[1].id,
            });
        }
    }
    Ok(())
}

/// Merge two newest-first runs; on equal timestamps `base` goes first
fn merge_by_recency(
    base: Vec<(Snowflake, Entry)>,
    stale: Vec<(Snowflake, Entry)>,
) -> Vec<(Snowflake, Entry)> {
    let mut merged = Vec::with_capacity(base.len() + stale.len());
    let mut base = base.into_iter().peekable();
    let mut stale = stale.into_iter().peekable();

    loop {
        let take_stale = match (base.peek(), stale.peek()) {
            (Some((_, b)), Some((_, s))) => s.moment.created_at > b.moment.created_at,
            (None, Some(_)) => true,
            (Some(_), None) => false,
            (None, None) => break,
        };
        let next = if take_stale { stale.next() } else { base.next() };
        merged.extend(next);
    }
    merged
}

/// Keep locally appended reactions the fresh copy does not know about yet
fn merge_reactions(fresh: &mut Moment, local: Vec<Reaction>) {
    for reaction in local {
        insert_reaction(&mut fresh.reactions, reaction);
    }
}

fn reaction_key(reaction: &Reaction) -> (DateTime<Utc>, Snowflake) {
    (reaction.created_at, reaction.id)
}

fn with_sorted_reactions(mut moment: Moment) -> Moment {
    moment.reactions.sort_by_key(reaction_key);
    moment.reactions.dedup_by_key(|r| r.id);
    moment
}

/// Insert at the `(created_at, id)` position; false if the id is attached
fn insert_reaction(reactions: &mut Vec<Reaction>, reaction: Reaction) -> bool {
    if reactions.iter().any(|r| r.id == reaction.id) {
        return false;
    }
    let key = reaction_key(&reaction);
    let at = reactions.partition_point(|r| reaction_key(r) < key);
    reactions.insert(at, reaction);
    true
}
