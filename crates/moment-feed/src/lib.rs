//! # moment-feed
//!
//! Synchronization and expiry core for the ephemeral moment feed.
//!
//! - [`projector`] - lifetime to discrete progress level
//! - [`reactions`] - emoji display set, grouping and counts
//! - [`index`] - ordered working set with dedup merge
//! - [`pruner`] - expiry pruning
//! - [`source`] - backend collaborator port
//! - [`notices`] - user-facing notice sink
//! - [`view`] - per-moment display data
//! - [`engine`] - lifecycle state machine and serialized update loop

pub mod engine;
pub mod index;
pub mod notices;
pub mod projector;
pub mod pruner;
pub mod reactions;
pub mod source;
pub mod view;

// Re-export commonly used types at crate root
pub use engine::{
    ChangeListener, FeedError, FeedResult, FeedSnapshot, FeedSyncEngine, FeedSyncEngineBuilder,
    ListenerId, SyncState,
};
pub use index::{LoadReport, MergeIndex, MergeOutcome};
pub use notices::{ChannelNotices, FeedNotice, NoopNotices, NoticeSink, SharedNotices};
pub use pruner::{ExpiryPruner, PruneStats};
pub use source::{FeedEvent, FeedSource, SourceError, SourceResult, Subscription};
pub use view::{build_views, MomentView};
