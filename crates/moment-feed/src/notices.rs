//! User-facing notices
//!
//! Things worth telling the person looking at the feed (a failed refresh,
//! a dropped live connection) are pushed into a [`NoticeSink`] handed to the
//! engine. The default sink discards everything.

use std::sync::Arc;

use tokio::sync::broadcast;

/// A notice emitted by the feed engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedNotice {
    /// The initial load failed; the feed is back to idle
    FetchFailed { message: String, retryable: bool },
    /// A refresh failed; the previous feed is still shown
    RefreshFailed { message: String, retryable: bool },
    /// The live event subscription could not be opened
    SubscribeFailed { message: String },
    /// The live event subscription closed
    SubscriptionDropped,
    /// Moments with an invalid lifetime were skipped
    DegenerateSkipped { count: usize },
    /// Moments expired and left the feed
    Expired { count: usize },
}

impl FeedNotice {
    /// Whether the notice reports a failure
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::FetchFailed { .. }
                | Self::RefreshFailed { .. }
                | Self::SubscribeFailed { .. }
                | Self::SubscriptionDropped
        )
    }
}

/// Receiver of feed notices
pub trait NoticeSink: Send + Sync {
    fn notify(&self, notice: &FeedNotice);
}

/// Shared notice sink handle
pub type SharedNotices = Arc<dyn NoticeSink>;

/// Sink that drops every notice
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotices;

impl NoopNotices {
    #[must_use]
    pub fn shared() -> SharedNotices {
        Arc::new(Self)
    }
}

impl NoticeSink for NoopNotices {
    fn notify(&self, _notice: &FeedNotice) {}
}

/// Sink fanning notices out to any number of receivers
#[derive(Debug, Clone)]
pub struct ChannelNotices {
    tx: broadcast::Sender<FeedNotice>,
}

impl ChannelNotices {
    /// Create a sink buffering up to `buffer` notices per receiver
    pub fn new(buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self { tx }
    }

    /// Get a receiver for notices sent from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<FeedNotice> {
        self.tx.subscribe()
    }

    /// Erase the concrete type
    #[must_use]
    pub fn shared(&self) -> SharedNotices {
        Arc::new(self.clone())
    }
}

impl NoticeSink for ChannelNotices {
    fn notify(&self, notice: &FeedNotice) {
        // No receivers is fine, nobody is showing toasts
        let _ = self.tx.send(notice.clone());
    }
}
