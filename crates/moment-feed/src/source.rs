//! Feed source port
//!
//! The backend collaborator the engine pulls from: a one-shot bulk fetch
//! and a long-lived event subscription. Implementations live outside this
//! crate (managed backend client, test doubles).

use std::fmt;

use async_trait::async_trait;
use moment_core::{Moment, Reaction};
use tokio::sync::mpsc;

/// Error type for source operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Channel closed")]
    Closed,
}

impl SourceError {
    /// Whether a later retry might succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Closed)
    }
}

/// Result type for source operations
pub type SourceResult<T> = Result<T, SourceError>;

/// Event delivered on a subscription
///
/// Delivery is unordered and may repeat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    MomentArrived(Moment),
    ReactionAdded(Reaction),
}

/// An open event channel plus its disposer
///
/// Dropping the subscription runs the disposer, so unsubscribing happens
/// synchronously when the owner lets go of it.
pub struct Subscription {
    events: mpsc::Receiver<FeedEvent>,
    on_close: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wrap a receiver with no disposer
    pub fn new(events: mpsc::Receiver<FeedEvent>) -> Self {
        Self {
            events,
            on_close: None,
        }
    }

    /// Create a bounded channel and the subscription reading from it
    pub fn channel(buffer: usize) -> (mpsc::Sender<FeedEvent>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self::new(rx))
    }

    /// Run `f` when the subscription is dropped
    #[must_use]
    pub fn on_close(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_close = Some(Box::new(f));
        self
    }

    /// Receive the next event, `None` once the channel has closed
    pub async fn recv(&mut self) -> Option<FeedEvent> {
        self.events.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.events.close();
        if let Some(on_close) = self.on_close.take() {
            on_close();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("has_disposer", &self.on_close.is_some())
            .finish_non_exhaustive()
    }
}

/// Backend collaborator for the feed
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch every currently valid moment, newest first
    async fn fetch_all(&self) -> SourceResult<Vec<Moment>>;

    /// Open the event subscription
    async fn subscribe(&self) -> SourceResult<Subscription>;
}
