//! Feed synchronization engine
//!
//! [`FeedSyncEngine`] is a cheap, cloneable handle to a background actor
//! that owns the working set. The lifecycle runs
//! `Idle -> Loading -> Ready <-> Refreshing`, ending in `Disposed`.
//!
//! ```ignore
//! let engine = FeedSyncEngine::builder(source)
//!     .config(FeedConfig::from_env()?)
//!     .notices(toasts.shared())
//!     .spawn();
//!
//! engine.start().await?;
//! let snapshot = engine.snapshot().await;
//! ```

mod actor;
mod error;
mod state;

pub use actor::{ChangeListener, ListenerId};
pub use error::{FeedError, FeedResult};
pub use state::{FeedSnapshot, SyncState};

use std::sync::Arc;

use moment_common::FeedConfig;
use moment_core::{SharedClock, Snowflake, SystemClock};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::instrument;

use crate::notices::{NoopNotices, SharedNotices};
use crate::source::FeedSource;
use crate::view::{build_views, MomentView};
use actor::{Command, FeedActor};

/// Builder for [`FeedSyncEngine`]
pub struct FeedSyncEngineBuilder {
    source: Arc<dyn FeedSource>,
    config: FeedConfig,
    clock: SharedClock,
    notices: SharedNotices,
}

impl FeedSyncEngineBuilder {
    pub fn config(mut self, config: FeedConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn notices(mut self, notices: SharedNotices) -> Self {
        self.notices = notices;
        self
    }

    /// Spawn the engine actor on the current tokio runtime
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn spawn(self) -> FeedSyncEngine {
        let (command_tx, command_rx) = mpsc::channel(self.config.command_buffer.max(1));
        let (snapshot_tx, snapshot_rx) = watch::channel(FeedSnapshot::initial(self.clock.now()));

        let engine = FeedSyncEngine {
            commands: command_tx,
            snapshots: snapshot_rx,
            clock: Arc::clone(&self.clock),
            progress_levels: self.config.progress_levels,
            reaction_display_cap: self.config.reaction_display_cap,
        };

        let actor = FeedActor::new(
            self.source,
            self.clock,
            self.notices,
            self.config,
            command_rx,
            snapshot_tx,
        );
        tokio::spawn(actor.run());

        engine
    }
}

/// Handle to a running feed engine
#[derive(Clone)]
pub struct FeedSyncEngine {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<FeedSnapshot>,
    clock: SharedClock,
    progress_levels: u32,
    reaction_display_cap: usize,
}

impl FeedSyncEngine {
    /// Start building an engine around `source`
    ///
    /// Defaults: [`FeedConfig::default`], the system clock, no notices.
    pub fn builder(source: Arc<dyn FeedSource>) -> FeedSyncEngineBuilder {
        FeedSyncEngineBuilder {
            source,
            config: FeedConfig::default(),
            clock: SystemClock::shared(),
            notices: NoopNotices::shared(),
        }
    }

    /// Spawn an engine with the given config and default collaborators
    pub fn spawn(source: Arc<dyn FeedSource>, config: FeedConfig) -> Self {
        Self::builder(source).config(config).spawn()
    }

    /// Run the initial bulk fetch and go live
    ///
    /// Resolves once the fetch has been applied (`Ready`) or has failed
    /// (back to `Idle`). Only valid from `Idle`.
    #[instrument(skip(self))]
    pub async fn start(&self) -> FeedResult<()> {
        self.request(Command::Start).await?
    }

    /// Re-fetch the base collection without losing live arrivals
    ///
    /// From `Idle` this behaves like [`start`](Self::start); while a fetch
    /// is outstanding the call joins it.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> FeedResult<()> {
        self.request(Command::Refresh).await?
    }

    /// Close the subscription, stop pruning and silence every listener
    ///
    /// No change callback fires after this returns. Calling it again is a
    /// no-op.
    #[instrument(skip(self))]
    pub async fn dispose(&self) {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Dispose(tx)).await.is_ok() {
            let _ = rx.await;
        }
    }

    /// Prune, then return the current working set
    ///
    /// After dispose this returns the final published snapshot.
    pub async fn snapshot(&self) -> FeedSnapshot {
        match self.request(Command::Snapshot).await {
            Ok(snapshot) => snapshot,
            Err(_) => self.current(),
        }
    }

    /// Prune now, returning the removed ids
    pub async fn prune_now(&self) -> FeedResult<Vec<Snowflake>> {
        self.request(Command::Prune).await
    }

    /// Last published snapshot, without pruning
    pub fn current(&self) -> FeedSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Last published lifecycle state
    pub fn state(&self) -> SyncState {
        self.snapshots.borrow().state
    }

    /// Receiver that observes every published snapshot
    pub fn watch(&self) -> watch::Receiver<FeedSnapshot> {
        self.snapshots.clone()
    }

    /// Register a callback invoked after every published change
    pub async fn on_change<F>(&self, listener: F) -> FeedResult<ListenerId>
    where
        F: Fn(&FeedSnapshot) + Send + Sync + 'static,
    {
        let listener: ChangeListener = Box::new(listener);
        self.request(|tx| Command::AddListener(listener, tx)).await
    }

    /// Unregister a callback, returning whether it was registered
    pub async fn remove_listener(&self, id: ListenerId) -> FeedResult<bool> {
        self.request(|tx| Command::RemoveListener(id, tx)).await
    }

    /// Display data for the current working set
    pub async fn views(&self) -> Vec<MomentView> {
        let snapshot = self.snapshot().await;
        build_views(
            &snapshot.moments,
            self.clock.now(),
            self.progress_levels,
            self.reaction_display_cap,
        )
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> FeedResult<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .await
            .map_err(|_| self.closed_error())?;
        rx.await.map_err(|_| self.closed_error())
    }

    fn closed_error(&self) -> FeedError {
        if self.state() == SyncState::Disposed {
            FeedError::Disposed
        } else {
            FeedError::EngineStopped
        }
    }
}

impl std::fmt::Debug for FeedSyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedSyncEngine")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
