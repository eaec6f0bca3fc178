//! Engine actor
//!
//! One task owns the working set. Handle commands, subscription events,
//! prune ticks and fetch completions all funnel through a single
//! `tokio::select!` loop, so every mutation is applied in order and no lock
//! guards the index. Bulk fetches and subscription opens run in spawned
//! tasks and are joined from the loop.

use std::fmt;
use std::future::pending;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moment_common::FeedConfig;
use moment_core::{Moment, SharedClock, Snowflake};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use super::error::{FeedError, FeedResult};
use super::state::{FeedSnapshot, SyncState};
use crate::index::{MergeIndex, MergeOutcome};
use crate::notices::{FeedNotice, SharedNotices};
use crate::pruner::ExpiryPruner;
use crate::source::{FeedEvent, FeedSource, SourceError, SourceResult, Subscription};

/// Callback invoked with every published snapshot
pub type ChangeListener = Box<dyn Fn(&FeedSnapshot) + Send + Sync + 'static>;

/// Handle for removing a registered change listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl ListenerId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Requests sent from the handle to the actor
pub(crate) enum Command {
    Start(oneshot::Sender<FeedResult<()>>),
    Refresh(oneshot::Sender<FeedResult<()>>),
    Snapshot(oneshot::Sender<FeedSnapshot>),
    Prune(oneshot::Sender<Vec<Snowflake>>),
    AddListener(ChangeListener, oneshot::Sender<ListenerId>),
    RemoveListener(ListenerId, oneshot::Sender<bool>),
    Dispose(oneshot::Sender<()>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchKind {
    Initial,
    Refresh,
}

/// The outstanding bulk fetch and everyone waiting on it
struct InFlight {
    kind: FetchKind,
    task: JoinHandle<FeedResult<Vec<Moment>>>,
    waiters: Vec<oneshot::Sender<FeedResult<()>>>,
}

pub(crate) struct FeedActor {
    source: Arc<dyn FeedSource>,
    clock: SharedClock,
    notices: SharedNotices,
    config: FeedConfig,
    index: MergeIndex,
    pruner: ExpiryPruner,
    state: SyncState,
    version: u64,
    commands: mpsc::Receiver<Command>,
    publisher: watch::Sender<FeedSnapshot>,
    listeners: Vec<(ListenerId, ChangeListener)>,
    in_flight: Option<InFlight>,
    pending_subscribe: Option<JoinHandle<SourceResult<Subscription>>>,
    subscription: Option<Subscription>,
    ticker: Option<Interval>,
}

impl FeedActor {
    pub(crate) fn new(
        source: Arc<dyn FeedSource>,
        clock: SharedClock,
        notices: SharedNotices,
        config: FeedConfig,
        commands: mpsc::Receiver<Command>,
        publisher: watch::Sender<FeedSnapshot>,
    ) -> Self {
        Self {
            index: MergeIndex::new(config.verify_base_order, config.tombstone_capacity),
            pruner: ExpiryPruner::new(),
            state: SyncState::Idle,
            version: 0,
            listeners: Vec::new(),
            in_flight: None,
            pending_subscribe: None,
            subscription: None,
            ticker: None,
            source,
            clock,
            notices,
            config,
            commands,
            publisher,
        }
    }

    /// Main loop; returns after dispose or once every handle is dropped
    pub(crate) async fn run(mut self) {
        self.ticker = self.config.prune_interval().map(|period| {
            let mut ticker = time::interval_at(time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        debug!(
            prune_interval_secs = self.config.prune_interval_secs,
            "Feed engine running"
        );

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        debug!("All engine handles dropped");
                        self.shutdown();
                        break;
                    };
                    if self.handle_command(command).is_break() {
                        break;
                    }
                }
                joined = join_task(self.in_flight.as_mut().map(|f| &mut f.task)) => {
                    self.finish_fetch(joined);
                }
                joined = join_task(self.pending_subscribe.as_mut()) => {
                    self.pending_subscribe = None;
                    self.finish_subscribe(joined);
                }
                event = next_event(self.subscription.as_mut()) => self.handle_event(event),
                () = next_tick(self.ticker.as_mut()) => self.handle_tick(),
            }
        }

        debug!("Feed engine loop exited");
    }

    fn handle_command(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::Start(reply) => {
                if self.state == SyncState::Idle {
                    self.begin_fetch(FetchKind::Initial, reply);
                } else {
                    let _ = reply.send(Err(FeedError::InvalidTransition {
                        state: self.state,
                        operation: "start",
                    }));
                }
            }
            Command::Refresh(reply) => match self.state {
                SyncState::Disposed => {
                    let _ = reply.send(Err(FeedError::Disposed));
                }
                state if state.is_fetching() => self.join_fetch(reply),
                state if state.has_data() => self.begin_fetch(FetchKind::Refresh, reply),
                _ => self.begin_fetch(FetchKind::Initial, reply),
            },
            Command::Snapshot(reply) => {
                let now = self.clock.now();
                self.prune_and_publish(now);
                let _ = reply.send(self.build_snapshot(now));
            }
            Command::Prune(reply) => {
                let removed = self.prune_and_publish(self.clock.now());
                let _ = reply.send(removed);
            }
            Command::AddListener(listener, reply) => {
                let id = ListenerId::generate();
                self.listeners.push((id, listener));
                debug!(listener_id = %id, "Change listener registered");
                let _ = reply.send(id);
            }
            Command::RemoveListener(id, reply) => {
                let before = self.listeners.len();
                self.listeners.retain(|(listener_id, _)| *listener_id != id);
                let _ = reply.send(self.listeners.len() != before);
            }
            Command::Dispose(ack) => {
                self.shutdown();
                let _ = ack.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn begin_fetch(&mut self, kind: FetchKind, reply: oneshot::Sender<FeedResult<()>>) {
        let source = Arc::clone(&self.source);
        let task = tokio::spawn(fetch_with_deadline(source, self.config.fetch_timeout()));

        self.in_flight = Some(InFlight {
            kind,
            task,
            waiters: vec![reply],
        });
        self.state = match kind {
            FetchKind::Initial => SyncState::Loading,
            FetchKind::Refresh => SyncState::Refreshing,
        };
        info!(state = %self.state, "Bulk fetch started");
        self.publish(self.clock.now());
    }

    fn join_fetch(&mut self, reply: oneshot::Sender<FeedResult<()>>) {
        match self.in_flight.as_mut() {
            Some(in_flight) => {
                debug!(waiters = in_flight.waiters.len() + 1, "Joined in-flight fetch");
                in_flight.waiters.push(reply);
            }
            None => {
                let _ = reply.send(Err(FeedError::InvalidTransition {
                    state: self.state,
                    operation: "refresh",
                }));
            }
        }
    }

    fn finish_fetch(&mut self, joined: Result<FeedResult<Vec<Moment>>, JoinError>) {
        let Some(in_flight) = self.in_flight.take() else {
            return;
        };
        let kind = in_flight.kind;
        let now = self.clock.now();

        let fetched = joined.unwrap_or_else(|e| {
            Err(FeedError::Fetch(SourceError::Backend(format!(
                "fetch task failed: {e}"
            ))))
        });
        let outcome = fetched.and_then(|items| self.apply_bulk(kind, items, now));

        match (&outcome, kind) {
            (Ok(()), _) => {
                self.state = SyncState::Ready;
                self.ensure_subscription();
            }
            (Err(e), FetchKind::Initial) => {
                warn!(error = %e, code = e.code(), "Initial load failed");
                self.state = SyncState::Idle;
                self.notify(&FeedNotice::FetchFailed {
                    message: e.to_string(),
                    retryable: e.is_transient(),
                });
            }
            (Err(e), FetchKind::Refresh) => {
                warn!(
                    error = %e,
                    code = e.code(),
                    "Refresh failed, keeping previous feed"
                );
                self.state = SyncState::Ready;
                self.notify(&FeedNotice::RefreshFailed {
                    message: e.to_string(),
                    retryable: e.is_transient(),
                });
            }
        }

        self.prune(now);
        self.publish(now);

        for waiter in in_flight.waiters {
            let _ = waiter.send(outcome.clone());
        }
    }

    fn apply_bulk(
        &mut self,
        kind: FetchKind,
        items: Vec<Moment>,
        now: DateTime<Utc>,
    ) -> FeedResult<()> {
        let fetched = items.len();
        let report = match kind {
            FetchKind::Initial => self.index.load_base(items),
            FetchKind::Refresh => self.index.reload_base(items, now),
        }
        .map_err(FeedError::InvalidOrder)?;

        if !report.degenerate.is_empty() {
            warn!(
                count = report.degenerate.len(),
                ids = ?report.degenerate,
                "Skipped moments with degenerate lifetime"
            );
            self.notify(&FeedNotice::DegenerateSkipped {
                count: report.degenerate.len(),
            });
        }

        info!(
            fetched,
            loaded = report.loaded,
            duplicates = report.duplicates,
            tombstoned = report.tombstoned,
            carried = report.carried,
            "Working set loaded"
        );
        Ok(())
    }

    fn ensure_subscription(&mut self) {
        if self.subscription.is_some() || self.pending_subscribe.is_some() {
            return;
        }
        let source = Arc::clone(&self.source);
        self.pending_subscribe = Some(tokio::spawn(async move { source.subscribe().await }));
    }

    fn finish_subscribe(&mut self, joined: Result<SourceResult<Subscription>, JoinError>) {
        let message = match joined {
            Ok(Ok(subscription)) => {
                self.subscription = Some(subscription);
                info!("Event subscription opened");
                self.publish(self.clock.now());
                return;
            }
            Ok(Err(e)) => e.to_string(),
            Err(e) => format!("subscribe task failed: {e}"),
        };
        warn!(error = %message, "Failed to open event subscription");
        self.notify(&FeedNotice::SubscribeFailed { message });
    }

    fn handle_event(&mut self, event: Option<FeedEvent>) {
        let now = self.clock.now();
        match event {
            Some(FeedEvent::MomentArrived(moment)) => {
                let moment_id = moment.id;
                match self.index.merge_incoming(moment, now) {
                    MergeOutcome::Inserted => {
                        debug!(moment_id = %moment_id, "Moment arrived");
                        self.prune(now);
                        self.publish(now);
                    }
                    MergeOutcome::Degenerate => {
                        warn!(moment_id = %moment_id, "Skipped arrived moment with degenerate lifetime");
                        self.notify(&FeedNotice::DegenerateSkipped { count: 1 });
                    }
                    outcome => {
                        trace!(moment_id = %moment_id, ?outcome, "Arrived moment ignored");
                    }
                }
            }
            Some(FeedEvent::ReactionAdded(reaction)) => {
                let moment_id = reaction.moment_id;
                let reaction_id = reaction.id;
                if self.index.append_reaction(reaction) {
                    debug!(moment_id = %moment_id, reaction_id = %reaction_id, "Reaction added");
                    self.prune(now);
                    self.publish(now);
                } else {
                    trace!(moment_id = %moment_id, reaction_id = %reaction_id, "Reaction ignored");
                }
            }
            None => {
                self.subscription = None;
                warn!("Event subscription dropped");
                self.notify(&FeedNotice::SubscriptionDropped);
                self.publish(now);
            }
        }
    }

    fn handle_tick(&mut self) {
        let now = self.clock.now();
        trace!(at = %now, "Prune tick");
        self.prune_and_publish(now);
    }

    fn prune(&mut self, now: DateTime<Utc>) -> Vec<Snowflake> {
        let removed = self.pruner.prune(&mut self.index, now);
        if !removed.is_empty() {
            self.notify(&FeedNotice::Expired {
                count: removed.len(),
            });
        }
        removed
    }

    fn prune_and_publish(&mut self, now: DateTime<Utc>) -> Vec<Snowflake> {
        let removed = self.prune(now);
        if !removed.is_empty() {
            self.publish(now);
        }
        removed
    }

    fn build_snapshot(&self, now: DateTime<Utc>) -> FeedSnapshot {
        FeedSnapshot {
            moments: Arc::from(self.index.snapshot()),
            state: self.state,
            subscribed: self.subscription.is_some(),
            version: self.version,
            taken_at: now,
        }
    }

    fn publish(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        let snapshot = self.build_snapshot(now);
        self.publisher.send_replace(snapshot.clone());
        for (_, listener) in &self.listeners {
            listener(&snapshot);
        }
    }

    fn notify(&self, notice: &FeedNotice) {
        self.notices.notify(notice);
    }

    fn shutdown(&mut self) {
        self.state = SyncState::Disposed;
        self.listeners.clear();

        if let Some(in_flight) = self.in_flight.take() {
            in_flight.task.abort();
            for waiter in in_flight.waiters {
                let _ = waiter.send(Err(FeedError::Disposed));
            }
        }
        if let Some(task) = self.pending_subscribe.take() {
            task.abort();
        }
        self.subscription = None;
        self.ticker = None;

        let stats = self.pruner.stats();
        self.version += 1;
        self.publisher
            .send_replace(self.build_snapshot(self.clock.now()));
        info!(
            prune_runs = stats.runs,
            pruned_total = stats.removed_total,
            "Feed engine disposed"
        );
    }
}

async fn fetch_with_deadline(
    source: Arc<dyn FeedSource>,
    deadline: Option<Duration>,
) -> FeedResult<Vec<Moment>> {
    let fetch = source.fetch_all();
    let fetched = match deadline {
        Some(limit) => time::timeout(limit, fetch)
            .await
            .map_err(|_| FeedError::Timeout(limit))?,
        None => fetch.await,
    };
    fetched.map_err(FeedError::from)
}

async fn join_task<T>(task: Option<&mut JoinHandle<T>>) -> Result<T, JoinError> {
    match task {
        Some(task) => task.await,
        None => pending().await,
    }
}

async fn next_event(subscription: Option<&mut Subscription>) -> Option<FeedEvent> {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => pending().await,
    }
}

async fn next_tick(ticker: Option<&mut Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => pending().await,
    }
}
