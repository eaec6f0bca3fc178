//! Feed engine integration tests
//!
//! Drive a full engine against the scripted source. Wall-clock time comes
//! from a manual clock; timer-driven tests pause tokio time.
//!
//! Run with: cargo test -p integration-tests --test feed_tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use integration_tests::{
    at, degenerate_moment, feed_from_json, moment, reaction, test_config, TestFeed,
};
use moment_common::FeedConfig;
use moment_core::{Reaction, Snowflake};
use moment_feed::{reactions, FeedError, FeedEvent, FeedNotice, SourceError, SyncState};

fn ids(raw: &[i64]) -> Vec<Snowflake> {
    raw.iter().copied().map(Snowflake::new).collect()
}

// ============================================================================
// Loading
// ============================================================================

#[tokio::test]
async fn test_start_with_backend_payload() -> Result<()> {
    let feed = TestFeed::new();
    feed.source.push_items(feed_from_json()?);

    feed.engine.start().await?;

    let snapshot = feed.engine.snapshot().await;
    assert_eq!(snapshot.state, SyncState::Ready);
    assert_eq!(snapshot.ids(), ids(&[3, 2]));

    let views = feed.engine.views().await;
    assert_eq!(views[0].emojis, vec!["❤️", "✨"]);
    assert_eq!(views[0].reaction_count, 3);
    assert_eq!(views[0].level, 6);
    Ok(())
}

#[tokio::test]
async fn test_degenerate_items_are_skipped() -> Result<()> {
    let mut feed = TestFeed::new();
    feed.source
        .push_items(vec![moment(2, 20, 3600), degenerate_moment(1, 10)]);

    feed.engine.start().await?;

    assert_eq!(feed.engine.snapshot().await.ids(), ids(&[2]));
    assert_eq!(
        feed.next_notice().await?,
        FeedNotice::DegenerateSkipped { count: 1 }
    );
    Ok(())
}

#[tokio::test]
async fn test_failed_start_surfaces_error() -> Result<()> {
    let mut feed = TestFeed::new();
    feed.source
        .push_fetch(Err(SourceError::Unavailable("offline".to_string())));

    let err = feed.engine.start().await.unwrap_err();
    assert_eq!(
        err,
        FeedError::Fetch(SourceError::Unavailable("offline".to_string()))
    );
    assert_eq!(feed.engine.state(), SyncState::Idle);
    assert!(matches!(
        feed.next_notice().await?,
        FeedNotice::FetchFailed {
            retryable: true,
            ..
        }
    ));

    // Pull-to-refresh from idle retries the initial load
    feed.source.push_items(vec![moment(1, 0, 3600)]);
    feed.engine.refresh().await?;
    assert_eq!(feed.engine.state(), SyncState::Ready);
    assert_eq!(feed.source.fetch_calls(), 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_fetch_timeout_returns_to_idle() -> Result<()> {
    let mut feed = TestFeed::with_config(FeedConfig {
        fetch_timeout_ms: Some(500),
        ..test_config()
    });
    feed.source.push_hanging_fetch();

    let err = feed.engine.start().await.unwrap_err();
    assert_eq!(err, FeedError::Timeout(Duration::from_millis(500)));
    assert_eq!(feed.engine.state(), SyncState::Idle);
    assert!(matches!(
        feed.next_notice().await?,
        FeedNotice::FetchFailed { .. }
    ));
    Ok(())
}

// ============================================================================
// Refresh
// ============================================================================

#[tokio::test]
async fn test_refresh_preserves_late_arrivals() -> Result<()> {
    let feed = TestFeed::new();
    feed.source
        .push_items(vec![moment(2, 20, 3600), moment(1, 10, 3600)]);
    feed.engine.start().await?;
    feed.wait_subscribed().await?;

    feed.source.emit_moment(moment(3, 30, 3600)).await?;
    feed.wait_for(|s| s.contains(Snowflake::new(3))).await?;

    feed.source
        .push_items(vec![moment(2, 20, 3600), moment(1, 10, 3600)]);
    feed.engine.refresh().await?;

    let snapshot = feed.engine.snapshot().await;
    assert_eq!(snapshot.state, SyncState::Ready);
    assert_eq!(snapshot.ids(), ids(&[3, 2, 1]));
    Ok(())
}

#[tokio::test]
async fn test_events_during_refresh_survive_it() -> Result<()> {
    let feed = TestFeed::new();
    feed.source.push_items(vec![moment(1, 10, 3600)]);
    feed.engine.start().await?;
    feed.wait_subscribed().await?;

    let gate = feed.source.gate_fetch();
    let engine = feed.engine.clone();
    let refresh = tokio::spawn(async move { engine.refresh().await });
    feed.wait_for(|s| s.state == SyncState::Refreshing).await?;

    feed.source.emit_moment(moment(5, 50, 3600)).await?;
    let during = feed.wait_for(|s| s.contains(Snowflake::new(5))).await?;
    assert_eq!(during.state, SyncState::Refreshing);

    gate.resolve(vec![moment(1, 10, 3600)]);
    refresh.await??;

    let snapshot = feed.engine.snapshot().await;
    assert_eq!(snapshot.state, SyncState::Ready);
    assert_eq!(snapshot.ids(), ids(&[5, 1]));
    Ok(())
}

#[tokio::test]
async fn test_concurrent_refreshes_share_one_fetch() -> Result<()> {
    let feed = TestFeed::new();
    feed.source.push_items(vec![moment(1, 10, 3600)]);
    feed.engine.start().await?;

    let gate = feed.source.gate_fetch();
    let (first, second, ()) = tokio::join!(
        feed.engine.refresh(),
        feed.engine.refresh(),
        async {
            // Both refresh commands are queued ahead of this one
            let _ = feed.engine.snapshot().await;
            gate.resolve(vec![moment(2, 20, 3600), moment(1, 10, 3600)]);
        }
    );

    first?;
    second?;
    assert_eq!(feed.source.fetch_calls(), 2);
    assert_eq!(feed.engine.snapshot().await.ids(), ids(&[2, 1]));
    Ok(())
}

#[tokio::test]
async fn test_failed_refresh_keeps_snapshot() -> Result<()> {
    let mut feed = TestFeed::new();
    feed.source
        .push_items(vec![moment(2, 20, 3600), moment(1, 10, 3600)]);
    feed.engine.start().await?;
    let before = feed.engine.snapshot().await;

    feed.source
        .push_fetch(Err(SourceError::Backend("500".to_string())));
    let err = feed.engine.refresh().await.unwrap_err();
    assert!(err.is_fetch_failure());

    let after = feed.engine.snapshot().await;
    assert_eq!(after.state, SyncState::Ready);
    assert_eq!(after.ids(), before.ids());
    assert!(matches!(
        feed.next_notice().await?,
        FeedNotice::RefreshFailed {
            retryable: false,
            ..
        }
    ));
    Ok(())
}

#[tokio::test]
async fn test_start_while_ready_is_rejected() -> Result<()> {
    let feed = TestFeed::new();
    feed.source.push_items(Vec::new());
    feed.engine.start().await?;

    let err = feed.engine.start().await.unwrap_err();
    assert!(matches!(err, FeedError::InvalidTransition { .. }));
    assert_eq!(feed.engine.state(), SyncState::Ready);
    Ok(())
}

// ============================================================================
// Live events
// ============================================================================

#[tokio::test]
async fn test_duplicate_events_insert_once() -> Result<()> {
    let feed = TestFeed::new();
    feed.source.push_items(vec![moment(1, 10, 3600)]);
    feed.engine.start().await?;
    feed.wait_subscribed().await?;

    for _ in 0..3 {
        feed.source.emit_moment(moment(4, 40, 3600)).await?;
        feed.source.emit_moment(moment(1, 10, 3600)).await?;
    }
    feed.source.emit_moment(moment(9, 90, 3600)).await?;
    feed.wait_for(|s| s.contains(Snowflake::new(9))).await?;

    assert_eq!(feed.engine.snapshot().await.ids(), ids(&[9, 4, 1]));
    Ok(())
}

#[tokio::test]
async fn test_reactions_fold_into_display_set() -> Result<()> {
    let feed = TestFeed::new();
    feed.source.push_items(vec![moment(1, 10, 3600)]);
    feed.engine.start().await?;
    feed.wait_subscribed().await?;

    let heart = reaction(1, 7, "❤️");
    for event in [
        heart.clone(),
        reaction(1, 8, "✨"),
        heart,
        reaction(1, 9, "❤️"),
        reaction(1, 7, "🔥"),
        reaction(99, 7, "🔥"),
    ] {
        feed.source.emit(FeedEvent::ReactionAdded(event)).await?;
    }

    let snapshot = feed
        .wait_for(|s| s.get(Snowflake::new(1)).is_some_and(|m| m.reactions.len() == 4))
        .await?;
    let reacted = &snapshot.get(Snowflake::new(1)).unwrap().reactions;

    assert_eq!(
        reactions::unique_emojis(reacted, 4),
        vec!["❤️", "✨", "🔥"]
    );
    let summary = reactions::summarize(reacted, Some(Snowflake::new(7)));
    assert_eq!(summary[0].count, 2);
    assert!(summary[0].me);
    assert!(!summary[1].me);
    Ok(())
}

#[tokio::test]
async fn test_emoji_row_independent_of_delivery_order() -> Result<()> {
    let feed = TestFeed::new();
    feed.source.push_items(vec![moment(1, 10, 3600)]);
    feed.engine.start().await?;
    feed.wait_subscribed().await?;

    let first = Reaction::new(
        Snowflake::new(501),
        Snowflake::new(1),
        Snowflake::new(7),
        "A",
        at(11),
    );
    let second = Reaction::new(
        Snowflake::new(502),
        Snowflake::new(1),
        Snowflake::new(8),
        "B",
        at(12),
    );
    feed.source
        .emit(FeedEvent::ReactionAdded(second.clone()))
        .await?;
    feed.source
        .emit(FeedEvent::ReactionAdded(first.clone()))
        .await?;
    feed.wait_for(|s| s.get(Snowflake::new(1)).is_some_and(|m| m.reactions.len() == 2))
        .await?;

    let views = feed.engine.views().await;
    assert_eq!(views[0].emojis, vec!["A", "B"]);

    // Server copy carries the same reactions newest-first
    let mut fresh = moment(1, 10, 3600);
    fresh.reactions = vec![second, first];
    feed.source.push_items(vec![fresh]);
    feed.engine.refresh().await?;

    let views = feed.engine.views().await;
    assert_eq!(views[0].emojis, vec!["A", "B"]);
    Ok(())
}

#[tokio::test]
async fn test_subscription_drop_emits_notice_and_refresh_reopens() -> Result<()> {
    let mut feed = TestFeed::new();
    feed.source.push_items(vec![moment(1, 10, 3600)]);
    feed.engine.start().await?;
    feed.wait_subscribed().await?;

    feed.source.close_stream();
    let dropped = feed.wait_for(|s| !s.subscribed).await?;
    assert_eq!(dropped.state, SyncState::Ready);
    assert_eq!(feed.next_notice().await?, FeedNotice::SubscriptionDropped);

    feed.source.push_items(vec![moment(1, 10, 3600)]);
    feed.engine.refresh().await?;
    feed.wait_subscribed().await?;
    assert_eq!(feed.source.subscribe_calls(), 2);
    Ok(())
}

// ============================================================================
// Expiry
// ============================================================================

#[tokio::test]
async fn test_expired_moment_never_returns() -> Result<()> {
    let feed = TestFeed::new();
    feed.source.push_items(vec![moment(1, 0, 3600)]);
    feed.engine.start().await?;
    feed.wait_subscribed().await?;

    feed.clock.set(at(3650));
    assert_eq!(feed.engine.prune_now().await?, ids(&[1]));
    assert!(feed.engine.prune_now().await?.is_empty());

    // Replay it, then again after the clock drifts back before expiry
    feed.source.emit_moment(moment(1, 0, 3600)).await?;
    feed.clock.set(at(100));
    feed.source.emit_moment(moment(1, 0, 3600)).await?;
    feed.source.emit_moment(moment(2, 90, 3600)).await?;

    let snapshot = feed.wait_for(|s| s.contains(Snowflake::new(2))).await?;
    assert_eq!(snapshot.ids(), ids(&[2]));
    Ok(())
}

#[tokio::test]
async fn test_snapshot_prunes_before_returning() -> Result<()> {
    let feed = TestFeed::new();
    feed.source
        .push_items(vec![moment(2, 20, 60), moment(1, 10, 3600)]);
    feed.engine.start().await?;

    feed.clock.set(at(80));
    assert_eq!(feed.engine.snapshot().await.ids(), ids(&[1]));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_periodic_prune_removes_expired() -> Result<()> {
    let mut feed = TestFeed::with_config(FeedConfig {
        prune_interval_secs: 2,
        ..test_config()
    });
    feed.source
        .push_items(vec![moment(2, 20, 3600), moment(1, 10, 30)]);
    feed.engine.start().await?;

    feed.clock.set(at(45));
    let snapshot = feed.wait_for(|s| s.len() == 1).await?;
    assert_eq!(snapshot.ids(), ids(&[2]));

    let notice = tokio::time::timeout(Duration::from_secs(5), feed.notices.recv()).await??;
    assert_eq!(notice, FeedNotice::Expired { count: 1 });
    Ok(())
}

// ============================================================================
// Dispose
// ============================================================================

#[tokio::test]
async fn test_dispose_silences_callbacks_and_unsubscribes() -> Result<()> {
    let feed = TestFeed::new();
    feed.source.push_items(vec![moment(1, 10, 3600)]);

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    feed.engine
        .on_change(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await?;

    feed.engine.start().await?;
    feed.wait_subscribed().await?;
    assert!(calls.load(Ordering::SeqCst) > 0);

    feed.engine.dispose().await;
    let after_dispose = calls.load(Ordering::SeqCst);

    assert_eq!(feed.source.unsubscribed(), 1);
    assert!(feed.source.emit_moment(moment(2, 20, 3600)).await.is_err());
    feed.clock.set(at(7200));
    let _ = feed.engine.snapshot().await;
    assert_eq!(calls.load(Ordering::SeqCst), after_dispose);

    assert_eq!(feed.engine.state(), SyncState::Disposed);
    assert_eq!(feed.engine.refresh().await.unwrap_err(), FeedError::Disposed);
    feed.engine.dispose().await;
    Ok(())
}

#[tokio::test]
async fn test_dispose_during_fetch_fails_waiter() -> Result<()> {
    let feed = TestFeed::new();
    let _gate = feed.source.gate_fetch();

    let engine = feed.engine.clone();
    let start = tokio::spawn(async move { engine.start().await });
    feed.wait_for(|s| s.state == SyncState::Loading).await?;

    feed.engine.dispose().await;
    assert_eq!(start.await?.unwrap_err(), FeedError::Disposed);
    assert_eq!(feed.source.subscribe_calls(), 0);
    Ok(())
}
