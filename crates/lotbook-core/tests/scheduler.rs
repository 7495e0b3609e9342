//! Trigger-layer behavior: debounced reconnect drains and stat polling.

mod common;

use std::sync::Arc;
use std::time::Duration;

use lotbook_core::sync::SyncScheduler;
use lotbook_core::{StoreService, SyncEngine, SyncEvents, SyncPolicy};
use pretty_assertions::assert_eq;
use tokio::sync::watch;

use common::ScriptedRemote;

fn test_policy() -> SyncPolicy {
    SyncPolicy::default()
        .with_debounce(Duration::from_millis(20))
        .with_poll_interval(Duration::from_millis(40))
}

async fn pending_completion(store: &StoreService) {
    store
        .record_completion("L1", "C1", "completed", None, None)
        .await
        .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn reconnect_triggers_a_debounced_drain() {
    let remote = ScriptedRemote::new();
    let store = StoreService::open_in_memory().await.unwrap();
    pending_completion(&store).await;

    let engine = Arc::new(SyncEngine::new(
        store.clone(),
        remote.clone(),
        test_policy(),
        SyncEvents::new(),
    ));
    let (connectivity_tx, connectivity_rx) = watch::channel(false);
    let scheduler = SyncScheduler::spawn(engine.clone(), connectivity_rx, test_policy());

    // Still offline: nothing dispatched
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(remote.calls().is_empty());
    assert!(!engine.is_online());

    connectivity_tx.send(true).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(remote.calls(), vec!["completion L1/C1"]);
    assert!(store.pending_queue().await.unwrap().is_empty());

    scheduler.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn flap_back_offline_cancels_the_pending_drain() {
    let remote = ScriptedRemote::new();
    let store = StoreService::open_in_memory().await.unwrap();
    pending_completion(&store).await;

    let engine = Arc::new(SyncEngine::new(
        store.clone(),
        remote.clone(),
        test_policy(),
        SyncEvents::new(),
    ));
    let (connectivity_tx, connectivity_rx) = watch::channel(false);
    let scheduler = SyncScheduler::spawn(engine, connectivity_rx, test_policy());

    // Online then immediately back offline, inside the debounce window
    connectivity_tx.send(true).unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    connectivity_tx.send(false).unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(remote.calls().is_empty());
    assert_eq!(store.pending_queue().await.unwrap().len(), 1);

    scheduler.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn poll_tick_refreshes_displayed_counts_without_draining() {
    let remote = ScriptedRemote::new();
    let store = StoreService::open_in_memory().await.unwrap();

    let engine = Arc::new(SyncEngine::new(
        store.clone(),
        remote.clone(),
        test_policy(),
        SyncEvents::new(),
    ));
    let stats_rx = engine.subscribe_stats();
    // Offline the whole time: ticks must refresh counts, never drain
    let (_connectivity_tx, connectivity_rx) = watch::channel(false);
    let scheduler = SyncScheduler::spawn(engine, connectivity_rx, test_policy());

    pending_completion(&store).await;
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(stats_rx.borrow().pending, 1);
    assert!(remote.calls().is_empty());
    assert_eq!(store.pending_queue().await.unwrap().len(), 1);

    scheduler.shutdown().await;
}
