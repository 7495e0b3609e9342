//! Trigger layer: decides when the engine should drain.
//!
//! Drains on debounced offline-to-online transitions; the periodic tick
//! only refreshes displayed counts and never forces a drain. An in-flight
//! drain is never cancelled; overlapping triggers are absorbed by the
//! engine's single-flight guard.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::SyncPolicy;
use crate::remote::RemoteApi;
use crate::sync::SyncEngine;

/// Background task driving a [`SyncEngine`] from connectivity transitions
/// and a polling interval.
pub struct SyncScheduler {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SyncScheduler {
    /// Spawn the scheduler. `connectivity` carries the platform's current
    /// online belief; the sender side lives with whatever probes the
    /// network.
    pub fn spawn<R>(
        engine: Arc<SyncEngine<R>>,
        connectivity: watch::Receiver<bool>,
        policy: SyncPolicy,
    ) -> Self
    where
        R: RemoteApi + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run(engine, connectivity, policy, shutdown_rx));
        Self {
            shutdown_tx,
            handle,
        }
    }

    /// Stop the scheduler and wait for the task to wind down.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.handle.await;
    }
}

async fn run<R>(
    engine: Arc<SyncEngine<R>>,
    mut connectivity: watch::Receiver<bool>,
    policy: SyncPolicy,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    R: RemoteApi,
{
    engine.set_online(*connectivity.borrow());

    let mut poll = tokio::time::interval(policy.poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            changed = connectivity.changed() => {
                if changed.is_err() {
                    // Connectivity source dropped; nothing left to react to
                    break;
                }
                let online = *connectivity.borrow_and_update();
                engine.set_online(online);
                if !online {
                    tracing::info!("connectivity lost; queueing mutations locally");
                    continue;
                }

                // Debounce so a flapping connection fires one drain, not one
                // per flap; re-check before committing to it
                tokio::time::sleep(policy.debounce).await;
                if !*connectivity.borrow() {
                    continue;
                }
                tracing::info!("back online; draining mutation queue");
                if let Err(error) = engine.drain().await {
                    tracing::warn!("scheduled drain failed: {error}");
                }
            }
            _ = poll.tick() => {
                if let Err(error) = engine.refresh_stats().await {
                    tracing::warn!("stats refresh failed: {error}");
                }
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
}
