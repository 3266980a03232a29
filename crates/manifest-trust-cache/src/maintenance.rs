// crates/manifest-trust-cache/src/maintenance.rs
// ============================================================================
// Module: Cache Maintenance
// Description: Background expiry sweeps, periodic warming, and shutdown.
// Purpose: Keep the cache bounded and warm without consumer involvement.
// Dependencies: tokio, manifest-trust-core, crate::cache
// ============================================================================

//! ## Overview
//! Background tasks hold a weak reference to the cache so that dropping the
//! last strong handle ends them. Each task waits on its interval or the
//! shutdown signal, whichever comes first. Shutdown joins the tasks within
//! the configured timeout and aborts any that overrun.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Weak;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::cache::ManifestCache;
use crate::cache::lock;

// ============================================================================
// SECTION: Handle
// ============================================================================

/// Running background tasks.
#[derive(Debug)]
pub(crate) struct MaintenanceHandle {
    /// Shutdown signal sender.
    shutdown: watch::Sender<bool>,
    /// Spawned task handles.
    tasks: Vec<JoinHandle<()>>,
}

/// Background task kinds.
#[derive(Debug, Clone, Copy)]
enum Task {
    /// Expired entry sweep.
    Sweep,
    /// Top-N warming.
    Warm,
}

// ============================================================================
// SECTION: Lifecycle
// ============================================================================

impl ManifestCache {
    /// Starts background maintenance. Returns false when already running or
    /// shut down.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(self: &Arc<Self>) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        let mut slot = lock(&self.maintenance);
        if slot.is_some() {
            return false;
        }
        let (shutdown, receiver) = watch::channel(false);
        let mut tasks = vec![spawn_task(
            Arc::downgrade(self),
            Task::Sweep,
            self.settings.cleanup_interval,
            receiver.clone(),
        )];
        if self.settings.background_warming {
            tasks.push(spawn_task(
                Arc::downgrade(self),
                Task::Warm,
                self.settings.warm_interval,
                receiver,
            ));
        }
        *slot = Some(MaintenanceHandle {
            shutdown,
            tasks,
        });
        true
    }

    /// Returns true while background maintenance is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        lock(&self.maintenance).is_some()
    }

    /// Stops background tasks and rejects further lookups.
    ///
    /// Tasks that do not finish within the shutdown timeout are aborted.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        let handle = lock(&self.maintenance).take();
        let Some(handle) = handle else {
            return;
        };
        handle.shutdown.send_replace(true);
        for task in handle.tasks {
            let abort = task.abort_handle();
            if tokio::time::timeout(self.settings.shutdown_timeout, task).await.is_err() {
                abort.abort();
            }
        }
    }
}

// ============================================================================
// SECTION: Tasks
// ============================================================================

/// Spawns one periodic maintenance task.
fn spawn_task(
    cache: Weak<ManifestCache>,
    task: Task,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return;
                    }
                    continue;
                }
            }
            let Some(cache) = cache.upgrade() else {
                return;
            };
            match task {
                Task::Sweep => {
                    cache.sweep_expired();
                }
                Task::Warm => {
                    cache.warm(None).await;
                }
            }
        }
    })
}
