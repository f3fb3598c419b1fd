//! Periodic reconciliation scheduler.
//!
//! Drives the reconciler from a single timer so cycles run strictly
//! sequentially: an overrunning cycle delays the next tick rather than
//! overlapping with it. Supports manual trigger via broadcast channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::info;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use crate::reconciler::Reconciler;

/// Periodic cycle scheduler.
pub struct Scheduler {
    reconciler: Arc<Reconciler>,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
}

impl Scheduler {
    /// Creates a scheduler running one cycle every `interval`.
    pub fn new(reconciler: Arc<Reconciler>, interval: Duration) -> Self {
        Self {
            reconciler,
            interval,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Runs the loop until [`stop`](Self::stop) is called.
    ///
    /// One cycle runs immediately before the periodic loop so the node
    /// is not left stale for a full interval after (re)start. A manual
    /// trigger on `trigger_rx` wakes the loop for an immediate cycle.
    pub async fn run(&self, mut trigger_rx: broadcast::Receiver<()>) {
        let report = self.reconciler.cycle().await;
        info!("Initial cycle complete (reload_ok: {})", report.reload_ok);

        let mut interval_timer = tokio::time::interval(self.interval);
        interval_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval_timer.tick().await; // skip immediate first tick

        loop {
            if self.shutdown.load(Ordering::Acquire) {
                break;
            }

            tokio::select! {
                _ = interval_timer.tick() => {},
                Ok(()) = trigger_rx.recv() => {
                    info!("Manual sync triggered");
                },
            }

            if self.shutdown.load(Ordering::Acquire) {
                break;
            }

            let report = self.reconciler.cycle().await;
            if let Some(sync) = &report.sync {
                if sync.changed {
                    info!("Cycle pulled new config (reload_ok: {})", report.reload_ok);
                }
            }
        }

        info!("Scheduler stopped");
    }

    /// Signals the scheduler to stop. The loop exits after the cycle
    /// in flight (if any) completes; send a trigger to wake it.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
    }
}
