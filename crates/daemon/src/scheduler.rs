//! Fixed-period scan scheduler
//!
//! Runs a task on a fixed period without ever overlapping two runs: each run
//! is awaited before the next tick is taken, and ticks missed while a run
//! was in progress are delayed rather than replayed.

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// Stops a running scheduler. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    stop_tx: watch::Sender<bool>,
}

impl SchedulerHandle {
    /// Ask the scheduler to exit. A run in progress completes first.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }
}

/// Single-flight periodic runner.
#[derive(Debug)]
pub struct Scheduler {
    period: Duration,
    stop_tx: watch::Sender<bool>,
}

impl Scheduler {
    /// `period` must be non-zero.
    pub fn new(period: Duration) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self { period, stop_tx }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            stop_tx: self.stop_tx.clone(),
        }
    }

    /// Run `task` now and then once per period until stopped.
    ///
    /// Returns the number of completed runs.
    pub async fn run<F, Fut>(&self, mut task: F) -> u64
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut stop_rx = self.stop_tx.subscribe();
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(period_secs = self.period.as_secs_f64(), "Scheduler started");

        let mut runs = 0u64;
        loop {
            if *stop_rx.borrow_and_update() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    debug!(run = runs + 1, "Scheduled run starting");
                    task().await;
                    runs += 1;
                }
                changed = stop_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(runs, "Scheduler stopped");
        runs
    }
}
