//! Readiness checking module for verifying files are no longer being written.
//!
//! A file is ready once two consecutive polls observe the same size and the
//! file can be opened for read-write access without truncation. Files that
//! never settle within the timeout are left for a later scan.

use std::path::Path;
use std::time::Duration;
use tokio::fs::{self, OpenOptions};
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// Outcome of comparing two consecutive size observations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SizeObservation {
    /// First time the file was seen.
    First { size: u64 },
    /// Size did not change since the previous poll.
    Unchanged { size: u64 },
    /// Size changed since the previous poll.
    Changed { previous: u64, current: u64 },
}

/// Compare the previous observation (if any) with the current size.
#[inline]
pub fn observe_size(previous: Option<u64>, current: u64) -> SizeObservation {
    match previous {
        None => SizeObservation::First { size: current },
        Some(prev) if prev == current => SizeObservation::Unchanged { size: current },
        Some(prev) => SizeObservation::Changed {
            previous: prev,
            current,
        },
    }
}

/// Whether no writer holds the file exclusively.
///
/// Opens read-write without truncation and closes again immediately.
pub async fn can_open_for_write(path: &Path) -> bool {
    OpenOptions::new()
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .await
        .is_ok()
}

/// Poll `path` until it is ready or `timeout` elapses.
///
/// A missing file counts as not yet ready and polling continues. Returns
/// `false` only after the full timeout has elapsed.
pub async fn wait_until_ready(path: &Path, timeout: Duration, poll_interval: Duration) -> bool {
    let started = Instant::now();
    let mut last_size: Option<u64> = None;

    while started.elapsed() < timeout {
        match fs::metadata(path).await {
            Ok(metadata) => {
                let observation = observe_size(last_size, metadata.len());
                if let SizeObservation::Unchanged { size } = observation {
                    if can_open_for_write(path).await {
                        debug!(path = %path.display(), size, "File is ready");
                        return true;
                    }
                    debug!(path = %path.display(), size, "File size stable but still locked");
                } else {
                    debug!(path = %path.display(), ?observation, "File still changing");
                }
                last_size = Some(metadata.len());
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "File not present yet");
            }
        }

        let remaining = timeout.saturating_sub(started.elapsed());
        sleep(poll_interval.min(remaining)).await;
    }

    warn!(path = %path.display(), timeout_secs = timeout.as_secs_f64(), "Timeout reached waiting for file");
    false
}
