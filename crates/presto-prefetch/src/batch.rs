//! Per-batch progress accounting.

use std::time::{Duration, Instant};

/// Minimum advance in percentage points before a report is considered.
const MIN_STEP: f64 = 1.0;
/// Advance that forces a report regardless of elapsed time.
const FORCED_STEP: f64 = 5.0;
/// Elapsed time that lets a small advance through.
const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Mutable progress state owned by a single batch run.
///
/// Tracks expected and transferred byte totals across all jobs of the
/// batch and decides which updates are worth reporting: an update is
/// emitted when the percentage advanced at least one point since the
/// last report and either jumped five points or a second has passed.
#[derive(Debug)]
pub struct BatchState {
    job_count: usize,
    bytes_max_count: usize,
    bytes_max: u64,
    bytes_transferred: u64,
    last_progress: f64,
    last_update: Instant,
}

impl BatchState {
    /// Create state for a batch of `job_count` jobs.
    #[must_use]
    pub fn new(job_count: usize) -> Self {
        Self {
            job_count,
            bytes_max_count: 0,
            bytes_max: 0,
            bytes_transferred: 0,
            last_progress: 0.0,
            last_update: Instant::now(),
        }
    }

    /// Record a newly known content length.
    pub fn content_length_known(&mut self, len: u64) {
        self.bytes_max_count += 1;
        self.bytes_max += len;
    }

    /// Record a transfer update; returns the percentage to report, if any.
    ///
    /// `bytes` is the cumulative count for one request. The overall
    /// percentage is scaled by the fraction of jobs whose size is known,
    /// so early estimates do not overshoot.
    pub fn transferred(&mut self, bytes: u64, total: Option<u64>, now: Instant) -> Option<u8> {
        let progress = if self.bytes_max > 0 {
            let known = self.bytes_max_count as f64 / self.job_count.max(1) as f64;
            known * 100.0 * (self.bytes_transferred + bytes) as f64 / self.bytes_max as f64
        } else {
            0.0
        };

        // Fold finished requests into the running total.
        if total == Some(bytes) {
            self.bytes_transferred += bytes;
        }

        let delta = progress - self.last_progress;
        if delta >= MIN_STEP
            && (delta >= FORCED_STEP || now.duration_since(self.last_update) >= MIN_INTERVAL)
        {
            self.last_progress = progress;
            self.last_update = now;
            return Some(progress.min(100.0) as u8);
        }

        None
    }
}
