//! Batch scheduler: bounded-concurrency fan-out over the transport.

use crate::batch::BatchState;
use crate::job::FetchJob;
use crate::reporter::{NullReporter, ProgressReporter};
use dashmap::DashMap;
use futures::StreamExt;
use parking_lot::Mutex;
use presto_core::Result;
use presto_transport::{Fetched, HttpClient, ProgressEvent};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, trace};

/// Default bound on simultaneous in-flight requests.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Outcome of one batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Jobs dispatched (always the full batch).
    pub dispatched: usize,
    /// Jobs that completed and were handed to the callback.
    pub succeeded: usize,
    /// Jobs dropped after a logged failure.
    pub dropped: usize,
}

/// Parallel prefetcher for provider files.
///
/// Jobs are dispatched in FIFO order with at most a fixed number in
/// flight at once; completions may interleave arbitrarily. Per-job
/// failures are logged and dropped here, retry policy belongs to the
/// metadata facade.
#[derive(Debug)]
pub struct Prefetcher {
    client: HttpClient,
    concurrency: usize,
    reporter: Arc<dyn ProgressReporter>,
    response_cache: DashMap<String, Fetched>,
    cache_next: AtomicBool,
    in_flight: AtomicUsize,
    in_flight_peak: AtomicUsize,
}

impl Prefetcher {
    /// Create a prefetcher with the default concurrency bound and a
    /// silent reporter.
    #[must_use]
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            concurrency: DEFAULT_CONCURRENCY,
            reporter: Arc::new(NullReporter),
            response_cache: DashMap::new(),
            cache_next: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            in_flight_peak: AtomicUsize::new(0),
        }
    }

    /// Set the bound on simultaneous requests (minimum 1).
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Set the progress reporter.
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Store the next fetched URL's response in the in-process cache.
    ///
    /// Single-shot: the flag is consumed by the next dispatched job.
    /// Later fetches of that URL are served from memory without network
    /// I/O, so metadata fetched once is never fetched again within this
    /// process.
    pub fn cache_next_response(&self) {
        self.cache_next.store(true, Ordering::SeqCst);
    }

    /// Highest number of requests observed in flight at once.
    #[must_use]
    pub fn in_flight_peak(&self) -> usize {
        self.in_flight_peak.load(Ordering::SeqCst)
    }

    /// Run a batch to completion.
    ///
    /// Every job is dispatched exactly once; the call returns only after
    /// all jobs reached a terminal state. `on_each` receives each
    /// successful completion, in completion (not dispatch) order.
    pub async fn run(
        &self,
        jobs: Vec<FetchJob>,
        on_each: impl Fn(FetchJob, Fetched),
    ) -> BatchSummary {
        let count = jobs.len();
        self.reporter.batch_started(count);

        let state = Mutex::new(BatchState::new(count));
        let mut summary = BatchSummary::default();

        {
            let mut completions = futures::stream::iter(jobs.into_iter().map(|job| {
                let state = &state;
                async move {
                    let result = self.fetch_job(&job, state).await;
                    (job, result)
                }
            }))
            .buffer_unordered(self.concurrency);

            while let Some((job, result)) = completions.next().await {
                summary.dispatched += 1;
                match result {
                    Ok(fetched) => {
                        summary.succeeded += 1;
                        on_each(job, fetched);
                    }
                    Err(e) => {
                        summary.dropped += 1;
                        debug!(url = %job.url, error = %e, "skipping download");
                    }
                }
            }
        }

        self.reporter.batch_finished();
        summary
    }

    async fn fetch_job(&self, job: &FetchJob, state: &Mutex<BatchState>) -> Result<Fetched> {
        let key = job.url.to_string();

        if let Some(cached) = self.response_cache.get(&key) {
            trace!(url = %job.url, "served from in-process cache");
            return Ok(cached.clone());
        }

        let cache_this = self.cache_next.swap(false, Ordering::SeqCst);

        self.enter_flight();
        let notify = |event: ProgressEvent| match event {
            ProgressEvent::ContentLength(len) => state.lock().content_length_known(len),
            ProgressEvent::Transferred { bytes, total } => {
                if let Some(pct) = state.lock().transferred(bytes, total, Instant::now()) {
                    self.reporter.progress(pct);
                }
            }
            _ => {}
        };

        let result = match &job.dest {
            Some(dest) => self.client.fetch_to_path(&job.url, &[], dest, notify).await,
            None => self.client.fetch(&job.url, &[], notify).await,
        };
        self.leave_flight();

        let fetched = result?;
        if cache_this {
            self.response_cache.insert(key, fetched.clone());
        }
        Ok(fetched)
    }

    fn enter_flight(&self) {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.in_flight_peak.fetch_max(current, Ordering::SeqCst);
    }

    fn leave_flight(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
