//! Parallel provider-file prefetching for Presto.
//!
//! The scheduler fans a queue of [`FetchJob`]s out over the transport
//! with a bounded number of requests in flight, accounts batch-wide
//! byte progress, and keeps an in-process URL response cache with a
//! single-shot "cache the next response" override.
//!
//! Per-job failures are logged and dropped here; retries and stale-cache
//! fallback live in the `presto-metadata` facade.

#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]

mod batch;
mod job;
mod prefetcher;
mod reporter;

pub use batch::BatchState;
pub use job::FetchJob;
pub use prefetcher::{BatchSummary, DEFAULT_CONCURRENCY, Prefetcher};
pub use reporter::{ConsoleReporter, NullReporter, ProgressReporter};
