//! Single-request HTTP executor for Presto.
//!
//! Issues one HTTP(S) request at a time over a shared multiplexed
//! connection pool, reporting per-request progress through
//! [`ProgressEvent`] checkpoints. File downloads stream to a
//! `.partial` temp file that is renamed into place only on success.

#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]

mod client;
mod config;
mod progress;

pub use client::{Fetched, HttpClient};
pub use config::TransportConfig;
pub use progress::ProgressEvent;
