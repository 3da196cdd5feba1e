//! Cache-aware metadata fetching for Presto.
//!
//! The [`Downloader`] facade sits on top of `presto-transport` and
//! `presto-cache`:
//!
//! - read-through response cache with `If-Modified-Since` revalidation,
//! - up to 3 attempts with a fixed 100 ms delay on transient failures
//!   (404s and parse errors abort immediately),
//! - degraded mode serving the last good cached body when the network
//!   stays down, warned once per instance,
//! - a `Package-Session` header correlating all requests of one process.
//!
//! The endpoint comes from `PRESTO_ENDPOINT` or a compiled-in default.

#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]

mod downloader;
mod endpoint;

pub use downloader::{Downloader, FetchOutcome};
pub use endpoint::{DEFAULT_ENDPOINT, ENDPOINT_ENV, Endpoint, session_token};
