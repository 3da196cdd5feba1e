//! Core types for the Presto prefetch engine.
//!
//! Shared by every other Presto crate:
//!
//! - [`Error`] / [`Result`]: the error taxonomy (not-found, transport,
//!   parse, io, cache, config).
//! - [`JsonResponse`]: parsed body + headers + status, also used as the
//!   on-disk cache envelope.
//! - [`json`]: thin sonic-rs wrappers that attribute parse failures to
//!   their source URL.

#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]

mod error;
pub mod json;
mod response;

pub use error::{Error, Result};
pub use response::JsonResponse;
