//! JSON helpers over sonic-rs with error context.

use crate::{Error, Result};
use serde::{Serialize, de::DeserializeOwned};

/// Deserialize JSON bytes, attributing failures to `source`.
///
/// # Errors
/// Returns [`Error::Parse`] if the JSON is invalid.
pub fn from_json_slice<T: DeserializeOwned>(bytes: &[u8], source: &str) -> Result<T> {
    sonic_rs::from_slice(bytes).map_err(|e| Error::Parse {
        url: source.to_string(),
        message: e.to_string(),
    })
}

/// Serialize to compact JSON.
///
/// # Errors
/// Returns [`Error::Parse`] if serialization fails.
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    sonic_rs::to_string(value).map_err(|e| Error::Parse {
        url: String::new(),
        message: e.to_string(),
    })
}
