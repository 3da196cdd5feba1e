//! JSON response value type shared by the fetch layers.

use serde::{Deserialize, Serialize};
use sonic_rs::JsonValueTrait;
use std::collections::BTreeMap;

/// Parsed JSON body plus response headers and HTTP status code.
///
/// Immutable value object handed back to callers and persisted verbatim
/// as the on-disk cache envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonResponse {
    body: sonic_rs::Value,
    headers: BTreeMap<String, String>,
    status: u16,
}

impl JsonResponse {
    /// Create a response from a decoded body.
    #[must_use]
    pub fn new(body: sonic_rs::Value, headers: BTreeMap<String, String>, status: u16) -> Self {
        Self {
            body,
            headers,
            status,
        }
    }

    /// Empty response returned when fetching is disabled.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            body: sonic_rs::Value::default(),
            headers: BTreeMap::new(),
            status: 200,
        }
    }

    /// Build the header map from raw `Name: value` lines.
    ///
    /// Names are lowercased; for repeated headers the last occurrence wins.
    #[must_use]
    pub fn headers_from_lines<S: AsRef<str>>(lines: &[S]) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        for line in lines {
            if let Some((name, value)) = line.as_ref().split_once(':') {
                headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
            }
        }
        headers
    }

    /// Decoded JSON body.
    #[must_use]
    pub const fn body(&self) -> &sonic_rs::Value {
        &self.body
    }

    /// Response headers, keyed by lowercased name.
    #[must_use]
    pub const fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Look up a header by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// The `last-modified` header, when present.
    #[must_use]
    pub fn last_modified(&self) -> Option<&str> {
        self.header("last-modified")
    }

    /// True when the body carries no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.body.is_null()
    }

    /// Replace the headers and status, keeping the body.
    ///
    /// Used when a conditional request returns 304 and the cached body is
    /// re-served under the fresh headers.
    #[must_use]
    pub fn with_headers(self, headers: BTreeMap<String, String>, status: u16) -> Self {
        Self {
            body: self.body,
            headers,
            status,
        }
    }
}
