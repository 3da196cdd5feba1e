//! Metadata endpoint configuration.

use presto_core::{Error, Result};
use url::Url;

/// Compiled-in default metadata endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://automatic.prestopm.dev";

/// Environment variable overriding the endpoint URL.
pub const ENDPOINT_ENV: &str = "PRESTO_ENDPOINT";

/// A metadata endpoint base URL.
#[derive(Debug, Clone)]
pub struct Endpoint {
    base: Url,
}

impl Endpoint {
    /// Create an endpoint from a URL string.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the URL is invalid.
    pub fn new(url: &str) -> Result<Self> {
        let base = Url::parse(url.trim_end_matches('/'))
            .map_err(|e| Error::Config(format!("invalid endpoint url '{url}': {e}")))?;
        Ok(Self { base })
    }

    /// Resolve the endpoint from the environment, falling back to the
    /// compiled-in default.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the configured URL is invalid.
    pub fn from_env() -> Result<Self> {
        Self::new(&resolve(std::env::var(ENDPOINT_ENV).ok()))
    }

    /// The endpoint base URL as a string, without a trailing slash.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }

    /// Join a request path onto the endpoint.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the combined URL is invalid.
    pub fn join(&self, path: &str) -> Result<Url> {
        let full = format!("{}/{}", self.as_str(), path.trim_start_matches('/'));
        Url::parse(&full).map_err(|e| Error::Config(format!("invalid request url '{full}': {e}")))
    }
}

fn resolve(env_value: Option<String>) -> String {
    match env_value {
        Some(value) if !value.trim().is_empty() => value,
        _ => DEFAULT_ENDPOINT.to_string(),
    }
}

/// Generate the per-process session token: 16 random bytes as hex.
#[must_use]
pub fn session_token() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_prefers_override() {
        assert_eq!(
            resolve(Some("https://mirror.example.com".into())),
            "https://mirror.example.com"
        );
        assert_eq!(resolve(None), DEFAULT_ENDPOINT);
        assert_eq!(resolve(Some(String::new())), DEFAULT_ENDPOINT);
    }

    #[test]
    fn join_normalizes_slashes() {
        let endpoint = Endpoint::new("https://repo.example.com/api/").unwrap();
        let url = endpoint.join("/versions.json").unwrap();
        assert_eq!(url.as_str(), "https://repo.example.com/api/versions.json");
    }

    #[test]
    fn session_token_is_32_hex_chars() {
        let token = session_token();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, session_token());
    }
}
