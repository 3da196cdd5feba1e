//! Response caching for Presto.
//!
//! Stores [`JsonResponse`] envelopes on disk, one directory per endpoint
//! and one file per request path. The cache is advisory: there is no file
//! locking, concurrent writers follow last-write-wins, and readers treat
//! any malformed entry as a miss.

#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]

use parking_lot::RwLock;
use presto_core::{Error, JsonResponse, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Cache statistics.
#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    /// Cache hits.
    pub hits: u64,
    /// Cache misses.
    pub misses: u64,
    /// Entries written.
    pub writes: u64,
}

/// On-disk cache of JSON response envelopes, keyed by request path.
#[derive(Debug)]
pub struct ResponseCache {
    root: PathBuf,
    stats: RwLock<CacheStats>,
}

impl ResponseCache {
    /// Create a cache rooted at `base/<sanitized endpoint>`.
    ///
    /// # Errors
    /// Returns error if the cache directory cannot be created.
    pub fn for_endpoint(base: impl Into<PathBuf>, endpoint: &str) -> Result<Self> {
        let root = base.into().join(sanitize_endpoint(endpoint));
        Self::at_path(root)
    }

    /// Create a cache at a specific directory.
    ///
    /// # Errors
    /// Returns error if the cache directory cannot be created.
    pub fn at_path(root: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&root).map_err(|e| Error::io(&root, e))?;
        Ok(Self {
            root,
            stats: RwLock::new(CacheStats::default()),
        })
    }

    /// Get the cache root path.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read the cached response for a request path.
    ///
    /// Returns `None` on a miss. A corrupt entry is removed and counted
    /// as a miss.
    #[must_use]
    pub fn read(&self, key: &str) -> Option<JsonResponse> {
        let path = self.entry_path(key);
        let Ok(data) = std::fs::read(&path) else {
            self.stats.write().misses += 1;
            return None;
        };

        match sonic_rs::from_slice::<JsonResponse>(&data) {
            Ok(response) => {
                self.stats.write().hits += 1;
                debug!(key, "cache hit");
                Some(response)
            }
            Err(e) => {
                warn!(key, error = %e, "discarding corrupt cache entry");
                let _ = std::fs::remove_file(&path);
                self.stats.write().misses += 1;
                None
            }
        }
    }

    /// Write a response envelope for a request path.
    ///
    /// The entry is written to a temp file and renamed into place, so
    /// readers never observe a partial entry.
    ///
    /// # Errors
    /// Returns error if the entry cannot be serialized or written.
    pub fn write(&self, key: &str, response: &JsonResponse) -> Result<()> {
        let path = self.entry_path(key);
        let data = sonic_rs::to_string(response).map_err(|e| Error::Cache(e.to_string()))?;

        let tmp = tempfile::NamedTempFile::new_in(&self.root)
            .map_err(|e| Error::io(&self.root, e))?;
        std::fs::write(tmp.path(), data).map_err(|e| Error::io(tmp.path(), e))?;
        tmp.persist(&path).map_err(|e| Error::io(&path, e.error))?;

        self.stats.write().writes += 1;
        debug!(key, "cached response");
        Ok(())
    }

    /// Remove a cached entry.
    ///
    /// # Errors
    /// Returns error if the entry exists but cannot be removed.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let path = self.entry_path(key);
        if path.exists() {
            std::fs::remove_file(&path).map_err(|e| Error::io(&path, e))?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Get cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats.read().clone()
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(sanitize_key(key))
    }
}

/// Reduce an endpoint URL to a directory name of `[a-z0-9.]`, everything
/// else collapsed to `-`.
#[must_use]
pub fn sanitize_endpoint(endpoint: &str) -> String {
    endpoint
        .to_ascii_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Turn a request path into a safe flat file name.
///
/// The leading slash is stripped; characters outside `[A-Za-z0-9_.-]`
/// become `-`.
#[must_use]
pub fn sanitize_key(key: &str) -> String {
    key.trim_start_matches('/')
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}
