//! Batch fetch jobs.

use std::path::PathBuf;
use url::Url;

/// One unit of prefetch work.
///
/// Created by the caller, dispatched exactly once, discarded after it
/// reaches a terminal state.
#[derive(Debug, Clone)]
pub struct FetchJob {
    /// Origin host the file belongs to.
    pub origin: String,
    /// File URL to fetch.
    pub url: Url,
    /// Local destination; `None` fetches into memory.
    pub dest: Option<PathBuf>,
    /// Opaque caller tag correlating completions with requests.
    pub tag: u64,
}

impl FetchJob {
    /// Create an in-memory fetch job.
    #[must_use]
    pub fn new(origin: impl Into<String>, url: Url) -> Self {
        Self {
            origin: origin.into(),
            url,
            dest: None,
            tag: 0,
        }
    }

    /// Set a local destination path.
    #[must_use]
    pub fn with_dest(mut self, dest: impl Into<PathBuf>) -> Self {
        self.dest = Some(dest.into());
        self
    }

    /// Set the caller tag.
    #[must_use]
    pub const fn with_tag(mut self, tag: u64) -> Self {
        self.tag = tag;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder() {
        let url = Url::parse("https://repo.example.com/p/a.json").unwrap();
        let job = FetchJob::new("repo.example.com", url)
            .with_dest("/tmp/a.json")
            .with_tag(7);
        assert_eq!(job.origin, "repo.example.com");
        assert_eq!(job.tag, 7);
        assert!(job.dest.is_some());
    }
}
