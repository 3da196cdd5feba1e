//! Progress notification protocol for in-flight requests.
//!
//! Mirrors a stream-notification protocol: the caller supplies an
//! observer closure and the transport invokes it at defined checkpoints
//! while a request is in flight.

/// A progress checkpoint during a single fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Response headers arrived; the connection is established.
    Resolved,
    /// The body size is known from `Content-Length`.
    ContentLength(u64),
    /// Bytes received so far.
    Transferred {
        /// Cumulative bytes downloaded.
        bytes: u64,
        /// Expected total, when known.
        total: Option<u64>,
    },
    /// The request failed.
    Failed {
        /// HTTP status, when one was received.
        status: Option<u16>,
        /// Error text.
        message: String,
    },
    /// The body was fully received.
    Completed,
}

impl ProgressEvent {
    /// True for the terminal events of a request.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_events() {
        assert!(ProgressEvent::Completed.is_terminal());
        assert!(
            ProgressEvent::Failed {
                status: Some(500),
                message: "HTTP 500".into()
            }
            .is_terminal()
        );
        assert!(!ProgressEvent::Resolved.is_terminal());
        assert!(
            !ProgressEvent::Transferred {
                bytes: 10,
                total: None
            }
            .is_terminal()
        );
    }
}
