//! Transport configuration.

use std::time::Duration;

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Total request timeout.
    pub total_timeout: Duration,
    /// Enable HTTP/2 multiplexing (ALPN negotiated, so TLS hosts only).
    /// When off the client is HTTP/1-only.
    pub http2_multiplexing: bool,
    /// Use an adaptive HTTP/2 flow-control window.
    pub http2_adaptive_window: bool,
    /// Initial HTTP/2 stream window size.
    pub http2_initial_stream_window: u32,
    /// Initial HTTP/2 connection window size.
    pub http2_initial_connection_window: u32,
    /// Maximum idle pooled connections per host.
    pub max_idle_per_host: usize,
    /// Idle connection keep-alive.
    pub keep_alive_timeout: Duration,
    /// User agent string.
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            total_timeout: Duration::from_secs(60),
            http2_multiplexing: true,
            http2_adaptive_window: true,
            http2_initial_stream_window: 1024 * 1024,
            http2_initial_connection_window: 4 * 1024 * 1024,
            max_idle_per_host: 10,
            keep_alive_timeout: Duration::from_secs(30),
            user_agent: concat!("presto/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}
