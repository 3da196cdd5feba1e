//! HTTP client with HTTP/2 multiplexing and connection pooling.

use crate::config::TransportConfig;
use crate::progress::ProgressEvent;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use presto_core::{Error, Result};
use reqwest::{
    Client, Response, StatusCode,
    header::{ACCEPT, HeaderMap, HeaderName, HeaderValue, USER_AGENT},
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace};
use url::Url;

/// A completed fetch: status, lowercased headers, and the body.
///
/// For path-destination fetches the body lives on disk and `body` is empty.
#[derive(Debug, Clone)]
pub struct Fetched {
    /// HTTP status code.
    pub status: u16,
    /// Response headers, keyed by lowercased name.
    pub headers: BTreeMap<String, String>,
    /// Response body.
    pub body: Bytes,
}

impl Fetched {
    /// Look up a header by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Single-request executor over a multiplexed connection pool.
///
/// Many concurrent `fetch` calls share the same pool; each call resolves
/// only when its own request finishes.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    config: Arc<TransportConfig>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("client", &"reqwest::Client")
            .field("config", &self.config)
            .finish()
    }
}

impl HttpClient {
    /// Create a new HTTP client with the given configuration.
    ///
    /// # Errors
    /// Returns error if the client cannot be built.
    pub fn new(config: TransportConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.total_timeout)
            .pool_max_idle_per_host(config.max_idle_per_host)
            .pool_idle_timeout(config.keep_alive_timeout)
            .tcp_keepalive(config.keep_alive_timeout)
            .tcp_nodelay(true)
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .redirect(reqwest::redirect::Policy::limited(10));

        // HTTP/2 is negotiated via ALPN, so it only takes effect on TLS
        // hosts; plain-http hosts stay on HTTP/1.
        if config.http2_multiplexing {
            builder = builder
                .http2_adaptive_window(config.http2_adaptive_window)
                .http2_initial_stream_window_size(Some(config.http2_initial_stream_window))
                .http2_initial_connection_window_size(Some(config.http2_initial_connection_window))
                .http2_keep_alive_interval(Some(Duration::from_secs(15)))
                .http2_keep_alive_while_idle(true);
        } else {
            builder = builder.http1_only();
        }

        let client = builder.build().map_err(|e| Error::Config(e.to_string()))?;

        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    /// Create a client with default configuration.
    ///
    /// # Errors
    /// Returns error if the client cannot be built.
    pub fn with_defaults() -> Result<Self> {
        Self::new(TransportConfig::default())
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Fetch a URL into memory.
    ///
    /// `notify` is invoked at progress checkpoints: [`ProgressEvent::Resolved`]
    /// when response headers arrive, [`ProgressEvent::ContentLength`] when the
    /// size is known, [`ProgressEvent::Transferred`] per body chunk, and a
    /// terminal [`ProgressEvent::Completed`] or [`ProgressEvent::Failed`].
    ///
    /// A 304 response is surfaced as success with an empty body, not as an
    /// error.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] on HTTP 404, [`Error::Transport`] on other
    /// failures.
    pub async fn fetch(
        &self,
        url: &Url,
        headers: &[(String, String)],
        mut notify: impl FnMut(ProgressEvent),
    ) -> Result<Fetched> {
        let response = self.send(url, headers, &mut notify).await?;
        let headers = collect_headers(&response);
        let status = response.status().as_u16();

        if status == StatusCode::NOT_MODIFIED.as_u16() {
            notify(ProgressEvent::Completed);
            return Ok(Fetched {
                status,
                headers,
                body: Bytes::new(),
            });
        }

        let total = response.content_length();
        if let Some(len) = total {
            notify(ProgressEvent::ContentLength(len));
        }

        let mut body = BytesMut::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    notify(ProgressEvent::Failed {
                        status: None,
                        message: e.to_string(),
                    });
                    return Err(Error::transport(url.as_str(), e.to_string()));
                }
            };
            body.extend_from_slice(&chunk);
            notify(ProgressEvent::Transferred {
                bytes: body.len() as u64,
                total,
            });
        }

        notify(ProgressEvent::Completed);
        trace!(url = %url, bytes = body.len(), "fetch complete");

        Ok(Fetched {
            status,
            headers,
            body: body.freeze(),
        })
    }

    /// Fetch a URL to a local file.
    ///
    /// The body streams into `<dest>.partial`, which is renamed to `dest`
    /// only when the whole body arrived without error; a failed transfer
    /// leaves no partial file behind. The returned [`Fetched`] carries an
    /// empty body.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`], [`Error::Transport`], or [`Error::Io`].
    pub async fn fetch_to_path(
        &self,
        url: &Url,
        headers: &[(String, String)],
        dest: &Path,
        mut notify: impl FnMut(ProgressEvent),
    ) -> Result<Fetched> {
        let response = self.send(url, headers, &mut notify).await?;
        let resp_headers = collect_headers(&response);
        let status = response.status().as_u16();

        let total = response.content_length();
        if let Some(len) = total {
            notify(ProgressEvent::ContentLength(len));
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io(parent, e))?;
        }

        let partial = partial_path(dest);
        let mut file = tokio::fs::File::create(&partial)
            .await
            .map_err(|e| Error::io(&partial, e))?;

        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let result = match chunk {
                Ok(c) => {
                    downloaded += c.len() as u64;
                    file.write_all(&c)
                        .await
                        .map_err(|e| Error::io(&partial, e))
                }
                Err(e) => Err(Error::transport(url.as_str(), e.to_string())),
            };

            if let Err(e) = result {
                drop(file);
                let _ = tokio::fs::remove_file(&partial).await;
                notify(ProgressEvent::Failed {
                    status: None,
                    message: e.to_string(),
                });
                return Err(e);
            }

            notify(ProgressEvent::Transferred {
                bytes: downloaded,
                total,
            });
        }

        file.flush().await.map_err(|e| Error::io(&partial, e))?;
        drop(file);

        tokio::fs::rename(&partial, dest)
            .await
            .map_err(|e| Error::io(dest, e))?;

        notify(ProgressEvent::Completed);
        debug!(url = %url, dest = ?dest, bytes = downloaded, "download complete");

        Ok(Fetched {
            status,
            headers: resp_headers,
            body: Bytes::new(),
        })
    }

    async fn send(
        &self,
        url: &Url,
        headers: &[(String, String)],
        notify: &mut impl FnMut(ProgressEvent),
    ) -> Result<Response> {
        let header_map = self.build_headers(headers)?;

        debug!(url = %url, "GET request starting");

        let send_future = self.client.get(url.as_str()).headers(header_map).send();

        let response = match tokio::time::timeout(self.config.total_timeout, send_future).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => {
                notify(ProgressEvent::Failed {
                    status: None,
                    message: e.to_string(),
                });
                return Err(Error::transport(url.as_str(), e.to_string()));
            }
            Err(_) => {
                let message = format!("request timed out for {url}");
                notify(ProgressEvent::Failed {
                    status: None,
                    message: message.clone(),
                });
                return Err(Error::transport(url.as_str(), message));
            }
        };

        notify(ProgressEvent::Resolved);

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_MODIFIED {
            return Ok(response);
        }

        if status == StatusCode::NOT_FOUND {
            notify(ProgressEvent::Failed {
                status: Some(404),
                message: "HTTP 404".into(),
            });
            return Err(Error::NotFound {
                url: url.to_string(),
            });
        }

        let code = status.as_u16();
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| format!("HTTP {code}"));
        notify(ProgressEvent::Failed {
            status: Some(code),
            message: message.clone(),
        });
        Err(Error::transport_with_status(url.as_str(), code, message))
    }

    fn build_headers(&self, headers: &[(String, String)]) -> Result<HeaderMap> {
        let mut map = HeaderMap::new();

        if let Ok(ua) = HeaderValue::from_str(&self.config.user_agent) {
            map.insert(USER_AGENT, ua);
        }
        map.insert(ACCEPT, HeaderValue::from_static("application/json, */*"));

        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Config(format!("invalid header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::Config(format!("invalid header value: {e}")))?;
            map.insert(name, value);
        }

        Ok(map)
    }
}

fn collect_headers(response: &Response) -> BTreeMap<String, String> {
    response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut os = dest.as_os_str().to_owned();
    os.push(".partial");
    PathBuf::from(os)
}
