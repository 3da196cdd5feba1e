//! Cache-aware metadata fetch facade.
//!
//! Wraps the transport with a read-through response cache, conditional
//! revalidation via `If-Modified-Since`, fixed-delay retries, and a
//! degraded mode that serves stale cache entries when the network stays
//! down.

use crate::endpoint::{Endpoint, session_token};
use presto_cache::ResponseCache;
use presto_core::{Error, JsonResponse, Result, json};
use presto_transport::{Fetched, HttpClient};
use sonic_rs::JsonValueTrait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

const RETRIES: usize = 3;
const RETRY_DELAY: Duration = Duration::from_millis(100);

/// How a response was obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Fetched fresh from the network.
    Fresh(JsonResponse),
    /// Remote confirmed the cached entry is current; the cached body is
    /// re-served under the fresh headers.
    NotModified(JsonResponse),
    /// Served from the local cache without any network traffic.
    Cached(JsonResponse),
    /// Stale cache entry served after retries were exhausted.
    Degraded(JsonResponse),
}

impl FetchOutcome {
    /// The response regardless of how it was obtained.
    #[must_use]
    pub const fn response(&self) -> &JsonResponse {
        match self {
            Self::Fresh(r) | Self::NotModified(r) | Self::Cached(r) | Self::Degraded(r) => r,
        }
    }

    /// Unwrap into the response.
    #[must_use]
    pub fn into_response(self) -> JsonResponse {
        match self {
            Self::Fresh(r) | Self::NotModified(r) | Self::Cached(r) | Self::Degraded(r) => r,
        }
    }

    /// True when the response came from a stale cache entry.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }
}

/// Metadata downloader for one endpoint.
///
/// Attaches a `Package-Session` correlation header to every request.
/// Degraded mode is reported with a warning at most once per instance.
#[derive(Debug)]
pub struct Downloader {
    endpoint: Endpoint,
    client: HttpClient,
    cache: ResponseCache,
    session: String,
    enabled: AtomicBool,
    degraded: AtomicBool,
}

impl Downloader {
    /// Create a downloader whose cache lives under
    /// `cache_root/<sanitized endpoint>`.
    ///
    /// # Errors
    /// Returns error if the cache directory cannot be created.
    pub fn new(endpoint: Endpoint, client: HttpClient, cache_root: impl Into<PathBuf>) -> Result<Self> {
        let cache = ResponseCache::for_endpoint(cache_root, endpoint.as_str())?;
        Ok(Self {
            endpoint,
            client,
            cache,
            session: session_token(),
            enabled: AtomicBool::new(true),
            degraded: AtomicBool::new(false),
        })
    }

    /// Check if the downloader is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Disable the downloader; `get` then returns empty responses
    /// without network activity.
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    /// True once a stale cache entry has been served.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    /// The response cache backing this downloader.
    #[must_use]
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Fetch and decode a JSON document from the endpoint.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] for 404s, [`Error::Parse`] for
    /// malformed bodies, [`Error::Transport`] when retries are exhausted
    /// and no cache entry exists.
    pub async fn get(&self, path: &str) -> Result<JsonResponse> {
        self.get_with_outcome(path, &[], true)
            .await
            .map(FetchOutcome::into_response)
    }

    /// Serve a path from the local cache only, without network traffic.
    #[must_use]
    pub fn get_cached(&self, path: &str) -> Option<FetchOutcome> {
        self.cache
            .read(path.trim_start_matches('/'))
            .map(FetchOutcome::Cached)
    }

    /// Fetch a JSON document, reporting how the response was obtained.
    ///
    /// # Errors
    /// See [`Self::get`].
    pub async fn get_with_outcome(
        &self,
        path: &str,
        extra_headers: &[(String, String)],
        use_cache: bool,
    ) -> Result<FetchOutcome> {
        if !self.is_enabled() {
            return Ok(FetchOutcome::Fresh(JsonResponse::empty()));
        }

        let mut headers = vec![("Package-Session".to_string(), self.session.clone())];
        headers.extend_from_slice(extra_headers);

        let url = self.endpoint.join(path)?;
        let cache_key = path.trim_start_matches('/').to_string();

        if use_cache
            && let Some(cached) = self.cache.read(&cache_key)
            && let Some(last_modified) = cached.last_modified().map(str::to_string)
        {
            headers.push(("If-Modified-Since".to_string(), last_modified));
            return self.fetch_if_modified(&url, &cache_key, cached, headers).await;
        }

        let cache_key = use_cache.then_some(cache_key);
        self.fetch_fresh(&url, cache_key.as_deref(), &headers).await
    }

    /// Fetch without a conditional header, retrying on transient errors
    /// and degrading to the stale cache entry on exhaustion.
    async fn fetch_fresh(
        &self,
        url: &Url,
        cache_key: Option<&str>,
        headers: &[(String, String)],
    ) -> Result<FetchOutcome> {
        let mut last_error = None;

        for attempt in 0..RETRIES {
            if attempt > 0 {
                tokio::time::sleep(RETRY_DELAY).await;
            }

            match self.client.fetch(url, headers, |_| {}).await {
                Ok(fetched) => {
                    return self
                        .parse_and_store(url, cache_key, fetched)
                        .map(FetchOutcome::Fresh);
                }
                Err(e) if e.is_not_found() => return Err(e),
                Err(e) => {
                    debug!(url = %url, attempt, error = %e, "fetch failed, will retry");
                    last_error = Some(e);
                }
            }
        }

        let last_error = last_error.unwrap_or_else(|| Error::transport(url.as_str(), "fetch failed"));

        if let Some(key) = cache_key
            && let Some(stale) = self.cache.read(key)
        {
            self.switch_to_degraded(&last_error, url);
            return Ok(FetchOutcome::Degraded(stale));
        }

        Err(last_error)
    }

    /// Revalidate a cached entry with `If-Modified-Since`.
    ///
    /// A 304 re-serves the cached body under the fresh headers. On retry
    /// exhaustion the stale body is served, never an empty one.
    async fn fetch_if_modified(
        &self,
        url: &Url,
        cache_key: &str,
        cached: JsonResponse,
        headers: Vec<(String, String)>,
    ) -> Result<FetchOutcome> {
        let mut last_error = None;

        for attempt in 0..RETRIES {
            if attempt > 0 {
                tokio::time::sleep(RETRY_DELAY).await;
            }

            match self.client.fetch(url, &headers, |_| {}).await {
                Ok(fetched) if fetched.status == 304 => {
                    debug!(url = %url, "not modified, serving cached body");
                    return Ok(FetchOutcome::NotModified(
                        cached.with_headers(fetched.headers, 304),
                    ));
                }
                Ok(fetched) => {
                    return self
                        .parse_and_store(url, Some(cache_key), fetched)
                        .map(FetchOutcome::Fresh);
                }
                Err(e) if e.is_not_found() => return Err(e),
                Err(e) => {
                    debug!(url = %url, attempt, error = %e, "revalidation failed, will retry");
                    last_error = Some(e);
                }
            }
        }

        let last_error = last_error.unwrap_or_else(|| Error::transport(url.as_str(), "fetch failed"));
        self.switch_to_degraded(&last_error, url);
        Ok(FetchOutcome::Degraded(cached))
    }

    /// Decode a body, surface operator notices, and persist cacheable
    /// responses.
    fn parse_and_store(
        &self,
        url: &Url,
        cache_key: Option<&str>,
        fetched: Fetched,
    ) -> Result<JsonResponse> {
        let body: sonic_rs::Value = json::from_json_slice(&fetched.body, url.as_str())?;

        if let Some(warning) = body.get("warning").and_then(|v| v.as_str()) {
            warn!(url = %url, "{warning}");
        }
        if let Some(notice) = body.get("info").and_then(|v| v.as_str()) {
            info!(url = %url, "{notice}");
        }

        let response = JsonResponse::new(body, fetched.headers, fetched.status);

        if let Some(key) = cache_key
            && response.last_modified().is_some()
            && let Err(e) = self.cache.write(key, &response)
        {
            // advisory cache, a failed write must not fail the fetch
            warn!(key, error = %e, "failed to write cache entry");
        }

        Ok(response)
    }

    fn switch_to_degraded(&self, error: &Error, url: &Url) {
        if !self.degraded.swap(true, Ordering::SeqCst) {
            warn!("{error}");
            warn!(
                "{url} could not be fully loaded, package information was loaded \
                 from the local cache and may be out of date"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{headers, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LAST_MODIFIED: &str = "Sat, 01 Jan 2022 00:00:00 GMT";

    struct Fixture {
        server: MockServer,
        downloader: Downloader,
        _dir: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let endpoint = Endpoint::new(&server.uri()).unwrap();
        let downloader =
            Downloader::new(endpoint, HttpClient::with_defaults().unwrap(), dir.path()).unwrap();
        Fixture {
            server,
            downloader,
            _dir: dir,
        }
    }

    fn body_string(response: &JsonResponse) -> String {
        sonic_rs::to_string(response.body()).unwrap()
    }

    #[tokio::test]
    async fn disabled_returns_empty_without_network() {
        let fx = fixture().await;
        fx.downloader.disable();
        assert!(!fx.downloader.is_enabled());

        let response = fx.downloader.get("/versions.json").await.unwrap();
        assert!(response.is_empty());
    }

    #[tokio::test]
    async fn fresh_fetch_is_cached_when_last_modified_present() {
        let fx = fixture().await;
        Mock::given(method("GET"))
            .and(path("/versions.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(r#"{"versions":[1]}"#, "application/json")
                    .insert_header("Last-Modified", LAST_MODIFIED),
            )
            .expect(1)
            .mount(&fx.server)
            .await;

        let outcome = fx
            .downloader
            .get_with_outcome("/versions.json", &[], true)
            .await
            .unwrap();

        assert!(matches!(outcome, FetchOutcome::Fresh(_)));
        assert_eq!(fx.downloader.cache().stats().writes, 1);
        assert!(fx.downloader.get_cached("/versions.json").is_some());
    }

    #[tokio::test]
    async fn response_without_last_modified_is_not_cached() {
        let fx = fixture().await;
        Mock::given(method("GET"))
            .and(path("/versions.json"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("{}", "application/json"))
            .expect(2)
            .mount(&fx.server)
            .await;

        // no caching benefit: both calls reach the network
        fx.downloader.get("/versions.json").await.unwrap();
        fx.downloader.get("/versions.json").await.unwrap();
        assert_eq!(fx.downloader.cache().stats().writes, 0);
    }

    #[tokio::test]
    async fn revalidation_serves_cached_body_on_304() {
        let fx = fixture().await;
        Mock::given(method("GET"))
            .and(path("/versions.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(r#"{"versions":[1,2]}"#, "application/json")
                    .insert_header("Last-Modified", LAST_MODIFIED),
            )
            .up_to_n_times(1)
            .mount(&fx.server)
            .await;
        Mock::given(method("GET"))
            .and(path("/versions.json"))
            // wiremock splits incoming header values on commas, so an
            // HTTP-date can only be matched via the multi-value form
            .and(headers(
                "If-Modified-Since",
                LAST_MODIFIED.split(',').map(str::trim).collect(),
            ))
            .respond_with(ResponseTemplate::new(304))
            .expect(1)
            .mount(&fx.server)
            .await;

        let first = fx.downloader.get("/versions.json").await.unwrap();
        let second = fx
            .downloader
            .get_with_outcome("/versions.json", &[], true)
            .await
            .unwrap();

        assert!(matches!(second, FetchOutcome::NotModified(_)));
        assert_eq!(body_string(&first), body_string(second.response()));
        assert_eq!(second.response().status(), 304);
    }

    #[tokio::test]
    async fn transient_errors_retry_exactly_three_times() {
        let fx = fixture().await;
        Mock::given(method("GET"))
            .and(path("/flaky.json"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&fx.server)
            .await;

        let err = fx.downloader.get("/flaky.json").await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn not_found_aborts_after_one_attempt() {
        let fx = fixture().await;
        Mock::given(method("GET"))
            .and(path("/missing.json"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&fx.server)
            .await;

        let err = fx.downloader.get("/missing.json").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn parse_errors_are_not_retried() {
        let fx = fixture().await;
        Mock::given(method("GET"))
            .and(path("/broken.json"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("{not json", "application/json"))
            .expect(1)
            .mount(&fx.server)
            .await;

        let err = fx.downloader.get("/broken.json").await.unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[tokio::test]
    async fn degraded_mode_serves_stale_body() {
        let fx = fixture().await;
        let headers = JsonResponse::headers_from_lines(&[format!("Last-Modified: {LAST_MODIFIED}")]);
        let stale = JsonResponse::new(sonic_rs::json!({"versions": [9]}), headers, 200);
        fx.downloader.cache().write("versions.json", &stale).unwrap();

        // every revalidation attempt fails: 2 calls x 3 attempts
        Mock::given(method("GET"))
            .and(path("/versions.json"))
            .respond_with(ResponseTemplate::new(500))
            .expect(6)
            .mount(&fx.server)
            .await;

        let first = fx
            .downloader
            .get_with_outcome("/versions.json", &[], true)
            .await
            .unwrap();
        let second = fx
            .downloader
            .get_with_outcome("/versions.json", &[], true)
            .await
            .unwrap();

        assert!(first.is_degraded());
        assert!(second.is_degraded());
        assert_eq!(body_string(first.response()), body_string(&stale));
        assert_eq!(body_string(second.response()), body_string(&stale));
        assert!(fx.downloader.is_degraded());
    }

    #[tokio::test]
    async fn degraded_fallback_without_conditional_entry() {
        let fx = fixture().await;
        // entry with no last-modified goes down the fresh-fetch path
        let stale = JsonResponse::new(
            sonic_rs::json!({"versions": [3]}),
            Default::default(),
            200,
        );
        fx.downloader.cache().write("versions.json", &stale).unwrap();

        Mock::given(method("GET"))
            .and(path("/versions.json"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&fx.server)
            .await;

        let outcome = fx
            .downloader
            .get_with_outcome("/versions.json", &[], true)
            .await
            .unwrap();
        assert!(outcome.is_degraded());
        assert_eq!(body_string(outcome.response()), body_string(&stale));
    }

    #[tokio::test]
    async fn session_header_is_attached() {
        let fx = fixture().await;
        Mock::given(method("GET"))
            .and(path("/versions.json"))
            .and(wiremock::matchers::header_exists("Package-Session"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("{}", "application/json"))
            .expect(1)
            .mount(&fx.server)
            .await;

        fx.downloader.get("/versions.json").await.unwrap();
    }

    #[tokio::test]
    async fn warning_field_does_not_affect_control_flow() {
        let fx = fixture().await;
        Mock::given(method("GET"))
            .and(path("/versions.json"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"warning":"old client","info":"hello","versions":[]}"#,
                "application/json",
            ))
            .mount(&fx.server)
            .await;

        let response = fx.downloader.get("/versions.json").await.unwrap();
        assert!(!response.is_empty());
    }
}
