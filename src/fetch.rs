//! Page fetching: the injectable transport plus the retry/throttle wrapper
//! every source goes through.
//!
//! # Attempt lifecycle
//!
//! ```text
//!   Idle ──▶ RateLimited ──▶ InFlight ──┬──▶ Success ─▶ limiter.report(ok)
//!    ▲        (limiter.wait)  (timeout)  │
//!    │                                   └──▶ Failed ──▶ limiter.report(fail)
//!    └──── linear backoff ◀── retryable && attempts left
//!                                              │ otherwise
//!                                              ▼
//!                                  one ErrorTracker record, Err returned
//! ```
//!
//! `InFlight` is gated by a semaphore shared by every source, so at most
//! `max_in_flight` transport calls run at once across a whole collection.
//!
//! [`PageFetcher`] is the only seam that touches the network. Tests swap
//! in scripted implementations; production uses [`HttpPageFetcher`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::config::FetchConfig;
use crate::error::FetchError;
use crate::error_tracker::ErrorTracker;
use crate::rate_limit::RateLimiter;

// ═══════════════════════════════════════════════════════════════════════
// Transport
// ═══════════════════════════════════════════════════════════════════════

/// Raw response, uninterpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct PageResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl PageResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Fetch one URL. No assumption about transport beyond
/// "bytes come back with a status and a content type".
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> Result<PageResponse, FetchError>;
}

/// [`PageFetcher`] over `reqwest`.
pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(
        &self,
        url: &str,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> Result<PageResponse, FetchError> {
        let mut request = self.client.get(url).timeout(timeout);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(timeout)
            } else {
                FetchError::Transport(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?
            .to_vec();

        Ok(PageResponse {
            status,
            content_type,
            body,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Fetch context
// ═══════════════════════════════════════════════════════════════════════

/// What a response must look like to count as a success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// Any 2xx.
    Any,
    /// 2xx, a PDF-like content type and at least `min_bytes` of body.
    Pdf { min_bytes: usize },
}

impl Expect {
    fn check(&self, response: &PageResponse) -> Result<(), FetchError> {
        match self {
            Expect::Any => Ok(()),
            Expect::Pdf { min_bytes } => {
                let ct = response.content_type.clone().unwrap_or_default();
                if !ct.to_lowercase().contains("pdf") {
                    return Err(FetchError::UnexpectedContent(ct));
                }
                if response.body.len() < *min_bytes {
                    return Err(FetchError::TooSmall(response.body.len()));
                }
                Ok(())
            }
        }
    }
}

/// One logical request.
#[derive(Debug, Clone)]
pub struct Request<'a> {
    pub url: &'a str,
    pub accept: &'a str,
    pub timeout: Option<Duration>,
    pub headers: Vec<(String, String)>,
    pub expect: Expect,
}

impl<'a> Request<'a> {
    pub fn html(url: &'a str) -> Self {
        Self {
            url,
            accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            timeout: None,
            headers: Vec::new(),
            expect: Expect::Any,
        }
    }

    pub fn json(url: &'a str) -> Self {
        Self {
            accept: "application/json",
            ..Self::html(url)
        }
    }

    pub fn pdf(url: &'a str, min_bytes: usize, timeout: Duration) -> Self {
        Self {
            accept: "application/pdf,*/*;q=0.5",
            timeout: Some(timeout),
            expect: Expect::Pdf { min_bytes },
            ..Self::html(url)
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }
}

/// Host of `url` without a leading `www.`, lowercased. Empty when unparsable.
pub fn domain_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
        .map(|h| h.strip_prefix("www.").map(str::to_string).unwrap_or(h))
        .unwrap_or_default()
}

/// Shared state every fetch goes through: transport, in-flight gate,
/// per-domain limiter, error tracker and retry policy.
pub struct FetchContext {
    fetcher: Arc<dyn PageFetcher>,
    gate: Semaphore,
    limiter: Arc<RateLimiter>,
    tracker: Arc<ErrorTracker>,
    config: FetchConfig,
    user_agents: Vec<String>,
    ua_cursor: AtomicUsize,
}

impl FetchContext {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        limiter: Arc<RateLimiter>,
        tracker: Arc<ErrorTracker>,
        config: FetchConfig,
        user_agents: Vec<String>,
        max_in_flight: usize,
    ) -> Self {
        Self {
            fetcher,
            gate: Semaphore::new(max_in_flight.max(1)),
            limiter,
            tracker,
            config,
            user_agents,
            ua_cursor: AtomicUsize::new(0),
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn tracker(&self) -> &ErrorTracker {
        &self.tracker
    }

    fn next_user_agent(&self) -> Option<&str> {
        if self.user_agents.is_empty() {
            return None;
        }
        let i = self.ua_cursor.fetch_add(1, Ordering::Relaxed) % self.user_agents.len();
        Some(self.user_agents[i].as_str())
    }

    fn headers_for(&self, request: &Request<'_>) -> Vec<(String, String)> {
        let mut headers = Vec::with_capacity(request.headers.len() + 3);
        if let Some(ua) = self.next_user_agent() {
            headers.push(("User-Agent".to_string(), ua.to_string()));
        }
        headers.push(("Accept".to_string(), request.accept.to_string()));
        headers.push((
            "Accept-Language".to_string(),
            "en-US,en;q=0.9,ru;q=0.8".to_string(),
        ));
        headers.extend(request.headers.iter().cloned());
        headers
    }

    /// Shorthand for an HTML request with default timeout.
    pub async fn get(&self, url: &str) -> Result<PageResponse, FetchError> {
        self.send(Request::html(url)).await
    }

    /// Run `request` through the limiter with timeout and retries.
    ///
    /// On `Err` the failure has already been recorded in the tracker; the
    /// caller only needs to fall back to an empty result.
    pub async fn send(&self, request: Request<'_>) -> Result<PageResponse, FetchError> {
        let domain = domain_of(request.url);
        let timeout = request
            .timeout
            .unwrap_or(Duration::from_secs(self.config.timeout_secs));
        let max_attempts = self.config.max_attempts.max(1);

        let mut last_error = FetchError::Transport("no attempt made".to_string());
        let mut attempts = 0;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let delay = Duration::from_millis(self.config.backoff_ms * u64::from(attempt - 1));
                tokio::time::sleep(delay).await;
            }
            attempts = attempt;

            self.limiter.wait(&domain).await;
            let headers = self.headers_for(&request);
            tracing::debug!(url = request.url, attempt, "fetching");

            let outcome = match self.gate.acquire().await {
                Ok(_permit) => {
                    let call = self.fetcher.fetch(request.url, &headers, timeout);
                    match tokio::time::timeout(timeout, call).await {
                        Ok(result) => result,
                        Err(_) => Err(FetchError::Timeout(timeout)),
                    }
                }
                Err(_) => Err(FetchError::Transport("fetch gate closed".to_string())),
            };
            let outcome = outcome.and_then(|response| {
                if !response.is_success() {
                    return Err(FetchError::Status(response.status));
                }
                request.expect.check(&response)?;
                Ok(response)
            });

            match outcome {
                Ok(response) => {
                    self.limiter.report(&domain, true);
                    return Ok(response);
                }
                Err(e) => {
                    self.limiter.report(&domain, false);
                    tracing::warn!(url = request.url, attempt, "attempt failed: {e}");
                    let retry = e.is_retryable();
                    last_error = e;
                    if !retry {
                        break;
                    }
                }
            }
        }

        self.tracker
            .record(request.url, &domain, &last_error, attempts);
        Err(last_error)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Test doubles
// ═══════════════════════════════════════════════════════════════════════


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn domain_strips_www_and_case() {
        assert_eq!(domain_of("https://WWW.Google.com/search?q=x"), "google.com");
        assert_eq!(domain_of("http://scholar.google.com"), "scholar.google.com");
        assert_eq!(domain_of("not a url"), "");
    }

    #[tokio::test(start_paused = true)]
    async fn retries_server_errors_then_succeeds() {
        let fetcher = Arc::new(ScriptedFetcher::new().route(
            "flaky.com",
            vec![Ok(status(503)), Ok(status(502)), Ok(html("<p>ok</p>"))],
        ));
        let ctx = context(fetcher.clone());
        let response = ctx.get("https://flaky.com/page").await.unwrap();
        assert_eq!(response.text(), "<p>ok</p>");
        assert_eq!(fetcher.call_count(), 3);
        assert!(ctx.tracker().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn client_errors_are_not_retried() {
        let fetcher = Arc::new(ScriptedFetcher::new().route("gone.com", vec![Ok(status(404))]));
        let ctx = context(fetcher.clone());
        let err = ctx.get("https://gone.com/x").await.unwrap_err();
        assert_eq!(err, FetchError::Status(404));
        assert_eq!(fetcher.call_count(), 1);
        let records = ctx.tracker().records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].attempts, 1);
        assert_eq!(records[0].domain, "gone.com");
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_leave_one_record_and_raise_delay() {
        let fetcher = Arc::new(ScriptedFetcher::new().route("down.com", vec![Ok(status(500))]));
        let ctx = context(fetcher.clone());
        assert!(ctx.get("https://down.com/").await.is_err());
        assert_eq!(fetcher.call_count(), 3);
        assert_eq!(ctx.tracker().len(), 1);
        assert_eq!(ctx.limiter().snapshot()["down.com"].consecutive_failures, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn pdf_expectation_rejects_html_and_tiny_bodies() {
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .html("a.com/doc.pdf", "<html>login wall</html>")
                .route(
                    "b.com/doc.pdf",
                    vec![Ok(PageResponse {
                        status: 200,
                        content_type: Some("application/pdf".to_string()),
                        body: vec![b'%'; 10],
                    })],
                ),
        );
        let ctx = context(fetcher);
        let timeout = Duration::from_secs(5);
        let err = ctx
            .send(Request::pdf("https://a.com/doc.pdf", 1000, timeout))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::UnexpectedContent(_)));
        let err = ctx
            .send(Request::pdf("https://b.com/doc.pdf", 1000, timeout))
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::TooSmall(10));
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_calls_never_exceed_the_gate() {
        let fetcher = Arc::new(SlowFetcher::new(Duration::from_millis(50)));
        let ctx = gated_context(fetcher.clone(), 2);
        let urls: Vec<String> = (0..6).map(|i| format!("https://host{i}.test/")).collect();
        let outcomes = futures::future::join_all(urls.iter().map(|u| ctx.get(u))).await;
        assert_eq!(outcomes.len(), 6);
        assert_eq!(fetcher.peak.load(Ordering::SeqCst), 2);
    }
}
