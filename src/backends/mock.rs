//! Mock transport and render provider for testing.
//!
//! Both doubles answer from scripted replies keyed by URL, count their
//! calls, and can simulate latency. [`MockTransport`] also tracks how many
//! requests are in flight at once, per URL and overall, which is how the
//! stampede guarantees are tested.

use crate::core::{FetchError, HttpResponse, HttpTransport, RenderProvider, RenderedPage};

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// A scripted transport reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Return this response.
    Respond(HttpResponse),
    /// Fail with [`FetchError::Timeout`].
    Timeout,
    /// Fail with [`FetchError::ConnectionFailed`].
    ConnectionFailed(String),
    /// Panic inside the transport.
    Panic(String),
}

impl MockReply {
    /// A 200 response with `body`.
    pub fn ok(body: impl Into<String>) -> Self {
        Self::Respond(HttpResponse::new(200, body))
    }

    /// A response with the given status and body.
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Respond(HttpResponse::new(status, body))
    }

    /// A redirect to `location`.
    pub fn redirect(status: u16, location: impl Into<String>) -> Self {
        Self::Respond(HttpResponse::redirect(status, location))
    }

    /// Sets the content type of a response reply.
    pub fn with_content_type(self, content_type: impl Into<String>) -> Self {
        match self {
            Self::Respond(response) => Self::Respond(response.with_content_type(content_type)),
            other => other,
        }
    }

    /// Sets the `Retry-After` header of a response reply.
    pub fn with_retry_after(self, value: impl Into<String>) -> Self {
        match self {
            Self::Respond(response) => Self::Respond(response.with_retry_after(value)),
            other => other,
        }
    }
}

/// Replies for one URL; the last one repeats forever.
#[derive(Debug)]
struct Script<T> {
    replies: VecDeque<T>,
}

impl<T: Clone> Script<T> {
    fn new(replies: impl IntoIterator<Item = T>) -> Self {
        Self {
            replies: replies.into_iter().collect(),
        }
    }

    fn next(&mut self) -> Option<T> {
        if self.replies.len() > 1 {
            self.replies.pop_front()
        } else {
            self.replies.front().cloned()
        }
    }
}

#[derive(Debug, Default)]
struct Gauge {
    current: usize,
    max: usize,
}

/// A mock [`HttpTransport`] for testing.
///
/// # Examples
///
/// ```rust
/// use pagebridge::backends::mock::{MockReply, MockTransport};
/// use std::time::Duration;
///
/// let transport = MockTransport::new()
///     .with_reply("https://example.com/", MockReply::ok("<html></html>"))
///     .with_sequence(
///         "https://example.com/busy",
///         vec![MockReply::status(429, ""), MockReply::ok("<html></html>")],
///     )
///     .with_latency(Duration::from_millis(50));
/// ```
#[derive(Debug)]
pub struct MockTransport {
    name: String,
    scripts: Mutex<HashMap<String, Script<MockReply>>>,
    default_reply: MockReply,
    latency: Option<Duration>,
    calls: AtomicU64,
    calls_per_url: Mutex<HashMap<String, u64>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    in_flight_per_url: Mutex<HashMap<String, Gauge>>,
}

impl MockTransport {
    /// Creates a transport that answers 404 for every URL.
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            scripts: Mutex::new(HashMap::new()),
            default_reply: MockReply::status(404, "not found"),
            latency: None,
            calls: AtomicU64::new(0),
            calls_per_url: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            in_flight_per_url: Mutex::new(HashMap::new()),
        }
    }

    /// Sets the name of this transport.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Always answers `url` with `reply`.
    pub fn with_reply(self, url: impl Into<String>, reply: MockReply) -> Self {
        self.with_sequence(url, vec![reply])
    }

    /// Answers `url` with `replies` in order, repeating the last one.
    pub fn with_sequence(self, url: impl Into<String>, replies: Vec<MockReply>) -> Self {
        lock(&self.scripts).insert(url.into(), Script::new(replies));
        self
    }

    /// Sets the reply for URLs without a script.
    pub fn with_default_reply(mut self, reply: MockReply) -> Self {
        self.default_reply = reply;
        self
    }

    /// Sets the simulated latency per request.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Total number of requests.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of requests for `url`.
    pub fn calls_for(&self, url: &str) -> u64 {
        lock(&self.calls_per_url).get(url).copied().unwrap_or(0)
    }

    /// Highest number of requests ever in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of requests for `url` ever in flight at once.
    pub fn max_in_flight_for(&self, url: &str) -> usize {
        lock(&self.in_flight_per_url)
            .get(url)
            .map(|gauge| gauge.max)
            .unwrap_or(0)
    }

    fn next_reply(&self, url: &str) -> MockReply {
        lock(&self.scripts)
            .get_mut(url)
            .and_then(Script::next)
            .unwrap_or_else(|| self.default_reply.clone())
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Marks one request in flight until dropped.
struct InFlight<'a> {
    transport: &'a MockTransport,
    url: String,
}

impl<'a> InFlight<'a> {
    fn enter(transport: &'a MockTransport, url: &str) -> Self {
        let now = transport.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        transport.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let mut gauges = lock(&transport.in_flight_per_url);
        let gauge = gauges.entry(url.to_string()).or_default();
        gauge.current += 1;
        gauge.max = gauge.max.max(gauge.current);

        Self {
            transport,
            url: url.to_string(),
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.transport.in_flight.fetch_sub(1, Ordering::SeqCst);
        if let Some(gauge) = lock(&self.transport.in_flight_per_url).get_mut(&self.url) {
            gauge.current = gauge.current.saturating_sub(1);
        }
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.calls_per_url).entry(url.to_string()).or_default() += 1;

        let _in_flight = InFlight::enter(self, url);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match self.next_reply(url) {
            MockReply::Respond(response) => Ok(response),
            MockReply::Timeout => Err(FetchError::timeout(url, Duration::from_secs(15))),
            MockReply::ConnectionFailed(message) => Err(FetchError::connection_failed(url, message)),
            MockReply::Panic(message) => panic!("{message}"),
        }
    }
}

/// A scripted render-provider reply.
#[derive(Debug, Clone)]
pub enum MockRender {
    /// Return this page.
    Page(RenderedPage),
    /// Fail with [`FetchError::RateLimited`].
    RateLimited,
    /// Fail with [`FetchError::Timeout`].
    Timeout,
    /// Fail with [`FetchError::ProviderError`].
    Error(String),
}

/// A mock [`RenderProvider`] for testing.
///
/// # Examples
///
/// ```rust
/// use pagebridge::backends::mock::{MockRender, MockRenderProvider};
/// use pagebridge::core::RenderedPage;
///
/// let provider = MockRenderProvider::returning(RenderedPage::new("<html></html>"));
/// let flaky = MockRenderProvider::new(vec![MockRender::RateLimited, MockRender::Timeout]);
/// ```
#[derive(Debug)]
pub struct MockRenderProvider {
    name: String,
    script: Mutex<Script<MockRender>>,
    latency: Option<Duration>,
    calls: AtomicU64,
}

impl MockRenderProvider {
    /// Creates a provider answering with `replies` in order, repeating the
    /// last one.
    pub fn new(replies: Vec<MockRender>) -> Self {
        Self {
            name: "mock-render".to_string(),
            script: Mutex::new(Script::new(replies)),
            latency: None,
            calls: AtomicU64::new(0),
        }
    }

    /// A provider that always returns `page`.
    pub fn returning(page: RenderedPage) -> Self {
        Self::new(vec![MockRender::Page(page)])
    }

    /// A provider that always fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::new(vec![MockRender::Error(message.into())])
    }

    /// Sets the name of this provider.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the simulated latency per call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of render calls made.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RenderProvider for MockRenderProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn render(&self, url: &str) -> Result<RenderedPage, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let reply = lock(&self.script).next();
        match reply {
            Some(MockRender::Page(page)) => Ok(page),
            Some(MockRender::RateLimited) => Err(FetchError::RateLimited {
                source_name: self.name.clone(),
                retry_after: None,
            }),
            Some(MockRender::Timeout) => Err(FetchError::timeout(url, Duration::from_secs(30))),
            Some(MockRender::Error(message)) => Err(FetchError::provider(&self.name, message)),
            None => Err(FetchError::provider(&self.name, "no scripted reply")),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_sequence_repeats_last_reply() {
        let transport = MockTransport::new().with_sequence(
            "https://example.com/",
            vec![MockReply::status(429, ""), MockReply::ok("done")],
        );

        let statuses: Vec<u16> = futures::future::join_all(
            (0..3).map(|_| transport.get("https://example.com/")),
        )
        .await
        .into_iter()
        .map(|r| r.unwrap().status)
        .collect();

        assert_eq!(statuses, vec![429, 200, 200]);
        assert_eq!(transport.calls_for("https://example.com/"), 3);
    }

    #[tokio::test]
    async fn test_unknown_url_gets_default() {
        let transport = MockTransport::new();
        let response = transport.get("https://nowhere.example/").await.unwrap();
        assert_eq!(response.status, 404);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_gauges() {
        let transport = Arc::new(MockTransport::new().with_latency(Duration::from_millis(100)));

        let tasks: Vec<_> = ["https://a.example/", "https://a.example/", "https://b.example/"]
            .into_iter()
            .map(|url| {
                let transport = Arc::clone(&transport);
                tokio::spawn(async move { transport.get(url).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(transport.max_in_flight(), 3);
        assert_eq!(transport.max_in_flight_for("https://a.example/"), 2);
        assert_eq!(transport.max_in_flight_for("https://b.example/"), 1);
    }

    #[tokio::test]
    async fn test_render_provider_script() {
        let provider = MockRenderProvider::new(vec![
            MockRender::RateLimited,
            MockRender::Page(RenderedPage::new("ok")),
        ]);

        assert!(provider.render("u").await.unwrap_err().is_rate_limited());
        assert_eq!(provider.render("u").await.unwrap().html, "ok");
        assert_eq!(provider.render("u").await.unwrap().html, "ok");
        assert_eq!(provider.call_count(), 3);

        let failing = MockRenderProvider::failing("boom");
        assert!(matches!(
            failing.render("u").await,
            Err(FetchError::ProviderError { .. })
        ));
    }
}
