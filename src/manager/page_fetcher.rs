//! The page fetcher: the public entry point of the library.

use crate::audit::{self, FetchAuditEvent};
use crate::backends::{DirectFetcher, FallbackAdapter, ReqwestTransport};
use crate::circuit_breaker::BreakerStatus;
use crate::core::{
    ArcProvider, ArcResolver, ArcTransport, FetchError, FetchMethod, FetchOptions, FetchReason,
    FetchResult, HttpTransport, RenderProvider, UrlKey,
};
use crate::guard::{normalize, SsrfGuard};
use crate::manager::config::PageFetcherConfig;
use crate::manager::context::FetchContext;
use crate::manager::retry::RetryPolicy;

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Builder for creating a `PageFetcher`.
pub struct PageFetcherBuilder {
    config: PageFetcherConfig,
    context: Option<FetchContext>,
    transport: Option<ArcTransport>,
    provider: Option<ArcProvider>,
    guard: Option<SsrfGuard>,
    provider_retry: RetryPolicy,
}

impl PageFetcherBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            config: PageFetcherConfig::default(),
            context: None,
            transport: None,
            provider: None,
            guard: None,
            provider_retry: RetryPolicy::provider(),
        }
    }

    /// Sets the configuration.
    pub fn with_config(mut self, config: PageFetcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Shares `context` (breaker and lock registry) with this fetcher.
    ///
    /// Without one the fetcher gets a private context, which only makes
    /// sense when it is the only fetcher in the process.
    pub fn with_context(mut self, context: FetchContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Sets the HTTP transport used by both tiers.
    pub fn with_transport<T: HttpTransport + 'static>(self, transport: T) -> Self {
        self.with_arc_transport(Arc::new(transport))
    }

    /// Sets a transport wrapped in an Arc.
    pub fn with_arc_transport(mut self, transport: ArcTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the render provider for the fallback tier.
    pub fn with_provider<P: RenderProvider + 'static>(self, provider: P) -> Self {
        self.with_arc_provider(Arc::new(provider))
    }

    /// Sets a render provider wrapped in an Arc.
    pub fn with_arc_provider(mut self, provider: ArcProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Resolves hosts for SSRF checks through `resolver`.
    pub fn with_resolver(self, resolver: ArcResolver) -> Self {
        self.with_guard(SsrfGuard::new(resolver))
    }

    /// Sets the SSRF guard.
    pub fn with_guard(mut self, guard: SsrfGuard) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Sets the retry policy for render-provider calls.
    pub fn with_provider_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.provider_retry = retry;
        self
    }

    /// Builds the page fetcher.
    ///
    /// Missing pieces default to a `reqwest` transport, the system resolver
    /// and a private [`FetchContext`].
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Configuration`] if the default HTTP client
    /// cannot be created.
    pub fn build(self) -> Result<PageFetcher, FetchError> {
        let config = self.config;
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(
                &config.user_agent,
                config.http_timeout,
            )?),
        };
        let guard = self.guard.unwrap_or_else(SsrfGuard::system);

        let mut direct = DirectFetcher::new(transport)
            .with_retry_policy(RetryPolicy::direct(config.max_retries))
            .with_max_redirects(config.max_redirects);
        if config.revalidate_redirects {
            direct = direct.with_guard(guard.clone());
        }

        let precheck = direct.clone().with_retry_policy(RetryPolicy::no_retry());
        let fallback =
            FallbackAdapter::new(precheck, self.provider).with_retry_policy(self.provider_retry);

        if fallback.provider_name().is_none() {
            tracing::warn!("No render provider configured, fallback will only pre-check");
        }

        Ok(PageFetcher {
            config,
            context: self.context.unwrap_or_default(),
            guard,
            direct,
            fallback,
        })
    }
}

impl Default for PageFetcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Acquires pages through a direct tier and a circuit-broken fallback tier.
///
/// # Example
///
/// ```rust,no_run
/// use pagebridge::manager::{FetchContext, PageFetcher};
///
/// # async fn demo() -> Result<(), pagebridge::core::FetchError> {
/// let context = FetchContext::default();
/// let fetcher = PageFetcher::builder().with_context(context.clone()).build()?;
///
/// let result = fetcher.fetch("example.com/pricing").await;
/// println!("{} via {:?}: {} bytes", result.reason, result.method, result.html.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PageFetcher {
    config: PageFetcherConfig,
    context: FetchContext,
    guard: SsrfGuard,
    direct: DirectFetcher,
    fallback: FallbackAdapter,
}

impl PageFetcher {
    /// Creates a new builder.
    pub fn builder() -> PageFetcherBuilder {
        PageFetcherBuilder::new()
    }

    /// Fetches `url` with default options.
    pub async fn fetch(&self, url: &str) -> FetchResult {
        self.fetch_with_options(url, FetchOptions::default()).await
    }

    /// Fetches `url`.
    ///
    /// Never fails: blocked URLs, network errors, circuit denials and
    /// provider failures all come back as a [`FetchResult`] whose `reason`
    /// says what happened. Panics inside the pipeline are caught and
    /// reported as [`FetchReason::InternalError`].
    pub async fn fetch_with_options(&self, url: &str, options: FetchOptions) -> FetchResult {
        let fetch_id = Uuid::new_v4().to_string();
        let started = Instant::now();

        audit::emit_fetch_started(&fetch_id, url, options.force_fallback);

        let result = match AssertUnwindSafe(self.run(&fetch_id, url, options))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => {
                tracing::error!(
                    fetch_id = %fetch_id,
                    url = %url,
                    panic = %panic_message(panic.as_ref()),
                    "Fetch pipeline panicked"
                );
                let normalized = normalize(url).unwrap_or_else(|_| url.to_string());
                FetchResult::failure(url, normalized, FetchReason::InternalError, "internal error")
            }
        };

        let elapsed = started.elapsed();
        tracing::info!(
            fetch_id = %fetch_id,
            url = %result.normalized_url,
            reason = %result.reason,
            method = ?result.method,
            status = ?result.status_code,
            bytes = result.html.len(),
            duration_ms = elapsed.as_millis() as u64,
            "Fetch completed"
        );
        audit::emit_fetch_completed(&FetchAuditEvent::from_result(&fetch_id, &result, elapsed));

        result
    }

    /// Returns a snapshot of the fallback circuit breaker.
    pub fn breaker_status(&self) -> BreakerStatus {
        self.context.breaker().status()
    }

    /// Returns the shared context.
    pub fn context(&self) -> &FetchContext {
        &self.context
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &PageFetcherConfig {
        &self.config
    }

    async fn run(&self, fetch_id: &str, url: &str, options: FetchOptions) -> FetchResult {
        let normalized = match normalize(url) {
            Ok(normalized) => normalized,
            Err(e) => {
                let reason = e.to_string();
                audit::emit_ssrf_blocked(fetch_id, url, &reason);
                return FetchResult::failure(url, url.trim(), FetchReason::SsrfBlocked, reason);
            }
        };

        if let Err(e) = self.guard.validate(&normalized).await {
            let reason = e.to_string();
            audit::emit_ssrf_blocked(fetch_id, &normalized, &reason);
            return FetchResult::failure(url, normalized, FetchReason::SsrfBlocked, reason);
        }

        let key = UrlKey::for_url(&normalized);
        let _lock = self.context.locks().acquire(&key).await;

        if options.force_fallback {
            tracing::info!(url = %normalized, "Forced fallback, skipping direct fetch");
        } else {
            let direct = self.direct.fetch(url, &normalized).await;
            if direct.is_sufficient() {
                return direct;
            }
            tracing::info!(
                url = %normalized,
                reason = %direct.reason,
                status = ?direct.status_code,
                bytes = direct.html.len(),
                "Direct fetch insufficient, escalating to fallback"
            );
        }

        // Dropping the probe without recording (cancellation, uncounted
        // outcome) hands its half-open slot back.
        let probe = match self.context.breaker().admit() {
            Ok(probe) => probe,
            Err(e) => {
                let reason = match e {
                    FetchError::CircuitHalfOpenExhausted { .. } => {
                        FetchReason::CircuitHalfOpenExhausted
                    }
                    _ => FetchReason::CircuitOpen,
                };
                tracing::warn!(url = %normalized, reason = %reason, error = %e, "Fallback denied by circuit breaker");
                return FetchResult::failure(url, normalized, reason, e.to_string())
                    .with_method(FetchMethod::Fallback);
            }
        };

        let outcome = self.fallback.fetch(url, &normalized).await;
        if outcome.result.reason.is_fallback_success() || outcome.provider_called() {
            probe.record(&outcome.result.reason);
        }
        outcome.result
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
