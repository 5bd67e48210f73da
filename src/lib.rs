//! # Pagebridge
//!
//! Resilient page acquisition for crawlers and enrichment pipelines that
//! fetch URLs supplied by untrusted users.
//!
//! ## Overview
//!
//! Pagebridge turns a raw, user-supplied URL into a [`FetchResult`]:
//!
//! - Normalizes the URL into one canonical form
//! - Refuses URLs that target private, loopback or metadata addresses
//! - Serializes concurrent fetches of the same page
//! - Tries a cheap direct HTTP GET first
//! - Escalates to a paid headless-render provider when the direct fetch
//!   is blocked or too thin, behind a circuit breaker
//! - Emits structured audit events for every fetch
//!
//! A fetch never returns an error: every outcome is described by a
//! [`FetchReason`] on the result.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pagebridge::backends::{FirecrawlConfig, FirecrawlProvider};
//! use pagebridge::{FetchContext, PageFetcher};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // One context per process, shared by every fetcher
//!     let context = FetchContext::default();
//!
//!     let fetcher = PageFetcher::builder()
//!         .with_context(context)
//!         .with_provider(FirecrawlProvider::new(FirecrawlConfig::new("fc-key"))?)
//!         .build()?;
//!
//!     let result = fetcher.fetch("example.com/pricing").await;
//!     if result.has_content() {
//!         println!("{} bytes via {:?}", result.html.len(), result.method);
//!     } else {
//!         println!("failed: {}", result.reason);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `default` - Includes the Firecrawl provider
//! - `firecrawl` - Firecrawl render-provider backend
//!
//! ## Architecture
//!
//! The library is organized into several layers:
//!
//! - **Core**: Result, reason codes, traits, and error handling
//! - **Guard**: URL normalization and SSRF validation
//! - **Backends**: HTTP transport, direct and fallback tiers, render providers
//! - **Circuit Breaker**: Protection for the paid render provider
//! - **Manager**: The page fetcher, per-URL locks, and retry policy
//! - **Audit**: Structured logging for compliance

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod audit;
pub mod backends;
pub mod circuit_breaker;
pub mod core;
pub mod guard;
pub mod manager;

// Re-export commonly used types at the crate root
pub use crate::core::{FetchError, FetchMethod, FetchOptions, FetchReason, FetchResult};

pub use crate::circuit_breaker::{BreakerStatus, CircuitBreaker, CircuitBreakerConfig};
pub use crate::guard::{normalize, SsrfGuard};
pub use crate::manager::{FetchContext, PageFetcher, PageFetcherConfig};

/// Prelude module for convenient imports.
///
/// ```rust
/// use pagebridge::prelude::*;
/// ```
pub mod prelude {
    pub use crate::core::{
        FetchError, FetchMethod, FetchOptions, FetchReason, FetchResult, HostResolver,
        HttpTransport, RenderProvider, RenderedPage,
    };
    pub use crate::circuit_breaker::{BreakerStatus, CircuitBreaker, CircuitBreakerConfig};
    pub use crate::guard::{normalize, SsrfGuard};
    pub use crate::manager::{FetchContext, PageFetcher, PageFetcherBuilder, PageFetcherConfig};
}
