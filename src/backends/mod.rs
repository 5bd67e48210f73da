//! Acquisition backends.
//!
//! This module contains the network-facing pieces of the fetch pipeline
//! and the test doubles that stand in for them.
//!
//! ## Available Backends
//!
//! - [`http`] - `reqwest` transport that never follows redirects itself
//! - [`dns`] - System and static host resolvers
//! - [`direct`] - Tier-1 direct fetcher with manual redirect handling
//! - [`fallback`] - Tier-2 adapter: cheap pre-check, then the render provider
//! - [`firecrawl`] - Firecrawl render provider (requires `firecrawl` feature)
//! - [`mock`] - Scripted transport and provider for tests
//!
//! ## Implementing a Custom Render Provider
//!
//! ```rust,ignore
//! use pagebridge::core::{FetchError, RenderProvider, RenderedPage};
//! use async_trait::async_trait;
//!
//! #[derive(Debug)]
//! pub struct MyRenderer;
//!
//! #[async_trait]
//! impl RenderProvider for MyRenderer {
//!     fn name(&self) -> &str {
//!         "my-renderer"
//!     }
//!
//!     async fn render(&self, url: &str) -> Result<RenderedPage, FetchError> {
//!         // Load the page in a browser and return its HTML
//!         todo!()
//!     }
//! }
//! ```

pub mod direct;
pub mod dns;
pub mod fallback;
pub mod http;
pub mod mock;

#[cfg(feature = "firecrawl")]
pub mod firecrawl;

// Re-exports
pub use direct::DirectFetcher;
pub use dns::{StaticResolver, SystemResolver};
pub use fallback::{FallbackAdapter, FallbackOutcome, ProviderContact};
pub use http::{ReqwestTransport, BROWSER_USER_AGENT};
pub use mock::{MockRender, MockRenderProvider, MockReply, MockTransport};

#[cfg(feature = "firecrawl")]
pub use firecrawl::{FirecrawlConfig, FirecrawlProvider};
