//! Page fetcher orchestration.
//!
//! The `PageFetcher` runs normalize, validate, lock, Tier-1 and the
//! breaker-gated Tier-2 in order, and turns every failure into a
//! `FetchResult`.

pub(crate) mod config;
mod context;
mod locks;
mod page_fetcher;
mod retry;

pub use config::PageFetcherConfig;
pub use context::FetchContext;
pub use locks::{FetchLockGuard, FetchLockRegistry};
pub use page_fetcher::{PageFetcher, PageFetcherBuilder};
pub use retry::{retry_async, RetryOn, RetryPolicy};
