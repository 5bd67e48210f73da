//! Fetches one page and prints the result as JSON.
//!
//! This example shows how to:
//! - Configure the fetcher from environment variables
//! - Plug in Firecrawl when `FIRECRAWL_API_KEY` is set
//! - Inspect the circuit breaker after a fetch
//!
//! Run with: cargo run --example fetch_page -- <url> [--force-fallback]
//!
//! Set `RUST_LOG=pagebridge=debug` to see the pipeline, or
//! `RUST_LOG=pagebridge::audit=info` for audit events only.

use pagebridge::backends::{FirecrawlConfig, FirecrawlProvider};
use pagebridge::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pagebridge=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(url) = args.next() else {
        eprintln!("usage: fetch_page <url> [--force-fallback]");
        std::process::exit(2);
    };
    let force_fallback = args.any(|arg| arg == "--force-fallback");

    let context = FetchContext::default();
    let mut builder = PageFetcher::builder()
        .with_config(PageFetcherConfig::from_env()?)
        .with_context(context.clone());

    match FirecrawlConfig::from_env()? {
        Some(config) => builder = builder.with_provider(FirecrawlProvider::new(config)?),
        None => eprintln!("FIRECRAWL_API_KEY not set; fallback limited to the pre-check"),
    }

    let fetcher = builder.build()?;
    let result = fetcher
        .fetch_with_options(&url, FetchOptions::new().with_force_fallback(force_fallback))
        .await;

    println!("{}", serde_json::to_string_pretty(&result)?);
    eprintln!(
        "breaker: {}",
        serde_json::to_string(&fetcher.breaker_status())?
    );

    Ok(())
}
