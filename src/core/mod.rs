//! Core types and traits for the pagebridge library.
//!
//! This module provides the fundamental building blocks used throughout
//! the library:
//!
//! - [`types`] - Fetch method tags, reason codes, per-call options
//! - [`traits`] - The transport, render-provider and resolver seams
//! - [`error`] - Structured error type
//! - [`hasher`] - BLAKE3 lock keys for normalized URLs
//! - [`result`] - The `FetchResult` handed to callers

pub mod error;
pub mod hasher;
pub mod result;
pub mod traits;
pub mod types;

pub use error::FetchError;
pub use hasher::UrlKey;
pub use result::{FetchResult, MIN_SUFFICIENT_BODY_BYTES};
pub use traits::{
    ArcProvider, ArcResolver, ArcTransport, HostResolver, HttpResponse, HttpTransport,
    RenderProvider, RenderedPage,
};
pub use types::{FetchMethod, FetchOptions, FetchReason};
