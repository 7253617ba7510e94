//! HTTP client for the feed-aggregation server.

mod client;
mod types;

pub use client::{ApiClient, ApiError, DEFAULT_TIMEOUT};
