//! feedsync: a terminal client for a feed-aggregation server.
//!
//! The library half holds everything the binary wires together, so the
//! integration tests can drive the sync engine and the HTTP client directly.

pub mod api;
pub mod app;
pub mod config;
pub mod preferences;
pub mod storage;
pub mod sync;
pub mod ui;
pub mod util;
