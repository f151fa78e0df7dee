//! TTL Cache - A generic thread-safe in-memory cache with TTL expiration
//!
//! Items are kept in a key map plus a deadline-ordered min-heap. A background
//! reaper thread sleeps until the earliest deadline and evicts expired items,
//! subject to an optional veto callback. The crate also ships a small HTTP
//! server exposing a string cache.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
mod tasks;

pub use api::AppState;
pub use cache::{CacheBuilder, Clock, Metrics, MockClock, SystemClock, Ttl, TtlCache};
pub use config::Config;
pub use error::{CacheError, Result};
