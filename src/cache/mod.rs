//! Cache Module
//!
//! Generic in-memory cache with per-item TTL and heap-driven background
//! expiration.

mod arena;
mod builder;
mod clock;
mod item;
mod queue;
mod stats;
mod store;


use std::time::Duration;

// Re-export public types
pub use builder::{CacheBuilder, CheckExpirationCallback, ItemCallback};
pub use clock::{Clock, MockClock, SystemClock};
pub use item::Ttl;
pub use stats::Metrics;
pub use store::TtlCache;

pub(crate) use store::Shared;

// == Reaper Scheduling ==
/// Shortest sleep the reaper arms when the earliest deadline is already due.
pub const MIN_SLEEP: Duration = Duration::from_millis(1);

/// Sleep used when nothing is scheduled and no global TTL is set.
pub const IDLE_POLL: Duration = Duration::from_secs(60 * 60);
