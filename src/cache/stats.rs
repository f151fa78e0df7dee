//! Cache Metrics Module
//!
//! Tracks insert, lookup and expiration counters.

use serde::Serialize;

// == Metrics ==
/// Snapshot of cache activity counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Metrics {
    /// Number of genuinely new keys stored
    pub inserted: u64,
    /// Number of lookups performed
    pub retrieved: u64,
    /// Lookups that returned a live value
    pub hits: u64,
    /// Lookups for missing or expired keys
    pub misses: u64,
    /// Items removed by the reaper on expiration
    pub evicted: u64,
}

impl Metrics {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_insert(&mut self) {
        self.inserted += 1;
    }

    pub fn record_hit(&mut self) {
        self.retrieved += 1;
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.retrieved += 1;
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evicted += 1;
    }
}
