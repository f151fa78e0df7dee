//! Request DTOs for the cache server API

use std::time::Duration;

use serde::Deserialize;

use crate::cache::Ttl;

/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Longest accepted TTL in seconds (ten years)
pub const MAX_TTL_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;

/// Request body for the SET operation (PUT /set)
///
/// # Fields
/// - `key`: The cache key to store the value under
/// - `value`: The value to store
/// - `ttl`: Optional TTL in seconds. Absent or 0 uses the global TTL, a
///   negative value stores the item without expiration.
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The cache key
    pub key: String,
    /// The value to store
    pub value: String,
    /// Optional TTL in seconds
    #[serde(default)]
    pub ttl: Option<i64>,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.key.len() > MAX_KEY_LENGTH {
            return Some(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            ));
        }
        if self.ttl.is_some_and(|secs| secs > MAX_TTL_SECONDS) {
            return Some(format!(
                "TTL exceeds maximum of {} seconds",
                MAX_TTL_SECONDS
            ));
        }
        None
    }

    /// Maps the wire TTL onto the cache's TTL modes.
    pub fn ttl(&self) -> Ttl {
        match self.ttl {
            None | Some(0) => Ttl::Global,
            Some(secs) if secs < 0 => Ttl::Never,
            Some(secs) => {
                Ttl::After(Duration::from_secs(secs.min(MAX_TTL_SECONDS).unsigned_abs()))
            }
        }
    }
}
