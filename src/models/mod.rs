//! Request and Response models for the cache server API
//!
//! DTOs used for serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{SetRequest, MAX_KEY_LENGTH, MAX_TTL_SECONDS};
pub use responses::{DeleteResponse, GetResponse, HealthResponse, SetResponse, StatsResponse};
