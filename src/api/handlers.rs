//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::debug;

use crate::cache::TtlCache;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    DeleteResponse, GetResponse, HealthResponse, SetRequest, SetResponse, StatsResponse,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Thread-safe cache; it carries its own lock
    pub cache: Arc<TtlCache<String, String>>,
}

impl AppState {
    /// Creates a new AppState around an existing cache.
    pub fn new(cache: TtlCache<String, String>) -> Self {
        Self {
            cache: Arc::new(cache),
        }
    }

    /// Builds the cache described by the configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let cache = TtlCache::builder()
            .global_ttl(config.global_ttl())
            .skip_ttl_extension_on_hit(config.skip_ttl_extension)
            .on_expire(|key: &String, _: &String| debug!("Key '{}' expired", key))
            .build()?;
        Ok(Self::new(cache))
    }
}

/// Handler for PUT /set
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let ttl = req.ttl();
    state.cache.set_with_ttl(req.key.clone(), req.value, ttl);

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /get/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    let (value, remaining) = state
        .cache
        .get_with_ttl(&key)
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;
    let remaining_ms =
        remaining.map(|ttl| u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX));

    Ok(Json(GetResponse::new(key, value, remaining_ms)))
}

/// Handler for DELETE /del/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    if !state.cache.remove(&key) {
        return Err(CacheError::NotFound(key));
    }

    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::new(state.cache.metrics(), state.cache.count()))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
