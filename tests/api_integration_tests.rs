//! Integration Tests for API Endpoints
//!
//! Drives the router end to end and checks that cache behaviour (TTL modes,
//! hit extension, reaper eviction, metrics) is visible over HTTP.

use std::time::{Duration, Instant};

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;
use ttl_cache::{api::create_router, models::MAX_TTL_SECONDS, AppState, Config};

// == Helper Functions ==

fn create_test_app(config: &Config) -> Router {
    create_router(AppState::from_config(config).unwrap())
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<String>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn set(app: &Router, key: &str, value: &str, ttl: Option<i64>) -> StatusCode {
    let body = match ttl {
        Some(ttl) => format!(r#"{{"key":"{key}","value":"{value}","ttl":{ttl}}}"#),
        None => format!(r#"{{"key":"{key}","value":"{value}"}}"#),
    };
    send(app, Method::PUT, "/set", Some(body)).await.0
}

async fn get(app: &Router, key: &str) -> (StatusCode, Value) {
    send(app, Method::GET, &format!("/get/{key}"), None).await
}

async fn stats(app: &Router) -> Value {
    send(app, Method::GET, "/stats", None).await.1
}

// == TTL Modes ==

#[tokio::test]
async fn test_ttl_modes_over_the_wire() {
    let app = create_test_app(&Config::default());

    assert_eq!(set(&app, "global", "g", None).await, StatusCode::OK);
    assert_eq!(set(&app, "zero", "z", Some(0)).await, StatusCode::OK);
    assert_eq!(set(&app, "explicit", "e", Some(10)).await, StatusCode::OK);
    assert_eq!(set(&app, "never", "n", Some(-1)).await, StatusCode::OK);

    // Absent and zero both inherit the 300s global TTL
    for key in ["global", "zero"] {
        let (status, json) = get(&app, key).await;
        assert_eq!(status, StatusCode::OK);
        let remaining = json["ttl_remaining_ms"].as_u64().unwrap();
        assert!(remaining > 295_000 && remaining <= 300_000, "{key}: {remaining}");
    }

    let (_, json) = get(&app, "explicit").await;
    let remaining = json["ttl_remaining_ms"].as_u64().unwrap();
    assert!(remaining > 5_000 && remaining <= 10_000);

    let (_, json) = get(&app, "never").await;
    assert_eq!(json["value"], "n");
    assert!(json.get("ttl_remaining_ms").is_none());
}

#[tokio::test]
async fn test_overwrite_replaces_ttl_mode() {
    let app = create_test_app(&Config::default());

    set(&app, "k", "first", Some(60)).await;
    set(&app, "k", "second", Some(-1)).await;

    let (_, json) = get(&app, "k").await;
    assert_eq!(json["value"], "second");
    assert!(json.get("ttl_remaining_ms").is_none());

    let json = stats(&app).await;
    assert_eq!(json["inserted"], 1);
    assert_eq!(json["total_entries"], 1);
}

#[tokio::test]
async fn test_disabled_global_ttl_never_expires() {
    let config = Config {
        default_ttl: 0,
        ..Config::default()
    };
    let app = create_test_app(&config);

    set(&app, "k", "v", None).await;
    let (status, json) = get(&app, "k").await;
    assert_eq!(status, StatusCode::OK);
    assert!(json.get("ttl_remaining_ms").is_none());
}

#[tokio::test]
async fn test_oversized_ttl_rejected() {
    let app = create_test_app(&Config::default());

    for ttl in [MAX_TTL_SECONDS + 1, i64::MAX] {
        assert_eq!(set(&app, "huge", "v", Some(ttl)).await, StatusCode::BAD_REQUEST);
    }
    assert_eq!(get(&app, "huge").await.0, StatusCode::NOT_FOUND);

    // The largest accepted TTL still works
    assert_eq!(set(&app, "huge", "v", Some(MAX_TTL_SECONDS)).await, StatusCode::OK);
    let (status, json) = get(&app, "huge").await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["ttl_remaining_ms"].as_u64().unwrap() > 0);
}

// == Expiration ==

#[tokio::test]
async fn test_reads_extend_ttl() {
    let app = create_test_app(&Config::default());
    set(&app, "k", "v", Some(1)).await;

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(get(&app, "k").await.0, StatusCode::OK);

    // 1.2s after the write, but only 0.6s after the last read
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(get(&app, "k").await.0, StatusCode::OK);
}

#[tokio::test]
async fn test_skip_extension_keeps_deadline() {
    let config = Config {
        skip_ttl_extension: true,
        ..Config::default()
    };
    let app = create_test_app(&config);
    set(&app, "k", "v", Some(1)).await;

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(get(&app, "k").await.0, StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(get(&app, "k").await.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stats_reflect_reaper_eviction() {
    let app = create_test_app(&Config::default());
    set(&app, "short", "v", Some(1)).await;
    set(&app, "long", "v", Some(60)).await;

    assert_eq!(get(&app, "long").await.0, StatusCode::OK);
    assert_eq!(get(&app, "missing").await.0, StatusCode::NOT_FOUND);

    // No reads on "short": only the reaper can remove it
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut json = stats(&app).await;
    while json["evicted"] != 1 && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
        json = stats(&app).await;
    }

    assert_eq!(json["evicted"], 1);
    assert_eq!(json["total_entries"], 1);
    assert_eq!(json["inserted"], 2);
    assert_eq!(json["hits"], 1);
    assert_eq!(json["misses"], 1);
    assert_eq!(json["hit_rate"].as_f64().unwrap(), 0.5);
}

// == Delete ==

#[tokio::test]
async fn test_delete_is_not_an_eviction() {
    let app = create_test_app(&Config::default());
    set(&app, "k", "v", None).await;

    let (status, json) = send(&app, Method::DELETE, "/del/k", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["key"], "k");

    assert_eq!(send(&app, Method::DELETE, "/del/k", None).await.0, StatusCode::NOT_FOUND);
    assert_eq!(get(&app, "k").await.0, StatusCode::NOT_FOUND);

    let json = stats(&app).await;
    assert_eq!(json["evicted"], 0);
    assert_eq!(json["total_entries"], 0);
}

// == Errors ==

#[tokio::test]
async fn test_error_bodies() {
    let app = create_test_app(&Config::default());

    let (status, json) = get(&app, "absent").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Key not found: absent");

    let (status, json) = send(
        &app,
        Method::PUT,
        "/set",
        Some(r#"{"key":"","value":"v"}"#.to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("Key cannot be empty"));

    let (status, _) = send(&app, Method::PUT, "/set", Some(r#"{"key":"#.to_string())).await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app(&Config::default());

    let (status, json) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert!(json["timestamp"].as_str().is_some());
}
