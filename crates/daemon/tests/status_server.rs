//! Status API served from the projector's cache.

mod common;

use std::sync::atomic::Ordering;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use common::{manual_clock, ScriptedClient};
use keeper_core::model::RemoteState;
use keeper_core::RemoteError;
use keeper_daemon::http;
use keeper_daemon::status::{StatusCache, StatusProjector};
use serde_json::{json, Value};
use tower::ServiceExt;

const T: u64 = 1_700_000_000;

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn cold_start_is_service_unavailable() {
    let cache = StatusCache::new();
    let (status, body) = get(http::router(cache), "/api/status").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, json!({"error": "status not yet available"}));
}

#[tokio::test]
async fn failed_first_read_is_still_not_ready() {
    let client = ScriptedClient::new();
    let cache = StatusCache::new();
    let projector = StatusProjector::new(client.clone(), cache.clone());

    assert!(projector.refresh().await.is_err());
    let (status, _) = get(http::router(cache), "/api/status").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn serves_projected_countdown() {
    let client = ScriptedClient::new();
    client.set_fields(Ok(RemoteState {
        last_transition_timestamp: T,
        interval: 3_600,
    }));
    let (_now, clock) = manual_clock(T + 600);
    let cache = StatusCache::new();
    let projector = StatusProjector::with_clock(client.clone(), cache.clone(), clock);

    projector.refresh().await.unwrap();
    let (status, body) = get(http::router(cache), "/api/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"timeLeft": 3000, "isDrawing": false, "observedAt": T + 600})
    );
}

#[tokio::test]
async fn keeps_serving_last_snapshot_through_failed_refreshes() {
    let client = ScriptedClient::new();
    client.set_fields(Ok(RemoteState {
        last_transition_timestamp: T,
        interval: 3_600,
    }));
    let (now, clock) = manual_clock(T + 100);
    let cache = StatusCache::new();
    let projector = StatusProjector::with_clock(client.clone(), cache.clone(), clock);
    let good = projector.refresh().await.unwrap();

    client.set_fields(Err(RemoteError::unavailable("node down")));
    for step in 1..=5 {
        now.store(T + 100 + step * 5, Ordering::SeqCst);
        assert!(projector.refresh().await.is_err());
    }

    assert_eq!(cache.latest(), Some(good));
    let (status, body) = get(http::router(cache), "/api/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["observedAt"], json!(T + 100));
    assert_eq!(body["timeLeft"], json!(3_500));
}

#[tokio::test]
async fn healthz_is_ok() {
    let app = http::router(StatusCache::new());
    let response = app
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), 1024).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}
