//! `GET /health` and CORS behaviour of the assembled router.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderValue, Method, Request, StatusCode},
};
use serde_json::{json, Value};
use tower::ServiceExt;

use tasksync_api::{cors_layer, router, AppState};
use tasksync_core::{EventBus, InMemoryBoardLookup};

fn state(capacity: usize) -> AppState {
    AppState::new(EventBus::new(capacity), Arc::new(InMemoryBoardLookup::new()))
}

async fn health(state: &AppState) -> Value {
    let response = router(state.clone())
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_on_empty_bus() {
    let body = health(&state(8)).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["events_buffered"], 0);
    assert_eq!(body["latest_event_id"], Value::Null);
    assert_eq!(body["subscribers"], 0);
    assert_eq!(body["active_streams"], 0);
}

#[tokio::test]
async fn test_health_reports_buffer_and_listeners() {
    let state = state(2);
    for i in 0..3 {
        state.event_bus.emit("task", "created", json!({"i": i}));
    }
    let _sub = state.event_bus.subscribe(|_| {});

    let body = health(&state).await;
    assert_eq!(body["events_buffered"], 2);
    assert_eq!(body["latest_event_id"], "3");
    assert_eq!(body["subscribers"], 1);
}

#[tokio::test]
async fn test_cors_preflight_allows_configured_origin() {
    let origins = vec![HeaderValue::from_static("http://localhost:5173")];
    let app = router(state(4)).layer(cors_layer(origins));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/api/sync/stream")
                .header(header::ORIGIN, "http://localhost:5173")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "last-event-id")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:5173"
    );

    let response = app
        .oneshot(
            Request::get("/health")
                .header(header::ORIGIN, "https://evil.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}
