//! In-process tests for `GET /api/sync/stream`.
//!
//! Tests verify:
//! - SSE response headers
//! - backlog replay followed by live frames, with no duplicate or gap
//! - `Last-Event-ID` header priority over the `lastEventId` parameter
//! - heartbeat frames after the configured interval
//! - events whose type cannot be framed are skipped, not fatal
//! - closing the response body releases the listener

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, BodyDataStream},
    http::{header, Request, StatusCode},
    Router,
};
use futures::StreamExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use tasksync_api::{router, AppState};
use tasksync_core::{EventBus, InMemoryBoardLookup};

// Longer than two heartbeat periods so paused-clock tests reach them first.
const FRAME_TIMEOUT: Duration = Duration::from_secs(120);

fn setup(heartbeat: Duration) -> (Router, AppState, EventBus) {
    let bus = EventBus::new(16);
    let state = AppState::new(bus.clone(), Arc::new(InMemoryBoardLookup::new()))
        .with_heartbeat(heartbeat);
    (router(state.clone()), state, bus)
}

/// Incremental reader splitting an SSE body into frames.
struct FrameReader {
    body: BodyDataStream,
    buffer: String,
}

impl FrameReader {
    fn new(body: Body) -> Self {
        Self {
            body: body.into_data_stream(),
            buffer: String::new(),
        }
    }

    /// Next frame as a field map (`id`, `event`, `data`).
    async fn next_frame(&mut self) -> HashMap<String, String> {
        loop {
            if let Some(end) = self.buffer.find("\n\n") {
                let raw: String = self.buffer.drain(..end + 2).collect();
                return parse_frame(&raw);
            }
            let chunk = tokio::time::timeout(FRAME_TIMEOUT, self.body.next())
                .await
                .expect("timed out waiting for frame")
                .expect("stream ended")
                .expect("body error");
            self.buffer.push_str(std::str::from_utf8(&chunk).unwrap());
        }
    }

    /// Next frame that is not a heartbeat.
    async fn next_event(&mut self) -> HashMap<String, String> {
        loop {
            let frame = self.next_frame().await;
            if frame.get("event").map(String::as_str) != Some("heartbeat") {
                return frame;
            }
        }
    }
}

fn parse_frame(raw: &str) -> HashMap<String, String> {
    raw.lines()
        .filter(|line| !line.is_empty() && !line.starts_with(':'))
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            Some((key.to_string(), value.strip_prefix(' ').unwrap_or(value).to_string()))
        })
        .collect()
}

async fn open(app: &Router, uri: &str, last_event_id: Option<&str>) -> axum::response::Response {
    let mut request = Request::get(uri);
    if let Some(id) = last_event_id {
        request = request.header("Last-Event-ID", id);
    }
    app.clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_stream_headers() {
    let (app, _state, _bus) = setup(Duration::from_secs(30));
    let response = open(&app, "/api/sync/stream", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream");
    assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
}

#[tokio::test]
async fn test_stream_replays_backlog_then_live() {
    let (app, _state, bus) = setup(Duration::from_secs(30));
    bus.emit("task", "created", json!({"task": {"id": 1}}));
    bus.emit("task", "updated", json!({"task": {"id": 1, "title": "Renamed"}}));

    let response = open(&app, "/api/sync/stream", None).await;
    let mut reader = FrameReader::new(response.into_body());

    let first = reader.next_event().await;
    assert_eq!(first["id"], "1");
    assert_eq!(first["event"], "task.created");
    let data: Value = serde_json::from_str(&first["data"]).unwrap();
    assert_eq!(data["id"], "1");
    assert_eq!(data["resource"], "task");
    assert_eq!(data["data"]["task"]["id"], 1);

    let second = reader.next_event().await;
    assert_eq!(second["id"], "2");
    assert_eq!(second["event"], "task.updated");

    bus.emit("board", "deleted", json!({"board": {"id": 4}}));
    let live = reader.next_event().await;
    assert_eq!(live["id"], "3");
    assert_eq!(live["event"], "board.deleted");
}

#[tokio::test]
async fn test_stream_resumes_from_query_cursor() {
    let (app, _state, bus) = setup(Duration::from_secs(30));
    for i in 0..4 {
        bus.emit("task", "updated", json!({"i": i}));
    }

    let response = open(&app, "/api/sync/stream?lastEventId=2", None).await;
    let mut reader = FrameReader::new(response.into_body());
    assert_eq!(reader.next_event().await["id"], "3");
    assert_eq!(reader.next_event().await["id"], "4");

    bus.emit("task", "updated", json!({"i": 4}));
    assert_eq!(reader.next_event().await["id"], "5");
}

#[tokio::test]
async fn test_last_event_id_header_beats_query() {
    let (app, _state, bus) = setup(Duration::from_secs(30));
    for i in 0..4 {
        bus.emit("task", "updated", json!({"i": i}));
    }

    let response = open(&app, "/api/sync/stream?lastEventId=1", Some("3")).await;
    let mut reader = FrameReader::new(response.into_body());
    assert_eq!(reader.next_event().await["id"], "4");

    bus.emit("task", "updated", json!({"i": 4}));
    assert_eq!(reader.next_event().await["id"], "5");
}

#[tokio::test]
async fn test_stream_limit_applies_to_backlog() {
    let (app, _state, bus) = setup(Duration::from_secs(30));
    for i in 0..5 {
        bus.emit("task", "updated", json!({"i": i}));
    }

    let response = open(&app, "/api/sync/stream?limit=1", None).await;
    let mut reader = FrameReader::new(response.into_body());
    assert_eq!(reader.next_event().await["id"], "5");

    bus.emit("task", "updated", json!({"i": 5}));
    assert_eq!(reader.next_event().await["id"], "6");
}

#[tokio::test]
async fn test_line_break_in_event_type_is_skipped() {
    let (app, _state, bus) = setup(Duration::from_secs(30));
    bus.emit("task", "created\nevent: spoof", json!({}));
    bus.emit("task", "created", json!({"task": {"id": 2}}));

    // Replayed from the backlog.
    let response = open(&app, "/api/sync/stream", None).await;
    let mut reader = FrameReader::new(response.into_body());
    let frame = reader.next_event().await;
    assert_eq!(frame["id"], "2");
    assert_eq!(frame["event"], "task.created");

    // Delivered live.
    bus.emit("board", "updated\r", json!({}));
    bus.emit("board", "updated", json!({"board": {"id": 1}}));
    let frame = reader.next_event().await;
    assert_eq!(frame["id"], "4");
    assert_eq!(frame["event"], "board.updated");

    // Skipped events stay in the log.
    assert_eq!(bus.len(), 4);
}

#[tokio::test]
async fn test_stream_rejects_malformed_since() {
    let (app, _state, bus) = setup(Duration::from_secs(30));
    let response = open(&app, "/api/sync/stream?since=soon", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(bus.subscriber_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_after_interval() {
    let (app, _state, _bus) = setup(Duration::from_secs(30));
    let response = open(&app, "/api/sync/stream", None).await;
    let mut reader = FrameReader::new(response.into_body());

    let started = tokio::time::Instant::now();
    let frame = reader.next_frame().await;
    assert_eq!(frame["event"], "heartbeat");
    assert_eq!(frame["data"], "{}");
    assert!(!frame.contains_key("id"));
    assert!(started.elapsed() >= Duration::from_secs(30));

    let frame = reader.next_frame().await;
    assert_eq!(frame["event"], "heartbeat");
    assert!(started.elapsed() >= Duration::from_secs(60));
}

#[tokio::test]
async fn test_disconnect_releases_listener() {
    let (app, state, bus) = setup(Duration::from_secs(30));

    let first = open(&app, "/api/sync/stream", None).await;
    let second = open(&app, "/api/sync/stream", None).await;
    assert_eq!(bus.subscriber_count(), 2);
    assert_eq!(state.active_streams(), 2);

    drop(first);
    assert_eq!(bus.subscriber_count(), 1);
    assert_eq!(state.active_streams(), 1);

    // The remaining client keeps receiving.
    let mut reader = FrameReader::new(second.into_body());
    bus.emit("task", "created", json!({}));
    assert_eq!(reader.next_event().await["id"], "1");

    drop(reader);
    assert_eq!(bus.subscriber_count(), 0);
    assert_eq!(state.active_streams(), 0);

    // Emitting with no listeners still records the event.
    bus.emit("task", "created", json!({}));
    assert_eq!(bus.len(), 2);
}
