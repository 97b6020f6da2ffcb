use axum::{extract::State, Json};
use serde_json::{json, Value as JsonValue};

use crate::state::AppState;

/// `GET /health`
pub async fn health_check(State(state): State<AppState>) -> Json<JsonValue> {
    let bus = &state.event_bus;
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "events_buffered": bus.len(),
        "latest_event_id": bus.latest_id(),
        "subscribers": bus.subscriber_count(),
        "active_streams": state.active_streams(),
    }))
}
