//! Sync endpoints: catch-up polling and the live SSE stream.

use std::convert::Infallible;
use std::time::Instant;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::sse::{Event as SseEvent, Sse},
    Json,
};
use futures::Stream;
use tokio_stream::{wrappers::IntervalStream, StreamExt as _};
use tracing::{debug, info, warn};

use tasksync_core::defaults::{SSE_HEARTBEAT_DATA, SSE_HEARTBEAT_EVENT};
use tasksync_core::{Event, EventTail};

use crate::error::ApiError;
use crate::query_types::SyncQuery;
use crate::state::AppState;

/// Header a reconnecting `EventSource` sends with the last id it saw.
const LAST_EVENT_ID_HEADER: &str = "last-event-id";

/// `GET /api/sync/events`
///
/// Replays retained events (`since`, `lastEventId`, `limit`), then applies the
/// `events`, `board_id` and `priority` filters. The limit bounds the replay
/// before filtering.
pub async fn poll_events(
    State(state): State<AppState>,
    Query(params): Query<SyncQuery>,
) -> Result<Json<Vec<Event>>, ApiError> {
    let query = params.event_query(None)?;
    let filter = params.sync_filter()?;

    let start = Instant::now();
    let replayed = state.event_bus.events_since(&query);
    let replayed_count = replayed.len();

    let events = if filter.is_empty() {
        replayed
    } else {
        filter.apply(replayed, state.boards.as_ref()).await
    };

    debug!(
        subsystem = "api",
        component = "sync",
        op = "poll",
        last_event_id = query.last_event_id.as_deref(),
        replayed = replayed_count,
        result_count = events.len(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Poll served"
    );

    Ok(Json(events))
}

/// `GET /api/sync/stream`
///
/// Sends the backlog selected by the query (the `Last-Event-ID` header wins
/// over `lastEventId`), then every live event, interleaved with heartbeat
/// frames. The listener is released when the client goes away.
pub async fn stream_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<SyncQuery>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let header_cursor = headers
        .get(LAST_EVENT_ID_HEADER)
        .and_then(|v| v.to_str().ok());
    let query = params.event_query(header_cursor)?;

    let EventTail { backlog, live } = state.event_bus.tail(&query);
    let guard = state.open_stream();

    info!(
        subsystem = "api",
        component = "sse",
        op = "connect",
        last_event_id = query.last_event_id.as_deref(),
        backlog = backlog.len(),
        subscription = live.subscription().id(),
        active_streams = guard.active_at_open(),
        "SSE client connected"
    );

    let events = tokio_stream::iter(backlog)
        .chain(live)
        .filter_map(|event| event_frame(&event));

    let period = state.heartbeat_interval;
    let heartbeats = IntervalStream::new(tokio::time::interval_at(
        tokio::time::Instant::now() + period,
        period,
    ))
    .map(|_| heartbeat_frame());

    let stream = events.merge(heartbeats).map(move |frame| {
        // Dropped together with the response body.
        let _guard = &guard;
        Ok::<_, Infallible>(frame)
    });

    Ok(Sse::new(stream))
}

fn event_frame(event: &Event) -> Option<SseEvent> {
    // An `event:` line cannot carry a line break; such tags would end the frame.
    let event_type = event.event_type();
    if event_type.contains(|c| c == '\r' || c == '\n') {
        warn!(
            subsystem = "api",
            component = "sse",
            event_id = %event.id,
            event_type = %event_type.escape_debug(),
            "Dropping event whose type contains a line break"
        );
        return None;
    }

    match serde_json::to_string(event) {
        Ok(json) => Some(
            SseEvent::default()
                .id(event.id.to_string())
                .event(event_type)
                .data(json),
        ),
        Err(e) => {
            warn!(
                subsystem = "api",
                component = "sse",
                event_id = %event.id,
                error = %e,
                "Dropping event that failed to serialize"
            );
            None
        }
    }
}

fn heartbeat_frame() -> SseEvent {
    SseEvent::default()
        .event(SSE_HEARTBEAT_EVENT)
        .data(SSE_HEARTBEAT_DATA)
}
