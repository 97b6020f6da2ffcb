//! Query parameters of the sync endpoints.
//!
//! Parameters arrive as raw strings and are validated here, so that a
//! malformed value produces a readable `400 {"error": ...}` instead of an
//! opaque extractor rejection. Blank values count as absent.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;

use tasksync_core::{EventQuery, EventTypeFilter, SyncFilter};

use crate::error::ApiError;

/// Query string accepted by `GET /api/sync/events` and `GET /api/sync/stream`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncQuery {
    /// Inclusive lower bound on event timestamps.
    pub since: Option<String>,
    /// Resume cursor; events strictly after this id.
    #[serde(rename = "lastEventId", alias = "last_event_id")]
    pub last_event_id: Option<String>,
    /// Keep at most this many of the newest matching events.
    pub limit: Option<String>,
    /// Comma-separated `resource.action` list.
    pub events: Option<String>,
    pub board_id: Option<String>,
    pub priority: Option<String>,
}

impl SyncQuery {
    /// Replay selection described by the query.
    ///
    /// `cursor_override` is the `Last-Event-ID` header of a reconnecting SSE
    /// client and takes priority over the `lastEventId` parameter.
    pub fn event_query(&self, cursor_override: Option<&str>) -> Result<EventQuery, ApiError> {
        let mut query = EventQuery::new();

        if let Some(since) = non_blank(&self.since) {
            query = query.since(parse_since(since)?);
        }

        let cursor = cursor_override
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .or_else(|| non_blank(&self.last_event_id));
        if let Some(cursor) = cursor {
            query = query.after(cursor);
        }

        if let Some(limit) = non_blank(&self.limit) {
            let limit = limit.parse::<usize>().map_err(|_| {
                ApiError::BadRequest(format!(
                    "Invalid limit '{}': expected a non-negative integer",
                    limit
                ))
            })?;
            query = query.limit(limit);
        }

        Ok(query)
    }

    /// Filters requested by a polling client.
    pub fn sync_filter(&self) -> Result<SyncFilter, ApiError> {
        let mut filter =
            SyncFilter::new().with_types(non_blank(&self.events).and_then(EventTypeFilter::parse));

        if let Some(board_id) = non_blank(&self.board_id) {
            let board_id = board_id.parse::<i64>().map_err(|_| {
                ApiError::BadRequest(format!(
                    "Invalid board_id '{}': expected an integer",
                    board_id
                ))
            })?;
            filter = filter.with_board(board_id);
        }

        if let Some(priority) = non_blank(&self.priority) {
            filter = filter.with_priority(priority);
        }

        Ok(filter)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Parse a `since` value.
///
/// Accepts:
/// - RFC 3339 with timezone: `2024-01-15T10:30:00Z`, `2024-01-15T10:30:00.250+02:00`
/// - ISO 8601 without timezone (assumes UTC): `2024-01-15T10:30:00`
/// - Date only (assumes midnight UTC): `2024-01-15`
pub fn parse_since(s: &str) -> Result<DateTime<Utc>, ApiError> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }

    Err(ApiError::BadRequest(format!(
        "Invalid since '{}': expected an ISO 8601 timestamp (e.g., '2024-01-15T10:30:00Z') or a date (e.g., '2024-01-15')",
        s
    )))
}
