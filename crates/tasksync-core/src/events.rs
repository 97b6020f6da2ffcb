//! Event records and replay queries.
//!
//! An [`Event`] is an immutable record of a domain mutation (`task.created`,
//! `board.updated`, ...). Events are created only by
//! [`EventBus::emit`](crate::EventBus::emit), which assigns the id and the
//! capture timestamp.
//!
//! ## Wire Format
//!
//! ```text
//! {"id":"42","resource":"task","action":"created","timestamp":"2026-01-01T09:30:00.000Z","data":{...}}
//! ```
//!
//! Ids serialize as decimal strings so clients can hand them back verbatim as
//! a `Last-Event-ID` cursor.

use std::collections::VecDeque;
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;

// ============================================================================
// Event identifier
// ============================================================================

/// Monotonic event identifier, unique within one [`EventBus`](crate::EventBus).
///
/// Allocated from a per-bus counter starting at 1, so ordering does not depend
/// on the clock and events appended within the same millisecond stay totally
/// ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(u64);

impl EventId {
    /// The first id a fresh bus hands out.
    pub const FIRST: EventId = EventId(1);

    pub const fn new(seq: u64) -> Self {
        Self(seq)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    pub(crate) const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EventId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(EventId)
    }
}

impl Serialize for EventId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EventId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse()
            .map_err(|_| de::Error::custom(format!("invalid event id '{}'", s)))
    }
}

// ============================================================================
// Event
// ============================================================================

/// A single entry of the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    /// Entity type the event concerns (e.g. `"task"`, `"board"`).
    pub resource: String,
    /// What happened (e.g. `"created"`, `"updated"`, `"deleted"`).
    pub action: String,
    /// Capture time. Never decreases across events of one bus.
    #[serde(with = "iso_millis")]
    pub timestamp: DateTime<Utc>,
    /// Opaque payload supplied by the emitter.
    pub data: JsonValue,
}

impl Event {
    /// Namespaced event type, `"{resource}.{action}"`.
    ///
    /// Used as the SSE `event:` field and matched by the type filter.
    pub fn event_type(&self) -> String {
        format!("{}.{}", self.resource, self.action)
    }
}

/// ISO-8601 with millisecond precision and a `Z` suffix.
mod iso_millis {
    use super::*;

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(de::Error::custom)
    }
}

// ============================================================================
// Replay query
// ============================================================================

/// Selection of retained events for replay.
///
/// Precedence: `last_event_id` wins over `since`. A cursor that is malformed
/// or no longer retained selects the whole buffer, so a client with a stale
/// cursor resyncs instead of failing. `limit` keeps the newest events of the
/// selection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventQuery {
    /// Inclusive lower bound on `timestamp`.
    pub since: Option<DateTime<Utc>>,
    /// Cursor: return events strictly after this id.
    pub last_event_id: Option<String>,
    /// Maximum number of events, counted from the newest.
    pub limit: Option<usize>,
}

impl EventQuery {
    /// Query for the whole retained buffer.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn after(mut self, last_event_id: impl Into<String>) -> Self {
        self.last_event_id = Some(last_event_id.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Apply the query to an id-ordered buffer.
    pub(crate) fn select(&self, events: &VecDeque<Event>) -> Vec<Event> {
        let mut start = match self.last_event_id.as_deref() {
            Some(cursor) => Self::cursor_floor(events, cursor),
            None => match self.since {
                Some(since) => events.partition_point(|e| e.timestamp < since),
                None => 0,
            },
        };

        if let Some(limit) = self.limit {
            start = start.max(events.len().saturating_sub(limit));
        }

        events.range(start..).cloned().collect()
    }

    /// Index of the first event after `cursor`, or 0 when the cursor is unknown.
    fn cursor_floor(events: &VecDeque<Event>, cursor: &str) -> usize {
        let Ok(id) = cursor.parse::<EventId>() else {
            return 0;
        };
        match events.binary_search_by_key(&id, |e| e.id) {
            Ok(idx) => idx + 1,
            Err(_) => 0,
        }
    }
}
