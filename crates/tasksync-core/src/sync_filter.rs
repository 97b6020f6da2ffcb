//! Filters applied to replayed events before they are returned to a client.
//!
//! Filters never touch the [`EventBus`](crate::EventBus); they operate on a
//! query snapshot. Active filters combine with AND logic, in this order:
//!
//! 1. **Type**: `"{resource}.{action}"` must be in the requested set.
//! 2. **Board** (derived): the event must concern the requested board.
//!    - `board` events compare `data.board.id`;
//!    - `task` events carry only `data.task.column_id`, which is resolved
//!      through a [`BoardLookup`]. Lookups for all candidates run
//!      concurrently; a failed lookup excludes that event only;
//!    - anything else compares `data.board_id`.
//! 3. **Priority**: `data.task.priority` must equal the requested value.
//!
//! # Example
//!
//! ```
//! use tasksync_core::{EventTypeFilter, SyncFilter};
//!
//! let filter = SyncFilter::new()
//!     .with_types(EventTypeFilter::parse("task.created, task.updated"))
//!     .with_board(3);
//! assert!(filter.needs_lookup());
//! ```

use std::collections::HashSet;
use std::time::Instant;

use futures::future::join_all;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::events::Event;
use crate::traits::BoardLookup;

// =============================================================================
// TYPE FILTER
// =============================================================================

/// Set of accepted `"{resource}.{action}"` strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventTypeFilter {
    types: HashSet<String>,
}

impl EventTypeFilter {
    /// Parse a comma-separated list such as `"task.created, board.updated"`.
    ///
    /// Entries are trimmed and blanks dropped. Returns `None` when nothing
    /// remains, meaning "no type filter".
    pub fn parse(list: &str) -> Option<Self> {
        Self::from_types(list.split(','))
    }

    /// Build from individual type strings; `None` when all are blank.
    pub fn from_types<I, S>(types: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let types: HashSet<String> = types
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if types.is_empty() {
            None
        } else {
            Some(Self { types })
        }
    }

    pub fn matches(&self, event: &Event) -> bool {
        self.types.contains(&event.event_type())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

// =============================================================================
// COMPOSED FILTER
// =============================================================================

/// All filters a polling client can request.
#[derive(Debug, Clone, Default)]
pub struct SyncFilter {
    pub types: Option<EventTypeFilter>,
    pub board_id: Option<i64>,
    pub priority: Option<String>,
}

impl SyncFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_types(mut self, types: Option<EventTypeFilter>) -> Self {
        self.types = types;
        self
    }

    pub fn with_board(mut self, board_id: i64) -> Self {
        self.board_id = Some(board_id);
        self
    }

    pub fn with_priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    /// True when no filter is active.
    pub fn is_empty(&self) -> bool {
        self.types.is_none() && self.board_id.is_none() && self.priority.is_none()
    }

    /// True when applying the filter may hit the [`BoardLookup`].
    pub fn needs_lookup(&self) -> bool {
        self.board_id.is_some()
    }

    /// Keep the events that pass every active filter, preserving order.
    pub async fn apply(&self, events: Vec<Event>, lookup: &dyn BoardLookup) -> Vec<Event> {
        let mut events = events;

        if let Some(types) = &self.types {
            events.retain(|e| types.matches(e));
        }

        if let Some(board_id) = self.board_id {
            events = filter_by_board(events, board_id, lookup).await;
        }

        if let Some(priority) = self.priority.as_deref() {
            events.retain(|e| {
                task_field(&e.data, "priority").and_then(JsonValue::as_str) == Some(priority)
            });
        }

        events
    }
}

// =============================================================================
// BOARD FILTER
// =============================================================================

/// Keep events that belong to `board_id`, resolving task columns concurrently.
pub async fn filter_by_board(
    events: Vec<Event>,
    board_id: i64,
    lookup: &dyn BoardLookup,
) -> Vec<Event> {
    let start = Instant::now();
    let candidates = events.len();
    let verdicts = join_all(events.iter().map(|e| belongs_to_board(e, board_id, lookup))).await;

    let kept: Vec<Event> = events
        .into_iter()
        .zip(verdicts)
        .filter_map(|(event, keep)| keep.then_some(event))
        .collect();

    debug!(
        subsystem = "events",
        component = "sync_filter",
        op = "board_filter",
        board_id,
        candidates,
        result_count = kept.len(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Board filter applied"
    );
    kept
}

async fn belongs_to_board(event: &Event, board_id: i64, lookup: &dyn BoardLookup) -> bool {
    match event.resource.as_str() {
        "board" => {
            if let Some(board) = present(event.data.get("board")) {
                return board.get("id").and_then(JsonValue::as_i64) == Some(board_id);
            }
        }
        "task" => {
            if present(event.data.get("task")).is_some() {
                return task_on_board(event, board_id, lookup).await;
            }
        }
        _ => {}
    }
    event.data.get("board_id").and_then(JsonValue::as_i64) == Some(board_id)
}

async fn task_on_board(event: &Event, board_id: i64, lookup: &dyn BoardLookup) -> bool {
    let Some(column_id) = task_field(&event.data, "column_id").and_then(JsonValue::as_i64) else {
        return false;
    };
    match lookup.board_for_column(column_id).await {
        Ok(found) => found == Some(board_id),
        Err(e) => {
            warn!(
                subsystem = "events",
                component = "sync_filter",
                op = "board_lookup",
                event_id = %event.id,
                column_id,
                error = %e,
                "Column lookup failed; excluding event"
            );
            false
        }
    }
}

fn present(value: Option<&JsonValue>) -> Option<&JsonValue> {
    value.filter(|v| !v.is_null())
}

fn task_field<'a>(data: &'a JsonValue, field: &str) -> Option<&'a JsonValue> {
    present(data.get("task")).and_then(|task| task.get(field))
}
