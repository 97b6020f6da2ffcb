//! Structured logging schema and field name constants for tasksync.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation can query by the same names across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown, stream open/close) |
//! | DEBUG | Decision points, per-request query results |
//! | TRACE | Per-event iteration (emit, dispatch) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "api", "events", "db"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "event_bus", "sync_filter", "pool", "sse"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "emit", "dispatch", "events_since", "board_lookup"
pub const OPERATION: &str = "op";

// ─── Event fields ──────────────────────────────────────────────────────────

/// Event identifier (decimal sequence number).
pub const EVENT_ID: &str = "event_id";

/// Namespaced event type, `"{resource}.{action}"`.
pub const EVENT_TYPE: &str = "event_type";

/// Number of registered listeners at dispatch time.
pub const SUBSCRIBER_COUNT: &str = "subscriber_count";

/// Cursor supplied by a reconnecting client.
pub const LAST_EVENT_ID: &str = "last_event_id";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Board identifier used by the derived board filter.
pub const BOARD_ID: &str = "board_id";

/// Column identifier resolved to a board.
pub const COLUMN_ID: &str = "column_id";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of events returned by a query.
pub const RESULT_COUNT: &str = "result_count";

/// Number of currently open SSE streams.
pub const ACTIVE_STREAMS: &str = "active_streams";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
