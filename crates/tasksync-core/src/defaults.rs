//! Centralized default constants for tasksync.
//!
//! **This module is the single source of truth** for shared default values.
//! Configuration loaders fall back to these when an environment variable is
//! absent or unparseable.

use std::time::Duration;

// =============================================================================
// EVENT LOG
// =============================================================================

/// Maximum number of events retained for replay before FIFO eviction.
pub const EVENT_LOG_CAPACITY: usize = 1000;

/// Small capacity for unit tests that exercise eviction.
pub const EVENT_LOG_CAPACITY_TEST: usize = 32;

// =============================================================================
// STREAMING
// =============================================================================

/// Interval between SSE heartbeat frames, in seconds.
pub const SSE_HEARTBEAT_SECS: u64 = 30;

/// Event name used for heartbeat frames.
pub const SSE_HEARTBEAT_EVENT: &str = "heartbeat";

/// Payload carried by heartbeat frames.
pub const SSE_HEARTBEAT_DATA: &str = "{}";

/// Heartbeat interval as a [`Duration`].
pub const fn sse_heartbeat_interval() -> Duration {
    Duration::from_secs(SSE_HEARTBEAT_SECS)
}

// =============================================================================
// SERVER
// =============================================================================

/// Default bind host.
pub const SERVER_HOST: &str = "0.0.0.0";

/// Default bind port.
pub const SERVER_PORT: u16 = 3000;

/// Default SQLite database URL (shared with the task/board service).
pub const DATABASE_URL: &str = "sqlite://tasks.db";

/// Default origins allowed by CORS when `ALLOWED_ORIGINS` is unset or empty.
pub const ALLOWED_ORIGINS: &[&str] = &["http://localhost:3000", "http://localhost:5173"];

// =============================================================================
// DATABASE POOL
// =============================================================================

/// Maximum number of pooled SQLite connections.
pub const DB_MAX_CONNECTIONS: u32 = 5;

/// Pool acquire timeout, in seconds.
pub const DB_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Idle connection timeout, in seconds.
pub const DB_IDLE_TIMEOUT_SECS: u64 = 600;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_interval_matches_secs() {
        assert_eq!(sse_heartbeat_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_capacities_are_positive() {
        assert!(EVENT_LOG_CAPACITY > 0);
        assert!(EVENT_LOG_CAPACITY_TEST > 0);
        assert!(EVENT_LOG_CAPACITY_TEST < EVENT_LOG_CAPACITY);
    }

    #[test]
    fn test_heartbeat_data_is_empty_json_object() {
        let parsed: serde_json::Value = serde_json::from_str(SSE_HEARTBEAT_DATA).unwrap();
        assert!(parsed.as_object().is_some_and(|o| o.is_empty()));
    }
}
