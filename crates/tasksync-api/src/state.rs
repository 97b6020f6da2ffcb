//! Shared application state.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tasksync_core::defaults;
use tasksync_core::{BoardLookup, EventBus};

/// State handed to every handler. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub event_bus: EventBus,
    pub boards: Arc<dyn BoardLookup>,
    pub heartbeat_interval: Duration,
    active_streams: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(event_bus: EventBus, boards: Arc<dyn BoardLookup>) -> Self {
        Self {
            event_bus,
            boards,
            heartbeat_interval: defaults::sse_heartbeat_interval(),
            active_streams: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Number of open SSE responses.
    pub fn active_streams(&self) -> usize {
        self.active_streams.load(Ordering::SeqCst)
    }

    /// Count a new SSE response until the returned guard is dropped.
    pub(crate) fn open_stream(&self) -> StreamGuard {
        let active = self.active_streams.fetch_add(1, Ordering::SeqCst) + 1;
        StreamGuard {
            counter: Arc::clone(&self.active_streams),
            active_at_open: active,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("event_bus", &self.event_bus)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("active_streams", &self.active_streams())
            .finish_non_exhaustive()
    }
}

/// Decrements the open-stream counter on drop.
#[derive(Debug)]
pub(crate) struct StreamGuard {
    counter: Arc<AtomicUsize>,
    active_at_open: usize,
}

impl StreamGuard {
    pub(crate) fn active_at_open(&self) -> usize {
        self.active_at_open
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        let remaining = self.counter.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        tracing::info!(
            subsystem = "api",
            component = "sse",
            op = "disconnect",
            active_streams = remaining,
            "SSE client disconnected"
        );
    }
}
