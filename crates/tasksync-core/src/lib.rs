//! # tasksync-core
//!
//! Ordered, bounded, replayable event log with live fan-out.
//!
//! Domain mutations are recorded through [`EventBus::emit`]; streaming clients
//! attach with [`EventBus::tail`] (backlog plus live events) and polling
//! clients read [`EventBus::events_since`], optionally narrowed by a
//! [`SyncFilter`].

pub mod defaults;
pub mod error;
pub mod event_bus;
pub mod events;
pub mod logging;
pub mod sync_filter;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use event_bus::{EventBus, EventTail, LiveEvents, Subscription};
pub use events::{Event, EventId, EventQuery};
pub use sync_filter::{filter_by_board, EventTypeFilter, SyncFilter};
pub use traits::{BoardLookup, InMemoryBoardLookup};
