//! HTTP handlers for tasksync-api.

pub mod health;
pub mod sync;

pub use health::health_check;
pub use sync::{poll_events, stream_events};
