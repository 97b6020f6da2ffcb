//! # tasksync-api
//!
//! HTTP surface of the tasksync event log:
//!
//! - `GET /api/sync/events`: catch-up polling with filters
//! - `GET /api/sync/stream`: live Server-Sent Events with replay
//! - `GET /health`: liveness and buffer statistics

pub mod config;
pub mod error;
pub mod handlers;
pub mod query_types;
pub mod state;
pub mod telemetry;

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

pub use config::ServerConfig;
pub use error::ApiError;
pub use state::AppState;

/// Request ID generator using UUIDv7 (time-ordered).
#[derive(Clone, Copy, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Build the application router with tracing and request-id middleware.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/sync/events", get(handlers::poll_events))
        .route("/api/sync/stream", get(handlers::stream_events))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TraceLayer::new_for_http()),
        )
        .with_state(state)
}

/// CORS policy for browser clients. `Last-Event-ID` is allowed so that
/// `EventSource` reconnects pass preflight.
pub fn cors_layer(allowed_origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::CACHE_CONTROL,
            header::HeaderName::from_static("last-event-id"),
        ])
        .max_age(Duration::from_secs(3600))
}
