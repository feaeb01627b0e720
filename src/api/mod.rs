//! API module
//!
//! HTTP API endpoints and middleware.

pub mod middleware;
pub mod routes;

use axum::Router;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub use routes::{create_router, AppState};

use middleware::{MakeRequestUuid, REQUEST_ID_HEADER};

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Build the application router with its middleware stack
pub fn build_app(state: AppState) -> Router {
    // Layers run outermost-last: request id is set before logging sees the request
    let api_router = create_router().layer(axum::middleware::from_fn(middleware::logging_middleware));

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .nest("/api/v1", api_router)
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER))
        .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuid))
        .with_state(state)
}
