//! API module
//!
//! HTTP API endpoints and middleware.

pub mod middleware;
pub mod routes;

use axum::{http::HeaderName, middleware as axum_middleware, routing::get, Router};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub use routes::{create_router, AppState};

/// Build the full application: `/health` plus the API under `/api`
pub fn build_app(state: AppState) -> Router {
    // Layers run in reverse order of addition: logging -> cancellation -> handler
    let api_routes = create_router()
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::cancellation_middleware,
        ))
        .layer(axum_middleware::from_fn(middleware::logging_middleware));

    let request_id = HeaderName::from_static(middleware::REQUEST_ID_HEADER);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
