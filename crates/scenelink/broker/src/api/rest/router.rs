//! API Router configuration

use super::handlers;
use super::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the broker router
pub fn create_router(state: AppState) -> Router {
    let router = Router::new()
        // Health
        .route("/health", get(handlers::health_check))
        // Publish leg
        .route("/events", get(handlers::stream_events))
        .route("/action", post(handlers::post_action))
        // Broadcast-and-collect
        .route("/run", post(handlers::post_run))
        .route("/api-request", post(handlers::post_run))
        // Response channels
        .route("/ws", get(handlers::response_channel))
        .layer(DefaultBodyLimit::max(state.server.max_body_size))
        .layer(TraceLayer::new_for_http());

    let router = if state.server.enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.with_state(state)
}
