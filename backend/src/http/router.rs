//! Router configuration for the HTTP API.
//!
//! This module sets up all routes, middleware (CORS, compression, tracing),
//! and creates the axum router ready for serving.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::state::AppState;

/// Largest accepted request body; sized for batch imports.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Create the main application router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration - permissive for development, should be restricted in production
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Snapshot CRUD
        .route(
            "/utilization",
            get(handlers::list_snapshots).post(handlers::create_snapshot),
        )
        .route("/utilization/import", post(handlers::import_snapshots))
        .route("/utilization/aggregate", get(handlers::aggregate_utilization))
        .route(
            "/utilization/{id}",
            get(handlers::get_snapshot)
                .patch(handlers::update_snapshot)
                .delete(handlers::delete_snapshot),
        )
        // Per-aircraft views
        .route("/aircraft", get(handlers::list_aircraft))
        .route(
            "/aircraft/{aircraft_id}/utilization/latest",
            get(handlers::latest_snapshot),
        )
        .route(
            "/aircraft/{aircraft_id}/utilization/deltas",
            get(handlers::get_daily_deltas),
        );

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/v1", api_v1)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
