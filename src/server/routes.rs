//! Router configuration for the web server.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        // Streaming downloads
        .route(
            "/api/sites/:domain/download-report",
            get(handlers::download_report),
        )
        .route("/api/sites/bulk-download", post(handlers::bulk_download))
        // Stored reports
        .route("/api/sites/check-excel", get(handlers::check_excel))
        .route(
            "/api/sites/:domain/delete-excel",
            delete(handlers::delete_excel),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
