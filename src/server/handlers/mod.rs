//! HTTP request handlers for the web server.

mod downloads;
mod reports;

use axum::{http::StatusCode, response::IntoResponse};

pub use downloads::{bulk_download, download_report};
pub use reports::{check_excel, delete_excel};

/// Health check endpoint for container orchestration.
pub async fn health() -> impl IntoResponse {
    StatusCode::OK
}
