//! Stored report endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use super::super::AppState;
use crate::storage::ReportStoreError;

#[derive(Debug, Deserialize)]
pub struct CheckParams {
    pub domain: Option<String>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// Whether a report exists for `?domain=`.
pub async fn check_excel(
    State(state): State<AppState>,
    Query(params): Query<CheckParams>,
) -> Response {
    let Some(domain) = params.domain.filter(|d| !d.trim().is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "Domain is required");
    };

    let path = match state.store.path_for(&domain) {
        Ok(path) => path,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };
    let exists = match state.store.exists(&domain).await {
        Ok(exists) => exists,
        Err(e) => {
            error!("Error checking report for {}: {}", domain, e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Error checking Excel file");
        }
    };

    Json(json!({
        "exists": exists,
        "filePath": path.display().to_string(),
    }))
    .into_response()
}

/// Delete the stored report for a domain.
pub async fn delete_excel(
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> Response {
    match state.store.delete(&domain).await {
        Ok(path) => {
            info!("Deleted report {}", path.display());
            Json(json!({ "message": "Excel file deleted successfully" })).into_response()
        }
        Err(e @ ReportStoreError::InvalidDomain(_)) => {
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e) => {
            error!("Error deleting Excel file for {}: {}", domain, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Error deleting Excel file")
        }
    }
}
