//! Streaming download endpoints.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::FutureExt;
use serde_json::json;
use tracing::{error, info, warn};

use super::super::AppState;
use crate::models::DownloadJob;
use crate::progress::{
    progress_channel, ProgressChannel, ProgressSink, ProgressStream, PROGRESS_CONTENT_TYPE,
};
use crate::scheduler::{panic_message, BulkRequest, BulkRequestError, BulkScheduler};

impl IntoResponse for BulkRequestError {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

fn progress_response(stream: ProgressStream) -> Response {
    (
        [(header::CONTENT_TYPE, PROGRESS_CONTENT_TYPE)],
        Body::from_stream(stream.into_body_stream()),
    )
        .into_response()
}

/// Download one domain's report, streaming progress lines.
pub async fn download_report(
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> Response {
    let (channel, stream) = progress_channel();
    tokio::spawn(single_download(state, domain, Arc::new(channel)));
    progress_response(stream)
}

async fn single_download(state: AppState, domain: String, channel: Arc<ProgressChannel>) {
    let outcome = AssertUnwindSafe(run_single(&state, &domain, &channel))
        .catch_unwind()
        .await;
    if let Err(payload) = outcome {
        let message = panic_message(payload.as_ref());
        error!("Report download for {} panicked: {}", domain, message);
        channel
            .emit(format!("Error downloading report: {}", message))
            .await;
    }
    if let Err(e) = channel.close().await {
        warn!("Progress channel for {} already closed: {}", domain, e);
    }
}

async fn run_single(state: &AppState, domain: &str, channel: &ProgressChannel) {
    let site = match state.sites.find_by_domain(domain).await {
        Ok(Some(site)) => site,
        Ok(None) => {
            info!("Report requested for unknown site {}", domain);
            channel.emit("Site not found".to_string()).await;
            return;
        }
        Err(e) => {
            error!("Site lookup for {} failed: {}", domain, e);
            channel
                .emit(format!("Error downloading report: {}", e))
                .await;
            return;
        }
    };

    let job = DownloadJob::new(domain, Some(&site.report_language()), site.monthly);
    let status = match state.fetcher.fetch(&job, channel).await {
        Ok(_) => "Report downloaded successfully".to_string(),
        Err(e) => format!("Error downloading report: {}", e),
    };
    channel.emit(status).await;
}

/// Download reports for many domains, streaming progress lines.
///
/// Malformed bodies are rejected with 400 before any stream is opened.
pub async fn bulk_download(State(state): State<AppState>, body: Bytes) -> Response {
    let request = match BulkRequest::parse(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!("Rejected bulk download request: {}", e);
            return e.into_response();
        }
    };
    let plan = request.plan(&state.bulk);

    let (channel, stream) = progress_channel();
    let scheduler = BulkScheduler::new(state.fetcher.clone(), plan.concurrency);
    let channel = Arc::new(channel);
    tokio::spawn(async move { scheduler.run_to_channel(plan.jobs, channel).await });

    progress_response(stream)
}
