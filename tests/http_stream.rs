//! End-to-end HTTP tests.
//!
//! Serves the router on a local port and follows the progress stream with
//! the bundled client, so line reassembly runs over a real connection.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::tempdir;

use sitereports::client::{ClientError, ProgressClient};
use sitereports::config::BulkConfig;
use sitereports::fetcher::{FetchError, FetchPhase, ReportFetcher, SessionError};
use sitereports::models::{DownloadJob, SiteRecord};
use sitereports::progress::ProgressSink;
use sitereports::repository::MemorySiteDirectory;
use sitereports::scheduler::{BulkRequest, BulkSite};
use sitereports::server::{create_router, AppState};
use sitereports::storage::ReportStore;

/// Emits a burst of long lines so responses span several chunks.
struct ChattyFetcher {
    store: ReportStore,
}

#[async_trait]
impl ReportFetcher for ChattyFetcher {
    async fn fetch(
        &self,
        job: &DownloadJob,
        progress: &dyn ProgressSink,
    ) -> Result<PathBuf, FetchError> {
        progress.emit("Starting download process...".to_string()).await;
        for i in 0..20 {
            progress
                .emit(format!("step {} - ünïcödé {}", i, "x".repeat(512)))
                .await;
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        if job.domain_name == "broken.com" {
            return Err(FetchError::new(
                &job.domain_name,
                FetchPhase::Export,
                SessionError::NotReady {
                    target: "'button'".into(),
                    waited: Duration::from_secs(30),
                },
            ));
        }
        self.store.ensure_dir().await.unwrap();
        let path = self.store.path_for(&job.domain_name).unwrap();
        tokio::fs::write(&path, b"xlsx").await.unwrap();
        progress.emit("Download completed".to_string()).await;
        Ok(path)
    }
}

async fn spawn_server() -> (String, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let store = ReportStore::new(dir.path().join("reports"));
    let state = AppState {
        fetcher: Arc::new(ChattyFetcher {
            store: store.clone(),
        }),
        sites: Arc::new(MemorySiteDirectory::new(vec![
            SiteRecord::new("example.com", 1000, vec!["EN".into()]),
            SiteRecord::new("broken.com", 0, vec![]),
        ])),
        store,
        bulk: BulkConfig::default(),
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, create_router(state)).await.unwrap();
    });
    (format!("http://{}", addr), dir)
}

#[tokio::test]
async fn single_download_over_http() {
    let (url, dir) = spawn_server().await;
    let client = ProgressClient::new(&url).unwrap();

    let mut seen = 0;
    let events = client.download("example.com", |_| seen += 1).await.unwrap();

    assert_eq!(seen, events.len());
    assert_eq!(events.len(), 23);
    assert_eq!(events[0].status, "Starting download process...");
    assert!(events[5].status.contains("ünïcödé"));
    assert_eq!(
        events.last().unwrap().status,
        "Report downloaded successfully"
    );
    assert!(dir.path().join("reports/example.com.xlsx").exists());
}

#[tokio::test]
async fn unknown_site_over_http() {
    let (url, _dir) = spawn_server().await;
    let client = ProgressClient::new(&url).unwrap();

    let events = client.download("nope.com", |_| {}).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, "Site not found");
}

#[tokio::test]
async fn bulk_download_over_http() {
    let (url, _dir) = spawn_server().await;
    let client = ProgressClient::new(&url).unwrap();

    let request = BulkRequest {
        sites: ["a.com", "broken.com", "c.com"]
            .iter()
            .map(|d| BulkSite {
                domain_name: d.to_string(),
                language: Some("en".into()),
                monthly_visitors: 10,
            })
            .collect(),
        concurrency: Some(3),
    };
    let events = client.bulk(&request, |_| {}).await.unwrap();
    let lines: Vec<&str> = events.iter().map(|e| e.status.as_str()).collect();

    assert_eq!(lines[0], "Starting bulk download for 3 sites with concurrency 3");
    assert_eq!(*lines.last().unwrap(), "All downloads completed");
    assert!(lines.contains(
        &"Error processing broken.com: exporting report: 'button' did not appear within 30s"
    ));
    assert_eq!(
        lines
            .iter()
            .filter(|l| l.starts_with("Completed download for "))
            .count(),
        2
    );
}

#[tokio::test]
async fn rejected_bulk_request_carries_server_message() {
    let (url, _dir) = spawn_server().await;
    let client = ProgressClient::new(&url).unwrap();

    let request = BulkRequest {
        sites: vec![],
        concurrency: None,
    };
    match client.bulk(&request, |_| {}).await {
        Err(ClientError::Rejected { status, message }) => {
            assert_eq!(status.as_u16(), 400);
            assert_eq!(message, "Invalid sites data: Empty or not an array");
        }
        other => panic!("expected a rejection, got {:?}", other.map(|e| e.len())),
    }
}
