//! Minimal end-to-end walkthrough: register two in-memory engines, sync a
//! handful of documents, then show change detection skipping the rerun.
//!
//! Run with: `cargo run --example basic_usage`

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use index_sync::connector::memory::MemoryConnector;
use index_sync::{
    DataRecord, JobStatus, SyncJobConfig, SyncOperation, SyncService, SyncServiceConfig,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "index_sync=debug".into()),
        )
        .init();

    let service = SyncService::new(SyncServiceConfig::default());

    let primary = Arc::new(MemoryConnector::new("primary"));
    let search = Arc::new(MemoryConnector::new("search"));
    service.register_connector("primary", primary.clone());
    service.register_connector("search", search.clone());
    service.start();

    for i in 0..5 {
        primary.seed(DataRecord::new(
            format!("doc-{i}"),
            "document".into(),
            json!({"title": format!("Document {i}"), "scope_id": "kb-1"}),
            "primary".into(),
        ));
    }

    let config = SyncJobConfig::new("primary", "search", SyncOperation::BulkUpdate, "document")
        .with_batch_size(2)
        .with_on_progress(Arc::new(|job_id, done, total| {
            println!("[{job_id}] {done}/{total}");
        }));

    let job_id = service.submit_sync_job(config.clone()).expect("submit");
    let result = wait(&service, &job_id).await;
    println!(
        "first pass: {} ({} written, {} skipped)",
        result.status, result.success_items, result.skipped_items
    );

    // Nothing changed, so the rerun is a pure no-op
    let job_id = service.submit_sync_job(config).expect("submit");
    let result = wait(&service, &job_id).await;
    println!(
        "second pass: {} ({} written, {} skipped)",
        result.status, result.success_items, result.skipped_items
    );

    let stats = service.get_sync_statistics();
    println!(
        "stats: {} jobs tracked, {} checksums indexed",
        stats.total_jobs, stats.tracked_checksums
    );

    service.shutdown().await;
}

async fn wait(service: &SyncService, job_id: &str) -> index_sync::SyncJobResult {
    loop {
        if let Some(result) = service.get_job_status(job_id) {
            if result.status.is_terminal() || result.status == JobStatus::AwaitingResolution {
                return result;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
