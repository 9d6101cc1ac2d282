// src/ingest/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::task::JoinHandle;

use crate::ingest::types::SourceAdapter;
use crate::ingest::Pipeline;

/// Spawn a periodic ingestion of `adapters`. Returns `None` when `interval` is zero.
///
/// Ticks that fall behind are skipped, so a slow pass never queues up a burst
/// of back-to-back runs.
pub fn spawn_scheduler(
    pipeline: Pipeline,
    adapters: Vec<Arc<dyn SourceAdapter>>,
    interval: Duration,
) -> Option<JoinHandle<()>> {
    if interval.is_zero() {
        return None;
    }
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let report = pipeline.ingest(&adapters).await;
            counter!("ingest_runs_total").increment(1);
            tracing::info!(
                target: "ingest",
                inserted = report.inserted,
                updated = report.updated,
                failed = report.failed.len(),
                "scheduled ingest tick"
            );
        }
    }))
}
