// src/lib.rs
// Public library surface for integration tests and the binary.

pub mod api;
pub mod ingest;
pub mod metrics;
pub mod pagination;
pub mod store;

pub use crate::api::{router, AppState};
pub use crate::ingest::Pipeline;
pub use crate::pagination::PaginationService;
pub use crate::store::{FeedStore, MemoryFeedStore};

use tracing::info;

/// Build the full application router from a config: feed API plus `/metrics`,
/// with the periodic ingest scheduler started when configured.
///
/// Installing the Prometheus recorder fails if one already exists (e.g. a second
/// call in the same process); the app then runs without `/metrics`.
pub fn app(cfg: &ingest::config::FeedConfig) -> anyhow::Result<axum::Router> {
    let state = AppState::from_config(cfg)?;
    let metrics = metrics::Metrics::init()
        .inspect_err(|e| tracing::warn!(error = %e, "prometheus recorder not installed"))
        .ok();

    let interval = std::time::Duration::from_secs(cfg.ingest_interval_secs);
    if ingest::scheduler::spawn_scheduler(state.pipeline.clone(), state.adapters.to_vec(), interval)
        .is_some()
    {
        info!(interval_secs = cfg.ingest_interval_secs, "ingest scheduler started");
    }

    let router = api::router(state);
    Ok(match metrics {
        Some(m) => router.merge(m.router()),
        None => router,
    })
}
