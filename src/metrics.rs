// src/metrics.rs
//! Prometheus exposition for the ingest pipeline.

use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// Adapter fetch latency buckets, in milliseconds.
const FETCH_MS_BUCKETS: &[f64] = &[
    50.0, 100.0, 250.0, 500.0, 1_000.0, 2_500.0, 5_000.0, 10_000.0, 15_000.0, 30_000.0,
];

/// Register help text for every ingest series once, so they render with
/// `# HELP` lines as soon as a recorder is installed.
pub fn describe_ingest_series() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_runs_total", "Scheduled ingest passes.");
        describe_counter!("ingest_items_fetched_total", "Items returned by adapters.");
        describe_counter!(
            "ingest_items_skipped_total",
            "Malformed items skipped inside otherwise valid payloads."
        );
        describe_counter!("ingest_inserted_total", "Items inserted as new drafts.");
        describe_counter!("ingest_updated_total", "Existing items refreshed.");
        describe_counter!(
            "ingest_source_errors_total",
            "Adapter fetch/parse failures and timeouts."
        );
        describe_counter!("ingest_write_errors_total", "Upserts rejected by the store.");
        describe_histogram!("ingest_fetch_ms", "Adapter fetch time in milliseconds.");
        describe_gauge!(
            "ingest_pipeline_last_run_ts",
            "Unix ts when ingest pipeline last ran."
        );
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Fails if one is already installed.
    pub fn init() -> Result<Self, BuildError> {
        let handle = PrometheusBuilder::new()
            .set_buckets_for_metric(Matcher::Full("ingest_fetch_ms".into()), FETCH_MS_BUCKETS)?
            .install_recorder()?;
        describe_ingest_series();
        Ok(Self { handle })
    }

    /// `/metrics` in the Prometheus text format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
