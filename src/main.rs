//! Feed service binary entrypoint.
//! Boots the Axum HTTP server: loads config, wires the store, adapters and
//! routes, and starts the optional ingest scheduler.

use anyhow::Context;
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use webarc_feed::ingest::config;

/// Compact local logs. Shuttle may already own the global subscriber, in which
/// case this is a no-op.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("webarc_feed=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = config::load_default().context("loading feed config")?;
    tracing::info!(
        sources = cfg.sources.len(),
        snapshot = ?cfg.snapshot_path,
        "feed config loaded"
    );

    let router = webarc_feed::app(&cfg)?;
    Ok(router.into())
}
