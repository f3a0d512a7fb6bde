//! tube-curator: binary entrypoint
//! Boots the Axum HTTP server with the pipeline state and the metrics route.

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tube_curator::api::{self, AppState};
use tube_curator::metrics::Metrics;

/// Enable compact tracing logs in development only.
/// Activation requires BOTH:
///   - dev environment (debug build OR SHUTTLE_ENV in {local, development, dev})
///   - CURATOR_DEV_LOG=1
fn enable_dev_tracing() {
    let dev_flag = std::env::var("CURATOR_DEV_LOG")
        .ok()
        .is_some_and(|v| v == "1");

    let is_dev_env = cfg!(debug_assertions)
        || matches!(
            std::env::var("SHUTTLE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        );

    if !(dev_flag && is_dev_env) {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("ingest=info,enrich=info,recommend=info,pipeline=info,api=info,warn")
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    enable_dev_tracing();

    if let Err(e) = tube_curator::run_llm_quick_probe().await {
        tracing::warn!(error = ?e, "LLM quick probe didn't run");
    }

    let state = AppState::from_env()?;
    let metrics = Metrics::init(&state.config)?;
    let router = api::router(state).merge(metrics.router());

    Ok(router.into())
}
