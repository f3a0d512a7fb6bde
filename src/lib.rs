// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod analysis;
pub mod api;
pub mod config;
pub mod enrich;
pub mod ingest;
pub mod llm;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod recommend;
pub mod select;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::model::{
    ChannelRecord, FetchTask, RecommendationRequest, RecommendationResult, SourceKind, VideoRecord,
};
pub use crate::pipeline::{PipelineOutcome, RequestContext};

use tracing::{info, warn};

/// One-off smoke test of the configured LLM client. Call after tracing init;
/// never fails the caller on a bad answer, it only logs the result.
///
/// ```ignore
/// if let Err(e) = tube_curator::run_llm_quick_probe().await {
///     tracing::warn!(error=?e, "LLM quick probe didn't run");
/// }
/// ```
pub async fn run_llm_quick_probe() -> anyhow::Result<()> {
    let cfg = config::LlmConfig::load_default()?;
    // Only provider + enabled + key length, never the key.
    info!(
        model = %cfg.model,
        enabled = cfg.enabled,
        key_len = cfg.api_key.len(),
        "llm config loaded"
    );
    if !cfg.enabled {
        warn!("llm quick probe skipped: disabled in config");
        return Ok(());
    }
    let pipeline_cfg = config::pipeline::load_default()?;
    let client = llm::build_client_from_config(&cfg, pipeline_cfg.llm_timeout());
    let out = client.generate("Reply with the single word OK.").await;
    info!(provider = client.provider_name(), result = ?out, "llm quick probe finished");
    Ok(())
}
