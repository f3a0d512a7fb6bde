// src/pipeline.rs
//! End-to-end flows over one request-scoped context:
//! fetch → enrich → build → retry loop, and the subscription box.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::enrich::{enrich_all, TranscriptSource};
use crate::ingest::orchestrator::{self, FetchReport};
use crate::ingest::types::SourceAdapter;
use crate::ingest::cap_per_channel;
use crate::llm::DynLlmClient;
use crate::model::{ChannelRecord, ExtractionAttempt, FetchTask, RecommendationResult, VideoRecord};
use crate::recommend::channel_filter::{filter_channels, match_channels};
use crate::recommend::{
    build_request, extract_recommendation, render_prompt, Extraction, RetryMachine, RetryOutcome,
};
use crate::select::select_within_budget;

/// Short, stable, non-reversible tag for free text in logs.
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceSelection {
    /// YouTube Data API; falls back to the scraper when no key is configured.
    #[default]
    Api,
    Scraper,
}

/// Shared, long-lived collaborators. Cheap to clone.
#[derive(Clone)]
pub struct Collaborators {
    pub quota_api: Option<Arc<dyn SourceAdapter>>,
    pub scraper: Arc<dyn SourceAdapter>,
    pub feed: Arc<dyn SourceAdapter>,
    pub transcripts: Arc<dyn TranscriptSource>,
    pub llm: DynLlmClient,
}

/// Everything one recommendation run needs. Built per request, never shared.
pub struct RequestContext {
    pub interests: String,
    pub budget_seconds: Option<u64>,
    /// Lower end of the accepted length range; 0 accepts everything.
    pub min_duration_seconds: u64,
    pub source: SourceSelection,
    pub config: Arc<PipelineConfig>,
    pub collaborators: Collaborators,
}

impl RequestContext {
    pub fn new(
        interests: impl Into<String>,
        config: Arc<PipelineConfig>,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            interests: interests.into(),
            budget_seconds: None,
            min_duration_seconds: 0,
            source: SourceSelection::default(),
            config,
            collaborators,
        }
    }

    pub fn with_budget_seconds(mut self, budget: u64) -> Self {
        self.budget_seconds = Some(budget);
        self
    }

    pub fn with_min_duration_seconds(mut self, min: u64) -> Self {
        self.min_duration_seconds = min;
        self
    }

    pub fn with_source(mut self, source: SourceSelection) -> Self {
        self.source = source;
        self
    }

    /// Adapter for search/trending/detail lookups according to `source`.
    pub fn primary_adapter(&self) -> Arc<dyn SourceAdapter> {
        match (self.source, &self.collaborators.quota_api) {
            (SourceSelection::Api, Some(api)) => Arc::clone(api),
            _ => Arc::clone(&self.collaborators.scraper),
        }
    }

    /// `min_duration_seconds <= duration <= budget`, the budget being optional.
    pub fn accepts_length(&self, record: &VideoRecord) -> bool {
        record.duration_seconds >= self.min_duration_seconds
            && self
                .budget_seconds
                .map_or(true, |budget| record.duration_seconds <= budget)
    }

    fn machine(&self) -> RetryMachine<'_> {
        RetryMachine::new(self.collaborators.llm.as_ref()).with_timeout(self.config.llm_timeout())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineOutcome {
    Recommended {
        result: RecommendationResult,
        record: VideoRecord,
    },
    /// No candidate with a transcript survived fetch, budget and enrichment.
    NothingFound,
    /// The model never produced a usable answer.
    RetryExhausted { attempts: Vec<ExtractionAttempt> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AboboxOutcome {
    Selected {
        channel_ids: Vec<String>,
        videos: Vec<VideoRecord>,
    },
    NothingFound,
    RetryExhausted { attempts: Vec<ExtractionAttempt> },
}

pub async fn recommend_from_trending(ctx: &RequestContext, region: &str) -> PipelineOutcome {
    let report = orchestrator::run(
        vec![FetchTask::trending(region)],
        ctx.primary_adapter(),
        &ctx.config.fetch_pool(),
    )
    .await;
    recommend_from_report(ctx, report).await
}

pub async fn recommend_from_query(ctx: &RequestContext, query: &str) -> PipelineOutcome {
    let report = orchestrator::run(
        vec![FetchTask::search(query)],
        ctx.primary_adapter(),
        &ctx.config.fetch_pool(),
    )
    .await;
    recommend_from_report(ctx, report).await
}

async fn recommend_from_report(ctx: &RequestContext, report: FetchReport) -> PipelineOutcome {
    if report.quota_exhausted() {
        tracing::warn!(target: "pipeline", "quota exhausted while fetching candidates");
    }
    recommend_from_records(ctx, report.records).await
}

/// Enrich, build and run the retry loop over already fetched candidates.
///
/// Only records inside the context's length range are considered; with a
/// budget, each one has to fit it on its own.
pub async fn recommend_from_records(
    ctx: &RequestContext,
    records: Vec<VideoRecord>,
) -> PipelineOutcome {
    let interests_tag = anon_hash(&ctx.interests);
    let candidates: Vec<VideoRecord> = records
        .into_iter()
        .filter(|r| ctx.accepts_length(r))
        .collect();
    if candidates.is_empty() {
        tracing::info!(target: "pipeline", interests = %interests_tag, "no candidates");
        return PipelineOutcome::NothingFound;
    }

    let enriched = enrich_all(
        candidates,
        Arc::clone(&ctx.collaborators.transcripts),
        &ctx.config.enrich_pool(),
    )
    .await;

    let request = build_request(&enriched, &ctx.interests, ctx.config.max_transcript_chars);
    if request.is_empty() {
        tracing::info!(target: "pipeline", interests = %interests_tag, "no candidate has a transcript");
        return PipelineOutcome::NothingFound;
    }

    let prompt = render_prompt(&request);
    let observer = |attempt: u32, show_progress: bool| {
        if show_progress {
            tracing::info!(target: "pipeline", items = request.items.len(), "asking model for a recommendation");
        } else {
            tracing::info!(target: "pipeline", attempt, "retrying recommendation");
        }
    };
    let report = ctx
        .machine()
        .with_observer(&observer)
        .run(&prompt, |raw| match extract_recommendation(raw) {
            Extraction::Success(r) if request.contains_video(&r.video_id) => Extraction::Success(r),
            Extraction::Success(_) => Extraction::Malformed {
                missing: vec!["known video_id"],
            },
            malformed => malformed,
        })
        .await;

    match report.outcome {
        RetryOutcome::Succeeded(result) => {
            match enriched.into_iter().find(|r| r.video_id == result.video_id) {
                Some(record) => {
                    tracing::info!(
                        target: "pipeline",
                        interests = %interests_tag,
                        video_id = %result.video_id,
                        attempts = report.attempts.len(),
                        "recommended"
                    );
                    PipelineOutcome::Recommended { result, record }
                }
                None => PipelineOutcome::NothingFound,
            }
        }
        RetryOutcome::RetryExhausted => PipelineOutcome::RetryExhausted {
            attempts: report.attempts,
        },
    }
}

/// Subscription box: narrow subscriptions by interest, pull the newest
/// uploads of the chosen channels and fit them into the budget.
pub async fn abobox(
    ctx: &RequestContext,
    subscriptions: &[ChannelRecord],
    count: usize,
    per_channel: usize,
) -> AboboxOutcome {
    if subscriptions.is_empty() {
        return AboboxOutcome::NothingFound;
    }
    let report = filter_channels(&ctx.machine(), subscriptions, &ctx.interests, count).await;
    let names = match report.outcome {
        RetryOutcome::Succeeded(names) => names,
        RetryOutcome::RetryExhausted => {
            return AboboxOutcome::RetryExhausted {
                attempts: report.attempts,
            }
        }
    };

    let channel_ids = match_channels(&names, subscriptions);
    tracing::info!(
        target: "pipeline",
        interests = %anon_hash(&ctx.interests),
        returned = names.len(),
        matched = channel_ids.len(),
        "channels filtered"
    );
    if channel_ids.is_empty() {
        return AboboxOutcome::NothingFound;
    }

    let pool = ctx.config.fetch_pool();
    let fetched = match (ctx.source, &ctx.collaborators.quota_api) {
        (SourceSelection::Api, Some(api)) => {
            let report = orchestrator::run(
                channel_ids.iter().map(FetchTask::channel).collect(),
                Arc::clone(api),
                &pool,
            )
            .await;
            cap_per_channel(report.records, per_channel)
        }
        _ => {
            orchestrator::run_two_stage_capped(
                &channel_ids,
                per_channel,
                Arc::clone(&ctx.collaborators.feed),
                Arc::clone(&ctx.collaborators.scraper),
                &pool,
            )
            .await
            .records
        }
    };

    let long_enough: Vec<VideoRecord> = fetched
        .into_iter()
        .filter(|r| r.duration_seconds >= ctx.min_duration_seconds)
        .collect();
    let videos = match ctx.budget_seconds {
        Some(budget) => select_within_budget(&long_enough, budget),
        None => long_enough,
    };
    if videos.is_empty() {
        return AboboxOutcome::NothingFound;
    }
    AboboxOutcome::Selected {
        channel_ids,
        videos,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anon_hash_is_short_and_stable() {
        let a = anon_hash("rust, chess");
        assert_eq!(a.len(), 12);
        assert_eq!(a, anon_hash("rust, chess"));
        assert_ne!(a, anon_hash("cooking"));
    }
}
