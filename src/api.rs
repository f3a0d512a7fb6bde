// src/api.rs
//! JSON HTTP surface over the pipeline. No presentation logic lives here.

use std::sync::Arc;
use std::time::Duration;

use shuttle_axum::axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::analysis;
use crate::config::{LlmConfig, PipelineConfig};
use crate::enrich::YtTranscriptSource;
use crate::ingest::providers::{AtomFeedAdapter, QuotaApiAdapter, ScraperAdapter};
use crate::ingest::types::SourceAdapter;
use crate::llm::build_client_from_config;
use crate::model::{ChannelRecord, VideoRecord};
use crate::pipeline::{self, Collaborators, RequestContext, SourceSelection};
use crate::recommend::channel_filter::{filter_channels, match_channels, recommend_new_channels};
use crate::recommend::{RetryMachine, RetryOutcome};
use crate::select::{budget_from_minutes, select_within_budget};
use crate::store::{Store, WatchLaterRow};

pub const ENV_DATA_DIR: &str = "CURATOR_DATA_DIR";
pub const DEFAULT_DATA_DIR: &str = "data";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<PipelineConfig>,
    pub collaborators: Collaborators,
    /// Present only with a YouTube API key; needed for subscription listing.
    pub subscriptions_api: Option<Arc<QuotaApiAdapter>>,
    pub store: Store,
}

impl AppState {
    /// Wire real collaborators from config files and environment.
    pub fn from_env() -> anyhow::Result<Self> {
        let config = crate::config::pipeline::load_default()?;
        let llm_cfg = LlmConfig::load_default()?;
        let fetch_timeout = Duration::from_secs(config.fetch_timeout_secs);

        let quota = QuotaApiAdapter::from_env(fetch_timeout)
            .map(|a| Arc::new(a.with_max_results(config.max_results)));
        if quota.is_none() {
            tracing::info!(target: "api", "YOUTUBE_API_KEY not set; scraper is the only detail source");
        }
        let scraper = ScraperAdapter::new(config.scraper_program.clone())
            .with_max_results(config.max_results);
        let feed = AtomFeedAdapter::from_host(config.feed_host.clone(), fetch_timeout)?;
        let transcripts = YtTranscriptSource::new(config.transcript_languages.clone())?;
        let llm = build_client_from_config(&llm_cfg, config.llm_timeout());
        tracing::info!(target: "api", provider = llm.provider_name(), "llm client ready");

        let collaborators = Collaborators {
            quota_api: quota
                .clone()
                .map(|a| a as Arc<dyn SourceAdapter>),
            scraper: Arc::new(scraper),
            feed: Arc::new(feed),
            transcripts: Arc::new(transcripts),
            llm,
        };
        let data_dir = std::env::var(ENV_DATA_DIR).unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string());

        Ok(Self {
            config: Arc::new(config),
            collaborators,
            subscriptions_api: quota,
            store: Store::new(data_dir),
        })
    }

    fn context(&self, interests: &str, range: LengthRange, source: SourceSelection) -> RequestContext {
        let ctx = RequestContext::new(interests, Arc::clone(&self.config), self.collaborators.clone())
            .with_source(source)
            .with_min_duration_seconds(budget_from_minutes(range.min_minutes.unwrap_or(0)));
        match range.budget_minutes {
            Some(m) => ctx.with_budget_seconds(budget_from_minutes(m)),
            None => ctx,
        }
    }

    fn machine(&self) -> RetryMachine<'_> {
        RetryMachine::new(self.collaborators.llm.as_ref()).with_timeout(self.config.llm_timeout())
    }

    /// Cached subscriptions; a missing or unreadable cache is an empty list.
    fn cached_subscriptions(&self) -> Vec<ChannelRecord> {
        match self.store.load_subscriptions() {
            Ok(Some(list)) => list,
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(target: "api", error = ?e, "subscription cache unreadable");
                Vec::new()
            }
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/recommend", post(recommend))
        .route("/abobox", post(abobox))
        .route("/select", post(select))
        .route("/channels/filter", post(channels_filter))
        .route("/channels/discover", post(channels_discover))
        .route("/subscriptions/refresh", post(subscriptions_refresh))
        .route("/analyze", post(analyze))
        .route("/watch-later", get(watch_later_list).post(watch_later_add))
        .route("/watch-later/remove", post(watch_later_remove))
        .route("/feedback", post(feedback))
        .route("/interests", get(interests_get).post(interests_save))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

fn bad_request(msg: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": msg }))).into_response()
}

fn internal(e: anyhow::Error) -> Response {
    tracing::warn!(target: "api", error = ?e, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": "internal error" })),
    )
        .into_response()
}

/// Accepted video length in minutes: `min_minutes..=budget_minutes`.
#[derive(serde::Deserialize, Clone, Copy)]
struct LengthRange {
    #[serde(default)]
    min_minutes: Option<u64>,
    #[serde(default)]
    budget_minutes: Option<u64>,
}

#[derive(serde::Deserialize)]
struct RecommendReq {
    interests: String,
    #[serde(flatten)]
    range: LengthRange,
    #[serde(default)]
    source: SourceSelection,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    query: Option<String>,
}

/// Query given → search; otherwise the trending chart of `region`.
async fn recommend(State(state): State<AppState>, Json(body): Json<RecommendReq>) -> Response {
    if body.interests.trim().is_empty() {
        return bad_request("interests must not be empty");
    }
    let ctx = state.context(&body.interests, body.range, body.source);
    let outcome = match body.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) => pipeline::recommend_from_query(&ctx, q).await,
        None => {
            let region = body
                .region
                .unwrap_or_else(|| state.config.region_code.clone());
            pipeline::recommend_from_trending(&ctx, &region).await
        }
    };
    Json(outcome).into_response()
}

#[derive(serde::Deserialize)]
struct AboboxReq {
    interests: String,
    #[serde(flatten)]
    range: LengthRange,
    #[serde(default)]
    source: SourceSelection,
    #[serde(default = "default_channel_count")]
    count: usize,
    #[serde(default = "default_per_channel")]
    per_channel: usize,
    /// Falls back to the cached subscriptions.
    #[serde(default)]
    channels: Option<Vec<ChannelRecord>>,
}

fn default_channel_count() -> usize {
    5
}
fn default_per_channel() -> usize {
    3
}

async fn abobox(State(state): State<AppState>, Json(body): Json<AboboxReq>) -> Response {
    if body.interests.trim().is_empty() {
        return bad_request("interests must not be empty");
    }
    let channels = body.channels.unwrap_or_else(|| state.cached_subscriptions());
    let ctx = state.context(&body.interests, body.range, body.source);
    let outcome = pipeline::abobox(&ctx, &channels, body.count, body.per_channel).await;
    Json(outcome).into_response()
}

#[derive(serde::Deserialize)]
struct SelectReq {
    records: Vec<VideoRecord>,
    budget_minutes: u64,
}

async fn select(Json(body): Json<SelectReq>) -> Json<Vec<VideoRecord>> {
    Json(select_within_budget(
        &body.records,
        budget_from_minutes(body.budget_minutes),
    ))
}

#[derive(serde::Deserialize)]
struct ChannelFilterReq {
    interests: String,
    #[serde(default = "default_channel_count")]
    count: usize,
    #[serde(default)]
    channels: Option<Vec<ChannelRecord>>,
}

#[derive(serde::Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum ChannelsResp {
    Matched {
        names: Vec<String>,
        channel_ids: Vec<String>,
    },
    Suggested {
        names: Vec<String>,
    },
    RetryExhausted {
        attempts: usize,
    },
}

async fn channels_filter(State(state): State<AppState>, Json(body): Json<ChannelFilterReq>) -> Response {
    let channels = body.channels.unwrap_or_else(|| state.cached_subscriptions());
    if channels.is_empty() {
        return bad_request("no channels to filter");
    }
    let report = filter_channels(&state.machine(), &channels, &body.interests, body.count).await;
    let resp = match report.outcome {
        RetryOutcome::Succeeded(names) => {
            let channel_ids = match_channels(&names, &channels);
            ChannelsResp::Matched { names, channel_ids }
        }
        RetryOutcome::RetryExhausted => ChannelsResp::RetryExhausted {
            attempts: report.attempts.len(),
        },
    };
    Json(resp).into_response()
}

#[derive(serde::Deserialize)]
struct DiscoverReq {
    interests: String,
    #[serde(default = "default_channel_count")]
    count: usize,
}

async fn channels_discover(State(state): State<AppState>, Json(body): Json<DiscoverReq>) -> Response {
    let titles = match state.store.history_titles() {
        Ok(t) => t,
        Err(e) => return internal(e),
    };
    let subscriptions = state.cached_subscriptions();
    let report = recommend_new_channels(
        &state.machine(),
        &titles,
        &subscriptions,
        &body.interests,
        body.count,
    )
    .await;
    let resp = match report.outcome {
        RetryOutcome::Succeeded(names) => ChannelsResp::Suggested { names },
        RetryOutcome::RetryExhausted => ChannelsResp::RetryExhausted {
            attempts: report.attempts.len(),
        },
    };
    Json(resp).into_response()
}

#[derive(serde::Deserialize)]
struct RefreshReq {
    channel_id: String,
}

async fn subscriptions_refresh(State(state): State<AppState>, Json(body): Json<RefreshReq>) -> Response {
    let Some(api) = state.subscriptions_api.as_ref() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": "no YouTube API key configured" })),
        )
            .into_response();
    };
    let channels = match api.subscriptions(&body.channel_id).await {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(target: "api", error = %e, "subscription listing failed");
            return (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };
    if let Err(e) = state.store.save_subscriptions(&channels) {
        return internal(e);
    }
    Json(channels).into_response()
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "snake_case")]
enum AnalysisKind {
    Summary,
    SpoilerFree,
    Clickbait,
}

#[derive(serde::Deserialize)]
struct AnalyzeReq {
    kind: AnalysisKind,
    record: VideoRecord,
}

#[derive(serde::Serialize)]
struct AnalyzeResp {
    text: Option<String>,
}

async fn analyze(State(state): State<AppState>, Json(body): Json<AnalyzeReq>) -> Json<AnalyzeResp> {
    let llm = state.collaborators.llm.as_ref();
    let text = match body.kind {
        AnalysisKind::Summary => analysis::summarize(llm, &body.record).await,
        AnalysisKind::SpoilerFree => analysis::summarize_without_spoiler(llm, &body.record).await,
        AnalysisKind::Clickbait => analysis::clickbait_check(llm, &body.record).await,
    };
    Json(AnalyzeResp { text })
}

#[derive(serde::Serialize)]
struct WatchLaterResp {
    rows: Vec<WatchLaterRow>,
    summary: Option<String>,
}

async fn watch_later_list(State(state): State<AppState>) -> Response {
    let rows = match state.store.load_watch_later() {
        Ok(r) => r,
        Err(e) => return internal(e),
    };
    let records: Vec<VideoRecord> = rows
        .iter()
        .filter_map(|r| {
            VideoRecord::new(r.video_id.clone(), r.title.clone()).map(|v| {
                v.with_channel(r.channel_name.clone())
                    .with_duration(crate::select::parse_clock_duration(&r.length))
            })
        })
        .collect();
    let summary = analysis::watch_list_summary(state.collaborators.llm.as_ref(), &records).await;
    Json(WatchLaterResp { rows, summary }).into_response()
}

#[derive(serde::Deserialize)]
struct WatchLaterAddReq {
    record: VideoRecord,
}

async fn watch_later_add(State(state): State<AppState>, Json(body): Json<WatchLaterAddReq>) -> Response {
    if body.record.video_id.trim().is_empty() {
        return bad_request("video_id must not be empty");
    }
    let summary = analysis::summarize(state.collaborators.llm.as_ref(), &body.record)
        .await
        .unwrap_or_default();
    let row = WatchLaterRow::from_record(&body.record, summary);
    let added = match state.store.append_watch_later(&row) {
        Ok(a) => a,
        Err(e) => return internal(e),
    };
    if let Err(e) = state.store.sync_history() {
        return internal(e);
    }
    Json(serde_json::json!({ "added": added })).into_response()
}

#[derive(serde::Deserialize)]
struct WatchLaterRemoveReq {
    video_id: String,
}

async fn watch_later_remove(State(state): State<AppState>, Json(body): Json<WatchLaterRemoveReq>) -> Response {
    match state.store.remove_watch_later(&body.video_id) {
        Ok(removed) => Json(serde_json::json!({ "removed": removed })).into_response(),
        Err(e) => internal(e),
    }
}

#[derive(serde::Deserialize)]
struct FeedbackReq {
    text: String,
}

async fn feedback(State(state): State<AppState>, Json(body): Json<FeedbackReq>) -> Response {
    if body.text.trim().is_empty() {
        return bad_request("feedback must not be empty");
    }
    match state.store.append_feedback(&body.text) {
        Ok(row) => Json(row).into_response(),
        Err(e) => internal(e),
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct InterestsBody {
    interests: String,
}

async fn interests_get(State(state): State<AppState>) -> Response {
    match state.store.load_interests() {
        Ok(interests) => Json(InterestsBody { interests }).into_response(),
        Err(e) => internal(e),
    }
}

async fn interests_save(State(state): State<AppState>, Json(body): Json<InterestsBody>) -> Response {
    match state.store.save_interests(body.interests.trim()) {
        Ok(changed) => Json(serde_json::json!({ "changed": changed })).into_response(),
        Err(e) => internal(e),
    }
}
