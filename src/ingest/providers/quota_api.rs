// src/ingest/providers/quota_api.rs
//! YouTube Data API v3 adapter. Every call spends quota; when the API reports
//! the quota as used up the task fails with `FetchError::QuotaExhausted` and
//! nothing is retried.

use async_trait::async_trait;
use metrics::counter;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use crate::ingest::normalize_text;
use crate::ingest::types::{FetchError, SourceAdapter};
use crate::model::{ChannelRecord, FetchTask, SourceKind, VideoRecord};

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";
pub const ENV_YOUTUBE_API_KEY: &str = "YOUTUBE_API_KEY";

/// API page size ceiling for search/videos/subscriptions.
const PAGE_MAX: u32 = 50;

// ------------------------------------------------------------
// Wire types
// ------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    snippet: Option<Snippet>,
    content_details: Option<ContentDetails>,
    statistics: Option<Statistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: Option<String>,
    channel_title: Option<String>,
    published_at: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    thumbnails: Option<Thumbnails>,
}

#[derive(Debug, Deserialize)]
struct Thumbnails {
    medium: Option<Thumb>,
    high: Option<Thumb>,
    default: Option<Thumb>,
}

#[derive(Debug, Deserialize)]
struct Thumb {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    // The API sends counts as strings.
    view_count: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionsResponse {
    #[serde(default)]
    items: Vec<SubscriptionItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionItem {
    snippet: SubscriptionSnippet,
    content_details: Option<SubscriptionCounts>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionSnippet {
    title: String,
    #[serde(default)]
    description: String,
    resource_id: ResourceId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
    channel_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionCounts {
    #[serde(default)]
    total_item_count: u64,
    #[serde(default)]
    new_item_count: u64,
}

// ------------------------------------------------------------
// Parsing helpers
// ------------------------------------------------------------

/// ISO-8601 duration (`PT1H2M3S`, `P1DT2H`, `PT45S`) to seconds.
/// Unparseable or out-of-range input is 0.
pub fn parse_iso8601_duration(s: &str) -> u64 {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$")
            .expect("iso duration regex")
    });
    let Some(c) = re.captures(s.trim()) else {
        return 0;
    };
    let part = |i: usize, unit: u64| -> Option<u64> {
        match c.get(i) {
            Some(m) => m.as_str().parse::<u64>().ok()?.checked_mul(unit),
            None => Some(0),
        }
    };
    [(1, 86_400), (2, 3_600), (3, 60), (4, 1)]
        .into_iter()
        .try_fold(0u64, |acc, (i, unit)| acc.checked_add(part(i, unit)?))
        .unwrap_or(0)
}

fn parse_published_at(s: &str) -> i64 {
    chrono::DateTime::parse_from_rfc3339(s.trim())
        .map(|dt| dt.timestamp())
        .unwrap_or(0)
}

fn is_quota_error(body: &str) -> bool {
    ["quotaExceeded", "dailyLimitExceeded", "rateLimitExceeded"]
        .iter()
        .any(|reason| body.contains(reason))
}

/// Build records from a `videos.list` payload; items with empty ids are dropped.
pub(crate) fn records_from_videos(resp: VideosResponse) -> Vec<VideoRecord> {
    resp.items
        .into_iter()
        .filter_map(|item| {
            let snippet = item.snippet;
            let title = snippet
                .as_ref()
                .and_then(|s| s.title.as_deref())
                .map(|t| normalize_text(t, 300))
                .unwrap_or_else(|| "Unknown title".to_string());
            let rec = VideoRecord::new(item.id, title)?;
            let (channel, published, tags, thumb) = match snippet {
                Some(s) => {
                    let thumb = s
                        .thumbnails
                        .and_then(|t| t.medium.or(t.high).or(t.default))
                        .map(|t| t.url)
                        .unwrap_or_default();
                    (
                        s.channel_title.unwrap_or_else(|| "Unknown channel".into()),
                        s.published_at.as_deref().map(parse_published_at).unwrap_or(0),
                        s.tags,
                        thumb,
                    )
                }
                None => ("Unknown channel".into(), 0, Vec::new(), String::new()),
            };
            let duration = item
                .content_details
                .and_then(|c| c.duration)
                .map(|d| parse_iso8601_duration(&d))
                .unwrap_or(0);
            let views = item
                .statistics
                .and_then(|s| s.view_count)
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(0);
            Some(
                rec.with_channel(channel)
                    .with_upload_timestamp(published)
                    .with_tags(tags)
                    .with_thumbnail(thumb)
                    .with_duration(duration)
                    .with_views(views),
            )
        })
        .collect()
}

/// Parse a raw `videos.list` JSON body.
pub fn parse_videos_json(body: &str) -> Result<Vec<VideoRecord>, FetchError> {
    let resp: VideosResponse = serde_json::from_str(body).map_err(FetchError::parse)?;
    Ok(records_from_videos(resp))
}

// ------------------------------------------------------------
// Adapter
// ------------------------------------------------------------

pub struct QuotaApiAdapter {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    max_results: u32,
}

impl QuotaApiAdapter {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .user_agent("tube-curator/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .map_err(FetchError::transient)?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: DEFAULT_API_BASE.to_string(),
            max_results: 25,
        })
    }

    /// Reads `YOUTUBE_API_KEY`; `None` when unset or empty.
    pub fn from_env(timeout: Duration) -> Option<Self> {
        let key = std::env::var(ENV_YOUTUBE_API_KEY).ok()?;
        if key.trim().is_empty() {
            return None;
        }
        Self::new(key, timeout).ok()
    }

    /// Point the adapter at another API root (local stubs).
    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base_url = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_results(mut self, n: u32) -> Self {
        self.max_results = n.max(1);
        self
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let resp = self
            .http
            .get(&url)
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else {
                    FetchError::transient(e)
                }
            })?;

        counter!("quota_api_calls_total", "endpoint" => endpoint.to_string()).increment(1);

        let status = resp.status();
        let body = resp.text().await.map_err(FetchError::transient)?;
        if status.as_u16() == 403 && is_quota_error(&body) {
            tracing::warn!(target: "ingest", endpoint, "youtube api quota exhausted");
            return Err(FetchError::QuotaExhausted);
        }
        if !status.is_success() {
            return Err(FetchError::Transient(format!("{endpoint} status {status}")));
        }
        serde_json::from_str(&body).map_err(FetchError::parse)
    }

    /// Paginated `search.list`, collecting video ids until `limit` is reached.
    async fn search_ids(
        &self,
        base_params: Vec<(&str, String)>,
        limit: u32,
    ) -> Result<Vec<String>, FetchError> {
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let remaining = limit.saturating_sub(ids.len() as u32);
            if remaining == 0 {
                break;
            }
            let mut params = base_params.clone();
            params.push(("part", "id".to_string()));
            params.push(("type", "video".to_string()));
            params.push(("maxResults", remaining.min(PAGE_MAX).to_string()));
            if let Some(tok) = &page_token {
                params.push(("pageToken", tok.clone()));
            }
            let page: SearchResponse = self.get_json("search", &params).await?;
            let before = ids.len();
            ids.extend(page.items.into_iter().filter_map(|it| it.id.video_id));
            page_token = page.next_page_token;
            if page_token.is_none() || ids.len() == before {
                break;
            }
        }
        ids.truncate(limit as usize);
        Ok(ids)
    }

    /// `videos.list` for up to 50 ids per call.
    async fn videos_by_ids(&self, ids: &[String]) -> Result<Vec<VideoRecord>, FetchError> {
        let mut out = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(PAGE_MAX as usize) {
            let params = vec![
                ("part", "snippet,contentDetails,statistics".to_string()),
                ("id", chunk.join(",")),
            ];
            let resp: VideosResponse = self.get_json("videos", &params).await?;
            out.extend(records_from_videos(resp));
        }
        Ok(out)
    }

    /// All subscriptions of a (public) channel, following page tokens.
    pub async fn subscriptions(&self, channel_id: &str) -> Result<Vec<ChannelRecord>, FetchError> {
        let mut out = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut params = vec![
                ("part", "snippet,contentDetails".to_string()),
                ("channelId", channel_id.to_string()),
                ("maxResults", PAGE_MAX.to_string()),
            ];
            if let Some(tok) = &page_token {
                params.push(("pageToken", tok.clone()));
            }
            let page: SubscriptionsResponse = self.get_json("subscriptions", &params).await?;
            for item in page.items {
                let Some(id) = item
                    .snippet
                    .resource_id
                    .channel_id
                    .filter(|id| !id.trim().is_empty())
                else {
                    continue;
                };
                let counts = item.content_details;
                out.push(ChannelRecord {
                    channel_id: id,
                    channel_name: item.snippet.title,
                    description: item.snippet.description,
                    total_video_count: counts.as_ref().map(|c| c.total_item_count).unwrap_or(0),
                    new_video_count: counts.as_ref().map(|c| c.new_item_count).unwrap_or(0),
                });
            }
            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl SourceAdapter for QuotaApiAdapter {
    async fn fetch(&self, task: &FetchTask) -> Result<Vec<VideoRecord>, FetchError> {
        match task.source_kind {
            SourceKind::Search => {
                let ids = self
                    .search_ids(vec![("q", task.source_query.clone())], self.max_results)
                    .await?;
                self.videos_by_ids(&ids).await
            }
            SourceKind::Channel => {
                let ids = self
                    .search_ids(
                        vec![
                            ("channelId", task.source_query.clone()),
                            ("order", "date".to_string()),
                        ],
                        self.max_results,
                    )
                    .await?;
                self.videos_by_ids(&ids).await
            }
            SourceKind::VideoDetail => self.videos_by_ids(&[task.source_query.clone()]).await,
            SourceKind::Trending => {
                let params = vec![
                    ("part", "snippet,contentDetails,statistics".to_string()),
                    ("chart", "mostPopular".to_string()),
                    ("regionCode", task.source_query.clone()),
                    ("maxResults", self.max_results.min(PAGE_MAX).to_string()),
                ];
                let resp: VideosResponse = self.get_json("videos", &params).await?;
                Ok(records_from_videos(resp))
            }
        }
    }

    fn name(&self) -> &'static str {
        "quota_api"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_durations_parse_to_seconds() {
        assert_eq!(parse_iso8601_duration("PT5M10S"), 310);
        assert_eq!(parse_iso8601_duration("PT1H"), 3_600);
        assert_eq!(parse_iso8601_duration("PT45S"), 45);
        assert_eq!(parse_iso8601_duration("P1DT1M"), 86_460);
        assert_eq!(parse_iso8601_duration("P0D"), 0);
        assert_eq!(parse_iso8601_duration("garbage"), 0);
    }

    #[test]
    fn oversized_iso_durations_are_zero() {
        assert_eq!(parse_iso8601_duration("P999999999999999D"), 0);
        assert_eq!(parse_iso8601_duration("PT99999999999999999999S"), 0);
        assert_eq!(parse_iso8601_duration("P213503982334602D"), 0);
    }

    #[test]
    fn quota_reasons_are_recognized() {
        assert!(is_quota_error(r#"{"error":{"errors":[{"reason":"quotaExceeded"}]}}"#));
        assert!(!is_quota_error(r#"{"error":{"errors":[{"reason":"forbidden"}]}}"#));
    }

    #[test]
    fn videos_payload_maps_to_records() {
        let body = r#"{
          "items": [
            {
              "id": "abcdefghijk",
              "snippet": {
                "title": "Rust &amp; you",
                "channelTitle": "Ferris",
                "publishedAt": "2024-05-01T12:00:00Z",
                "tags": ["rust", "async"],
                "thumbnails": {"medium": {"url": "https://i.ytimg.com/m.jpg"}}
              },
              "contentDetails": {"duration": "PT12M3S"},
              "statistics": {"viewCount": "1234"}
            },
            { "id": "", "snippet": {"title": "dropped"} }
          ]
        }"#;
        let recs = parse_videos_json(body).unwrap();
        assert_eq!(recs.len(), 1);
        let r = &recs[0];
        assert_eq!(r.title, "Rust & you");
        assert_eq!(r.channel_name, "Ferris");
        assert_eq!(r.duration_seconds, 723);
        assert_eq!(r.view_count, 1234);
        assert_eq!(r.upload_timestamp, 1_714_564_800);
        assert_eq!(r.tags, vec!["rust", "async"]);
        assert_eq!(r.thumbnail_url, "https://i.ytimg.com/m.jpg");
    }

    #[test]
    fn odd_duration_keeps_the_rest_of_the_batch() {
        let body = r#"{
          "items": [
            { "id": "aaaaaaaaaaa", "snippet": {"title": "huge"},
              "contentDetails": {"duration": "P999999999999999D"} },
            { "id": "bbbbbbbbbbb", "snippet": {"title": "normal"},
              "contentDetails": {"duration": "PT1M"} }
          ]
        }"#;
        let recs = parse_videos_json(body).unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].duration_seconds, 0);
        assert_eq!(recs[1].duration_seconds, 60);
    }
}
