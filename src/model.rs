// src/model.rs
//! Typed records flowing through the pipeline.

use serde::{Deserialize, Serialize};

/// Metadata for one video, as produced by a source adapter.
///
/// Constructed through [`VideoRecord::new`], which rejects empty ids, so every
/// record that reaches a downstream stage carries a usable `video_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VideoRecord {
    pub video_id: String,
    pub title: String,
    #[serde(default)]
    pub channel_name: String,
    #[serde(default)]
    pub duration_seconds: u64,
    /// Unix seconds; 0 when the source did not report an upload date.
    #[serde(default)]
    pub upload_timestamp: i64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub thumbnail_url: String,
    #[serde(default)]
    pub view_count: u64,
    /// `None` until the enricher ran; `Some("")` when no transcript exists.
    #[serde(default)]
    pub transcript: Option<String>,
}

impl VideoRecord {
    /// Returns `None` for an empty/whitespace id.
    pub fn new(video_id: impl Into<String>, title: impl Into<String>) -> Option<Self> {
        let video_id = video_id.into().trim().to_string();
        if video_id.is_empty() {
            return None;
        }
        Some(Self {
            video_id,
            title: title.into(),
            channel_name: String::new(),
            duration_seconds: 0,
            upload_timestamp: 0,
            tags: Vec::new(),
            thumbnail_url: String::new(),
            view_count: 0,
            transcript: None,
        })
    }

    pub fn with_channel(mut self, channel_name: impl Into<String>) -> Self {
        self.channel_name = channel_name.into();
        self
    }

    pub fn with_duration(mut self, seconds: u64) -> Self {
        self.duration_seconds = seconds;
        self
    }

    pub fn with_upload_timestamp(mut self, ts: i64) -> Self {
        self.upload_timestamp = ts;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail_url = url.into();
        self
    }

    pub fn with_views(mut self, views: u64) -> Self {
        self.view_count = views;
        self
    }

    pub fn with_transcript(mut self, transcript: impl Into<String>) -> Self {
        self.transcript = Some(transcript.into());
        self
    }

    /// True when a transcript is attached and carries non-whitespace text.
    pub fn has_transcript(&self) -> bool {
        self.transcript
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
    }

    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.video_id)
    }

    /// Duration rendered as `MM:SS` (minutes are not wrapped at 60).
    pub fn clock_length(&self) -> String {
        format!(
            "{:02}:{:02}",
            self.duration_seconds / 60,
            self.duration_seconds % 60
        )
    }
}

/// A subscribed channel, consumed read-only by the channel filter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelRecord {
    pub channel_id: String,
    pub channel_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub total_video_count: u64,
    #[serde(default)]
    pub new_video_count: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Free-text search query.
    Search,
    /// Recent uploads of one channel id.
    Channel,
    /// Full metadata for one video id.
    VideoDetail,
    /// Trending chart; `source_query` holds the region code.
    Trending,
}

/// Unit of work submitted to the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FetchTask {
    pub source_query: String,
    pub source_kind: SourceKind,
}

impl FetchTask {
    pub fn new(source_query: impl Into<String>, source_kind: SourceKind) -> Self {
        Self {
            source_query: source_query.into(),
            source_kind,
        }
    }

    pub fn search(query: impl Into<String>) -> Self {
        Self::new(query, SourceKind::Search)
    }

    pub fn channel(channel_id: impl Into<String>) -> Self {
        Self::new(channel_id, SourceKind::Channel)
    }

    pub fn video(video_id: impl Into<String>) -> Self {
        Self::new(video_id, SourceKind::VideoDetail)
    }

    pub fn trending(region_code: impl Into<String>) -> Self {
        Self::new(region_code, SourceKind::Trending)
    }
}

/// One `(title, transcript, video_id)` entry of a recommendation prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestItem {
    pub title: String,
    pub transcript: String,
    pub video_id: String,
}

/// Built fresh per recommendation; never mutated between retry attempts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecommendationRequest {
    pub items: Vec<RequestItem>,
    pub interests: String,
}

impl RecommendationRequest {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains_video(&self, video_id: &str) -> bool {
        self.items.iter().any(|it| it.video_id == video_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecommendationResult {
    pub video_id: String,
    pub explanation: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Malformed,
}

/// Record of one request/validate round inside the retry machine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractionAttempt {
    pub attempt_number: u32,
    pub raw_response_text: String,
    pub outcome: AttemptOutcome,
}
