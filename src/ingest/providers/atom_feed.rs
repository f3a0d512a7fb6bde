// src/ingest/providers/atom_feed.rs
//! Channel upload feed (`/feeds/videos.xml?channel_id=…`).
//!
//! Only ids, titles and publish times are available here; full metadata is a
//! second stage through a detail-capable adapter (see `orchestrator::run_two_stage`).

use async_trait::async_trait;
use metrics::{counter, histogram};
use once_cell::sync::OnceCell;
use quick_xml::de::from_str;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::ingest::normalize_text;
use crate::ingest::types::{FetchError, SourceAdapter};
use crate::model::{FetchTask, SourceKind, VideoRecord};

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(default)]
    author: Option<Author>,
    #[serde(rename = "entry", default)]
    entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Author {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    id: Option<String>,
    title: Option<String>,
    #[serde(default)]
    link: Vec<Link>,
    published: Option<String>,
    #[serde(default)]
    author: Option<Author>,
}

#[derive(Debug, Deserialize)]
struct Link {
    #[serde(rename = "@href")]
    href: Option<String>,
}

fn parse_rfc3339_to_unix(ts: &str) -> i64 {
    OffsetDateTime::parse(ts.trim(), &Rfc3339)
        .map(|dt| dt.unix_timestamp())
        .unwrap_or(0)
}

/// Extract an 11-char video id from a watch URL (`v=` query or path segment).
pub fn extract_video_id(url: &str) -> Option<String> {
    static RE_QUERY: OnceCell<Regex> = OnceCell::new();
    static RE_PATH: OnceCell<Regex> = OnceCell::new();
    let re_query =
        RE_QUERY.get_or_init(|| Regex::new(r"v=([A-Za-z0-9_-]{11})").expect("video id regex"));
    if let Some(c) = re_query.captures(url) {
        return Some(c[1].to_string());
    }
    let re_path = RE_PATH.get_or_init(|| {
        Regex::new(r"(?:youtu\.be|/shorts|/embed|/live)/([A-Za-z0-9_-]{11})(?:[/?#&]|$)")
            .expect("video path regex")
    });
    re_path.captures(url).map(|c| c[1].to_string())
}

pub struct AtomFeedAdapter {
    mode: Mode,
    max_per_channel: usize,
}

enum Mode {
    /// Same document for every channel; used by tests and offline runs.
    Fixture(String),
    Http { host: String, client: reqwest::Client },
}

impl AtomFeedAdapter {
    pub fn from_fixture_str(s: &str) -> Self {
        Self {
            mode: Mode::Fixture(s.to_string()),
            max_per_channel: usize::MAX,
        }
    }

    pub fn from_host(host: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent("tube-curator/0.1")
            .timeout(timeout)
            .build()
            .map_err(FetchError::transient)?;
        Ok(Self {
            mode: Mode::Http {
                host: host.into(),
                client,
            },
            max_per_channel: usize::MAX,
        })
    }

    /// Keep only the newest `n` entries of each feed.
    pub fn with_max_per_channel(mut self, n: usize) -> Self {
        self.max_per_channel = n.max(1);
        self
    }

    pub fn feed_url(host: &str, channel_id: &str) -> String {
        format!("https://{host}/feeds/videos.xml?channel_id={channel_id}")
    }

    fn parse_entries(&self, xml: &str) -> Result<Vec<VideoRecord>, FetchError> {
        let t0 = std::time::Instant::now();
        let feed: Feed = from_str(xml).map_err(FetchError::parse)?;
        let feed_author = feed
            .author
            .and_then(|a| a.name)
            .unwrap_or_default();

        let mut out = Vec::new();
        for entry in feed.entry.into_iter().take(self.max_per_channel) {
            let from_link = entry
                .link
                .iter()
                .filter_map(|l| l.href.as_deref())
                .find_map(extract_video_id);
            let from_id = entry
                .id
                .as_deref()
                .and_then(|id| id.trim().strip_prefix("yt:video:"))
                .map(str::to_string);

            let Some(video_id) = from_link.or(from_id) else {
                continue;
            };
            let title = normalize_text(entry.title.as_deref().unwrap_or_default(), 300);
            let channel = entry
                .author
                .and_then(|a| a.name)
                .unwrap_or_else(|| feed_author.clone());
            let Some(rec) = VideoRecord::new(video_id, title) else {
                continue;
            };
            out.push(
                rec.with_channel(channel).with_upload_timestamp(
                    entry
                        .published
                        .as_deref()
                        .map(parse_rfc3339_to_unix)
                        .unwrap_or(0),
                ),
            );
        }
        // A feed can list the same upload twice (premieres); keep the first.
        let mut seen = std::collections::HashSet::new();
        out.retain(|r| seen.insert(r.video_id.clone()));

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("feed_parse_ms").record(ms);
        counter!("feed_entries_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl SourceAdapter for AtomFeedAdapter {
    async fn fetch(&self, task: &FetchTask) -> Result<Vec<VideoRecord>, FetchError> {
        if task.source_kind != SourceKind::Channel {
            return Err(FetchError::Unsupported(task.source_kind));
        }
        match &self.mode {
            Mode::Fixture(s) => self.parse_entries(s),
            Mode::Http { host, client } => {
                let url = Self::feed_url(host, &task.source_query);
                let resp = client.get(&url).send().await.map_err(|e| {
                    tracing::warn!(target: "ingest", error = ?e, channel = %task.source_query, "feed http error");
                    FetchError::transient(e)
                })?;
                if !resp.status().is_success() {
                    return Err(FetchError::Transient(format!(
                        "feed status {}",
                        resp.status()
                    )));
                }
                let body = resp.text().await.map_err(FetchError::transient)?;
                self.parse_entries(&body)
            }
        }
    }

    fn name(&self) -> &'static str {
        "atom_feed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_come_from_query_or_path() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=1").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            extract_video_id("https://youtu.be/dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            extract_video_id("https://www.youtube.com/shorts/abcdefghijk").as_deref(),
            Some("abcdefghijk")
        );
        assert!(extract_video_id("https://www.youtube.com/channel/UC123").is_none());
    }

    #[test]
    fn rfc3339_parse_falls_back_to_zero() {
        assert_eq!(parse_rfc3339_to_unix("1970-01-01T00:01:00+00:00"), 60);
        assert_eq!(parse_rfc3339_to_unix("yesterday"), 0);
    }
}
