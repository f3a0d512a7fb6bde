// src/ingest/providers/scraper.rs
//! Quota-free metadata extraction through an external extractor process
//! (`yt-dlp` compatible: one JSON object per line on stdout).

use async_trait::async_trait;
use metrics::counter;
use serde::Deserialize;
use std::process::Stdio;
use tokio::process::Command;

use crate::ingest::normalize_text;
use crate::ingest::types::{FetchError, SourceAdapter};
use crate::model::{FetchTask, SourceKind, VideoRecord};

/// Hard cap on `ytsearchN:` result counts.
const SEARCH_MAX: u32 = 1_000;

#[derive(Debug, Deserialize)]
struct DumpEntry {
    id: Option<String>,
    title: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    duration: Option<f64>,
    upload_date: Option<String>,
    timestamp: Option<i64>,
    tags: Option<Vec<String>>,
    thumbnail: Option<String>,
    view_count: Option<u64>,
}

/// `YYYYMMDD` → unix seconds at UTC midnight; anything else → 0.
pub fn parse_upload_date(s: &str) -> i64 {
    chrono::NaiveDate::parse_from_str(s.trim(), "%Y%m%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or(0)
}

fn entry_to_record(e: DumpEntry) -> Option<VideoRecord> {
    let title = normalize_text(e.title.as_deref().unwrap_or("Unknown title"), 300);
    let rec = VideoRecord::new(e.id?, title)?;
    let uploaded = e
        .upload_date
        .as_deref()
        .map(parse_upload_date)
        .filter(|ts| *ts != 0)
        .or(e.timestamp)
        .unwrap_or(0);
    Some(
        rec.with_channel(
            e.uploader
                .or(e.channel)
                .unwrap_or_else(|| "Unknown channel".to_string()),
        )
        .with_duration(e.duration.map(|d| d.max(0.0) as u64).unwrap_or(0))
        .with_upload_timestamp(uploaded)
        .with_tags(e.tags.unwrap_or_default())
        .with_thumbnail(e.thumbnail.unwrap_or_default())
        .with_views(e.view_count.unwrap_or(0)),
    )
}

/// Parse extractor stdout. Lines that are not valid entries are skipped.
pub fn parse_dump_lines(stdout: &str) -> Vec<VideoRecord> {
    let mut out = Vec::new();
    let mut skipped = 0u64;
    for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match serde_json::from_str::<DumpEntry>(line) {
            Ok(entry) => match entry_to_record(entry) {
                Some(rec) => out.push(rec),
                None => skipped += 1,
            },
            Err(e) => {
                tracing::debug!(target: "ingest", error = %e, "skipping extractor line");
                skipped += 1;
            }
        }
    }
    if skipped > 0 {
        counter!("scraper_skipped_lines_total").increment(skipped);
    }
    out
}

pub struct ScraperAdapter {
    program: String,
    site: String,
    max_results: u32,
}

impl ScraperAdapter {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            site: "https://www.youtube.com".to_string(),
            max_results: 25,
        }
    }

    pub fn with_max_results(mut self, n: u32) -> Self {
        self.max_results = n.clamp(1, SEARCH_MAX);
        self
    }

    /// Extractor arguments for one task.
    pub fn args_for(&self, task: &FetchTask) -> Vec<String> {
        let mut args = vec!["--dump-json".to_string(), "--no-warnings".to_string()];
        match task.source_kind {
            SourceKind::VideoDetail => {
                args.push("--skip-download".into());
                args.push("--no-playlist".into());
                args.push(format!("{}/watch?v={}", self.site, task.source_query));
            }
            SourceKind::Search => {
                args.push("--flat-playlist".into());
                args.push(format!("ytsearch{}:{}", self.max_results, task.source_query));
            }
            SourceKind::Channel => {
                args.push("--flat-playlist".into());
                args.push("--playlist-end".into());
                args.push(self.max_results.to_string());
                args.push(format!("{}/channel/{}/videos", self.site, task.source_query));
            }
            SourceKind::Trending => {
                args.push("--flat-playlist".into());
                args.push("--playlist-end".into());
                args.push(self.max_results.to_string());
                args.push(format!("{}/feed/trending?gl={}", self.site, task.source_query));
            }
        }
        args
    }
}

#[async_trait]
impl SourceAdapter for ScraperAdapter {
    async fn fetch(&self, task: &FetchTask) -> Result<Vec<VideoRecord>, FetchError> {
        let output = Command::new(&self.program)
            .args(self.args_for(task))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| FetchError::Transient(format!("spawn {}: {e}", self.program)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let records = parse_dump_lines(&stdout);
        if !output.status.success() && records.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(FetchError::Transient(if stderr.is_empty() {
                format!("{} exited with {}", self.program, output.status)
            } else {
                stderr
            }));
        }
        Ok(records)
    }

    fn name(&self) -> &'static str {
        "scraper"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_date_parses_yyyymmdd() {
        assert_eq!(parse_upload_date("19700102"), 86_400);
        assert_eq!(parse_upload_date("2024-01-01"), 0);
        assert_eq!(parse_upload_date(""), 0);
    }

    #[test]
    fn missing_fields_default() {
        let out = parse_dump_lines(r#"{"id":"abcdefghijk"}"#);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].duration_seconds, 0);
        assert_eq!(out[0].upload_timestamp, 0);
        assert_eq!(out[0].channel_name, "Unknown channel");
        assert_eq!(out[0].title, "Unknown title");
    }

    #[test]
    fn search_args_cap_and_prefix() {
        let s = ScraperAdapter::new("yt-dlp").with_max_results(5_000);
        let args = s.args_for(&FetchTask::search("rust async"));
        assert_eq!(args.last().unwrap(), "ytsearch1000:rust async");
        assert!(args.contains(&"--flat-playlist".to_string()));
    }
}
