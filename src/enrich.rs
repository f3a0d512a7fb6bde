// src/enrich.rs
//! Transcript enrichment: one lookup per distinct video id, bounded the same
//! way as the fetch stage. A missing or failed transcript becomes an empty one;
//! the record itself always stays.

use anyhow::anyhow;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use metrics::counter;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use yt_transcript_rs::api::YouTubeTranscriptApi;

use crate::config::PoolConfig;
use crate::model::VideoRecord;

#[async_trait]
pub trait TranscriptSource: Send + Sync {
    async fn fetch_transcript(&self, video_id: &str) -> anyhow::Result<String>;
    fn name(&self) -> &'static str;
}

/// Caption track lookup through `yt-transcript-rs`, first matching language wins.
pub struct YtTranscriptSource {
    api: YouTubeTranscriptApi,
    languages: Vec<String>,
}

impl YtTranscriptSource {
    pub fn new(languages: Vec<String>) -> anyhow::Result<Self> {
        let api = YouTubeTranscriptApi::new(None, None, None)
            .map_err(|e| anyhow!("creating transcript api: {e:?}"))?;
        Ok(Self { api, languages })
    }
}

#[async_trait]
impl TranscriptSource for YtTranscriptSource {
    async fn fetch_transcript(&self, video_id: &str) -> anyhow::Result<String> {
        let langs: Vec<&str> = self.languages.iter().map(String::as_str).collect();
        let transcript = self
            .api
            .fetch_transcript(video_id, &langs, false)
            .await
            .map_err(|e| anyhow!("transcript unavailable for {video_id}: {e:?}"))?;

        let mut text = String::new();
        for entry in transcript {
            let piece = entry.text.trim();
            if piece.is_empty() {
                continue;
            }
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(piece);
        }
        Ok(text)
    }

    fn name(&self) -> &'static str {
        "yt_transcript"
    }
}

/// Attach a transcript to every record. Input order and length are preserved.
pub async fn enrich_all(
    records: Vec<VideoRecord>,
    source: Arc<dyn TranscriptSource>,
    pool: &PoolConfig,
) -> Vec<VideoRecord> {
    let mut seen = HashSet::new();
    let ids: Vec<String> = records
        .iter()
        .filter(|r| seen.insert(r.video_id.clone()))
        .map(|r| r.video_id.clone())
        .collect();
    if ids.is_empty() {
        return records;
    }

    let workers = pool.pool_size(ids.len());
    let timeout = pool.timeout;

    let transcripts: HashMap<String, String> = stream::iter(ids.into_iter().map(|id| {
        let source = Arc::clone(&source);
        let key = id.clone();
        let handle = tokio::spawn(async move {
            match tokio::time::timeout(timeout, source.fetch_transcript(&id)).await {
                Ok(Ok(text)) => text,
                Ok(Err(e)) => {
                    tracing::debug!(target: "enrich", video_id = %id, error = %e, "no transcript");
                    String::new()
                }
                Err(_) => {
                    tracing::debug!(target: "enrich", video_id = %id, "transcript lookup timed out");
                    String::new()
                }
            }
        });
        async move {
            let text = handle.await.unwrap_or_default();
            (key, text)
        }
    }))
    .buffer_unordered(workers)
    .collect()
    .await;

    let empty = transcripts.values().filter(|t| t.trim().is_empty()).count();
    counter!("enrich_empty_total").increment(empty as u64);
    tracing::info!(
        target: "enrich",
        source = source.name(),
        workers,
        looked_up = transcripts.len(),
        empty,
        "transcript stage done"
    );

    records
        .into_iter()
        .map(|rec| {
            let text = transcripts.get(&rec.video_id).cloned().unwrap_or_default();
            rec.with_transcript(text)
        })
        .collect()
}
