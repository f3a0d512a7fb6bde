// tests/enrich_transcripts.rs
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use parking_lot::Mutex;

use tube_curator::config::PoolConfig;
use tube_curator::enrich::{enrich_all, TranscriptSource};
use tube_curator::model::VideoRecord;

struct FakeTranscripts {
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl TranscriptSource for FakeTranscripts {
    async fn fetch_transcript(&self, video_id: &str) -> anyhow::Result<String> {
        self.calls.lock().push(video_id.to_string());
        match video_id {
            "no_captions" => Err(anyhow!("transcripts disabled")),
            "stuck" => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok("late".into())
            }
            other => Ok(format!("spoken words of {other}")),
        }
    }
    fn name(&self) -> &'static str {
        "fake"
    }
}

fn rec(id: &str) -> VideoRecord {
    VideoRecord::new(id, format!("title {id}")).unwrap()
}

#[tokio::test]
async fn failures_become_empty_transcripts_and_order_is_kept() {
    let source = Arc::new(FakeTranscripts {
        calls: Mutex::new(Vec::new()),
    });
    let records = vec![rec("a"), rec("no_captions"), rec("stuck"), rec("a"), rec("b")];

    let out = enrich_all(
        records,
        source.clone(),
        &PoolConfig::new(4, Duration::from_millis(100)),
    )
    .await;

    let ids: Vec<_> = out.iter().map(|r| r.video_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "no_captions", "stuck", "a", "b"]);
    assert_eq!(out[0].transcript.as_deref(), Some("spoken words of a"));
    assert_eq!(out[1].transcript.as_deref(), Some(""));
    assert_eq!(out[2].transcript.as_deref(), Some(""));
    assert_eq!(out[3].transcript.as_deref(), Some("spoken words of a"));
    assert!(out[4].has_transcript());

    // One lookup per distinct id.
    let mut calls = source.calls.lock().clone();
    calls.sort();
    assert_eq!(calls, vec!["a", "b", "no_captions", "stuck"]);
}

#[tokio::test]
async fn empty_input_makes_no_calls() {
    let source = Arc::new(FakeTranscripts {
        calls: Mutex::new(Vec::new()),
    });
    let out = enrich_all(vec![], source.clone(), &PoolConfig::sequential(Duration::from_secs(1))).await;
    assert!(out.is_empty());
    assert!(source.calls.lock().is_empty());
}
