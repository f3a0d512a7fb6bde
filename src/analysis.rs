// src/analysis.rs
//! One-shot LLM helpers over a single transcript or the watch-later list.
//! No retries here: a failed call is simply `None`.

use crate::ingest::normalize_text;
use crate::llm::LlmClient;
use crate::model::VideoRecord;

const MAX_TRANSCRIPT_CHARS: usize = 12_000;

async fn ask(llm: &dyn LlmClient, what: &'static str, prompt: String) -> Option<String> {
    match llm.generate(&prompt).await {
        Ok(text) => {
            let text = text.trim();
            if text.is_empty() {
                None
            } else {
                Some(text.to_string())
            }
        }
        Err(e) => {
            tracing::warn!(target: "analysis", what, error = %e, "llm call failed");
            None
        }
    }
}

fn transcript_of(record: &VideoRecord) -> Option<String> {
    record
        .has_transcript()
        .then(|| normalize_text(record.transcript.as_deref().unwrap_or_default(), MAX_TRANSCRIPT_CHARS))
}

pub async fn summarize(llm: &dyn LlmClient, record: &VideoRecord) -> Option<String> {
    let transcript = transcript_of(record)?;
    let prompt = format!(
        "Summarise the following video in a few sentences.\nTitle: {}\nTranscript: {}",
        record.title, transcript
    );
    ask(llm, "summary", prompt).await
}

/// Like [`summarize`] but must not reveal how the video ends.
pub async fn summarize_without_spoiler(llm: &dyn LlmClient, record: &VideoRecord) -> Option<String> {
    let transcript = transcript_of(record)?;
    let prompt = format!(
        "Summarise the following video so that someone who has not watched it yet \
knows what to expect. Do not reveal results, twists or the ending.\nTitle: {}\nTranscript: {}",
        record.title, transcript
    );
    ask(llm, "spoiler_free_summary", prompt).await
}

/// Returns `None` without calling the model when there is no transcript.
pub async fn clickbait_check(llm: &dyn LlmClient, record: &VideoRecord) -> Option<String> {
    let transcript = transcript_of(record)?;
    let prompt = format!(
        "Does the title of this video promise something the content does not deliver? \
Answer with 'clickbait' or 'not clickbait' followed by one sentence of reasoning.\n\
Title: {}\nTranscript: {}",
        record.title, transcript
    );
    ask(llm, "clickbait", prompt).await
}

/// Short overview of the whole watch-later list. `None` for an empty list.
pub async fn watch_list_summary(llm: &dyn LlmClient, records: &[VideoRecord]) -> Option<String> {
    if records.is_empty() {
        return None;
    }
    let mut listing = String::new();
    for r in records {
        listing.push_str(&format!("- {} ({}, {})\n", r.title, r.channel_name, r.clock_length()));
    }
    let prompt = format!(
        "This is the viewer's watch-later list:\n{listing}\n\
Give a short overview of the topics in it and how long it takes to watch everything."
    );
    ask(llm, "watch_list", prompt).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{DisabledClient, MockClient};

    #[tokio::test]
    async fn empty_transcript_skips_the_model() {
        let llm = MockClient::new("clickbait");
        let rec = VideoRecord::new("v1", "You won't believe").unwrap().with_transcript("");
        assert_eq!(clickbait_check(&llm, &rec).await, None);
    }

    #[tokio::test]
    async fn transport_failure_is_none() {
        let rec = VideoRecord::new("v1", "t").unwrap().with_transcript("words");
        assert_eq!(summarize(&DisabledClient, &rec).await, None);
    }

    #[tokio::test]
    async fn answer_is_trimmed() {
        let llm = MockClient::new("  not clickbait, honest title \n");
        let rec = VideoRecord::new("v1", "t").unwrap().with_transcript("words");
        assert_eq!(
            clickbait_check(&llm, &rec).await.as_deref(),
            Some("not clickbait, honest title")
        );
        assert_eq!(watch_list_summary(&llm, &[]).await, None);
    }
}
