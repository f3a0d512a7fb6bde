// src/recommend/request.rs
//! Pure request construction: records in, one immutable request out.

use crate::ingest::normalize_text;
use crate::model::{RecommendationRequest, RequestItem, VideoRecord};

/// Keep only records with a usable transcript, normalize and cap each one.
pub fn build_request(
    records: &[VideoRecord],
    interests: &str,
    max_transcript_chars: usize,
) -> RecommendationRequest {
    let items = records
        .iter()
        .filter(|r| r.has_transcript())
        .map(|r| RequestItem {
            title: normalize_text(&r.title, 300),
            transcript: normalize_text(
                r.transcript.as_deref().unwrap_or_default(),
                max_transcript_chars,
            ),
            video_id: r.video_id.clone(),
        })
        .collect();

    RecommendationRequest {
        items,
        interests: interests.trim().to_string(),
    }
}

/// Single prompt text sent for every attempt of one request.
pub fn render_prompt(request: &RecommendationRequest) -> String {
    let mut out = String::with_capacity(512 + request.items.len() * 256);
    out.push_str(
        "Below is a list of videos with their title, transcript and video id. \
Pick the ONE video the viewer should watch next: it must match their interests \
and must not be clickbait.\n",
    );
    out.push_str("Viewer interests: ");
    out.push_str(&request.interests);
    out.push_str(
        "\n\nAnswer in exactly this format and nothing else:\n\
'video_id': '<id of the chosen video>'\n\
'explanation': '<one or two sentences why>'\n\n",
    );

    for item in &request.items {
        out.push_str("Title: ");
        out.push_str(&item.title);
        out.push_str("\nTranscript: ");
        out.push_str(&item.transcript);
        out.push_str("\nVideo-ID: ");
        out.push_str(&item.video_id);
        out.push_str("\n\n");
    }
    out
}
