// src/ingest/mod.rs
pub mod orchestrator;
pub mod providers;
pub mod types;

use crate::model::VideoRecord;
use metrics::{describe_counter, describe_histogram};
use once_cell::sync::OnceCell;
use std::collections::{HashMap, HashSet};

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("fetch_tasks_total", "Fetch tasks submitted to a stage.");
        describe_counter!(
            "fetch_task_errors_total",
            "Fetch tasks that failed or timed out."
        );
        describe_counter!(
            "fetch_records_total",
            "Records kept after merge + dedup."
        );
        describe_counter!(
            "fetch_dedup_total",
            "Records removed because their video id was already seen."
        );
        describe_counter!(
            "enrich_empty_total",
            "Records left without a usable transcript."
        );
        describe_histogram!("fetch_stage_ms", "Wall time of one fetch stage in ms.");
    });
}

/// Normalize text: decode entities, strip tags, collapse whitespace, cap length.
pub fn normalize_text(s: &str, max_chars: usize) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    // “ ” « » ‘ ’ to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > max_chars {
        out = out.chars().take(max_chars).collect();
    }
    out
}

/// Flatten, dedupe by `video_id` (first seen wins) and sort by upload time, newest first.
///
/// The sort is stable, so records sharing a timestamp keep their fan-in order.
/// Returns the merged list and the number of duplicates removed.
pub fn merge_records<I>(batches: I) -> (Vec<VideoRecord>, usize)
where
    I: IntoIterator<Item = Vec<VideoRecord>>,
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::new();
    let mut dup = 0usize;

    for batch in batches {
        for rec in batch {
            if rec.video_id.trim().is_empty() {
                continue;
            }
            if !seen.insert(rec.video_id.clone()) {
                dup += 1;
                continue;
            }
            merged.push(rec);
        }
    }

    merged.sort_by(|a, b| b.upload_timestamp.cmp(&a.upload_timestamp));
    (merged, dup)
}

/// Keep the first `per_channel` records of every `channel_name`, order untouched.
pub fn cap_per_channel(records: Vec<VideoRecord>, per_channel: usize) -> Vec<VideoRecord> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    records
        .into_iter()
        .filter(|r| {
            let n = seen.entry(r.channel_name.clone()).or_insert(0);
            *n += 1;
            *n <= per_channel
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: &str, ts: i64) -> VideoRecord {
        VideoRecord::new(id, format!("title {id}"))
            .unwrap()
            .with_upload_timestamp(ts)
    }

    #[test]
    fn normalize_text_collapses_ws_and_tags() {
        let s = "  Hello,&nbsp;&nbsp; <b>world</b>  ";
        assert_eq!(normalize_text(s, 100), "Hello, world");
    }

    #[test]
    fn normalize_text_caps_length() {
        let s = "abcdef";
        assert_eq!(normalize_text(s, 3), "abc");
    }

    #[test]
    fn merge_keeps_first_seen_and_sorts_desc() {
        let mut first = rec("a", 10);
        first.title = "first".into();
        let mut second = rec("a", 99);
        second.title = "second".into();

        let (out, dup) = merge_records(vec![
            vec![first, rec("b", 50)],
            vec![second, rec("c", 30)],
        ]);

        assert_eq!(dup, 1);
        let ids: Vec<_> = out.iter().map(|r| r.video_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
        assert_eq!(out[2].title, "first");
    }

    #[test]
    fn merge_ties_keep_fan_in_order() {
        let (out, _) = merge_records(vec![vec![rec("x", 5)], vec![rec("y", 5)]]);
        assert_eq!(out[0].video_id, "x");
        assert_eq!(out[1].video_id, "y");
    }

    #[test]
    fn cap_keeps_first_n_per_channel() {
        let recs = vec![
            rec("a1", 3).with_channel("A"),
            rec("b1", 3).with_channel("B"),
            rec("a2", 2).with_channel("A"),
            rec("a3", 1).with_channel("A"),
        ];
        let ids: Vec<_> = cap_per_channel(recs, 2)
            .into_iter()
            .map(|r| r.video_id)
            .collect();
        assert_eq!(ids, vec!["a1", "b1", "a2"]);
    }
}
