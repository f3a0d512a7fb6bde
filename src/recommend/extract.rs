// src/recommend/extract.rs
//! Response grammar. Pure functions over the raw model text.

use once_cell::sync::OnceCell;
use regex::Regex;
use std::collections::HashMap;

use crate::model::RecommendationResult;

/// Result of running a grammar over one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction<T> {
    Success(T),
    Malformed { missing: Vec<&'static str> },
}

impl<T> Extraction<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Extraction::Success(_))
    }

    pub fn ok(self) -> Option<T> {
        match self {
            Extraction::Success(v) => Some(v),
            Extraction::Malformed { .. } => None,
        }
    }
}

pub const FIELD_VIDEO_ID: &str = "video_id";
pub const FIELD_EXPLANATION: &str = "explanation";
/// Accepted in place of `explanation`.
pub const EXPLANATION_ALIASES: [&str; 2] = ["Begründung", "Begruendung"];

fn field_regex(name: &str) -> Regex {
    let quoted = regex::escape(name);
    // A value runs up to the next quote of the same kind it opened with.
    let pattern = format!(r#"(?:'{quoted}'|"{quoted}")\s*:\s*(?:'([^']*)'|"([^"]*)")"#);
    Regex::new(&pattern).unwrap()
}

/// Compiled patterns for the canonical fields and their aliases.
fn known_fields() -> &'static HashMap<&'static str, Regex> {
    static CACHE: OnceCell<HashMap<&'static str, Regex>> = OnceCell::new();
    CACHE.get_or_init(|| {
        [FIELD_VIDEO_ID, FIELD_EXPLANATION]
            .into_iter()
            .chain(EXPLANATION_ALIASES)
            .map(|n| (n, field_regex(n)))
            .collect()
    })
}

fn cached_regex(name: &'static str) -> &'static Regex {
    &known_fields()[name]
}

/// First occurrence of `'name': 'value'` (either quote style), trimmed.
/// Empty values count as absent. Only names outside the known set are
/// compiled per call.
pub fn extract_field(text: &str, name: &str) -> Option<String> {
    match known_fields().get(name) {
        Some(re) => first_value(re, text),
        None => first_value(&field_regex(name), text),
    }
}

fn first_value(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1).or_else(|| c.get(2)))
        .map(|m| m.as_str().trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Both fields required; their order in the text does not matter.
pub fn extract_recommendation(text: &str) -> Extraction<RecommendationResult> {
    let video_id = first_value(cached_regex(FIELD_VIDEO_ID), text);
    let explanation = first_value(cached_regex(FIELD_EXPLANATION), text).or_else(|| {
        EXPLANATION_ALIASES
            .iter()
            .find_map(|alias| first_value(cached_regex(*alias), text))
    });

    match (video_id, explanation) {
        (Some(video_id), Some(explanation)) => Extraction::Success(RecommendationResult {
            video_id,
            explanation,
        }),
        (v, e) => {
            let mut missing = Vec::new();
            if v.is_none() {
                missing.push(FIELD_VIDEO_ID);
            }
            if e.is_none() {
                missing.push(FIELD_EXPLANATION);
            }
            Extraction::Malformed { missing }
        }
    }
}

/// Flat comma separated list. Quotes, brackets and surrounding whitespace are
/// stripped from every element; empty elements are dropped. An empty list is
/// malformed.
pub fn parse_comma_list(text: &str) -> Extraction<Vec<String>> {
    let items: Vec<String> = text
        .split([',', '\n'])
        .map(|s| {
            s.trim()
                .trim_matches(|c: char| matches!(c, '\'' | '"' | '[' | ']' | '`'))
                .trim()
                .to_string()
        })
        .filter(|s| !s.is_empty())
        .collect();

    if items.is_empty() {
        Extraction::Malformed {
            missing: vec!["list"],
        }
    } else {
        Extraction::Success(items)
    }
}
