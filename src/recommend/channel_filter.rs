// src/recommend/channel_filter.rs
//! Interest-based narrowing of the subscription list, plus discovery of
//! channels the viewer is not subscribed to yet.

use once_cell::sync::OnceCell;
use regex::Regex;

use super::extract::{parse_comma_list, Extraction};
use super::retry::{RetryMachine, RetryReport};
use crate::model::ChannelRecord;

/// Lowercase and drop every non-word character.
pub fn normalize_name(s: &str) -> String {
    static RE_NON_WORD: OnceCell<Regex> = OnceCell::new();
    let re = RE_NON_WORD.get_or_init(|| Regex::new(r"\W+").unwrap());
    re.replace_all(&s.to_lowercase(), "").into_owned()
}

/// `name:description` pairs joined by `, `; channels without a description are left out.
pub fn channel_list_line(channels: &[ChannelRecord]) -> String {
    channels
        .iter()
        .filter(|c| !c.description.trim().is_empty())
        .map(|c| format!("{}:{}", c.channel_name.trim(), c.description.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn render_filter_prompt(channels: &[ChannelRecord], interests: &str, count: usize) -> String {
    format!(
        "Here is a list of YouTube channels in the form name:description.\n\
{}\n\n\
Viewer interests: {}\n\n\
Choose the {} channels that match these interests best. Answer only with the \
channel names separated by commas, without any other text.",
        channel_list_line(channels),
        interests.trim(),
        count
    )
}

/// Ask the model for up to `count` channel names matching `interests`.
pub async fn filter_channels(
    machine: &RetryMachine<'_>,
    channels: &[ChannelRecord],
    interests: &str,
    count: usize,
) -> RetryReport<Vec<String>> {
    let prompt = render_filter_prompt(channels, interests, count);
    machine.run(&prompt, parse_comma_list).await
}

/// Map returned names back to channel ids.
///
/// A name matches the first channel whose normalized name contains the
/// normalized returned name. Ids appear once, in the order of `names`.
pub fn match_channels(names: &[String], channels: &[ChannelRecord]) -> Vec<String> {
    let normalized: Vec<String> = channels
        .iter()
        .map(|c| normalize_name(&c.channel_name))
        .collect();

    let mut out: Vec<String> = Vec::new();
    for name in names {
        let needle = normalize_name(name);
        if needle.is_empty() {
            continue;
        }
        match normalized.iter().position(|n| n.contains(&needle)) {
            Some(idx) => {
                let id = &channels[idx].channel_id;
                if !out.contains(id) {
                    out.push(id.clone());
                }
            }
            None => {
                tracing::debug!(target: "recommend", name = %name, "channel match miss");
            }
        }
    }
    out
}

pub fn render_discovery_prompt(
    history_titles: &[String],
    subscriptions: &[ChannelRecord],
    interests: &str,
    count: usize,
) -> String {
    let subscribed = subscriptions
        .iter()
        .map(|c| c.channel_name.trim())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Recently watched videos: {}\n\
Already subscribed channels: {}\n\
Viewer interests: {}\n\n\
Suggest {} YouTube channels the viewer is NOT subscribed to yet that fit \
what they watch and their interests. Answer only with the channel names \
separated by commas, without any other text.",
        history_titles.join(", "),
        subscribed,
        interests.trim(),
        count
    )
}

/// Channel names the viewer might subscribe to. Names matching an existing
/// subscription are removed; an answer with nothing new left is malformed.
pub async fn recommend_new_channels(
    machine: &RetryMachine<'_>,
    history_titles: &[String],
    subscriptions: &[ChannelRecord],
    interests: &str,
    count: usize,
) -> RetryReport<Vec<String>> {
    let prompt = render_discovery_prompt(history_titles, subscriptions, interests, count);
    machine
        .run(&prompt, |raw| match parse_comma_list(raw) {
            Extraction::Success(names) => {
                let fresh: Vec<String> = names
                    .into_iter()
                    .filter(|n| match_channels(std::slice::from_ref(n), subscriptions).is_empty())
                    .collect();
                if fresh.is_empty() {
                    Extraction::Malformed {
                        missing: vec!["new channel"],
                    }
                } else {
                    Extraction::Success(fresh)
                }
            }
            malformed => malformed,
        })
        .await
}
