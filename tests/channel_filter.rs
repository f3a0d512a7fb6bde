// tests/channel_filter.rs
use parking_lot::Mutex;

use tube_curator::llm::{LlmClient, LlmFuture, MockClient};
use tube_curator::model::ChannelRecord;
use tube_curator::recommend::channel_filter::{
    filter_channels, match_channels, recommend_new_channels,
};
use tube_curator::recommend::{RetryMachine, RetryOutcome};

fn ch(id: &str, name: &str, desc: &str) -> ChannelRecord {
    ChannelRecord {
        channel_id: id.into(),
        channel_name: name.into(),
        description: desc.into(),
        total_video_count: 100,
        new_video_count: 2,
    }
}

fn subscriptions() -> Vec<ChannelRecord> {
    vec![
        ch("UC_veri", "Veritasium", "An element of truth"),
        ch("UC_3b1b", "3Blue1Brown", "Animated math"),
        ch("UC_cook", "Joshua Weissman", "Cooking, but better"),
        ch("UC_nodesc", "Silent Channel", ""),
    ]
}

/// Remembers the prompt and answers with a fixed text.
struct RecordingLlm {
    answer: String,
    prompt: Mutex<Option<String>>,
}

impl LlmClient for RecordingLlm {
    fn generate<'a>(&'a self, prompt: &'a str) -> LlmFuture<'a> {
        *self.prompt.lock() = Some(prompt.to_string());
        let out = self.answer.clone();
        Box::pin(async move { Ok(out) })
    }
    fn provider_name(&self) -> &'static str {
        "recording"
    }
}

#[tokio::test]
async fn filter_prompt_lists_described_channels_and_answer_maps_to_ids() {
    let llm = RecordingLlm {
        answer: "'3Blue1Brown', veritasium, Some Unknown Channel".to_string(),
        prompt: Mutex::new(None),
    };
    let subs = subscriptions();

    let report = filter_channels(&RetryMachine::new(&llm), &subs, "math and physics", 2).await;
    let names = match report.outcome {
        RetryOutcome::Succeeded(names) => names,
        RetryOutcome::RetryExhausted => panic!("answer should parse"),
    };
    assert_eq!(names, vec!["3Blue1Brown", "veritasium", "Some Unknown Channel"]);
    assert_eq!(match_channels(&names, &subs), vec!["UC_3b1b", "UC_veri"]);

    let prompt = llm.prompt.lock().clone().unwrap();
    assert!(prompt.contains(
        "Veritasium:An element of truth, 3Blue1Brown:Animated math, Joshua Weissman:Cooking, but better"
    ));
    assert!(!prompt.contains("Silent Channel"));
    assert!(prompt.contains("math and physics"));
    assert!(prompt.contains("Choose the 2 channels"));
}

#[tokio::test]
async fn empty_list_answer_exhausts_retries() {
    let llm = MockClient::new(" , , ");
    let report = filter_channels(&RetryMachine::new(&llm), &subscriptions(), "x", 3).await;
    assert_eq!(report.outcome, RetryOutcome::RetryExhausted);
    assert_eq!(report.attempts.len(), 3);
}

#[test]
fn partial_names_match_by_containment() {
    let subs = subscriptions();
    let names = vec!["Weissman".to_string(), "blue1".to_string()];
    assert_eq!(match_channels(&names, &subs), vec!["UC_cook", "UC_3b1b"]);
}

#[test]
fn nothing_matches_nothing() {
    assert!(match_channels(&["Anything".to_string()], &[]).is_empty());
    assert!(match_channels(&[], &subscriptions()).is_empty());
}

#[tokio::test]
async fn discovery_drops_already_subscribed_channels() {
    let llm = MockClient::new("Veritasium, Numberphile, Kurzgesagt");
    let history = vec!["Why is this number everywhere?".to_string()];
    let report = recommend_new_channels(
        &RetryMachine::new(&llm),
        &history,
        &subscriptions(),
        "math",
        3,
    )
    .await;
    assert_eq!(
        report.into_value(),
        Some(vec!["Numberphile".to_string(), "Kurzgesagt".to_string()])
    );
}

#[tokio::test]
async fn discovery_with_only_known_channels_is_malformed() {
    let llm = MockClient::new("Veritasium, 3Blue1Brown");
    let report = recommend_new_channels(&RetryMachine::new(&llm), &[], &subscriptions(), "math", 2).await;
    assert_eq!(report.outcome, RetryOutcome::RetryExhausted);
}
