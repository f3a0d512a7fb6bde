// src/recommend/retry.rs
//! Bounded request/validate loop around one LLM prompt.
//!
//! `Requesting -> Validating -> {Success, Malformed}`; `Malformed` goes back to
//! `Requesting` until the attempt bound is reached, then the run ends as
//! `RetryExhausted`. The prompt is identical for every attempt.

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use std::time::Duration;

use super::extract::Extraction;
use crate::llm::LlmClient;
use crate::model::{AttemptOutcome, ExtractionAttempt};

pub const MAX_ATTEMPTS: u32 = 3;

/// Progress hook. `show_progress` is true only for the first attempt.
pub trait AttemptObserver: Send + Sync {
    fn on_attempt(&self, attempt_number: u32, show_progress: bool);
}

impl<F> AttemptObserver for F
where
    F: Fn(u32, bool) + Send + Sync,
{
    fn on_attempt(&self, attempt_number: u32, show_progress: bool) {
        self(attempt_number, show_progress)
    }
}

pub struct NoopObserver;

impl AttemptObserver for NoopObserver {
    fn on_attempt(&self, _attempt_number: u32, _show_progress: bool) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T> {
    Succeeded(T),
    RetryExhausted,
}

/// Everything a run produced; the caller decides what to surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryReport<T> {
    pub outcome: RetryOutcome<T>,
    pub attempts: Vec<ExtractionAttempt>,
}

impl<T> RetryReport<T> {
    pub fn succeeded(&self) -> Option<&T> {
        match &self.outcome {
            RetryOutcome::Succeeded(v) => Some(v),
            RetryOutcome::RetryExhausted => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self.outcome {
            RetryOutcome::Succeeded(v) => Some(v),
            RetryOutcome::RetryExhausted => None,
        }
    }
}

enum State {
    Requesting { attempt: u32 },
    Validating { attempt: u32, raw: String },
    Malformed { attempt: u32 },
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("llm_attempts_total", "LLM request attempts, retries included.");
        describe_counter!(
            "llm_retry_exhausted_total",
            "Runs that ended without a well-formed answer."
        );
    });
}

static NOOP: NoopObserver = NoopObserver;

pub struct RetryMachine<'a> {
    llm: &'a dyn LlmClient,
    observer: &'a dyn AttemptObserver,
    max_attempts: u32,
    timeout: Option<Duration>,
}

impl<'a> RetryMachine<'a> {
    pub fn new(llm: &'a dyn LlmClient) -> Self {
        Self {
            llm,
            observer: &NOOP,
            max_attempts: MAX_ATTEMPTS,
            timeout: None,
        }
    }

    pub fn with_observer(mut self, observer: &'a dyn AttemptObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Lowers the bound; clamped to `1..=MAX_ATTEMPTS`.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.clamp(1, MAX_ATTEMPTS);
        self
    }

    /// Per-attempt deadline; an expired attempt counts as malformed.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn llm(&self) -> &'a dyn LlmClient {
        self.llm
    }

    /// Drive the loop until `grammar` accepts a response or the bound is hit.
    /// Never returns an error: transport failures are malformed attempts.
    pub async fn run<T, F>(&self, prompt: &str, grammar: F) -> RetryReport<T>
    where
        T: Send,
        F: Fn(&str) -> Extraction<T> + Send + Sync,
    {
        ensure_metrics_described();
        let mut attempts: Vec<ExtractionAttempt> = Vec::new();
        let mut state = State::Requesting { attempt: 1 };

        loop {
            state = match state {
                State::Requesting { attempt } => {
                    self.observer.on_attempt(attempt, attempt == 1);
                    counter!("llm_attempts_total", "provider" => self.llm.provider_name())
                        .increment(1);
                    match self.request(prompt).await {
                        Ok(raw) => State::Validating { attempt, raw },
                        Err(reason) => {
                            tracing::warn!(
                                target: "recommend",
                                attempt,
                                provider = self.llm.provider_name(),
                                %reason,
                                "llm request failed"
                            );
                            attempts.push(ExtractionAttempt {
                                attempt_number: attempt,
                                raw_response_text: String::new(),
                                outcome: AttemptOutcome::Malformed,
                            });
                            State::Malformed { attempt }
                        }
                    }
                }
                State::Validating { attempt, raw } => match grammar(&raw) {
                    Extraction::Success(value) => {
                        attempts.push(ExtractionAttempt {
                            attempt_number: attempt,
                            raw_response_text: raw,
                            outcome: AttemptOutcome::Success,
                        });
                        return RetryReport {
                            outcome: RetryOutcome::Succeeded(value),
                            attempts,
                        };
                    }
                    Extraction::Malformed { missing } => {
                        tracing::debug!(
                            target: "recommend",
                            attempt,
                            ?missing,
                            "malformed llm response"
                        );
                        attempts.push(ExtractionAttempt {
                            attempt_number: attempt,
                            raw_response_text: raw,
                            outcome: AttemptOutcome::Malformed,
                        });
                        State::Malformed { attempt }
                    }
                },
                State::Malformed { attempt } if attempt >= self.max_attempts => {
                    counter!("llm_retry_exhausted_total").increment(1);
                    tracing::warn!(target: "recommend", attempts = attempt, "retry bound reached");
                    return RetryReport {
                        outcome: RetryOutcome::RetryExhausted,
                        attempts,
                    };
                }
                State::Malformed { attempt } => State::Requesting {
                    attempt: attempt + 1,
                },
            };
        }
    }

    async fn request(&self, prompt: &str) -> Result<String, String> {
        let call = self.llm.generate(prompt);
        let res = match self.timeout {
            Some(t) => match tokio::time::timeout(t, call).await {
                Ok(res) => res,
                Err(_) => return Err("timed out".to_string()),
            },
            None => call.await,
        };
        res.map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{DisabledClient, MockClient};
    use crate::recommend::extract::extract_recommendation;

    #[tokio::test]
    async fn first_good_answer_stops_the_loop() {
        let llm = MockClient::new("'video_id': 'v1' 'explanation': 'fits'");
        let report = RetryMachine::new(&llm)
            .run("prompt", extract_recommendation)
            .await;
        assert_eq!(report.attempts.len(), 1);
        assert_eq!(report.succeeded().map(|r| r.video_id.as_str()), Some("v1"));
    }

    #[tokio::test]
    async fn transport_failures_exhaust_the_bound() {
        let llm = DisabledClient;
        let report = RetryMachine::new(&llm)
            .run("prompt", extract_recommendation)
            .await;
        assert_eq!(report.outcome, RetryOutcome::RetryExhausted);
        assert_eq!(report.attempts.len(), MAX_ATTEMPTS as usize);
        assert!(report
            .attempts
            .iter()
            .all(|a| a.outcome == AttemptOutcome::Malformed));
    }
}
