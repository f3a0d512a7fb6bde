// src/ingest/types.rs
use crate::model::{FetchTask, SourceKind, VideoRecord};

/// Per-task failure reported by an adapter. Never escapes the fetch stage.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum FetchError {
    /// Source-side quota is used up; not retried within a run.
    #[error("source quota exhausted")]
    QuotaExhausted,
    /// Network, HTTP or external tool failure isolated to this task.
    #[error("transient fetch failure: {0}")]
    Transient(String),
    #[error("fetch timed out")]
    Timeout,
    #[error("adapter does not handle {0:?} tasks")]
    Unsupported(SourceKind),
    #[error("unparseable source payload: {0}")]
    Parse(String),
}

impl FetchError {
    pub fn transient(e: impl std::fmt::Display) -> Self {
        Self::Transient(e.to_string())
    }

    pub fn parse(e: impl std::fmt::Display) -> Self {
        Self::Parse(e.to_string())
    }

    /// Label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::QuotaExhausted => "quota_exhausted",
            Self::Transient(_) => "transient",
            Self::Timeout => "timeout",
            Self::Unsupported(_) => "unsupported",
            Self::Parse(_) => "parse",
        }
    }
}

/// One external video source. All variants are interchangeable behind this trait.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn fetch(&self, task: &FetchTask) -> Result<Vec<VideoRecord>, FetchError>;
    fn name(&self) -> &'static str;
}
