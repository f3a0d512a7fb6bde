// src/recommend/mod.rs
//! Request building, response grammar and the bounded retry loop.

pub mod channel_filter;
pub mod extract;
pub mod request;
pub mod retry;

pub use extract::{extract_recommendation, parse_comma_list, Extraction};
pub use request::{build_request, render_prompt};
pub use retry::{AttemptObserver, RetryMachine, RetryOutcome, RetryReport, MAX_ATTEMPTS};
