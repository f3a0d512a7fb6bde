// src/config/mod.rs
pub mod llm;
pub mod pipeline;

pub use llm::LlmConfig;
pub use pipeline::{PipelineConfig, PoolConfig};
