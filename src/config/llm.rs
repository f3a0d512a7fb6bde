// src/config/llm.rs
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

pub const DEFAULT_LLM_CONFIG_PATH: &str = "config/llm.json";
pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}
fn default_temperature() -> f32 {
    1.0
}
fn default_top_p() -> f32 {
    0.95
}
fn default_top_k() -> u32 {
    40
}
fn default_max_output_tokens() -> u32 {
    8_192
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub enabled: bool,
    #[serde(default = "default_model")]
    pub model: String,
    /// "ENV" means: read from GEMINI_API_KEY
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: default_model(),
            api_key: String::new(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

impl LlmConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        let cfg: LlmConfig = serde_json::from_str(&data)?;
        cfg.resolve()
    }

    /// File config if present, otherwise an env-only config that is enabled
    /// exactly when `GEMINI_API_KEY` is set.
    pub fn load_default() -> anyhow::Result<Self> {
        let path = Path::new(DEFAULT_LLM_CONFIG_PATH);
        if path.exists() {
            return Self::load_from_file(path);
        }
        let api_key = env::var(ENV_GEMINI_API_KEY).unwrap_or_default();
        Ok(Self {
            enabled: !api_key.trim().is_empty(),
            api_key,
            ..Self::default()
        })
    }

    fn resolve(mut self) -> anyhow::Result<Self> {
        if self.api_key.trim().eq_ignore_ascii_case("env") {
            self.api_key = env::var(ENV_GEMINI_API_KEY)
                .map_err(|_| anyhow::anyhow!("Missing {ENV_GEMINI_API_KEY} env var"))?;
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            self.temperature = default_temperature();
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            self.top_p = default_top_p();
        }
        if self.model.trim().is_empty() {
            self.model = default_model();
        }
        Ok(self)
    }
}
