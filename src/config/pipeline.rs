// src/config/pipeline.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_CONFIG_PATH: &str = "CURATOR_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/pipeline.toml";

fn default_concurrency_limit() -> usize {
    num_cpus::get().saturating_mul(2).max(1)
}
fn default_fetch_timeout_secs() -> u64 {
    20
}
fn default_transcript_timeout_secs() -> u64 {
    15
}
fn default_llm_timeout_secs() -> u64 {
    60
}
fn default_languages() -> Vec<String> {
    vec!["de".to_string(), "en".to_string()]
}
fn default_max_transcript_chars() -> usize {
    4_000
}
fn default_scraper_program() -> String {
    "yt-dlp".to_string()
}
fn default_feed_host() -> String {
    "www.youtube.com".to_string()
}
fn default_region_code() -> String {
    "DE".to_string()
}
fn default_max_results() -> u32 {
    25
}

/// Tunables for one pipeline run. Every field has a default, so an absent
/// or partial TOML file is fine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Upper bound on workers per stage; a stage uses `min(units, limit)`.
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_transcript_timeout_secs")]
    pub transcript_timeout_secs: u64,
    #[serde(default = "default_llm_timeout_secs")]
    pub llm_timeout_secs: u64,
    #[serde(default = "default_languages")]
    pub transcript_languages: Vec<String>,
    #[serde(default = "default_max_transcript_chars")]
    pub max_transcript_chars: usize,
    #[serde(default = "default_scraper_program")]
    pub scraper_program: String,
    #[serde(default = "default_feed_host")]
    pub feed_host: String,
    #[serde(default = "default_region_code")]
    pub region_code: String,
    /// Results per search / per channel request.
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: default_concurrency_limit(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            transcript_timeout_secs: default_transcript_timeout_secs(),
            llm_timeout_secs: default_llm_timeout_secs(),
            transcript_languages: default_languages(),
            max_transcript_chars: default_max_transcript_chars(),
            scraper_program: default_scraper_program(),
            feed_host: default_feed_host(),
            region_code: default_region_code(),
            max_results: default_max_results(),
        }
    }
}

/// Worker-pool parameters handed to one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub concurrency_limit: usize,
    pub timeout: Duration,
}

impl PoolConfig {
    pub fn new(concurrency_limit: usize, timeout: Duration) -> Self {
        Self {
            concurrency_limit: concurrency_limit.max(1),
            timeout,
        }
    }

    /// Single worker, used by tests that need deterministic scheduling.
    pub fn sequential(timeout: Duration) -> Self {
        Self::new(1, timeout)
    }

    /// `min(units, limit)`, never zero.
    pub fn pool_size(&self, units: usize) -> usize {
        units.min(self.concurrency_limit).max(1)
    }
}

impl PipelineConfig {
    pub fn fetch_pool(&self) -> PoolConfig {
        PoolConfig::new(
            self.concurrency_limit,
            Duration::from_secs(self.fetch_timeout_secs),
        )
    }

    pub fn enrich_pool(&self) -> PoolConfig {
        PoolConfig::new(
            self.concurrency_limit,
            Duration::from_secs(self.transcript_timeout_secs),
        )
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    fn sanitize(mut self) -> Self {
        if self.concurrency_limit == 0 {
            self.concurrency_limit = default_concurrency_limit();
        }
        if self.transcript_languages.is_empty() {
            self.transcript_languages = default_languages();
        }
        if self.max_transcript_chars == 0 {
            self.max_transcript_chars = default_max_transcript_chars();
        }
        self.max_results = self.max_results.clamp(1, 1_000);
        self
    }
}

/// Load config from an explicit TOML path.
pub fn load_from(path: &Path) -> Result<PipelineConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading pipeline config from {}", path.display()))?;
    parse(&content)
}

/// Load config using env var + fallback:
/// 1) $CURATOR_CONFIG_PATH (must exist)
/// 2) config/pipeline.toml
/// 3) built-in defaults
pub fn load_default() -> Result<PipelineConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_from(&pb);
        }
        return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
    }
    let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
    if default_path.exists() {
        return load_from(&default_path);
    }
    Ok(PipelineConfig::default())
}

fn parse(s: &str) -> Result<PipelineConfig> {
    let cfg: PipelineConfig = toml::from_str(s).context("parsing pipeline config toml")?;
    Ok(cfg.sanitize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    #[test]
    fn partial_toml_fills_defaults_and_sanitizes() {
        let cfg = parse("concurrency_limit = 0\nmax_results = 5000\nregion_code = \"US\"").unwrap();
        assert!(cfg.concurrency_limit >= 1);
        assert_eq!(cfg.max_results, 1_000);
        assert_eq!(cfg.region_code, "US");
        assert_eq!(cfg.transcript_languages, vec!["de", "en"]);
    }

    #[test]
    fn pool_size_is_bounded_by_units_and_limit() {
        let pool = PoolConfig::new(4, Duration::from_secs(1));
        assert_eq!(pool.pool_size(2), 2);
        assert_eq!(pool.pool_size(10), 4);
        assert_eq!(pool.pool_size(0), 1);
        assert_eq!(PoolConfig::new(0, Duration::ZERO).concurrency_limit, 1);
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_CONFIG_PATH);

        let cfg = load_default().unwrap();
        assert_eq!(cfg.fetch_timeout_secs, 20);

        let p = tmp.path().join("custom.toml");
        fs::write(&p, "fetch_timeout_secs = 3").unwrap();
        env::set_var(ENV_CONFIG_PATH, p.display().to_string());
        assert_eq!(load_default().unwrap().fetch_timeout_secs, 3);

        env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml"));
        assert!(load_default().is_err());

        env::remove_var(ENV_CONFIG_PATH);
        env::set_current_dir(&old).unwrap();
    }
}
