use crate::types::{AggregatorError, FetchConfig, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_CONFIG_PATH: &str = "news-aggregator.toml";

const ENV_DATABASE_URL: &str = "NEWS_AGGREGATOR_DATABASE_URL";
const ENV_MAX_ARTICLES: &str = "NEWS_AGGREGATOR_MAX_ARTICLES";
const ENV_LLM_API_KEY: &str = "NEWS_AGGREGATOR_LLM_API_KEY";
const ENV_LOG_LEVEL: &str = "NEWS_AGGREGATOR_LOG";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub database_url: String,
    /// Store capacity; the oldest fetched articles are evicted beyond it.
    pub max_articles: usize,
    pub source_timeout_secs: u64,
    pub fetch_concurrency: usize,
    pub summary_concurrency: usize,
    pub fetch_interval_secs: u64,
    /// A pass lease older than this is considered abandoned by a crashed process.
    pub pass_lease_secs: u64,
    pub summary_chars: usize,
    pub log_level: String,
    pub fetch: FetchConfig,
    pub llm: Option<LlmConfig>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://news-aggregator.db".to_string(),
            max_articles: 500,
            source_timeout_secs: 60,
            fetch_concurrency: 4,
            summary_concurrency: 4,
            fetch_interval_secs: 1800,
            pass_lease_secs: 900,
            summary_chars: interfaces::baseline::DEFAULT_SUMMARY_CHARS,
            log_level: "info".to_string(),
            fetch: FetchConfig::default(),
            llm: None,
        }
    }
}

/// OpenAI-compatible chat completion endpoint used for summaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub max_input_chars: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/v1/chat/completions".to_string(),
            model: "llama3.1".to_string(),
            api_key: None,
            timeout_secs: 20,
            max_tokens: 160,
            max_input_chars: 6000,
        }
    }
}

impl AggregatorConfig {
    /// Load configuration:
    /// 1) the explicit path, if given (must exist)
    /// 2) ./news-aggregator.toml, if present
    /// 3) built-in defaults
    ///
    /// Environment overrides are applied on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml(&content)
            .map_err(|e| AggregatorError::Config(format!("{}: {}", path.display(), e)))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| AggregatorError::Config(e.to_string()))
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_DATABASE_URL) {
            self.database_url = url;
        }
        if let Some(max) = lookup(ENV_MAX_ARTICLES) {
            self.max_articles = max
                .trim()
                .parse()
                .map_err(|_| AggregatorError::Config(format!("{} must be a number, got '{}'", ENV_MAX_ARTICLES, max)))?;
        }
        if let Some(key) = lookup(ENV_LLM_API_KEY) {
            self.llm.get_or_insert_with(LlmConfig::default).api_key = Some(key);
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_articles == 0 {
            return Err(AggregatorError::Config("max_articles must be at least 1".to_string()));
        }
        if self.source_timeout_secs == 0 {
            return Err(AggregatorError::Config("source_timeout_secs must be at least 1".to_string()));
        }
        if self.pass_lease_secs <= self.source_timeout_secs {
            return Err(AggregatorError::Config(
                "pass_lease_secs must be longer than source_timeout_secs".to_string(),
            ));
        }
        Ok(())
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }

    pub fn pass_lease(&self) -> Duration {
        Duration::from_secs(self.pass_lease_secs)
    }

    pub fn fetch_interval(&self) -> Duration {
        Duration::from_secs(self.fetch_interval_secs.max(1))
    }
}
