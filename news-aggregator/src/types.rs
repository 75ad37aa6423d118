use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use interfaces::{
    Article, BaselineSummarizer, FetchAdapter, FetchErrorKind, RawItem, Source, SourceFetchError,
    SourceType, Summarizer,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub max_feed_size_mb: usize,
    pub follow_redirects: bool,
    pub max_redirects: usize,
    /// Minimum spacing between two requests to the same host.
    pub host_interval_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "News-Aggregator/1.0".to_string(),
            timeout_seconds: 30,
            max_retries: 3,
            retry_delay_seconds: 5,
            max_feed_size_mb: 10,
            follow_redirects: true,
            max_redirects: 5,
            host_interval_ms: 1000,
        }
    }
}

/// Outcome of one source within a pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SourceReport {
    pub source_id: Uuid,
    pub source_name: String,
    pub items_found: usize,
    pub new_items: usize,
    pub error: Option<String>,
}

impl SourceReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassReport {
    pub started_at: DateTime<Utc>,
    pub new_count: usize,
    pub total_count: usize,
    pub evicted_count: usize,
    pub duration_ms: u64,
    pub sources: Vec<SourceReport>,
}

impl PassReport {
    pub fn failed_sources(&self) -> usize {
        self.sources.iter().filter(|s| !s.succeeded()).count()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PassError {
    #[error("Fetch already in progress")]
    AlreadyRunning,

    #[error("Failed to prepare fetch pass: {0}")]
    Setup(#[source] AggregatorError),

    #[error("Failed to persist articles: {0}")]
    Persistence(#[source] AggregatorError),
}

/// Structured result handed to whoever triggered a pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FetchOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<usize>,
}

impl FetchOutcome {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            new_count: None,
            total_count: None,
        }
    }
}

impl From<&PassReport> for FetchOutcome {
    fn from(report: &PassReport) -> Self {
        Self {
            success: true,
            message: None,
            new_count: Some(report.new_count),
            total_count: Some(report.total_count),
        }
    }
}

impl From<std::result::Result<PassReport, PassError>> for FetchOutcome {
    fn from(result: std::result::Result<PassReport, PassError>) -> Self {
        match result {
            Ok(report) => Self::from(&report),
            Err(e) => Self::failure(e.to_string()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Source not found: {id}")]
    SourceNotFound { id: Uuid },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("General error: {0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, AggregatorError>;
