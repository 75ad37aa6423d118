pub mod aggregator;
pub mod config;
pub mod db;
pub mod fetcher;
pub mod llm_adapter;
pub mod lock;
pub mod parser;
pub mod pipeline;
pub mod registry;
pub mod scheduler;
pub mod sources;
pub mod store;
pub mod summarizer;
pub mod types;
pub mod utils;

pub use aggregator::NewsAggregator;
pub use config::{AggregatorConfig, LlmConfig};
pub use db::Database;
pub use fetcher::Fetcher;
pub use lock::PassLock;
pub use parser::FeedParser;
pub use pipeline::{FetchOrchestrator, PassSettings, PassState};
pub use registry::SourceRegistry;
pub use store::ArticleStore;
pub use summarizer::{build_summarizer, LlmSummarizer};
pub use types::*;
