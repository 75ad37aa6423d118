use crate::config::AggregatorConfig;
use crate::llm_adapter::{LlmAdapter, OpenAiAdapter};
use crate::types::{BaselineSummarizer, Result, Summarizer};
use crate::utils::text::truncate_chars;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Summarizer backed by a language model, with a truncation fallback.
///
/// The model call is bounded by `timeout`. Errors, timeouts and empty answers
/// all fall back to [`BaselineSummarizer`]; a summary is always produced.
pub struct LlmSummarizer {
    adapter: Box<dyn LlmAdapter>,
    fallback: BaselineSummarizer,
    timeout: Duration,
    max_input_chars: usize,
}

impl LlmSummarizer {
    pub fn new(adapter: Box<dyn LlmAdapter>, fallback: BaselineSummarizer, timeout: Duration) -> Self {
        Self {
            adapter,
            fallback,
            timeout,
            max_input_chars: 6000,
        }
    }

    pub fn with_max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.max_input_chars = max_input_chars;
        self
    }

    fn degraded(&self, body: &str, reason: &str) -> String {
        warn!("Summarization degraded ({}), using truncated body", reason);
        self.fallback.summarize_text(body)
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, body: &str) -> String {
        let body = body.trim();
        if body.is_empty() {
            return String::new();
        }

        let input = truncate_chars(body, self.max_input_chars);
        match tokio::time::timeout(self.timeout, self.adapter.create_summary(input)).await {
            Ok(Ok(summary)) if !summary.trim().is_empty() => {
                debug!("Summarized {} chars with {}", input.len(), self.adapter.adapter_name());
                summary.trim().to_string()
            }
            Ok(Ok(_)) => self.degraded(body, "empty response"),
            Ok(Err(e)) => self.degraded(body, &e.to_string()),
            Err(_) => self.degraded(body, &format!("timed out after {:?}", self.timeout)),
        }
    }
}

/// Pick the summarizer described by the configuration.
pub fn build_summarizer(config: &AggregatorConfig) -> Result<Arc<dyn Summarizer>> {
    let fallback = BaselineSummarizer::new(config.summary_chars);
    match &config.llm {
        Some(llm) => {
            let adapter = OpenAiAdapter::new(llm.clone())?;
            info!("Using LLM summarizer: {}", adapter.adapter_name());
            Ok(Arc::new(
                LlmSummarizer::new(Box::new(adapter), fallback, Duration::from_secs(llm.timeout_secs))
                    .with_max_input_chars(llm.max_input_chars),
            ))
        }
        None => {
            info!("No LLM configured, summaries are truncated bodies");
            Ok(Arc::new(fallback))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_adapter::MockLlmAdapter;

    fn summarizer(adapter: MockLlmAdapter, timeout_ms: u64) -> LlmSummarizer {
        LlmSummarizer::new(Box::new(adapter), BaselineSummarizer::new(12), Duration::from_millis(timeout_ms))
    }

    #[tokio::test]
    async fn uses_model_output_when_available() {
        let s = summarizer(MockLlmAdapter::new("m".into()), 1000);
        assert_eq!(s.summarize("Rates held. Markets calm.").await, "[m] Rates held.");
    }

    #[tokio::test]
    async fn falls_back_when_model_fails() {
        let s = summarizer(MockLlmAdapter::new("m".into()).failing("503"), 1000);
        assert_eq!(s.summarize("alpha beta gamma delta").await, "alpha beta…");
    }

    #[tokio::test]
    async fn falls_back_when_model_is_slow() {
        let s = summarizer(MockLlmAdapter::new("m".into()).with_delay(500), 20);
        assert_eq!(s.summarize("short body").await, "short body");
    }

    #[tokio::test]
    async fn empty_body_skips_model() {
        let s = summarizer(MockLlmAdapter::new("m".into()).failing("should not be called"), 1000);
        assert_eq!(s.summarize("   ").await, "");
    }

    #[test]
    fn builds_baseline_without_llm_section() {
        assert!(build_summarizer(&AggregatorConfig::default()).is_ok());
    }
}
