use crate::config::LlmConfig;
use crate::types::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const SYSTEM_PROMPT: &str = "You summarize news articles. Reply with two or three plain sentences \
covering the key facts. No preamble, no markdown.";

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model returned no content")]
    EmptyResponse,

    #[error("{0}")]
    Unavailable(String),
}

/// Trait for LLM adapters that can condense article text
#[async_trait]
pub trait LlmAdapter: Send + Sync {
    /// Get the name of this LLM adapter
    fn adapter_name(&self) -> String;

    /// Create a short summary of the given plain text
    async fn create_summary(&self, text: &str) -> std::result::Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Adapter for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAiAdapter {
    client: reqwest::Client,
    config: LlmConfig,
}

impl OpenAiAdapter {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl LlmAdapter for OpenAiAdapter {
    fn adapter_name(&self) -> String {
        format!("OpenAI-compatible ({})", self.config.model)
    }

    async fn create_summary(&self, text: &str) -> std::result::Result<String, LlmError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: 0.2,
        };

        let mut builder = self.client.post(&self.config.endpoint).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        debug!("Requesting summary from {} ({} chars)", self.config.endpoint, text.len());
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: crate::utils::text::truncate_chars(&body, 200).to_string(),
            });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(LlmError::EmptyResponse)
    }
}

/// Mock LLM adapter for development and testing
pub struct MockLlmAdapter {
    name: String,
    response_delay_ms: u64,
    fail_with: Option<String>,
}

impl MockLlmAdapter {
    pub fn new(name: String) -> Self {
        Self {
            name,
            response_delay_ms: 0,
            fail_with: None,
        }
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.response_delay_ms = delay_ms;
        self
    }

    /// Make every call fail with `message`.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.fail_with = Some(message.into());
        self
    }
}

#[async_trait]
impl LlmAdapter for MockLlmAdapter {
    fn adapter_name(&self) -> String {
        format!("Mock LLM Adapter ({})", self.name)
    }

    async fn create_summary(&self, text: &str) -> std::result::Result<String, LlmError> {
        if self.response_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.response_delay_ms)).await;
        }
        if let Some(message) = &self.fail_with {
            return Err(LlmError::Unavailable(message.clone()));
        }

        // First sentence, extractive
        let first = text.split_inclusive('.').next().unwrap_or("").trim();
        if first.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(format!("[{}] {}", self.name, first))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_returns_first_sentence() {
        let adapter = MockLlmAdapter::new("m".into());
        let summary = adapter.create_summary("One thing. Another thing.").await.unwrap();
        assert_eq!(summary, "[m] One thing.");
    }

    #[tokio::test]
    async fn failing_mock_errors() {
        let adapter = MockLlmAdapter::new("m".into()).failing("quota exceeded");
        let err = adapter.create_summary("text").await.unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn chat_response_tolerates_missing_content() {
        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant"}}]}"#).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }
}
