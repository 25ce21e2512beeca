//! Answer generation via a hosted LLM
//!
//! The generator takes one prompt and returns one completion. Failures are
//! returned as a typed [`GenerationError`] rather than raised, so callers
//! always get something displayable via [`render_generation`].

use crate::config::LlmConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Failure at the generation boundary
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GenerationError {
    #[error("request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },

    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("could not parse completion: {0}")]
    MalformedResponse(String),

    #[error("completion contained no choices")]
    EmptyResponse,
}

/// Stateless text completion
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Complete a single prompt
    async fn generate(&self, prompt: &str) -> std::result::Result<String, GenerationError>;

    /// Model identifier used for completions
    fn model_name(&self) -> &str;
}

/// Render a generation outcome as display text: the answer, or `Error: <message>`
pub fn render_generation(result: std::result::Result<String, GenerationError>) -> String {
    match result {
        Ok(text) => text,
        Err(e) => format!("Error: {}", e),
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for OpenAI-compatible `/chat/completions` endpoints (Groq by default)
pub struct ChatCompletionsGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl ChatCompletionsGenerator {
    /// Create a generator; the API key must be supplied by configuration
    pub fn new(config: &LlmConfig, api_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: api_key.trim().to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    /// Build from configuration, failing if the credential is missing
    pub fn from_config(config: &crate::AppConfig) -> Result<Self> {
        let api_key = config.require_llm_api_key()?;
        Self::new(&config.llm, api_key)
    }

    fn transport_error(&self, e: reqwest::Error) -> GenerationError {
        GenerationError::Transport {
            endpoint: self.endpoint.clone(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl AnswerGenerator for ChatCompletionsGenerator {
    async fn generate(&self, prompt: &str) -> std::result::Result<String, GenerationError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api { status, body });
        }

        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        parse_completion(&body)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Extract the first choice's message content from a chat completion body
fn parse_completion(body: &str) -> std::result::Result<String, GenerationError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;

    parsed
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content.unwrap_or_default())
        .ok_or(GenerationError::EmptyResponse)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_completion() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"Rest and fluids."}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "Rest and fluids.");
    }

    #[test]
    fn test_parse_completion_without_choices() {
        assert_eq!(
            parse_completion(r#"{"choices":[]}"#),
            Err(GenerationError::EmptyResponse)
        );
        assert!(matches!(
            parse_completion("not json"),
            Err(GenerationError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_render_generation() {
        assert_eq!(render_generation(Ok("fine".to_string())), "fine");

        let rendered = render_generation(Err(GenerationError::Api {
            status: 429,
            body: "rate limited".to_string(),
        }));
        assert_eq!(rendered, "Error: API returned 429: rate limited");
    }

    #[test]
    fn test_request_serialisation_skips_unset_options() {
        let request = ChatRequest {
            model: "llama-3.1-8b-instant",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            temperature: None,
            max_tokens: Some(256),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["max_tokens"], 256);
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn test_from_config_requires_key() {
        let config = crate::AppConfig::default();
        assert!(matches!(
            ChatCompletionsGenerator::from_config(&config),
            Err(AppError::Configuration { .. })
        ));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let config = LlmConfig {
            endpoint: "http://127.0.0.1:9/v1/chat/completions".to_string(),
            timeout_secs: 2,
            ..LlmConfig::default()
        };
        let generator = ChatCompletionsGenerator::new(&config, "test-key").unwrap();
        let result = generator.generate("hello").await;
        assert!(matches!(result, Err(GenerationError::Transport { .. })));
        assert!(render_generation(result).starts_with("Error:"));
    }
}
