//! Language model clients.
//!
//! The engine talks to models through the [`LanguageModel`] port; two
//! implementations are provided, a hosted Claude client and a local Ollama
//! client. Retryable transport failures (timeouts, rate limits, 5xx) are
//! retried here with doubling backoff, separately from the engine's
//! schema-repair loop.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::config::EngineConfig;

/// Default Ollama server URL.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Errors from a language model client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing API key - set TYPELATE_API_KEY or ANTHROPIC_API_KEY")]
    MissingApiKey,
    #[error("invalid API key")]
    InvalidApiKey,
    #[error("server not running at {0}")]
    ServerNotRunning(String),
}

impl ClientError {
    /// Whether retrying the request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Http(e) => e.is_timeout() || e.is_connect(),
            ClientError::Api { status, .. } => *status == 429 || *status >= 500,
            // A local server may still be starting up.
            ClientError::ServerNotRunning(_) => true,
            _ => false,
        }
    }
}

/// Port to a language model: one prompt in, one completion out.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Send a prompt and return the model's completion text.
    async fn complete(&self, prompt: &str) -> Result<String, ClientError>;
}

#[async_trait]
impl<T: LanguageModel + ?Sized> LanguageModel for std::sync::Arc<T> {
    async fn complete(&self, prompt: &str) -> Result<String, ClientError> {
        (**self).complete(prompt).await
    }
}

async fn complete_with_retry<F, Fut>(retries: u32, send: F) -> Result<String, ClientError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<String, ClientError>>,
{
    let mut delay = RETRY_BASE_DELAY;
    let mut attempt = 0;
    loop {
        match send().await {
            Ok(text) => return Ok(text),
            Err(e) if e.is_retryable() && attempt < retries => {
                warn!(attempt, error = %e, "transport failure, retrying");
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

// ============================================================================
// Claude
// ============================================================================

/// Claude API client.
pub struct ClaudeClient {
    client: reqwest::Client,
    model: String,
    max_tokens: u32,
    transport_retries: u32,
}

/// Request to Claude API.
#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
}

/// A message in the conversation.
#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

/// Response from Claude API.
#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

/// Error response from Claude API.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

impl ClaudeClient {
    /// Create a new Claude client.
    pub fn new(config: &EngineConfig) -> Result<Self, ClientError> {
        if config.api_key.is_empty() {
            return Err(ClientError::MissingApiKey);
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let key =
            HeaderValue::from_str(&config.api_key).map_err(|_| ClientError::InvalidApiKey)?;
        headers.insert("x-api-key", key);
        headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            transport_retries: config.transport_retries,
        })
    }

    async fn send(&self, prompt: &str) -> Result<String, ClientError> {
        let request = ClaudeRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .json(&request)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error: ErrorResponse = response.json().await?;
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: error.error.message,
            });
        }

        let response: ClaudeResponse = response.json().await?;

        let text = response
            .content
            .iter()
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        Ok(text)
    }
}

#[async_trait]
impl LanguageModel for ClaudeClient {
    async fn complete(&self, prompt: &str) -> Result<String, ClientError> {
        complete_with_retry(self.transport_retries, || self.send(prompt)).await
    }
}

// ============================================================================
// Ollama
// ============================================================================

/// Ollama API client for local inference.
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    transport_retries: u32,
}

/// Request to Ollama generate API.
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: i32,
}

/// Response from Ollama generate API.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    #[serde(default)]
    error: Option<String>,
}

impl OllamaClient {
    /// Create a client for the given model on the default local server.
    pub fn new(model: impl Into<String>) -> Self {
        Self::with_url(DEFAULT_OLLAMA_URL, model)
    }

    /// Create a client with a custom server URL.
    pub fn with_url(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            transport_retries: 2,
        }
    }

    /// Set the transport retry count.
    pub fn transport_retries(mut self, retries: u32) -> Self {
        self.transport_retries = retries;
        self
    }

    /// Get the current model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(&self, prompt: &str) -> Result<String, ClientError> {
        let request = OllamaRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            options: OllamaOptions {
                // Low temperature for deterministic translation
                temperature: 0.1,
                num_predict: 4096,
            },
        };

        let url = format!("{}/api/generate", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ClientError::ServerNotRunning(self.base_url.clone())
                } else {
                    ClientError::Http(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let response: OllamaResponse = response.json().await?;

        if let Some(error) = response.error {
            return Err(ClientError::Api {
                status: 200,
                message: error,
            });
        }

        Ok(response.response)
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<String, ClientError> {
        complete_with_retry(self.transport_retries, || self.send(prompt)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_key() {
        let config = EngineConfig::default();
        let result = ClaudeClient::new(&config);
        assert!(matches!(result, Err(ClientError::MissingApiKey)));
    }

    #[test]
    fn test_ollama_defaults() {
        let client = OllamaClient::new("qwen2.5-coder:7b");
        assert_eq!(client.base_url(), DEFAULT_OLLAMA_URL);
        assert_eq!(client.model(), "qwen2.5-coder:7b");
    }

    #[test]
    fn test_retryable_classification() {
        let rate_limited = ClientError::Api {
            status: 429,
            message: "rate limited".to_string(),
        };
        assert!(rate_limited.is_retryable());

        let bad_request = ClientError::Api {
            status: 400,
            message: "bad request".to_string(),
        };
        assert!(!bad_request.is_retryable());

        // Connect failures retry the same way for local and hosted servers.
        let not_running = ClientError::ServerNotRunning(DEFAULT_OLLAMA_URL.to_string());
        assert!(not_running.is_retryable());

        assert!(!ClientError::MissingApiKey.is_retryable());
    }
}
