//! ClaudeApiModel - Direct REST API implementation of [`LanguageModel`].
//!
//! This collaborator calls the Claude REST API directly without CLI
//! dependency. Configuration priority: ~/.config/grove/secret.json >
//! environment variables.

use async_trait::async_trait;
use grove_core::llm::{CompletionRequest, LanguageModel, ModelError};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::env;

use crate::secret::load_secret_config;

const DEFAULT_CLAUDE_MODEL: &str = "claude-sonnet-4-20250514";
const BASE_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Collaborator that talks to the Claude HTTP API.
///
/// Temperature is fixed at 0 so that repeated turns over the same state are
/// deterministic as far as the service allows.
#[derive(Clone)]
pub struct ClaudeApiModel {
    client: Client,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl ClaudeApiModel {
    /// Creates a new collaborator with the provided API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: 4096,
        }
    }

    /// Loads configuration from ~/.config/grove/secret.json or environment
    /// variables.
    ///
    /// Priority:
    /// 1. ~/.config/grove/secret.json
    /// 2. Environment variables (ANTHROPIC_API_KEY, GROVE_MODEL_NAME)
    ///
    /// Model name defaults to `claude-sonnet-4-20250514` if not specified.
    pub fn try_from_env() -> Result<Self, ModelError> {
        if let Ok(secret_config) = load_secret_config() {
            if let Some(claude_config) = secret_config.claude {
                let model = claude_config
                    .model_name
                    .unwrap_or_else(|| DEFAULT_CLAUDE_MODEL.to_string());
                return Ok(Self::new(claude_config.api_key, model));
            }
        }

        let api_key = env::var("ANTHROPIC_API_KEY").map_err(|_| {
            ModelError::Config(
                "ANTHROPIC_API_KEY not found in ~/.config/grove/secret.json or environment \
                 variables"
                    .into(),
            )
        })?;
        let model = env::var("GROVE_MODEL_NAME").unwrap_or_else(|_| DEFAULT_CLAUDE_MODEL.into());
        Ok(Self::new(api_key, model))
    }

    /// Overrides the model after construction.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the maximum number of tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn system_with_schema(request: &CompletionRequest) -> String {
        format!(
            "{}\n\nRespond with a single JSON object conforming to this field \
             specification:\n{}",
            request.system_prompt, request.schema
        )
    }
}

#[async_trait]
impl LanguageModel for ClaudeApiModel {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ModelError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: 0.0,
            system: Self::system_with_schema(&request),
            messages: vec![Message {
                role: "user",
                content: request.user_prompt,
            }],
        };

        let response = self
            .client
            .post(BASE_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, body_text));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Network(format!("failed to read response body: {e}")))?;

        let text: String = parsed
            .content
            .into_iter()
            .filter_map(|block| match block {
                ResponseContent::Text { text } => Some(text),
                ResponseContent::Other => None,
            })
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            tracing::warn!("claude returned an empty completion for model {}", self.model);
            return Err(ModelError::EmptyCompletion);
        }
        Ok(text)
    }
}

fn map_http_error(status: StatusCode, body: String) -> ModelError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ModelError::Config(format!("authentication failed ({status}): {body}"))
        }
        _ => {
            let retryable = matches!(
                status,
                StatusCode::TOO_MANY_REQUESTS
                    | StatusCode::INTERNAL_SERVER_ERROR
                    | StatusCode::BAD_GATEWAY
                    | StatusCode::SERVICE_UNAVAILABLE
                    | StatusCode::GATEWAY_TIMEOUT
            );
            ModelError::Http {
                status: status.as_u16(),
                message: body,
                retryable,
            }
        }
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseContent>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ResponseContent {
    Text { text: String },
    #[serde(other)]
    Other,
}
