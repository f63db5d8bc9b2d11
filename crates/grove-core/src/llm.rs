//! Language model collaborator seam.
//!
//! The model is an untrusted text-completion service: it is asked for a JSON
//! object conforming to a schema, but conformance is only probabilistic.
//! Everything that consumes a completion validates; nothing trusts.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// One completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Instructions and context for the model.
    pub system_prompt: String,
    /// JSON-shaped field spec the completion should conform to.
    pub schema: Value,
    /// The user-facing prompt for this call.
    pub user_prompt: String,
}

/// Errors from a model collaborator.
#[derive(Error, Debug)]
pub enum ModelError {
    /// Missing or invalid credentials, bad endpoint configuration.
    #[error("model configuration error: {0}")]
    Config(String),

    /// The service answered with a non-success status.
    #[error("model request failed with status {status}: {message}")]
    Http {
        status: u16,
        message: String,
        retryable: bool,
    },

    /// The request never completed (connect failure, timeout).
    #[error("model network error: {0}")]
    Network(String),

    /// The service returned a completion with no usable text.
    #[error("model returned an empty completion")]
    EmptyCompletion,
}

impl ModelError {
    /// Whether retrying the whole turn may help.
    ///
    /// Configuration problems never heal by retrying and are surfaced as
    /// fatal turn errors instead.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Config(_) => false,
            Self::Http { retryable, .. } => *retryable,
            Self::Network(_) => true,
            Self::EmptyCompletion => true,
        }
    }
}

/// An abstract text-completion collaborator.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Requests a single completion.
    ///
    /// The returned string is the raw completion text; callers parse and
    /// validate it themselves.
    async fn complete(&self, request: CompletionRequest) -> Result<String, ModelError>;
}
