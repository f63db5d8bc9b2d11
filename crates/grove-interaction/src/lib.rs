//! Language model collaborators for GROVE.
//!
//! Implements the [`LanguageModel`](grove_core::llm::LanguageModel) seam
//! against the Claude REST API and provides the prompt rendering used by the
//! generation pipeline.

pub mod claude_api_model;
pub mod prompts;
pub mod secret;

pub use claude_api_model::ClaudeApiModel;
pub use secret::{ClaudeConfig, SecretConfig, load_secret_config};
