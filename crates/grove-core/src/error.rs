//! Error types for the Grove engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the entire Grove engine.
///
/// This provides typed, structured error variants with automatic conversion
/// from common error types via the `From` trait. Everything a user caused or
/// a model produced is recovered in-conversation by the use case layer; only
/// the variants below ever reach a caller as hard failures.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum GroveError {
    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// No framework registered under the requested id
    #[error("Framework not found: '{0}'")]
    FrameworkNotFound(String),

    /// A step name that does not belong to the session's framework
    #[error("Unknown step '{step}' for framework '{framework}'")]
    UnknownStep { framework: String, step: String },

    /// Data access error (repository/storage layer)
    #[error("Data access error: {0}")]
    DataAccess(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", etc.
        message: String,
    },

    /// Configuration error (missing credentials, bad catalog wiring)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Model collaborator failed after all retries were exhausted
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// Operation is not valid for the session's current state
    #[error("Invalid session state: {0}")]
    InvalidState(String),

    /// The review synthesis call produced unusable output; the session stays
    /// open and the operation may be retried
    #[error("Synthesis failed: {0}")]
    SynthesisFailed(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GroveError {
    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a DataAccess error
    pub fn data_access(message: impl Into<String>) -> Self {
        Self::DataAccess(message.into())
    }

    /// Creates an InvalidState error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::FrameworkNotFound(_))
    }

    /// Check if this is a config error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

impl From<serde_json::Error> for GroveError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for GroveError {
    fn from(err: anyhow::Error) -> Self {
        Self::DataAccess(format!("{err:#}"))
    }
}

/// A convenience Result type using `GroveError`.
pub type Result<T> = std::result::Result<T, GroveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_formats_entity_and_id() {
        let err = GroveError::not_found("Session", "abc");
        assert_eq!(err.to_string(), "Entity not found: Session 'abc'");
        assert!(err.is_not_found());
    }

    #[test]
    fn framework_not_found_is_not_found() {
        assert!(GroveError::FrameworkNotFound("grow".into()).is_not_found());
    }

    #[test]
    fn json_errors_convert_to_serialization() {
        let err: GroveError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, GroveError::Serialization { .. }));
    }
}
