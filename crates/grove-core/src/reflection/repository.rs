//! Reflection repository trait.

use super::model::Reflection;
use anyhow::Result;
use async_trait::async_trait;

/// An abstract append-only store for session reflections.
#[async_trait]
pub trait ReflectionRepository: Send + Sync {
    /// Appends a reflection to its session's history.
    async fn append(&self, reflection: &Reflection) -> Result<()>;

    /// Lists a session's reflections ordered ascending by creation time.
    async fn list_for_session(&self, session_id: &str) -> Result<Vec<Reflection>>;
}
