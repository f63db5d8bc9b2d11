//! Session repository trait.
//!
//! Defines the interface for session persistence operations. The engine
//! treats every operation as a synchronous-from-its-perspective request with
//! no caching; implementations live in `grove-infrastructure`.

use super::model::Session;
use crate::framework::StepName;
use anyhow::Result;
use async_trait::async_trait;

/// An abstract repository for managing session persistence.
///
/// Mutations are expressed as the narrow operations the orchestrator needs
/// rather than a generic save, so implementations can enforce append-only
/// semantics for the fields that carry invariants (escalation, closure).
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Finds a session by its ID.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Session))`: session found
    /// - `Ok(None)`: session not found
    /// - `Err(_)`: error occurred during retrieval
    async fn find_by_id(&self, session_id: &str) -> Result<Option<Session>>;

    /// Persists a newly created session.
    async fn create(&self, session: &Session) -> Result<()>;

    /// Moves the session to a new current step.
    async fn update_step(&self, session_id: &str, step: StepName) -> Result<()>;

    /// Increments the skip count for a step and returns the new count.
    async fn increment_skip(&self, session_id: &str, step: StepName) -> Result<u32>;

    /// Permanently marks the session as escalated. Idempotent.
    async fn mark_escalated(&self, session_id: &str) -> Result<()>;

    /// Closes the session by setting its closure timestamp.
    async fn close(&self, session_id: &str) -> Result<()>;
}
