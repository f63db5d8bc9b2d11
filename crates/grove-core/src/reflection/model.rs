//! Reflection domain model.

use super::payload::StepPayload;
use crate::framework::StepName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One structured record in a session's conversation history.
///
/// Reflections are append-only and ordered by creation time; they are the
/// single source of truth read by both field aggregation and report
/// synthesis. They are never mutated after creation; a correction is a new
/// reflection for the same step, and the latest reflection for a step wins.
///
/// A reflection without `user_input` is a system-authored message: a step
/// transition, an opener, or a redirect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reflection {
    /// Unique reflection identifier (UUID format).
    pub id: String,
    /// The session this reflection belongs to.
    pub session_id: String,
    /// The raw user turn that produced this reflection, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_input: Option<String>,
    /// The structured payload, tagged by step.
    pub payload: StepPayload,
    /// Timestamp when the reflection was created.
    pub created_at: DateTime<Utc>,
}

impl Reflection {
    /// Creates a reflection produced by a user turn.
    pub fn from_turn(
        session_id: impl Into<String>,
        user_input: impl Into<String>,
        payload: StepPayload,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            user_input: Some(user_input.into()),
            payload,
            created_at: Utc::now(),
        }
    }

    /// Creates a system-authored reflection (transition, opener, redirect).
    pub fn system_message(session_id: impl Into<String>, payload: StepPayload) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            user_input: None,
            payload,
            created_at: Utc::now(),
        }
    }

    /// The step this reflection was recorded for.
    pub fn step(&self) -> StepName {
        self.payload.step()
    }

    /// Whether this reflection was authored by the system, not a user turn.
    pub fn is_system_authored(&self) -> bool {
        self.user_input.is_none()
    }
}
