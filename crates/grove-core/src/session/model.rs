//! Session domain model.

use crate::framework::{Framework, FrameworkId, StepName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One coaching engagement walking a framework front to back.
///
/// A session is created once per engagement and mutated only by the turn
/// orchestrator: step changes, skip increments, the escalation flag, and
/// closure. It is never deleted during the conversation's lifetime. The
/// "at most one open session per user" invariant is enforced by the external
/// collaborator that creates sessions, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier (UUID format).
    pub id: String,
    /// The framework this session walks.
    pub framework_id: FrameworkId,
    /// The step the session is currently on.
    pub current_step: StepName,
    /// How often the user skipped a question, per step.
    #[serde(default)]
    pub skip_counts: HashMap<StepName, u32>,
    /// Permanently set once escalation vocabulary was detected.
    #[serde(default)]
    pub escalated: bool,
    /// Timestamp when the session was created.
    pub created_at: DateTime<Utc>,
    /// Timestamp when the session was last updated.
    pub updated_at: DateTime<Utc>,
    /// Set exactly once, by the review closure operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Creates a fresh session positioned on the framework's first step.
    pub fn new(id: impl Into<String>, framework: &Framework) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            framework_id: framework.id,
            current_step: framework.first_step().name,
            skip_counts: HashMap::new(),
            escalated: false,
            created_at: now,
            updated_at: now,
            closed_at: None,
        }
    }

    /// The skip count recorded for a step, zero if never skipped.
    pub fn skip_count(&self, step: StepName) -> u32 {
        self.skip_counts.get(&step).copied().unwrap_or(0)
    }

    /// Whether the session has been closed by the review operation.
    pub fn is_closed(&self) -> bool {
        self.closed_at.is_some()
    }
}
