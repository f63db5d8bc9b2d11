//! Safety incident audit records.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How serious an incident is for human review triage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentSeverity {
    Low,
    Med,
    High,
}

/// Why the incident was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentReason {
    /// Escalation vocabulary matched in user input.
    EscalationKeyword,
    /// The validator rejected the output or a banned term matched it.
    ContentRejected,
    /// The primary model output could not be parsed against the schema.
    MalformedModelOutput,
}

/// An append-only audit record.
///
/// Incidents are a write-only side channel for human review; the orchestrator
/// never reads them back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyIncident {
    pub id: String,
    pub session_id: String,
    pub reason: IncidentReason,
    pub offending_text: String,
    pub severity: IncidentSeverity,
    pub created_at: DateTime<Utc>,
}

impl SafetyIncident {
    pub fn new(
        session_id: impl Into<String>,
        reason: IncidentReason,
        offending_text: impl Into<String>,
        severity: IncidentSeverity,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            reason,
            offending_text: offending_text.into(),
            severity,
            created_at: Utc::now(),
        }
    }
}

/// An abstract append-only store for safety incidents.
#[async_trait]
pub trait IncidentRepository: Send + Sync {
    /// Records an incident for later human review.
    async fn record(&self, incident: &SafetyIncident) -> Result<()>;
}
