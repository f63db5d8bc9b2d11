//! Derived action records.
//!
//! Actions are created when a commitment step (GROW `will`, Confidence
//! `commitment`) yields action drafts in its payload; one record per draft.
//! Once created they have a lifecycle independent of the reflections they
//! came from.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::reflection::ActionDraft;

/// Lifecycle state of a committed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Open,
    Done,
    Dropped,
}

/// A committed action derived from a session's commitment step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    pub session_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
    pub status: ActionStatus,
    pub created_at: DateTime<Utc>,
}

impl Action {
    /// Builds an open action from a conversation draft.
    ///
    /// The draft's due date is free text from the model; it is accepted as
    /// RFC 3339 or a plain `YYYY-MM-DD` date (taken as midnight UTC) and
    /// dropped otherwise; a fuzzy phrase like "next week" yields no due
    /// timestamp rather than a guessed one.
    pub fn from_draft(session_id: impl Into<String>, draft: &ActionDraft) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            title: draft.title.trim().to_string(),
            due_at: draft.due.as_deref().and_then(parse_due),
            status: ActionStatus::Open,
            created_at: Utc::now(),
        }
    }
}

fn parse_due(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// An abstract store for derived action records.
#[async_trait]
pub trait ActionRepository: Send + Sync {
    /// Persists a newly derived action.
    async fn create(&self, action: &Action) -> Result<()>;

    /// Lists the actions derived from a session, in creation order.
    async fn list_for_session(&self, session_id: &str) -> Result<Vec<Action>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(title: &str, due: Option<&str>) -> ActionDraft {
        ActionDraft {
            title: title.into(),
            due: due.map(Into::into),
            first_step: None,
        }
    }

    #[test]
    fn plain_dates_become_midnight_utc() {
        let action = Action::from_draft("s-1", &draft("email mentor", Some("2026-08-14")));
        assert_eq!(
            action.due_at.unwrap().to_rfc3339(),
            "2026-08-14T00:00:00+00:00"
        );
        assert_eq!(action.status, ActionStatus::Open);
    }

    #[test]
    fn fuzzy_due_phrases_are_dropped() {
        let action = Action::from_draft("s-1", &draft("email mentor", Some("sometime next week")));
        assert!(action.due_at.is_none());
    }

    #[test]
    fn missing_due_is_fine() {
        let action = Action::from_draft("s-1", &draft("email mentor", None));
        assert!(action.due_at.is_none());
        assert_eq!(action.title, "email mentor");
    }
}
