//! In-memory repository implementations.
//!
//! Embedded stores backed by process memory: the default wiring for tests
//! and for callers that bring their own durable persistence and only need
//! the engine's working state. Locks are held for the duration of one
//! operation only and never across an await point.

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use chrono::Utc;
use grove_core::action::{Action, ActionRepository};
use grove_core::framework::StepName;
use grove_core::reflection::{Reflection, ReflectionRepository};
use grove_core::safety::{IncidentRepository, SafetyIncident};
use grove_core::session::{Session, SessionRepository};
use std::collections::HashMap;
use std::sync::Mutex;

fn poisoned() -> anyhow::Error {
    anyhow!("repository lock poisoned")
}

/// Sessions held in a process-local map.
#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: Mutex<HashMap<String, Session>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn find_by_id(&self, session_id: &str) -> Result<Option<Session>> {
        let sessions = self.sessions.lock().map_err(|_| poisoned())?;
        Ok(sessions.get(session_id).cloned())
    }

    async fn create(&self, session: &Session) -> Result<()> {
        let mut sessions = self.sessions.lock().map_err(|_| poisoned())?;
        if sessions.contains_key(&session.id) {
            bail!("session '{}' already exists", session.id);
        }
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn update_step(&self, session_id: &str, step: StepName) -> Result<()> {
        let mut sessions = self.sessions.lock().map_err(|_| poisoned())?;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| anyhow!("session '{session_id}' not found"))?;
        session.current_step = step;
        session.updated_at = Utc::now();
        Ok(())
    }

    async fn increment_skip(&self, session_id: &str, step: StepName) -> Result<u32> {
        let mut sessions = self.sessions.lock().map_err(|_| poisoned())?;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| anyhow!("session '{session_id}' not found"))?;
        let count = session.skip_counts.entry(step).or_insert(0);
        *count += 1;
        session.updated_at = Utc::now();
        Ok(*count)
    }

    async fn mark_escalated(&self, session_id: &str) -> Result<()> {
        let mut sessions = self.sessions.lock().map_err(|_| poisoned())?;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| anyhow!("session '{session_id}' not found"))?;
        session.escalated = true;
        session.updated_at = Utc::now();
        Ok(())
    }

    async fn close(&self, session_id: &str) -> Result<()> {
        let mut sessions = self.sessions.lock().map_err(|_| poisoned())?;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| anyhow!("session '{session_id}' not found"))?;
        if session.closed_at.is_none() {
            session.closed_at = Some(Utc::now());
            session.updated_at = Utc::now();
        }
        Ok(())
    }
}

/// Append-only reflection log held in memory.
#[derive(Default)]
pub struct InMemoryReflectionRepository {
    reflections: Mutex<Vec<Reflection>>,
}

impl InMemoryReflectionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReflectionRepository for InMemoryReflectionRepository {
    async fn append(&self, reflection: &Reflection) -> Result<()> {
        let mut reflections = self.reflections.lock().map_err(|_| poisoned())?;
        reflections.push(reflection.clone());
        Ok(())
    }

    async fn list_for_session(&self, session_id: &str) -> Result<Vec<Reflection>> {
        let reflections = self.reflections.lock().map_err(|_| poisoned())?;
        Ok(reflections
            .iter()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect())
    }
}

/// Write-only incident log held in memory, inspectable for review.
#[derive(Default)]
pub struct InMemoryIncidentRepository {
    incidents: Mutex<Vec<SafetyIncident>>,
}

impl InMemoryIncidentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far, in order.
    pub fn recorded(&self) -> Vec<SafetyIncident> {
        self.incidents
            .lock()
            .map(|i| i.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl IncidentRepository for InMemoryIncidentRepository {
    async fn record(&self, incident: &SafetyIncident) -> Result<()> {
        let mut incidents = self.incidents.lock().map_err(|_| poisoned())?;
        incidents.push(incident.clone());
        Ok(())
    }
}

/// Derived action records held in memory.
#[derive(Default)]
pub struct InMemoryActionRepository {
    actions: Mutex<Vec<Action>>,
}

impl InMemoryActionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ActionRepository for InMemoryActionRepository {
    async fn create(&self, action: &Action) -> Result<()> {
        let mut actions = self.actions.lock().map_err(|_| poisoned())?;
        actions.push(action.clone());
        Ok(())
    }

    async fn list_for_session(&self, session_id: &str) -> Result<Vec<Action>> {
        let actions = self.actions.lock().map_err(|_| poisoned())?;
        Ok(actions
            .iter()
            .filter(|a| a.session_id == session_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grove_core::framework::{FrameworkCatalog, FrameworkId};
    use grove_core::reflection::StepPayload;

    fn session() -> Session {
        let catalog = FrameworkCatalog::builtin();
        Session::new("s-1", catalog.get(FrameworkId::Grow).unwrap())
    }

    #[tokio::test]
    async fn sessions_round_trip() {
        let repo = InMemorySessionRepository::new();
        repo.create(&session()).await.unwrap();
        assert!(repo.find_by_id("s-1").await.unwrap().is_some());
        assert!(repo.find_by_id("s-2").await.unwrap().is_none());
        assert!(repo.create(&session()).await.is_err());
    }

    #[tokio::test]
    async fn skip_counts_accumulate_per_step() {
        let repo = InMemorySessionRepository::new();
        repo.create(&session()).await.unwrap();
        assert_eq!(repo.increment_skip("s-1", StepName::Goal).await.unwrap(), 1);
        assert_eq!(repo.increment_skip("s-1", StepName::Goal).await.unwrap(), 2);
        assert_eq!(repo.increment_skip("s-1", StepName::Will).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn escalation_and_closure_stick() {
        let repo = InMemorySessionRepository::new();
        repo.create(&session()).await.unwrap();
        repo.mark_escalated("s-1").await.unwrap();
        repo.mark_escalated("s-1").await.unwrap();
        repo.close("s-1").await.unwrap();
        let loaded = repo.find_by_id("s-1").await.unwrap().unwrap();
        assert!(loaded.escalated);
        assert!(loaded.is_closed());
    }

    #[tokio::test]
    async fn reflections_keep_append_order_per_session() {
        let repo = InMemoryReflectionRepository::new();
        for (session_id, text) in [("s-1", "first"), ("s-2", "other"), ("s-1", "second")] {
            repo.append(&Reflection::from_turn(
                session_id,
                text,
                StepPayload::reflection_only(StepName::Goal, text),
            ))
            .await
            .unwrap();
        }
        let listed = repo.list_for_session("s-1").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].user_input.as_deref(), Some("first"));
        assert_eq!(listed[1].user_input.as_deref(), Some("second"));
    }
}
