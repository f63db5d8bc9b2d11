//! TOML-based session and reflection persistence.
//!
//! Each session is one TOML document under the base directory, holding the
//! session record and its append-only reflection history together so a
//! document is always internally consistent:
//!
//! ```text
//! base_dir/
//! └── sessions/
//!     ├── <session-id-1>.toml
//!     └── <session-id-2>.toml
//! ```
//!
//! Domain models cross the file boundary through a small DTO because TOML
//! table keys are strings; the step-keyed skip-count map is stored with its
//! step names spelled out.

use crate::storage::AtomicTomlFile;
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use grove_core::framework::{FrameworkId, StepName};
use grove_core::reflection::{Reflection, ReflectionRepository};
use grove_core::session::{Session, SessionRepository};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Serialize, Deserialize)]
struct SessionDto {
    id: String,
    framework_id: FrameworkId,
    current_step: StepName,
    #[serde(default)]
    skip_counts: BTreeMap<String, u32>,
    #[serde(default)]
    escalated: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    closed_at: Option<DateTime<Utc>>,
}

impl From<&Session> for SessionDto {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            framework_id: session.framework_id,
            current_step: session.current_step,
            skip_counts: session
                .skip_counts
                .iter()
                .map(|(step, count)| (step.to_string(), *count))
                .collect(),
            escalated: session.escalated,
            created_at: session.created_at,
            updated_at: session.updated_at,
            closed_at: session.closed_at,
        }
    }
}

impl SessionDto {
    fn into_domain(self) -> Result<Session> {
        let mut skip_counts = HashMap::new();
        for (name, count) in self.skip_counts {
            let step = StepName::from_str(&name)
                .map_err(|_| anyhow!("unknown step '{name}' in stored session '{}'", self.id))?;
            skip_counts.insert(step, count);
        }
        Ok(Session {
            id: self.id,
            framework_id: self.framework_id,
            current_step: self.current_step,
            skip_counts,
            escalated: self.escalated,
            created_at: self.created_at,
            updated_at: self.updated_at,
            closed_at: self.closed_at,
        })
    }
}

#[derive(Serialize, Deserialize)]
struct SessionDoc {
    session: SessionDto,
    #[serde(default)]
    reflections: Vec<Reflection>,
}

/// A repository implementation storing sessions as individual TOML files.
pub struct TomlSessionRepository {
    base_dir: PathBuf,
}

impl TomlSessionRepository {
    /// Creates a repository rooted at `base_dir`, creating the directory
    /// structure if needed.
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(base_dir.join("sessions"))
            .context("Failed to create sessions directory")?;
        Ok(Self { base_dir })
    }

    /// Creates a repository at the default location (~/.grove).
    pub fn default_location() -> Result<Self> {
        let home_dir = dirs::home_dir().context("Failed to get home directory")?;
        Self::new(home_dir.join(".grove"))
    }

    fn doc_file(&self, session_id: &str) -> AtomicTomlFile<SessionDoc> {
        AtomicTomlFile::new(
            self.base_dir
                .join("sessions")
                .join(format!("{session_id}.toml")),
        )
    }

    fn load_doc(&self, session_id: &str) -> Result<Option<SessionDoc>> {
        self.doc_file(session_id)
            .load()
            .with_context(|| format!("Failed to load session '{session_id}'"))
    }

    /// Loads, mutates, and atomically rewrites one session document.
    fn mutate<R>(
        &self,
        session_id: &str,
        apply: impl FnOnce(&mut SessionDoc) -> R,
    ) -> Result<R> {
        let mut doc = self
            .load_doc(session_id)?
            .ok_or_else(|| anyhow!("session '{session_id}' not found"))?;
        let result = apply(&mut doc);
        doc.session.updated_at = Utc::now();
        self.doc_file(session_id)
            .save(&doc)
            .with_context(|| format!("Failed to save session '{session_id}'"))?;
        Ok(result)
    }
}

#[async_trait]
impl SessionRepository for TomlSessionRepository {
    async fn find_by_id(&self, session_id: &str) -> Result<Option<Session>> {
        match self.load_doc(session_id)? {
            Some(doc) => Ok(Some(doc.session.into_domain()?)),
            None => Ok(None),
        }
    }

    async fn create(&self, session: &Session) -> Result<()> {
        if self.load_doc(&session.id)?.is_some() {
            bail!("session '{}' already exists", session.id);
        }
        let doc = SessionDoc {
            session: SessionDto::from(session),
            reflections: Vec::new(),
        };
        self.doc_file(&session.id)
            .save(&doc)
            .with_context(|| format!("Failed to save session '{}'", session.id))?;
        tracing::debug!("created session document for {}", session.id);
        Ok(())
    }

    async fn update_step(&self, session_id: &str, step: StepName) -> Result<()> {
        self.mutate(session_id, |doc| {
            doc.session.current_step = step;
        })
    }

    async fn increment_skip(&self, session_id: &str, step: StepName) -> Result<u32> {
        self.mutate(session_id, |doc| {
            let count = doc.session.skip_counts.entry(step.to_string()).or_insert(0);
            *count += 1;
            *count
        })
    }

    async fn mark_escalated(&self, session_id: &str) -> Result<()> {
        self.mutate(session_id, |doc| {
            doc.session.escalated = true;
        })
    }

    async fn close(&self, session_id: &str) -> Result<()> {
        self.mutate(session_id, |doc| {
            if doc.session.closed_at.is_none() {
                doc.session.closed_at = Some(Utc::now());
            }
        })
    }
}

#[async_trait]
impl ReflectionRepository for TomlSessionRepository {
    async fn append(&self, reflection: &Reflection) -> Result<()> {
        self.mutate(&reflection.session_id, |doc| {
            doc.reflections.push(reflection.clone());
        })
    }

    async fn list_for_session(&self, session_id: &str) -> Result<Vec<Reflection>> {
        Ok(self
            .load_doc(session_id)?
            .map(|doc| doc.reflections)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grove_core::framework::FrameworkCatalog;
    use grove_core::reflection::{GoalFields, StepPayload};

    fn new_session(id: &str) -> Session {
        let catalog = FrameworkCatalog::builtin();
        Session::new(id, catalog.get(FrameworkId::Grow).unwrap())
    }

    fn repo(dir: &tempfile::TempDir) -> TomlSessionRepository {
        TomlSessionRepository::new(dir.path()).unwrap()
    }

    #[tokio::test]
    async fn sessions_survive_a_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo(&dir);
        let mut session = new_session("s-1");
        session.skip_counts.insert(StepName::Goal, 2);
        repo.create(&session).await.unwrap();

        let loaded = repo.find_by_id("s-1").await.unwrap().unwrap();
        assert_eq!(loaded.id, "s-1");
        assert_eq!(loaded.framework_id, FrameworkId::Grow);
        assert_eq!(loaded.skip_count(StepName::Goal), 2);
        assert!(repo.find_by_id("s-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_creation_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo(&dir);
        repo.create(&new_session("s-1")).await.unwrap();
        assert!(repo.create(&new_session("s-1")).await.is_err());
    }

    #[tokio::test]
    async fn mutations_persist_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        {
            let repo = repo(&dir);
            repo.create(&new_session("s-1")).await.unwrap();
            repo.update_step("s-1", StepName::Options).await.unwrap();
            assert_eq!(repo.increment_skip("s-1", StepName::Options).await.unwrap(), 1);
            repo.mark_escalated("s-1").await.unwrap();
            repo.close("s-1").await.unwrap();
        }
        let reopened = repo(&dir);
        let loaded = reopened.find_by_id("s-1").await.unwrap().unwrap();
        assert_eq!(loaded.current_step, StepName::Options);
        assert_eq!(loaded.skip_count(StepName::Options), 1);
        assert!(loaded.escalated);
        assert!(loaded.is_closed());
    }

    #[tokio::test]
    async fn reflections_append_in_order_with_typed_payloads() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo(&dir);
        repo.create(&new_session("s-1")).await.unwrap();

        repo.append(&Reflection::system_message(
            "s-1",
            StepPayload::reflection_only(StepName::Goal, "Welcome! What's the goal?"),
        ))
        .await
        .unwrap();
        repo.append(&Reflection::from_turn(
            "s-1",
            "I want to lead a team",
            StepPayload::Goal(GoalFields {
                coach_reflection: "A leadership goal, then.".into(),
                goal: Some("lead a team".into()),
                success_criteria: Some(vec!["running weekly 1:1s".into()]),
                ..Default::default()
            }),
        ))
        .await
        .unwrap();

        let listed = repo.list_for_session("s-1").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].is_system_authored());
        match &listed[1].payload {
            StepPayload::Goal(fields) => {
                assert_eq!(fields.goal.as_deref(), Some("lead a team"));
                assert_eq!(
                    fields.success_criteria.as_deref(),
                    Some(&["running weekly 1:1s".to_string()][..])
                );
            }
            other => panic!("expected goal payload, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn appending_to_an_unknown_session_fails() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo(&dir);
        let result = repo
            .append(&Reflection::system_message(
                "missing",
                StepPayload::reflection_only(StepName::Goal, "hello?"),
            ))
            .await;
        assert!(result.is_err());
    }
}
