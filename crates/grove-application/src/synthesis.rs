//! Review closure: the second phase of the terminal step.
//!
//! Phase 1 of the review step is ordinary turns collecting the closing
//! questions. This operation is phase 2: it reads the entire reflection
//! history, assembles per-step summaries, asks the model for one synthesis,
//! validates it, merges it into a terminal review reflection, and closes the
//! session. If generation or parsing fails the session stays open so the
//! operation can be retried.

use crate::pipeline::{complete_with_retries, extract_json, map_model_error};
use chrono::{DateTime, Utc};
use grove_core::aggregate::is_captured;
use grove_core::error::{GroveError, Result};
use grove_core::framework::{Framework, FrameworkCatalog};
use grove_core::llm::{CompletionRequest, LanguageModel};
use grove_core::reflection::{Reflection, ReflectionRepository, ReviewFields, StepPayload};
use grove_core::safety::{
    IncidentReason, IncidentRepository, IncidentSeverity, SafetyIncident,
};
use grove_core::session::SessionRepository;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_BACKOFF: Duration = Duration::from_millis(500);

/// Fixed closing message carried by the terminal reflection.
const CLOSING_MESSAGE: &str =
    "Thank you for the work you put in today. I've gathered what this session \
     surfaced into a summary you can come back to.";

/// Result of a successful closure.
#[derive(Debug, Clone)]
pub struct SynthesisOutcome {
    pub summary: String,
    pub closed_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct SynthesisFields {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    ai_insights: String,
    #[serde(default)]
    unexplored_options: Vec<String>,
    #[serde(default)]
    identified_risks: Vec<String>,
    #[serde(default)]
    potential_pitfalls: Vec<String>,
}

impl SynthesisFields {
    fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.summary.trim().is_empty() {
            missing.push("summary");
        }
        if self.ai_insights.trim().is_empty() {
            missing.push("ai_insights");
        }
        if self.unexplored_options.is_empty() {
            missing.push("unexplored_options");
        }
        if self.identified_risks.is_empty() {
            missing.push("identified_risks");
        }
        if self.potential_pitfalls.is_empty() {
            missing.push("potential_pitfalls");
        }
        missing
    }
}

/// Closes a session by synthesizing its terminal review reflection.
pub struct ReviewSynthesisUseCase {
    catalog: Arc<FrameworkCatalog>,
    sessions: Arc<dyn SessionRepository>,
    reflections: Arc<dyn ReflectionRepository>,
    incidents: Arc<dyn IncidentRepository>,
    model: Arc<dyn LanguageModel>,
    max_retries: u32,
    backoff: Duration,
}

impl ReviewSynthesisUseCase {
    pub fn new(
        catalog: Arc<FrameworkCatalog>,
        sessions: Arc<dyn SessionRepository>,
        reflections: Arc<dyn ReflectionRepository>,
        incidents: Arc<dyn IncidentRepository>,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            catalog,
            sessions,
            reflections,
            incidents,
            model,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: DEFAULT_BACKOFF,
        }
    }

    /// Overrides the retry policy.
    pub fn with_retry_policy(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.backoff = backoff;
        self
    }

    /// Runs phase 2 of the review step and closes the session.
    ///
    /// # Errors
    ///
    /// `SynthesisFailed` when the model's synthesis is unusable; the
    /// session stays open and the call may be retried. Environment errors
    /// (unknown session, storage, connectivity) propagate as usual.
    pub async fn finalize(&self, session_id: &str) -> Result<SynthesisOutcome> {
        let session = self
            .sessions
            .find_by_id(session_id)
            .await?
            .ok_or_else(|| GroveError::not_found("Session", session_id))?;
        if session.is_closed() {
            return Err(GroveError::invalid_state(format!(
                "session '{session_id}' is already closed"
            )));
        }
        let framework = self.catalog.get(session.framework_id)?;
        if !framework.is_terminal(session.current_step) {
            return Err(GroveError::invalid_state(format!(
                "session '{session_id}' has not reached the review step"
            )));
        }

        let history = self.reflections.list_for_session(session_id).await?;
        let summaries = step_summaries(framework, &history);

        let system_prompt = grove_interaction::prompts::synthesis_system()?;
        let user_prompt = grove_interaction::prompts::synthesis_user(&summaries)?;
        let raw = complete_with_retries(
            self.model.as_ref(),
            CompletionRequest {
                system_prompt,
                schema: synthesis_schema(),
                user_prompt,
            },
            self.max_retries,
            self.backoff,
        )
        .await
        .map_err(map_model_error)?;

        let fields = match extract_json(&raw)
            .and_then(|v| serde_json::from_value::<SynthesisFields>(v).ok())
        {
            Some(fields) => fields,
            None => {
                self.record_failure(session_id, &raw).await?;
                return Err(GroveError::SynthesisFailed(
                    "synthesis output was not a JSON object".to_string(),
                ));
            }
        };
        let missing = fields.missing_fields();
        if !missing.is_empty() {
            self.record_failure(session_id, &raw).await?;
            return Err(GroveError::SynthesisFailed(format!(
                "synthesis output left fields empty: {}",
                missing.join(", ")
            )));
        }

        let mut review = latest_review(&history).unwrap_or_default();
        review.coach_reflection = CLOSING_MESSAGE.to_string();
        review.summary = Some(fields.summary.clone());
        review.ai_insights = Some(fields.ai_insights);
        review.unexplored_options = Some(fields.unexplored_options);
        review.identified_risks = Some(fields.identified_risks);
        review.potential_pitfalls = Some(fields.potential_pitfalls);

        self.reflections
            .append(&Reflection::system_message(
                session_id,
                StepPayload::Review(review),
            ))
            .await?;
        self.sessions.close(session_id).await?;
        tracing::info!("session {} closed after review synthesis", session_id);

        Ok(SynthesisOutcome {
            summary: fields.summary,
            closed_at: Utc::now(),
        })
    }

    async fn record_failure(&self, session_id: &str, raw: &str) -> Result<()> {
        self.incidents
            .record(&SafetyIncident::new(
                session_id,
                IncidentReason::MalformedModelOutput,
                raw,
                IncidentSeverity::Med,
            ))
            .await?;
        Ok(())
    }
}

fn latest_review(history: &[Reflection]) -> Option<ReviewFields> {
    history.iter().rev().find_map(|r| match &r.payload {
        StepPayload::Review(fields) => Some(fields.clone()),
        _ => None,
    })
}

/// Renders per-step summaries of everything captured so far.
fn step_summaries(framework: &Framework, history: &[Reflection]) -> String {
    let mut out = String::new();
    for step in framework.steps() {
        let Some(reflection) = history.iter().rev().find(|r| r.step() == step.name) else {
            continue;
        };
        out.push_str(&format!("### {}\n", step.name));
        for (name, value) in reflection.payload.field_map() {
            if name == "coach_reflection" || !is_captured(&value) {
                continue;
            }
            match value {
                Value::String(s) => out.push_str(&format!("{name}: {s}\n")),
                other => out.push_str(&format!("{name}: {other}\n")),
            }
        }
        out.push('\n');
    }
    out.trim_end().to_string()
}

fn synthesis_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "summary": {"type": "string"},
            "ai_insights": {"type": "string"},
            "unexplored_options": {"type": "array", "items": {"type": "string"}},
            "identified_risks": {"type": "array", "items": {"type": "string"}},
            "potential_pitfalls": {"type": "array", "items": {"type": "string"}},
        },
        "required": [
            "summary",
            "ai_insights",
            "unexplored_options",
            "identified_risks",
            "potential_pitfalls",
        ],
    })
}
