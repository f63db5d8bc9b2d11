//! Per-turn session orchestration.
//!
//! The orchestrator is a state machine whose states are the step names of
//! the active framework plus a terminal closed state. One user turn flows
//! strictly downward: input cap → escalation short-circuit → safety gate →
//! generation pipeline → persistence → derived actions → completion
//! evaluation → step transition. Closure happens only through the separate
//! review synthesis operation.

use crate::pipeline::{DegradeReason, GenerationContext, GenerationPipeline};
use grove_core::action::{Action, ActionRepository};
use grove_core::aggregate::FieldAggregator;
use grove_core::completion::{LoopDetector, QuestionLoopDetector, should_advance};
use grove_core::error::{GroveError, Result};
use grove_core::framework::{FrameworkCatalog, FrameworkId, StepName};
use grove_core::llm::LanguageModel;
use grove_core::reflection::{Reflection, ReflectionRepository, StepPayload};
use grove_core::safety::{
    IncidentReason, IncidentRepository, IncidentSeverity, SafetyGate, SafetyIncident,
};
use grove_core::session::{Session, SessionRepository};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Hard cap on the length of one user turn, in characters.
pub const MAX_USER_INPUT_CHARS: usize = 800;

/// Fixed reply for over-length turns.
const LENGTH_MESSAGE: &str =
    "That message is a little long for me to coach on in one go.";
const LENGTH_HINT: &str = "Please shorten your message to 800 characters or fewer.";

/// Fixed reply once a session is escalated.
const REDIRECT_MESSAGE: &str =
    "I'm not the right support for this topic. Please reach out to a qualified person \
     you trust, or to your organisation's support channels.";

/// Turns whose whole trimmed text matches one of these count as a skip.
const SKIP_PHRASES: [&str; 6] = [
    "skip",
    "pass",
    "skip this",
    "skip this question",
    "next question",
    "move on",
];

/// The user-facing result of one turn.
///
/// `ok == false` signals a user-correctable rejection with no state change
/// beyond safety bookkeeping; `ok == true` always means the turn was
/// persisted, even when no field advancement occurred.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_step: Option<StepName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<StepPayload>,
    pub session_closed: bool,
}

impl TurnOutcome {
    fn rejected(message: &str, hint: Option<&str>) -> Self {
        Self {
            ok: false,
            message: Some(message.to_string()),
            hint: hint.map(ToString::to_string),
            next_step: None,
            payload: None,
            session_closed: false,
        }
    }
}

/// Drives one session turn end to end.
pub struct TurnUseCase {
    catalog: Arc<FrameworkCatalog>,
    sessions: Arc<dyn SessionRepository>,
    reflections: Arc<dyn ReflectionRepository>,
    incidents: Arc<dyn IncidentRepository>,
    actions: Arc<dyn ActionRepository>,
    pipeline: GenerationPipeline,
    gate: SafetyGate,
    aggregator: FieldAggregator,
    loop_detector: Arc<dyn LoopDetector>,
}

impl TurnUseCase {
    pub fn new(
        catalog: Arc<FrameworkCatalog>,
        sessions: Arc<dyn SessionRepository>,
        reflections: Arc<dyn ReflectionRepository>,
        incidents: Arc<dyn IncidentRepository>,
        actions: Arc<dyn ActionRepository>,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            catalog,
            sessions,
            reflections,
            incidents,
            actions,
            pipeline: GenerationPipeline::new(model),
            gate: SafetyGate::new(),
            aggregator: FieldAggregator::default(),
            loop_detector: Arc::new(QuestionLoopDetector::new()),
        }
    }

    /// Replaces the generation pipeline (retry policy, banned-term gate).
    pub fn with_pipeline(mut self, pipeline: GenerationPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Replaces the input safety gate. Intended for tests.
    pub fn with_gate(mut self, gate: SafetyGate) -> Self {
        self.gate = gate;
        self
    }

    /// Replaces the field aggregator (e.g. to enable cross-turn merging).
    pub fn with_aggregator(mut self, aggregator: FieldAggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    /// Replaces the loop detection heuristic.
    pub fn with_loop_detector(mut self, detector: Arc<dyn LoopDetector>) -> Self {
        self.loop_detector = detector;
        self
    }

    /// Creates a session on the framework's first step and writes its opener.
    pub async fn start_session(&self, framework_id: FrameworkId) -> Result<(Session, TurnOutcome)> {
        let framework = self.catalog.get(framework_id)?;
        let session = Session::new(Uuid::new_v4().to_string(), framework);
        self.sessions.create(&session).await?;

        let first = framework.first_step();
        let mut message = None;
        if let Some(opener) = first.opener {
            self.reflections
                .append(&Reflection::system_message(
                    &session.id,
                    StepPayload::reflection_only(first.name, opener),
                ))
                .await?;
            message = Some(opener.to_string());
        }
        tracing::info!(
            "started session {} on framework {} at step {}",
            session.id,
            framework_id,
            first.name
        );
        let outcome = TurnOutcome {
            ok: true,
            message,
            hint: None,
            next_step: Some(first.name),
            payload: None,
            session_closed: false,
        };
        Ok((session, outcome))
    }

    /// Processes one user turn against a session.
    ///
    /// # Errors
    ///
    /// Only environment and configuration failures bubble up: unknown
    /// session or framework, storage failures, missing model credentials,
    /// and connectivity failures after retries. Everything the user caused
    /// or the model produced is recovered into an in-conversation message.
    pub async fn process_turn(&self, session_id: &str, text: &str) -> Result<TurnOutcome> {
        if text.chars().count() > MAX_USER_INPUT_CHARS {
            return Ok(TurnOutcome::rejected(LENGTH_MESSAGE, Some(LENGTH_HINT)));
        }

        let session = self
            .sessions
            .find_by_id(session_id)
            .await?
            .ok_or_else(|| GroveError::not_found("Session", session_id))?;
        if session.is_closed() {
            return Err(GroveError::invalid_state(format!(
                "session '{session_id}' is closed"
            )));
        }

        // Once escalated, every turn short-circuits regardless of content.
        if session.escalated {
            tracing::debug!("redirecting turn on escalated session {}", session_id);
            return Ok(TurnOutcome::rejected(REDIRECT_MESSAGE, None));
        }

        let verdict = self.gate.check(text);
        if verdict.escalate {
            tracing::warn!(
                "escalation vocabulary in session {}: {:?}",
                session_id,
                verdict.matched
            );
            self.sessions.mark_escalated(session_id).await?;
            self.incidents
                .record(&SafetyIncident::new(
                    session_id,
                    IncidentReason::EscalationKeyword,
                    text,
                    IncidentSeverity::High,
                ))
                .await?;
            return Ok(TurnOutcome::rejected(REDIRECT_MESSAGE, None));
        }

        let framework = self.catalog.get(session.framework_id)?;
        let step = framework.step(session.current_step)?;

        let mut skip_count = session.skip_count(step.name);
        if is_skip_phrase(text) {
            skip_count = self.sessions.increment_skip(session_id, step.name).await?;
            tracing::debug!(
                "skip on session {} step {} (count now {})",
                session_id,
                step.name,
                skip_count
            );
        }

        let history = self.reflections.list_for_session(session_id).await?;
        let loop_detected = self.loop_detector.loop_detected(&history, step.name);
        let aggregate = self.aggregator.aggregate(&history, step);

        let result = self
            .pipeline
            .run(&GenerationContext {
                step,
                user_text: text,
                history: &history,
                aggregate: &aggregate,
                skip_count,
                loop_detected,
            })
            .await?;

        let reflection = Reflection::from_turn(session_id, text, result.payload.clone());
        self.reflections.append(&reflection).await?;

        if let Some(reason) = &result.degraded {
            let incident = match reason {
                DegradeReason::ContentRejected { output, .. } => SafetyIncident::new(
                    session_id,
                    IncidentReason::ContentRejected,
                    output.clone(),
                    IncidentSeverity::Low,
                ),
                DegradeReason::MalformedOutput { output, .. } => SafetyIncident::new(
                    session_id,
                    IncidentReason::MalformedModelOutput,
                    output.clone(),
                    IncidentSeverity::Med,
                ),
            };
            self.incidents.record(&incident).await?;
            // The turn still succeeds, just without field extraction.
            return Ok(TurnOutcome {
                ok: true,
                message: Some(result.payload.coach_reflection().to_string()),
                hint: None,
                next_step: None,
                payload: Some(result.payload),
                session_closed: false,
            });
        }

        if let Some(drafts) = result.payload.actions() {
            for draft in drafts.iter().filter(|d| d.has_title()) {
                self.actions
                    .create(&Action::from_draft(session_id, draft))
                    .await?;
            }
        }

        let mut message = result.payload.coach_reflection().to_string();
        let mut next_step = None;
        if should_advance(&result.payload, skip_count, loop_detected)
            && !framework.is_terminal(step.name)
        {
            if let Some(transition) = step.transition {
                self.reflections
                    .append(&Reflection::system_message(
                        session_id,
                        StepPayload::reflection_only(step.name, transition),
                    ))
                    .await?;
                message.push_str("\n\n");
                message.push_str(transition);
            }
            let next = framework.step_after(step.name).ok_or_else(|| {
                GroveError::internal(format!("step {} has no successor", step.name))
            })?;
            self.sessions.update_step(session_id, next.name).await?;
            if let Some(opener) = next.opener {
                self.reflections
                    .append(&Reflection::system_message(
                        session_id,
                        StepPayload::reflection_only(next.name, opener),
                    ))
                    .await?;
                message.push_str("\n\n");
                message.push_str(opener);
            }
            tracing::info!(
                "session {} advanced from {} to {}",
                session_id,
                step.name,
                next.name
            );
            next_step = Some(next.name);
        }

        Ok(TurnOutcome {
            ok: true,
            message: Some(message),
            hint: None,
            next_step,
            payload: Some(result.payload),
            session_closed: false,
        })
    }
}

fn is_skip_phrase(text: &str) -> bool {
    let trimmed = text.trim().trim_end_matches(['.', '!']).to_lowercase();
    SKIP_PHRASES.contains(&trimmed.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_phrases_match_whole_turns_only() {
        assert!(is_skip_phrase("skip"));
        assert!(is_skip_phrase("  Pass. "));
        assert!(is_skip_phrase("NEXT QUESTION!"));
        assert!(!is_skip_phrase("let's move on to my next goal"));
        assert!(!is_skip_phrase("I pass most of my evenings working"));
    }
}
