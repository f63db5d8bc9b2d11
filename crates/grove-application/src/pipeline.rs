//! Two-stage generation pipeline around the language model.
//!
//! One turn's generation is three named stages composed sequentially:
//! `Generate` (primary extract-and-reflect call, schema with constraints
//! intact), `Validate` (second call judging the primary output against the
//! constraint-stripped schema), and `LocalBannedScan` (local banned-term
//! re-scan, independent of the validator's verdict). Each stage returns a
//! typed result, so retry/backoff attaches at the pipeline level instead of
//! being duplicated per stage.
//!
//! The pipeline degrades gracefully and never crashes the conversation: a
//! rejected or unparseable completion becomes a soft, apologetic
//! reflection-only payload with the degrade reason attached so the caller
//! can record the incident. Only configuration problems and exhausted
//! retries surface as errors.

use grove_core::aggregate::StepAggregate;
use grove_core::error::{GroveError, Result};
use grove_core::framework::Step;
use grove_core::llm::{CompletionRequest, LanguageModel, ModelError};
use grove_core::reflection::{Reflection, StepPayload};
use grove_core::safety::SafetyGate;
use grove_interaction::prompts;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Additional attempts after the first failed one.
const DEFAULT_MAX_RETRIES: u32 = 2;
/// Base delay; attempt `n` waits `n * base` (linear backoff).
const DEFAULT_BACKOFF: Duration = Duration::from_millis(500);

/// The apologetic reply used when a turn's extraction is discarded.
const SOFT_REFLECTION: &str = "I'm sorry, I didn't manage to take that in properly. \
     Could you put it in your own words once more?";

/// Everything the pipeline needs to know about the turn being generated.
#[derive(Debug, Clone)]
pub struct GenerationContext<'a> {
    pub step: &'a Step,
    pub user_text: &'a str,
    pub history: &'a [Reflection],
    pub aggregate: &'a StepAggregate,
    pub skip_count: u32,
    pub loop_detected: bool,
}

/// Why a generated turn was degraded to a reflection-only payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DegradeReason {
    /// The validator said fail, or a banned term matched the output.
    ContentRejected {
        reasons: Vec<String>,
        matched_terms: Vec<String>,
        output: String,
    },
    /// The primary output was not a parseable payload for the step.
    MalformedOutput { error: String, output: String },
}

/// Outcome of one pipeline run. `degraded` is `None` on full success.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub payload: StepPayload,
    pub degraded: Option<DegradeReason>,
}

/// Result of the `Generate` stage.
#[derive(Debug, Clone)]
struct GeneratedDraft {
    raw: String,
}

/// Result of the `Validate` stage.
#[derive(Debug, Clone)]
struct ValidationOutcome {
    pass: bool,
    reasons: Vec<String>,
}

/// Result of the `LocalBannedScan` stage.
#[derive(Debug, Clone)]
struct BannedScanOutcome {
    matched: Vec<String>,
}

#[derive(Deserialize)]
struct ValidatorVerdict {
    verdict: String,
    #[serde(default)]
    reasons: Vec<String>,
}

/// The generate → validate → scan pipeline.
pub struct GenerationPipeline {
    model: Arc<dyn LanguageModel>,
    gate: SafetyGate,
    max_retries: u32,
    backoff: Duration,
}

impl GenerationPipeline {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            gate: SafetyGate::new(),
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: DEFAULT_BACKOFF,
        }
    }

    /// Replaces the banned-term gate. Intended for tests.
    pub fn with_gate(mut self, gate: SafetyGate) -> Self {
        self.gate = gate;
        self
    }

    /// Overrides the retry policy.
    pub fn with_retry_policy(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.backoff = backoff;
        self
    }

    /// Runs the whole pipeline for one turn, retrying the turn as a unit on
    /// transient model failures.
    pub async fn run(&self, ctx: &GenerationContext<'_>) -> Result<GenerationResult> {
        let mut attempt = 0;
        loop {
            match self.attempt(ctx).await {
                Ok(result) => return Ok(result),
                Err(err) if err.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        "transient model failure on step {} (attempt {}/{}): {}",
                        ctx.step.name,
                        attempt,
                        self.max_retries,
                        err
                    );
                    tokio::time::sleep(self.backoff * attempt).await;
                }
                Err(err) => return Err(map_model_error(err)),
            }
        }
    }

    async fn attempt(&self, ctx: &GenerationContext<'_>) -> std::result::Result<GenerationResult, ModelError> {
        let draft = self.generate(ctx).await?;
        let validation = self.validate(ctx.step, &draft).await?;
        let scan = self.banned_scan(&draft);

        if !validation.pass || !scan.matched.is_empty() {
            tracing::debug!(
                "turn rejected on step {}: validator pass={}, banned={:?}",
                ctx.step.name,
                validation.pass,
                scan.matched
            );
            return Ok(GenerationResult {
                payload: StepPayload::reflection_only(ctx.step.name, SOFT_REFLECTION),
                degraded: Some(DegradeReason::ContentRejected {
                    reasons: validation.reasons,
                    matched_terms: scan.matched,
                    output: draft.raw,
                }),
            });
        }

        match parse_payload(ctx.step, &draft.raw) {
            Ok(payload) => Ok(GenerationResult {
                payload,
                degraded: None,
            }),
            Err(err) => {
                tracing::debug!("unparseable model output on step {}: {}", ctx.step.name, err);
                Ok(GenerationResult {
                    payload: StepPayload::reflection_only(ctx.step.name, SOFT_REFLECTION),
                    degraded: Some(DegradeReason::MalformedOutput {
                        error: err.to_string(),
                        output: draft.raw,
                    }),
                })
            }
        }
    }

    /// `Generate`: the primary extract-and-reflect call, constraints intact.
    async fn generate(&self, ctx: &GenerationContext<'_>) -> std::result::Result<GeneratedDraft, ModelError> {
        let system_prompt =
            prompts::primary_system(ctx.step, ctx.aggregate, ctx.skip_count, ctx.loop_detected)
                .map_err(|e| ModelError::Config(e.to_string()))?;
        let user_prompt = prompts::primary_user(ctx.history, ctx.user_text)
            .map_err(|e| ModelError::Config(e.to_string()))?;
        let raw = self
            .model
            .complete(CompletionRequest {
                system_prompt,
                schema: ctx.step.schema_value(),
                user_prompt,
            })
            .await?;
        Ok(GeneratedDraft { raw })
    }

    /// `Validate`: the second call, judging against the stripped schema.
    ///
    /// An unparseable validator response counts as a failed validation, not
    /// a turn failure; the primary output may be fine but is unverifiable.
    async fn validate(
        &self,
        step: &Step,
        draft: &GeneratedDraft,
    ) -> std::result::Result<ValidationOutcome, ModelError> {
        let system_prompt =
            prompts::validator_system().map_err(|e| ModelError::Config(e.to_string()))?;
        let user_prompt =
            prompts::validator_user(&draft.raw).map_err(|e| ModelError::Config(e.to_string()))?;
        let raw = self
            .model
            .complete(CompletionRequest {
                system_prompt,
                schema: step.stripped_schema_value(),
                user_prompt,
            })
            .await?;

        match extract_json(&raw).and_then(|v| serde_json::from_value::<ValidatorVerdict>(v).ok()) {
            Some(verdict) => Ok(ValidationOutcome {
                pass: verdict.verdict == "pass",
                reasons: verdict.reasons,
            }),
            None => Ok(ValidationOutcome {
                pass: false,
                reasons: vec!["validator response was not a verdict object".to_string()],
            }),
        }
    }

    /// `LocalBannedScan`: local re-scan of the primary output.
    fn banned_scan(&self, draft: &GeneratedDraft) -> BannedScanOutcome {
        let verdict = self.gate.check(&draft.raw);
        BannedScanOutcome {
            matched: if verdict.banned { verdict.matched } else { Vec::new() },
        }
    }
}

fn parse_payload(step: &Step, raw: &str) -> Result<StepPayload> {
    let value = extract_json(raw).ok_or_else(|| GroveError::Serialization {
        format: "JSON".to_string(),
        message: "completion contained no JSON object".to_string(),
    })?;
    StepPayload::from_model_value(step.name, value)
}

/// Pulls the first JSON object out of a completion, tolerating code fences
/// and prose around it.
pub(crate) fn extract_json(raw: &str) -> Option<serde_json::Value> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&raw[start..=end]).ok()
}

/// Calls the model with the pipeline's whole-turn retry policy.
pub(crate) async fn complete_with_retries(
    model: &dyn LanguageModel,
    request: CompletionRequest,
    max_retries: u32,
    backoff: Duration,
) -> std::result::Result<String, ModelError> {
    let mut attempt = 0;
    loop {
        match model.complete(request.clone()).await {
            Ok(text) => return Ok(text),
            Err(err) if err.is_transient() && attempt < max_retries => {
                attempt += 1;
                tracing::warn!(
                    "transient model failure (attempt {}/{}): {}",
                    attempt,
                    max_retries,
                    err
                );
                tokio::time::sleep(backoff * attempt).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Maps an exhausted or fatal model error into the engine error taxonomy.
pub(crate) fn map_model_error(err: ModelError) -> GroveError {
    match err {
        ModelError::Config(message) => GroveError::Config(message),
        other => GroveError::Connectivity(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{PASS_VERDICT, ScriptedModel, goal_step};
    use grove_core::aggregate::StepAggregate;

    fn ctx<'a>(step: &'a Step, aggregate: &'a StepAggregate) -> GenerationContext<'a> {
        GenerationContext {
            step,
            user_text: "I want to run a half marathon because of a health scare",
            history: &[],
            aggregate,
            skip_count: 0,
            loop_detected: false,
        }
    }

    fn pipeline(model: ScriptedModel) -> GenerationPipeline {
        GenerationPipeline::new(Arc::new(model))
            .with_retry_policy(2, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn successful_turn_parses_the_primary_payload() {
        let model = ScriptedModel::new()
            .push_ok(r#"{"coach_reflection": "That sounds important.", "goal": "half marathon"}"#)
            .push_ok(PASS_VERDICT);
        let step = goal_step();
        let aggregate = StepAggregate::default();
        let result = pipeline(model).run(&ctx(&step, &aggregate)).await.unwrap();
        assert!(result.degraded.is_none());
        assert_eq!(result.payload.coach_reflection(), "That sounds important.");
        assert_eq!(result.payload.field_map()["goal"], "half marathon");
    }

    #[tokio::test]
    async fn both_calls_receive_the_right_schema_shape() {
        let model = ScriptedModel::new()
            .push_ok(r#"{"coach_reflection": "ok"}"#)
            .push_ok(PASS_VERDICT);
        let requests = model.requests();
        let step = goal_step();
        let aggregate = StepAggregate::default();
        pipeline(model).run(&ctx(&step, &aggregate)).await.unwrap();

        let recorded = requests.lock().unwrap();
        assert_eq!(recorded.len(), 2);
        // Primary keeps constraints; validator sees them stripped.
        assert!(recorded[0].schema["properties"]["goal"].get("maxLength").is_some());
        assert!(recorded[1].schema["properties"]["goal"].get("maxLength").is_none());
        assert!(recorded[1].user_prompt.contains("coach_reflection"));
    }

    #[tokio::test]
    async fn validator_fail_degrades_to_content_rejection() {
        let model = ScriptedModel::new()
            .push_ok(r#"{"coach_reflection": "dubious advice"}"#)
            .push_ok(r#"{"verdict": "fail", "reasons": ["off-topic"]}"#);
        let step = goal_step();
        let aggregate = StepAggregate::default();
        let result = pipeline(model).run(&ctx(&step, &aggregate)).await.unwrap();
        match result.degraded {
            Some(DegradeReason::ContentRejected { reasons, .. }) => {
                assert_eq!(reasons, vec!["off-topic"]);
            }
            other => panic!("expected content rejection, got {other:?}"),
        }
        assert!(result.payload.field_map().get("goal").is_none());
    }

    #[tokio::test]
    async fn banned_terms_reject_even_when_the_validator_passes() {
        let model = ScriptedModel::new()
            .push_ok(r#"{"coach_reflection": "I can diagnose this for you"}"#)
            .push_ok(PASS_VERDICT);
        let step = goal_step();
        let aggregate = StepAggregate::default();
        let result = pipeline(model).run(&ctx(&step, &aggregate)).await.unwrap();
        match result.degraded {
            Some(DegradeReason::ContentRejected { matched_terms, .. }) => {
                assert!(matched_terms.contains(&"diagnose".to_string()));
            }
            other => panic!("expected content rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unparseable_primary_output_degrades_to_malformed() {
        let model = ScriptedModel::new()
            .push_ok("I'd rather answer in prose, thanks.")
            .push_ok(PASS_VERDICT);
        let step = goal_step();
        let aggregate = StepAggregate::default();
        let result = pipeline(model).run(&ctx(&step, &aggregate)).await.unwrap();
        assert!(matches!(
            result.degraded,
            Some(DegradeReason::MalformedOutput { .. })
        ));
    }

    #[tokio::test]
    async fn unparseable_validator_response_counts_as_fail() {
        let model = ScriptedModel::new()
            .push_ok(r#"{"coach_reflection": "fine"}"#)
            .push_ok("looks good to me!");
        let step = goal_step();
        let aggregate = StepAggregate::default();
        let result = pipeline(model).run(&ctx(&step, &aggregate)).await.unwrap();
        assert!(matches!(
            result.degraded,
            Some(DegradeReason::ContentRejected { .. })
        ));
    }

    #[tokio::test]
    async fn transient_failures_retry_the_whole_turn() {
        let model = ScriptedModel::new()
            .push_err(ModelError::Network("connection reset".into()))
            .push_ok(r#"{"coach_reflection": "recovered"}"#)
            .push_ok(PASS_VERDICT);
        let step = goal_step();
        let aggregate = StepAggregate::default();
        let result = pipeline(model).run(&ctx(&step, &aggregate)).await.unwrap();
        assert!(result.degraded.is_none());
        assert_eq!(result.payload.coach_reflection(), "recovered");
    }

    #[tokio::test]
    async fn retries_exhaust_into_a_connectivity_error() {
        let model = ScriptedModel::new()
            .push_err(ModelError::Network("down".into()))
            .push_err(ModelError::Network("down".into()))
            .push_err(ModelError::Network("down".into()));
        let step = goal_step();
        let aggregate = StepAggregate::default();
        let err = pipeline(model).run(&ctx(&step, &aggregate)).await.unwrap_err();
        assert!(matches!(err, GroveError::Connectivity(_)));
    }

    #[tokio::test]
    async fn config_errors_are_fatal_immediately() {
        let model = ScriptedModel::new().push_err(ModelError::Config("no key".into()));
        let step = goal_step();
        let aggregate = StepAggregate::default();
        let err = pipeline(model).run(&ctx(&step, &aggregate)).await.unwrap_err();
        assert!(matches!(err, GroveError::Config(_)));
    }

    #[test]
    fn extract_json_tolerates_fences_and_prose() {
        let fenced = "```json\n{\"a\": 1}\n```";
        assert_eq!(extract_json(fenced).unwrap()["a"], 1);
        assert!(extract_json("no json here").is_none());
        assert!(extract_json("} {").is_none());
    }
}
