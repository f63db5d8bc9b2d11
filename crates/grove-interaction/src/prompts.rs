//! Prompt rendering for the generation pipeline's model calls.
//!
//! Templates are rendered with minijinja; the schema itself is not part of
//! any template; the model collaborator attaches it from the
//! [`CompletionRequest`](grove_core::llm::CompletionRequest) so prompts stay
//! independent of how a given provider wants the schema delivered.

use grove_core::aggregate::StepAggregate;
use grove_core::error::{GroveError, Result};
use grove_core::framework::Step;
use grove_core::reflection::Reflection;
use minijinja::{Environment, context};
use once_cell::sync::Lazy;

const PRIMARY_SYSTEM: &str = r#"You are an experienced, supportive coach guiding a structured session.

Current step: {{ step_name }}
Objective: {{ objective }}
Guidance: {{ guidance }}

Extract structured fields from the user's latest turn and reply as the coach.
Fields captured so far: {{ captured }}
Fields still missing: {{ missing }}
{%- if skip_count > 0 %}
The user has skipped questions on this step {{ skip_count }} time(s). Do not press skipped topics again.
{%- endif %}
{%- if loop_detected %}
The conversation appears to be circling. Change your angle instead of re-asking earlier questions.
{%- endif %}

Always include a "coach_reflection" field with your conversational reply.
Restate any previously captured field you want preserved; omitted fields are treated as lost.
Return a single JSON object and nothing else."#;

const PRIMARY_USER: &str = r#"{%- if transcript %}Conversation so far:
{{ transcript }}

{% endif -%}
User's latest turn:
{{ user_text }}"#;

const VALIDATOR_SYSTEM: &str = r#"You review a coaching assistant's draft output before it reaches a user.
Judge content safety and structural conformance only; length and style are out of scope.
The draft must be a single JSON object matching the field specification you are given, including every field listed as required.
Respond with a single JSON object: {"verdict": "pass", "reasons": []} or {"verdict": "fail", "reasons": ["..."]}."#;

const VALIDATOR_USER: &str = r#"Draft output to review:
{{ raw_output }}"#;

const SYNTHESIS_SYSTEM: &str = r#"You are writing the closing synthesis of a completed coaching session.
Base it only on the step summaries provided; invent nothing.
Respond with a single JSON object with exactly these fields, all non-empty:
  summary: string, a concise narrative of the session
  ai_insights: string, patterns worth the user's attention
  unexplored_options: array of strings
  identified_risks: array of strings
  potential_pitfalls: array of strings"#;

const SYNTHESIS_USER: &str = r#"Step summaries:
{{ summaries }}"#;

static TEMPLATES: Lazy<Environment<'static>> = Lazy::new(|| {
    let mut env = Environment::new();
    for (name, source) in [
        ("primary_system", PRIMARY_SYSTEM),
        ("primary_user", PRIMARY_USER),
        ("validator_system", VALIDATOR_SYSTEM),
        ("validator_user", VALIDATOR_USER),
        ("synthesis_system", SYNTHESIS_SYSTEM),
        ("synthesis_user", SYNTHESIS_USER),
    ] {
        env.add_template(name, source)
            .expect("built-in prompt template is valid");
    }
    env
});

fn render(name: &str, ctx: minijinja::Value) -> Result<String> {
    TEMPLATES
        .get_template(name)
        .and_then(|t| t.render(ctx))
        .map_err(|e| GroveError::internal(format!("prompt template '{name}' failed: {e}")))
}

/// Renders the system prompt of the primary extract-and-reflect call.
pub fn primary_system(
    step: &Step,
    aggregate: &StepAggregate,
    skip_count: u32,
    loop_detected: bool,
) -> Result<String> {
    let captured: Vec<&str> = aggregate.captured.keys().map(String::as_str).collect();
    render(
        "primary_system",
        context! {
            step_name => step.name.to_string(),
            objective => step.objective,
            guidance => step.guidance,
            captured => captured,
            missing => aggregate.missing,
            skip_count => skip_count,
            loop_detected => loop_detected,
        },
    )
}

/// Renders the user prompt of the primary call.
pub fn primary_user(history: &[Reflection], user_text: &str) -> Result<String> {
    render(
        "primary_user",
        context! {
            transcript => conversation_transcript(history),
            user_text => user_text,
        },
    )
}

/// Renders the system prompt of the validator call.
pub fn validator_system() -> Result<String> {
    render("validator_system", context! {})
}

/// Renders the user prompt of the validator call.
pub fn validator_user(raw_output: &str) -> Result<String> {
    render("validator_user", context! { raw_output => raw_output })
}

/// Renders the system prompt of the review synthesis call.
pub fn synthesis_system() -> Result<String> {
    render("synthesis_system", context! {})
}

/// Renders the user prompt of the review synthesis call.
pub fn synthesis_user(summaries: &str) -> Result<String> {
    render("synthesis_user", context! { summaries => summaries })
}

/// Flattens a reflection history into a plain transcript for prompting.
pub fn conversation_transcript(history: &[Reflection]) -> String {
    let mut lines = Vec::new();
    for reflection in history {
        if let Some(input) = &reflection.user_input {
            lines.push(format!("User: {input}"));
        }
        let reply = reflection.payload.coach_reflection();
        if !reply.is_empty() {
            lines.push(format!("Coach: {reply}"));
        }
    }
    lines.join("\n")
}
