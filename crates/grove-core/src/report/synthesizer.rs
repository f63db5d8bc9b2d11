//! Post-hoc report synthesis.
//!
//! A pure, read-only transformation of a session's full reflection history
//! into fixed, framework-specific report sections. The latest reflection for
//! each step wins, mirroring the field aggregator. A step with no reflection
//! simply has its section omitted; the synthesizer never fails for missing
//! data.

use super::model::{Report, ReportSection};
use crate::framework::{Framework, FrameworkId, StepName};
use crate::reflection::{ActionDraft, Reflection, StepPayload};
use chrono::Utc;

/// Synthesizes a report from a session's reflection history.
pub fn synthesize(framework: &Framework, history: &[Reflection]) -> Report {
    let sections = match framework.id {
        FrameworkId::Grow => grow_sections(history),
        FrameworkId::Confidence => confidence_sections(history),
    };
    Report {
        framework_id: framework.id,
        generated_at: Utc::now(),
        sections,
    }
}

fn latest_payload(history: &[Reflection], step: StepName) -> Option<&StepPayload> {
    history
        .iter()
        .rev()
        .find(|r| r.step() == step)
        .map(|r| &r.payload)
}

fn push_section(sections: &mut Vec<ReportSection>, title: &str, body: String) {
    let body = body.trim().to_string();
    if !body.is_empty() {
        sections.push(ReportSection {
            title: title.to_string(),
            body,
        });
    }
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|i| format!("- {i}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn action_lines(actions: &[ActionDraft]) -> String {
    actions
        .iter()
        .filter(|a| a.has_title())
        .map(|a| {
            let mut line = format!("- {}", a.title.trim());
            if let Some(due) = a.due.as_deref().filter(|d| !d.trim().is_empty()) {
                line.push_str(&format!(" (due {})", due.trim()));
            }
            if let Some(first) = a.first_step.as_deref().filter(|f| !f.trim().is_empty()) {
                line.push_str(&format!(" — first step: {}", first.trim()));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn grow_sections(history: &[Reflection]) -> Vec<ReportSection> {
    let mut sections = Vec::new();

    if let Some(StepPayload::Goal(goal)) = latest_payload(history, StepName::Goal) {
        let mut body = String::new();
        if let Some(g) = &goal.goal {
            body.push_str(g);
            body.push('\n');
        }
        if let Some(why) = &goal.why_now {
            body.push_str(&format!("\nWhy now: {why}\n"));
        }
        if let Some(criteria) = goal.success_criteria.as_deref().filter(|c| !c.is_empty()) {
            body.push_str("\nSuccess looks like:\n");
            body.push_str(&bullet_list(criteria));
            body.push('\n');
        }
        if let Some(timeframe) = &goal.timeframe {
            body.push_str(&format!("\nTimeframe: {timeframe}\n"));
        }
        push_section(&mut sections, "Goal", body);
    }

    if let Some(StepPayload::Options(options)) = latest_payload(history, StepName::Options) {
        let mut body = String::new();
        for option in options.options.as_deref().unwrap_or_default() {
            if option.label.trim().is_empty() {
                continue;
            }
            body.push_str(&format!("### {}\n", option.label.trim()));
            if !option.pros.is_empty() {
                body.push_str("Pros:\n");
                body.push_str(&bullet_list(&option.pros));
                body.push('\n');
            }
            if !option.cons.is_empty() {
                body.push_str("Cons:\n");
                body.push_str(&bullet_list(&option.cons));
                body.push('\n');
            }
            body.push('\n');
        }
        push_section(&mut sections, "Options Considered", body);
    }

    if let Some(StepPayload::Will(will)) = latest_payload(history, StepName::Will) {
        push_section(
            &mut sections,
            "Plan",
            action_lines(will.actions.as_deref().unwrap_or_default()),
        );
    }

    let mut risks_body = String::new();
    if let Some(StepPayload::Reality(reality)) = latest_payload(history, StepName::Reality) {
        if let Some(risks) = reality.risks.as_deref().filter(|r| !r.is_empty()) {
            risks_body.push_str(&bullet_list(risks));
            risks_body.push('\n');
        }
    }
    if let Some(StepPayload::Review(review)) = latest_payload(history, StepName::Review) {
        if let Some(risks) = review.identified_risks.as_deref().filter(|r| !r.is_empty()) {
            risks_body.push_str(&bullet_list(risks));
            risks_body.push('\n');
        }
        if let Some(pitfalls) = review
            .potential_pitfalls
            .as_deref()
            .filter(|p| !p.is_empty())
        {
            risks_body.push_str(&bullet_list(pitfalls));
            risks_body.push('\n');
        }
    }
    push_section(&mut sections, "Risks", risks_body);

    push_review_summary(&mut sections, history);
    sections
}

fn confidence_sections(history: &[Reflection]) -> Vec<ReportSection> {
    let mut sections = Vec::new();

    let mut transformation = String::new();
    if let Some(StepPayload::Situation(situation)) = latest_payload(history, StepName::Situation) {
        if let Some(challenge) = &situation.challenge {
            transformation.push_str(&format!("Challenge: {challenge}\n"));
        }
        if let Some(impact) = &situation.impact {
            transformation.push_str(&format!("Impact: {impact}\n"));
        }
        if let Some(desired) = &situation.desired_outcome {
            transformation.push_str(&format!("Desired outcome: {desired}\n"));
        }
    }
    if let Some(StepPayload::Reframe(reframe)) = latest_payload(history, StepName::Reframe) {
        if let Some(limiting) = &reframe.limiting_belief {
            transformation.push_str(&format!("\nFrom: {limiting}\n"));
        }
        if let Some(empowering) = &reframe.empowering_belief {
            transformation.push_str(&format!("To: {empowering}\n"));
        }
        if let Some(evidence) = reframe.evidence_against.as_deref().filter(|e| !e.is_empty()) {
            transformation.push_str("\nEvidence for the new belief:\n");
            transformation.push_str(&bullet_list(evidence));
            transformation.push('\n');
        }
    }
    push_section(&mut sections, "Confidence Transformation", transformation);

    if let Some(StepPayload::Commitment(commitment)) =
        latest_payload(history, StepName::Commitment)
    {
        push_section(
            &mut sections,
            "Action Commitment",
            action_lines(commitment.actions.as_deref().unwrap_or_default()),
        );
    }

    push_review_summary(&mut sections, history);
    sections
}

fn push_review_summary(sections: &mut Vec<ReportSection>, history: &[Reflection]) {
    let Some(StepPayload::Review(review)) = latest_payload(history, StepName::Review) else {
        return;
    };
    let mut body = String::new();
    if let Some(summary) = &review.summary {
        body.push_str(summary);
        body.push('\n');
    }
    if let Some(takeaway) = &review.key_takeaway {
        body.push_str(&format!("\nKey takeaway: {takeaway}\n"));
    }
    if let Some(insights) = &review.ai_insights {
        body.push_str(&format!("\nObservations: {insights}\n"));
    }
    if let Some(unexplored) = review
        .unexplored_options
        .as_deref()
        .filter(|u| !u.is_empty())
    {
        body.push_str("\nLeft unexplored:\n");
        body.push_str(&bullet_list(unexplored));
        body.push('\n');
    }
    push_section(sections, "Session Summary", body);
}
