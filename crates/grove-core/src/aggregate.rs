//! Progressive field aggregation over a session's reflection history.
//!
//! Given the ordered history and the active step, the aggregator computes
//! which required fields have been captured, with what values, and what is
//! still missing. By default only the most recent reflection for the step
//! counts; later reflections supersede earlier ones wholesale, with no
//! field-level merging across turns. The model is expected to restate fields
//! it wants preserved; that trade-off is deliberate, and the merge behaviour
//! is a configuration knob rather than a hardcoded rule.

use crate::framework::Step;
use crate::reflection::Reflection;
use serde_json::{Map, Value};

/// How values from multiple reflections of the same step combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AggregationMode {
    /// Only the latest reflection for the step counts.
    #[default]
    LatestWins,
    /// Older captured values fill gaps the latest reflection left open.
    MergeAcrossTurns,
}

/// Aggregated view of one step's captured state.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StepAggregate {
    /// Required fields that are captured, with their current values.
    pub captured: Map<String, Value>,
    /// Required fields still missing.
    pub missing: Vec<String>,
    /// captured divided by required, times 100, or 0 if the step has no required fields.
    pub completion_percent: f32,
}

/// Computes [`StepAggregate`]s from reflection history.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldAggregator {
    mode: AggregationMode,
}

impl FieldAggregator {
    pub fn new(mode: AggregationMode) -> Self {
        Self { mode }
    }

    /// Aggregates the captured state of `step` from `history`.
    ///
    /// `history` must be ordered ascending by creation time, the order the
    /// reflection repository returns.
    pub fn aggregate(&self, history: &[Reflection], step: &Step) -> StepAggregate {
        let mut relevant = history.iter().filter(|r| r.step() == step.name);
        let field_maps: Vec<Map<String, Value>> = match self.mode {
            AggregationMode::LatestWins => relevant
                .next_back()
                .map(|r| vec![r.payload.field_map()])
                .unwrap_or_default(),
            // Newest first, so earlier maps win and older ones only fill gaps.
            AggregationMode::MergeAcrossTurns => {
                relevant.rev().map(|r| r.payload.field_map()).collect()
            }
        };

        let mut captured = Map::new();
        let mut missing = Vec::new();
        for name in &step.required_fields {
            let value = field_maps
                .iter()
                .filter_map(|m| m.get(*name))
                .find(|v| is_captured(v));
            match value {
                Some(v) => {
                    captured.insert((*name).to_string(), v.clone());
                }
                None => missing.push((*name).to_string()),
            }
        }

        let completion_percent = if step.required_fields.is_empty() {
            0.0
        } else {
            captured.len() as f32 / step.required_fields.len() as f32 * 100.0
        };

        StepAggregate {
            captured,
            missing,
            completion_percent,
        }
    }
}

/// A field counts as captured iff its value is a non-empty string, a
/// non-empty array, a number, or a boolean. Empty string, empty array,
/// `null`, and absent all count as missing.
pub fn is_captured(value: &Value) -> bool {
    match value {
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Number(_) | Value::Bool(_) => true,
        Value::Null | Value::Object(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::{FrameworkCatalog, FrameworkId, StepName};
    use crate::reflection::{GoalFields, StepPayload};
    use serde_json::json;

    fn goal_step_aggregate(mode: AggregationMode, history: &[Reflection]) -> StepAggregate {
        let catalog = FrameworkCatalog::builtin();
        let step = catalog
            .get(FrameworkId::Grow)
            .unwrap()
            .step(StepName::Goal)
            .unwrap()
            .clone();
        FieldAggregator::new(mode).aggregate(history, &step)
    }

    fn goal_reflection(fields: GoalFields) -> Reflection {
        Reflection::from_turn("s-1", "some turn", StepPayload::Goal(fields))
    }

    #[test]
    fn empty_history_reports_all_required_fields_missing() {
        let aggregate = goal_step_aggregate(AggregationMode::LatestWins, &[]);
        assert_eq!(
            aggregate.missing,
            vec!["goal", "why_now", "success_criteria", "timeframe"]
        );
        assert_eq!(aggregate.completion_percent, 0.0);
        assert!(aggregate.captured.is_empty());
    }

    #[test]
    fn captured_value_boundaries() {
        assert!(is_captured(&json!("x")));
        assert!(is_captured(&json!(["x"])));
        assert!(is_captured(&json!(3)));
        assert!(is_captured(&json!(false)));
        assert!(!is_captured(&json!("")));
        assert!(!is_captured(&json!([])));
        assert!(!is_captured(&Value::Null));
    }

    #[test]
    fn latest_reflection_supersedes_earlier_ones() {
        let history = vec![
            goal_reflection(GoalFields {
                coach_reflection: "ok".into(),
                goal: Some("old goal".into()),
                why_now: Some("it matters".into()),
                ..Default::default()
            }),
            goal_reflection(GoalFields {
                coach_reflection: "ok".into(),
                goal: Some("new goal".into()),
                ..Default::default()
            }),
        ];
        let aggregate = goal_step_aggregate(AggregationMode::LatestWins, &history);
        assert_eq!(aggregate.captured["goal"], json!("new goal"));
        // why_now was not restated, so under latest-wins it is lost.
        assert!(aggregate.missing.contains(&"why_now".to_string()));
        assert_eq!(aggregate.completion_percent, 25.0);
    }

    #[test]
    fn merge_mode_fills_gaps_from_older_reflections() {
        let history = vec![
            goal_reflection(GoalFields {
                coach_reflection: "ok".into(),
                goal: Some("old goal".into()),
                why_now: Some("it matters".into()),
                ..Default::default()
            }),
            goal_reflection(GoalFields {
                coach_reflection: "ok".into(),
                goal: Some("new goal".into()),
                ..Default::default()
            }),
        ];
        let aggregate = goal_step_aggregate(AggregationMode::MergeAcrossTurns, &history);
        assert_eq!(aggregate.captured["goal"], json!("new goal"));
        assert_eq!(aggregate.captured["why_now"], json!("it matters"));
        assert_eq!(aggregate.completion_percent, 50.0);
    }

    #[test]
    fn reflections_for_other_steps_are_ignored() {
        let other = Reflection::from_turn(
            "s-1",
            "turn",
            StepPayload::reflection_only(StepName::Reality, "noted"),
        );
        let aggregate = goal_step_aggregate(AggregationMode::LatestWins, &[other]);
        assert_eq!(aggregate.missing.len(), 4);
    }

    #[test]
    fn empty_strings_and_arrays_do_not_count_as_captured() {
        let history = vec![goal_reflection(GoalFields {
            coach_reflection: "ok".into(),
            goal: Some(String::new()),
            success_criteria: Some(vec![]),
            ..Default::default()
        })];
        let aggregate = goal_step_aggregate(AggregationMode::LatestWins, &history);
        assert!(aggregate.missing.contains(&"goal".to_string()));
        assert!(aggregate.missing.contains(&"success_criteria".to_string()));
        assert_eq!(aggregate.completion_percent, 0.0);
    }
}
