//! Step completion evaluation with progressive relaxation.
//!
//! Decides whether a step's exit criteria are satisfied. The more the user
//! has skipped a question on the step, the looser the bar; at two or more
//! skips the bar reaches a terminal minimum and does not loosen further. A
//! detected repetition loop overrides the skip ladder with its own fixed
//! lenient threshold: the system itself appears stuck, which is a different
//! situation from the user choosing to skip.
//!
//! For a fixed payload the criteria are monotonically non-decreasing in
//! leniency as the skip count grows: anything that clears the strict bar
//! also clears every relaxed one.

use crate::reflection::{ActionDraft, OptionItem, StepPayload};

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.trim().is_empty())
}

fn present_list(value: &Option<Vec<String>>) -> bool {
    value.as_deref().is_some_and(|l| !l.is_empty())
}

fn count_present(values: &[bool]) -> usize {
    values.iter().filter(|b| **b).count()
}

fn labelled_options(options: Option<&[OptionItem]>) -> Vec<&OptionItem> {
    options
        .unwrap_or_default()
        .iter()
        .filter(|o| !o.label.trim().is_empty())
        .collect()
}

fn advance_on_actions(actions: Option<&[ActionDraft]>, skip_count: u32, loop_detected: bool) -> bool {
    let actions = actions.unwrap_or_default();
    let complete = actions.iter().filter(|a| a.is_complete()).count();
    let titled = actions.iter().filter(|a| a.has_title()).count();
    if loop_detected {
        return complete >= 1;
    }
    match skip_count {
        0 => complete >= 2,
        1 => complete >= 1,
        _ => titled >= 1,
    }
}

/// Pure decision: are the step's exit criteria satisfied?
///
/// The review step never auto-advances; its completion is decided by the
/// explicit two-phase closure flow, not by this evaluator.
pub fn should_advance(payload: &StepPayload, skip_count: u32, loop_detected: bool) -> bool {
    match payload {
        StepPayload::Goal(f) => {
            let captured = count_present(&[
                present(&f.goal),
                present(&f.why_now),
                present_list(&f.success_criteria),
                present(&f.timeframe),
            ]);
            let threshold = if loop_detected {
                2
            } else {
                match skip_count {
                    0 => 3,
                    1 => 2,
                    _ => 1,
                }
            };
            captured >= threshold
        }
        StepPayload::Reality(f) => {
            // Current state and risks are non-negotiable at every tier.
            if !present(&f.current_state) || !present_list(&f.risks) {
                return false;
            }
            let optional = count_present(&[present_list(&f.constraints), present_list(&f.resources)]);
            let threshold = if loop_detected {
                1
            } else {
                match skip_count {
                    0 => 2,
                    1 => 1,
                    _ => 0,
                }
            };
            optional >= threshold
        }
        StepPayload::Options(f) => {
            let options = labelled_options(f.options.as_deref());
            let explored = options.iter().filter(|o| o.is_explored()).count();
            if loop_detected {
                return options.len() >= 2;
            }
            match skip_count {
                0 => options.len() >= 2 && explored >= 2,
                1 => options.len() >= 2,
                _ => !options.is_empty(),
            }
        }
        StepPayload::Will(f) => advance_on_actions(f.actions.as_deref(), skip_count, loop_detected),
        StepPayload::Commitment(f) => {
            advance_on_actions(f.actions.as_deref(), skip_count, loop_detected)
        }
        StepPayload::Review(_) => false,
        StepPayload::Situation(f) => {
            let captured = count_present(&[
                present(&f.challenge),
                present(&f.impact),
                present(&f.desired_outcome),
            ]);
            let threshold = if loop_detected {
                1
            } else {
                match skip_count {
                    0 => 2,
                    _ => 1,
                }
            };
            captured >= threshold
        }
        StepPayload::Reframe(f) => {
            let limiting = present(&f.limiting_belief);
            let empowering = present(&f.empowering_belief);
            let any = limiting || empowering || present_list(&f.evidence_against);
            if loop_detected {
                return limiting || empowering;
            }
            match skip_count {
                0 => limiting && empowering,
                1 => limiting || empowering,
                _ => any,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflection::{
        GoalFields, OptionsFields, RealityFields, ReframeFields, ReviewFields, WillFields,
    };

    fn goal(captured: usize) -> StepPayload {
        let mut fields = GoalFields {
            coach_reflection: "ok".into(),
            ..Default::default()
        };
        if captured >= 1 {
            fields.goal = Some("run a half marathon".into());
        }
        if captured >= 2 {
            fields.why_now = Some("health scare".into());
        }
        if captured >= 3 {
            fields.success_criteria = Some(vec!["finish under 2h".into()]);
        }
        if captured >= 4 {
            fields.timeframe = Some("by spring".into());
        }
        StepPayload::Goal(fields)
    }

    fn option(label: &str, pros: &[&str], cons: &[&str]) -> OptionItem {
        OptionItem {
            label: label.into(),
            pros: pros.iter().map(|s| s.to_string()).collect(),
            cons: cons.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn options_payload(options: Vec<OptionItem>) -> StepPayload {
        StepPayload::Options(OptionsFields {
            coach_reflection: "ok".into(),
            options: Some(options),
        })
    }

    fn will_payload(actions: Vec<ActionDraft>) -> StepPayload {
        StepPayload::Will(WillFields {
            coach_reflection: "ok".into(),
            actions: Some(actions),
        })
    }

    fn action(title: &str, due: Option<&str>) -> ActionDraft {
        ActionDraft {
            title: title.into(),
            due: due.map(Into::into),
            first_step: None,
        }
    }

    #[test]
    fn goal_meets_strict_bar_with_three_of_four() {
        assert!(should_advance(&goal(3), 0, false));
        assert!(!should_advance(&goal(2), 0, false));
    }

    #[test]
    fn goal_ladder_relaxes_with_skips() {
        assert!(should_advance(&goal(2), 1, false));
        assert!(should_advance(&goal(1), 2, false));
        assert!(should_advance(&goal(1), 5, false));
        assert!(!should_advance(&goal(0), 5, false));
    }

    #[test]
    fn goal_loop_override_uses_its_own_threshold() {
        assert!(should_advance(&goal(2), 0, true));
        assert!(!should_advance(&goal(1), 0, true));
    }

    #[test]
    fn skip_leniency_is_monotone_for_every_step_payload() {
        let payloads = vec![
            goal(3),
            StepPayload::Reality(RealityFields {
                coach_reflection: "ok".into(),
                current_state: Some("stuck in role".into()),
                constraints: Some(vec!["time".into()]),
                resources: Some(vec!["mentor".into()]),
                risks: Some(vec!["burnout".into()]),
            }),
            options_payload(vec![
                option("a", &["p"], &["c"]),
                option("b", &["p"], &["c"]),
            ]),
            will_payload(vec![
                action("a", Some("2026-09-01")),
                action("b", Some("2026-09-02")),
            ]),
        ];
        for payload in payloads {
            for skip in 0..4u32 {
                if should_advance(&payload, skip, false) {
                    for looser in skip + 1..5 {
                        assert!(
                            should_advance(&payload, looser, false),
                            "payload {payload:?} advanced at skip {skip} but not {looser}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn reality_always_requires_current_state_and_risks() {
        let missing_risks = StepPayload::Reality(RealityFields {
            coach_reflection: "ok".into(),
            current_state: Some("stuck".into()),
            constraints: Some(vec!["time".into()]),
            resources: Some(vec!["mentor".into()]),
            risks: None,
        });
        assert!(!should_advance(&missing_risks, 5, false));
        assert!(!should_advance(&missing_risks, 0, true));
    }

    #[test]
    fn reality_optional_pair_relaxes_to_zero() {
        let bare = StepPayload::Reality(RealityFields {
            coach_reflection: "ok".into(),
            current_state: Some("stuck".into()),
            risks: Some(vec!["burnout".into()]),
            ..Default::default()
        });
        assert!(!should_advance(&bare, 0, false));
        assert!(!should_advance(&bare, 1, false));
        assert!(should_advance(&bare, 2, false));
    }

    #[test]
    fn options_strict_bar_needs_two_explored() {
        // Two options, neither explored: stays put at the strict tier.
        let unexplored = options_payload(vec![
            option("a", &["p"], &[]),
            option("b", &[], &[]),
        ]);
        assert!(!should_advance(&unexplored, 0, false));

        let one_explored = options_payload(vec![
            option("a", &["p"], &["c"]),
            option("b", &[], &[]),
        ]);
        assert!(!should_advance(&one_explored, 0, false));

        let two_explored = options_payload(vec![
            option("a", &["p"], &["c"]),
            option("b", &["p"], &["c"]),
        ]);
        assert!(should_advance(&two_explored, 0, false));
    }

    #[test]
    fn options_relaxations_drop_exploration_then_count() {
        let two_unexplored = options_payload(vec![
            option("a", &[], &[]),
            option("b", &[], &[]),
        ]);
        assert!(should_advance(&two_unexplored, 1, false));
        assert!(should_advance(&two_unexplored, 0, true));

        let one_unexplored = options_payload(vec![option("a", &[], &[])]);
        assert!(!should_advance(&one_unexplored, 1, false));
        assert!(should_advance(&one_unexplored, 2, false));
        assert!(!should_advance(&one_unexplored, 0, true));
    }

    #[test]
    fn unlabelled_options_do_not_count() {
        let blank = options_payload(vec![option("  ", &["p"], &["c"])]);
        assert!(!should_advance(&blank, 2, false));
    }

    #[test]
    fn will_counts_complete_then_titled_actions() {
        let two_complete = will_payload(vec![
            action("email mentor", Some("2026-09-01")),
            action("book course", Some("2026-09-15")),
        ]);
        assert!(should_advance(&two_complete, 0, false));

        let one_complete = will_payload(vec![action("email mentor", Some("2026-09-01"))]);
        assert!(!should_advance(&one_complete, 0, false));
        assert!(should_advance(&one_complete, 1, false));
        assert!(should_advance(&one_complete, 0, true));

        let undated = will_payload(vec![action("email mentor", None)]);
        assert!(!should_advance(&undated, 1, false));
        assert!(should_advance(&undated, 2, false));
        assert!(!should_advance(&undated, 0, true));
    }

    #[test]
    fn review_never_auto_advances() {
        let complete_review = StepPayload::Review(ReviewFields {
            coach_reflection: "ok".into(),
            key_takeaway: Some("x".into()),
            confidence_shift: Some("x".into()),
            first_step_commitment: Some("x".into()),
            support_needed: Some("x".into()),
            ..Default::default()
        });
        assert!(!should_advance(&complete_review, 0, false));
        assert!(!should_advance(&complete_review, 5, false));
        assert!(!should_advance(&complete_review, 0, true));
    }

    #[test]
    fn reframe_needs_both_beliefs_at_the_strict_tier() {
        let both = StepPayload::Reframe(ReframeFields {
            coach_reflection: "ok".into(),
            limiting_belief: Some("I freeze up".into()),
            empowering_belief: Some("I can prepare".into()),
            ..Default::default()
        });
        assert!(should_advance(&both, 0, false));

        let one = StepPayload::Reframe(ReframeFields {
            coach_reflection: "ok".into(),
            limiting_belief: Some("I freeze up".into()),
            ..Default::default()
        });
        assert!(!should_advance(&one, 0, false));
        assert!(should_advance(&one, 1, false));
        assert!(should_advance(&one, 0, true));

        let evidence_only = StepPayload::Reframe(ReframeFields {
            coach_reflection: "ok".into(),
            evidence_against: Some(vec!["gave a good talk".into()]),
            ..Default::default()
        });
        assert!(!should_advance(&evidence_only, 1, false));
        assert!(should_advance(&evidence_only, 2, false));
    }

    #[test]
    fn whitespace_only_values_do_not_count() {
        let padded = StepPayload::Goal(GoalFields {
            coach_reflection: "ok".into(),
            goal: Some("   ".into()),
            ..Default::default()
        });
        assert!(!should_advance(&padded, 2, false));
    }
}
