//! Built-in framework definitions and the catalog lookup.
//!
//! The catalog is an explicit immutable object constructed at startup and
//! passed by handle into the orchestrator, so tests can substitute alternate
//! frameworks without touching process-wide state.

use super::model::{Framework, FrameworkId, Step, StepName};
use super::schema::{FieldSpec, StepSchema};
use crate::error::{GroveError, Result};

/// Registry of the coaching frameworks known to this process.
#[derive(Debug, Clone)]
pub struct FrameworkCatalog {
    frameworks: Vec<Framework>,
}

impl FrameworkCatalog {
    /// Builds a catalog from the given frameworks.
    pub fn new(frameworks: Vec<Framework>) -> Self {
        Self { frameworks }
    }

    /// The catalog shipped with the engine: GROW and Confidence.
    pub fn builtin() -> Self {
        Self::new(vec![grow(), confidence()])
    }

    /// Pure lookup by framework id.
    ///
    /// # Errors
    ///
    /// `FrameworkNotFound` if no framework is registered under `id`. Callers
    /// must treat this as fatal for the turn; there is no partial processing.
    pub fn get(&self, id: FrameworkId) -> Result<&Framework> {
        self.frameworks
            .iter()
            .find(|f| f.id == id)
            .ok_or_else(|| GroveError::FrameworkNotFound(id.to_string()))
    }

    /// Registers an additional framework, replacing any existing one with the
    /// same id. Intended for test doubles.
    pub fn register(&mut self, framework: Framework) {
        self.frameworks.retain(|f| f.id != framework.id);
        self.frameworks.push(framework);
    }
}

fn coach_reflection_field() -> FieldSpec {
    FieldSpec::text(
        "coach_reflection",
        "The coach's conversational reply to the user for this turn.",
    )
    .with_length(1, 700)
}

fn action_item_members() -> Vec<FieldSpec> {
    vec![
        FieldSpec::text("title", "Short imperative description of the action.")
            .require()
            .with_length(1, 160),
        FieldSpec::text(
            "due",
            "When the action will be done, as an ISO date if the user gave one.",
        )
        .with_max_length(40),
        FieldSpec::text("first_step", "The very first concrete move, if mentioned.")
            .with_max_length(200),
    ]
}

fn review_step() -> Step {
    Step {
        name: StepName::Review,
        objective: "Consolidate what the session surfaced and how the user will carry it forward.",
        schema: StepSchema::new(vec![
            coach_reflection_field(),
            FieldSpec::text("key_takeaway", "The single most useful insight from the session.")
                .with_max_length(400),
            FieldSpec::text(
                "confidence_shift",
                "How the user's confidence changed over the session, in their words.",
            )
            .with_max_length(300),
            FieldSpec::text(
                "first_step_commitment",
                "The first step the user commits to taking after the session.",
            )
            .with_max_length(300),
            FieldSpec::text(
                "support_needed",
                "Support or accountability the user wants for follow-through.",
            )
            .with_max_length(300),
        ]),
        required_fields: vec![
            "key_takeaway",
            "confidence_shift",
            "first_step_commitment",
            "support_needed",
        ],
        guidance: "Walk the four closing questions one at a time: biggest takeaway, \
                   confidence shift, first step, support needed. Reflect answers back \
                   briefly; do not open new topics.",
        transition: None,
        opener: Some(
            "Before we wrap up, let's take stock. Looking back over this session, \
             what stands out as your biggest takeaway?",
        ),
    }
}

fn grow() -> Framework {
    let steps = vec![
        Step {
            name: StepName::Goal,
            objective: "Help the user name a specific goal, why it matters now, what success \
                        looks like, and a timeframe.",
            schema: StepSchema::new(vec![
                coach_reflection_field(),
                FieldSpec::text("goal", "The goal the user wants to work towards.")
                    .with_length(1, 300),
                FieldSpec::text("why_now", "Why this goal matters to the user right now.")
                    .with_max_length(400),
                FieldSpec::text_list(
                    "success_criteria",
                    "Observable signs the goal has been reached.",
                )
                .with_items(1, 5),
                FieldSpec::text("timeframe", "When the user wants to have reached the goal.")
                    .with_max_length(120),
            ]),
            required_fields: vec!["goal", "why_now", "success_criteria", "timeframe"],
            guidance: "Ask one question at a time. Push gently for specificity: a goal, the \
                       reason it matters now, success criteria, and a timeframe. Restate any \
                       fields already captured in earlier turns.",
            transition: Some(
                "That gives us a solid goal to work with. Next, let's look honestly at \
                 where things stand today.",
            ),
            opener: Some(
                "Welcome. This is your time, so let's make it count: what would you like \
                 to work towards?",
            ),
        },
        Step {
            name: StepName::Reality,
            objective: "Map the user's current situation: where they are, what limits them, \
                        what they can draw on, and what could go wrong.",
            schema: StepSchema::new(vec![
                coach_reflection_field(),
                FieldSpec::text(
                    "current_state",
                    "Where the user is today relative to the goal.",
                )
                .with_length(1, 500),
                FieldSpec::text_list("constraints", "What limits or blocks progress.")
                    .with_items(0, 6),
                FieldSpec::text_list("resources", "Assets, people, or strengths to draw on.")
                    .with_items(0, 6),
                FieldSpec::text_list("risks", "What could derail progress.").with_items(0, 6),
            ]),
            required_fields: vec!["current_state", "constraints", "resources", "risks"],
            guidance: "Stay descriptive, not evaluative. Capture the current state and risks \
                       before probing constraints and resources. Mirror the user's own words \
                       where possible.",
            transition: Some(
                "Thanks for laying that out so honestly. With the picture clear, let's \
                 open up what you could do about it.",
            ),
            opener: Some("So where are things today, honestly, in relation to that goal?"),
        },
        Step {
            name: StepName::Options,
            objective: "Generate at least two genuinely different ways forward and explore \
                        their trade-offs.",
            schema: StepSchema::new(vec![
                coach_reflection_field(),
                FieldSpec::object_list(
                    "options",
                    "Ways forward the user is considering.",
                    vec![
                        FieldSpec::text("label", "Short name for the option.")
                            .require()
                            .with_length(1, 120),
                        FieldSpec::text_list("pros", "What speaks for this option.")
                            .with_items(0, 5),
                        FieldSpec::text_list("cons", "What speaks against this option.")
                            .with_items(0, 5),
                    ],
                )
                .with_items(0, 6),
            ]),
            required_fields: vec!["options"],
            guidance: "Invite divergent thinking before judging anything. Aim for at least \
                       two distinct options and explore pros and cons for the serious ones. \
                       Never recommend an option; the choice is the user's.",
            transition: Some(
                "You've got real choices on the table now. Let's turn the one that pulls \
                 you most into a commitment.",
            ),
            opener: Some("What could you do? Let's collect a few different ways forward."),
        },
        Step {
            name: StepName::Will,
            objective: "Convert the chosen option into concrete actions with owners and dates.",
            schema: StepSchema::new(vec![
                coach_reflection_field(),
                FieldSpec::object_list(
                    "actions",
                    "The actions the user commits to.",
                    action_item_members(),
                )
                .with_items(0, 6),
            ]),
            required_fields: vec!["actions"],
            guidance: "Make it concrete: what exactly, by when, and what is the very first \
                       move. Test commitment lightly; shrink actions that sound aspirational \
                       rather than scheduled.",
            transition: Some(
                "Those commitments are written down. Let's close by reviewing what this \
                 session gave you.",
            ),
            opener: Some("What will you actually do, and by when?"),
        },
        review_step(),
    ];
    Framework::new(FrameworkId::Grow, steps).expect("built-in GROW framework is valid")
}

fn confidence() -> Framework {
    let steps = vec![
        Step {
            name: StepName::Situation,
            objective: "Name the situation where confidence fails, its impact, and the \
                        outcome the user wants instead.",
            schema: StepSchema::new(vec![
                coach_reflection_field(),
                FieldSpec::text(
                    "challenge",
                    "The situation in which the user's confidence breaks down.",
                )
                .with_length(1, 400),
                FieldSpec::text("impact", "What that costs the user today.").with_max_length(400),
                FieldSpec::text(
                    "desired_outcome",
                    "How the user wants to show up in that situation instead.",
                )
                .with_max_length(300),
            ]),
            required_fields: vec!["challenge", "impact", "desired_outcome"],
            guidance: "Ground the conversation in one concrete, recent situation rather than \
                       a general trait. Capture the felt cost and the desired way of showing \
                       up.",
            transition: Some(
                "That's a clear picture of the moment that matters. Let's look at the \
                 story you tell yourself inside it.",
            ),
            opener: Some(
                "Welcome. Tell me about a recent moment where your confidence let you \
                 down. What happened?",
            ),
        },
        Step {
            name: StepName::Reframe,
            objective: "Surface the limiting belief behind the situation and build an \
                        empowering alternative grounded in evidence.",
            schema: StepSchema::new(vec![
                coach_reflection_field(),
                FieldSpec::text(
                    "limiting_belief",
                    "The belief driving the confidence breakdown, in the user's words.",
                )
                .with_max_length(300),
                FieldSpec::text_list(
                    "evidence_against",
                    "Concrete past experiences that contradict the limiting belief.",
                )
                .with_items(0, 5),
                FieldSpec::text(
                    "empowering_belief",
                    "A believable alternative belief the user is willing to test.",
                )
                .with_max_length(300),
            ]),
            required_fields: vec!["limiting_belief", "evidence_against", "empowering_belief"],
            guidance: "Let the user articulate the belief before challenging it. Collect \
                       real counter-evidence from their own history; an empowering belief \
                       they don't find believable is worthless.",
            transition: Some(
                "You've traded a story that shrinks you for one you can actually test. \
                 Let's decide how you'll test it.",
            ),
            opener: Some(
                "When that moment hits, what does the voice in your head say about you?",
            ),
        },
        Step {
            name: StepName::Commitment,
            objective: "Commit to small, dated experiments that exercise the new belief.",
            schema: StepSchema::new(vec![
                coach_reflection_field(),
                FieldSpec::object_list(
                    "actions",
                    "The experiments the user commits to running.",
                    action_item_members(),
                )
                .with_items(0, 6),
            ]),
            required_fields: vec!["actions"],
            guidance: "Favour small experiments over grand plans: something the user can do \
                       within days that puts the empowering belief into practice. Each \
                       experiment needs a date.",
            transition: Some(
                "Those experiments will tell you more than any amount of talking. Let's \
                 close by reviewing the session.",
            ),
            opener: Some("What's one small experiment that would put the new belief to work?"),
        },
        review_step(),
    ];
    Framework::new(FrameworkId::Confidence, steps).expect("built-in Confidence framework is valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_has_both_frameworks() {
        let catalog = FrameworkCatalog::builtin();
        assert!(catalog.get(FrameworkId::Grow).is_ok());
        assert!(catalog.get(FrameworkId::Confidence).is_ok());
    }

    #[test]
    fn grow_walks_goal_to_review() {
        let catalog = FrameworkCatalog::builtin();
        let grow = catalog.get(FrameworkId::Grow).unwrap();
        let names: Vec<StepName> = grow.steps().iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec![
                StepName::Goal,
                StepName::Reality,
                StepName::Options,
                StepName::Will,
                StepName::Review
            ]
        );
        assert!(grow.is_terminal(StepName::Review));
    }

    #[test]
    fn review_step_has_four_closing_questions() {
        let catalog = FrameworkCatalog::builtin();
        let grow = catalog.get(FrameworkId::Grow).unwrap();
        let review = grow.step(StepName::Review).unwrap();
        assert_eq!(review.required_fields.len(), 4);
        assert!(review.transition.is_none());
    }

    #[test]
    fn every_step_schema_includes_a_bounded_coach_reflection() {
        let catalog = FrameworkCatalog::builtin();
        for id in [FrameworkId::Grow, FrameworkId::Confidence] {
            for step in catalog.get(id).unwrap().steps() {
                let schema = step.schema_value();
                let reflection = &schema["properties"]["coach_reflection"];
                assert_eq!(reflection["type"], "string", "step {}", step.name);
                assert!(reflection.get("maxLength").is_some(), "step {}", step.name);
            }
        }
    }

    #[test]
    fn register_replaces_framework_with_same_id() {
        let mut catalog = FrameworkCatalog::builtin();
        let replacement = Framework::new(
            FrameworkId::Grow,
            vec![review_step()],
        )
        .unwrap();
        catalog.register(replacement);
        let grow = catalog.get(FrameworkId::Grow).unwrap();
        assert_eq!(grow.steps().len(), 1);
    }
}
