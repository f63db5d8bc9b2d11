//! Typed per-step reflection payloads.
//!
//! Each framework step owns a payload variant with every schema field as an
//! explicit optional member. [`StepPayload::from_model_value`] is the single
//! mapping from step name to variant type, used by both the generation
//! pipeline (parsing model output) and anything that needs to rebuild a
//! payload from storage.

use crate::error::Result;
use crate::framework::StepName;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One way forward the user is considering in the options step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionItem {
    pub label: String,
    #[serde(default)]
    pub pros: Vec<String>,
    #[serde(default)]
    pub cons: Vec<String>,
}

impl OptionItem {
    /// An option is explored once both sides of the trade-off are on record.
    pub fn is_explored(&self) -> bool {
        !self.pros.is_empty() && !self.cons.is_empty()
    }
}

/// A committed action as extracted from conversation, before it becomes an
/// [`Action`](crate::action::Action) record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionDraft {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_step: Option<String>,
}

impl ActionDraft {
    /// Complete means the user said what and by when.
    pub fn is_complete(&self) -> bool {
        !self.title.trim().is_empty()
            && self.due.as_deref().is_some_and(|d| !d.trim().is_empty())
    }

    /// Whether the draft names an action at all.
    pub fn has_title(&self) -> bool {
        !self.title.trim().is_empty()
    }
}

macro_rules! payload_fields {
    ($(#[$meta:meta])* $name:ident { $($(#[$fmeta:meta])* $field:ident : $ty:ty),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            /// The coach's conversational reply for the turn. Mandatory in
            /// model output; a completion without it is malformed.
            pub coach_reflection: String,
            $(
                $(#[$fmeta])*
                #[serde(default, skip_serializing_if = "Option::is_none")]
                pub $field: $ty,
            )*
        }
    };
}

payload_fields!(
    /// Fields of the GROW goal step.
    GoalFields {
        goal: Option<String>,
        why_now: Option<String>,
        success_criteria: Option<Vec<String>>,
        timeframe: Option<String>,
    }
);

payload_fields!(
    /// Fields of the GROW reality step.
    RealityFields {
        current_state: Option<String>,
        constraints: Option<Vec<String>>,
        resources: Option<Vec<String>>,
        risks: Option<Vec<String>>,
    }
);

payload_fields!(
    /// Fields of the GROW options step.
    OptionsFields {
        options: Option<Vec<OptionItem>>,
    }
);

payload_fields!(
    /// Fields of the GROW will step.
    WillFields {
        actions: Option<Vec<ActionDraft>>,
    }
);

payload_fields!(
    /// Fields of the shared review step. The four reflective questions are
    /// collected turn by turn (phase 1); the synthesis fields are merged in
    /// by the closure operation (phase 2).
    ReviewFields {
        key_takeaway: Option<String>,
        confidence_shift: Option<String>,
        first_step_commitment: Option<String>,
        support_needed: Option<String>,
        summary: Option<String>,
        ai_insights: Option<String>,
        unexplored_options: Option<Vec<String>>,
        identified_risks: Option<Vec<String>>,
        potential_pitfalls: Option<Vec<String>>,
    }
);

payload_fields!(
    /// Fields of the confidence-framework situation step.
    SituationFields {
        challenge: Option<String>,
        impact: Option<String>,
        desired_outcome: Option<String>,
    }
);

payload_fields!(
    /// Fields of the confidence-framework reframe step.
    ReframeFields {
        limiting_belief: Option<String>,
        evidence_against: Option<Vec<String>>,
        empowering_belief: Option<String>,
    }
);

payload_fields!(
    /// Fields of the confidence-framework commitment step.
    CommitmentFields {
        actions: Option<Vec<ActionDraft>>,
    }
);

/// A reflection payload, tagged by the step that produced it.
///
/// The tag doubles as the reflection's step marker; there is no separate
/// string-keyed payload map anywhere in the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum StepPayload {
    Goal(GoalFields),
    Reality(RealityFields),
    Options(OptionsFields),
    Will(WillFields),
    Review(ReviewFields),
    Situation(SituationFields),
    Reframe(ReframeFields),
    Commitment(CommitmentFields),
}

impl StepPayload {
    /// The step this payload belongs to.
    pub fn step(&self) -> StepName {
        match self {
            Self::Goal(_) => StepName::Goal,
            Self::Reality(_) => StepName::Reality,
            Self::Options(_) => StepName::Options,
            Self::Will(_) => StepName::Will,
            Self::Review(_) => StepName::Review,
            Self::Situation(_) => StepName::Situation,
            Self::Reframe(_) => StepName::Reframe,
            Self::Commitment(_) => StepName::Commitment,
        }
    }

    /// Parses a model-produced JSON object into the step's payload variant.
    ///
    /// This is the single source of truth mapping step names to payload
    /// types. Unknown keys in `value` are ignored; a missing or mistyped
    /// known field is an error the caller degrades gracefully from.
    pub fn from_model_value(step: StepName, value: Value) -> Result<Self> {
        let payload = match step {
            StepName::Goal => Self::Goal(serde_json::from_value(value)?),
            StepName::Reality => Self::Reality(serde_json::from_value(value)?),
            StepName::Options => Self::Options(serde_json::from_value(value)?),
            StepName::Will => Self::Will(serde_json::from_value(value)?),
            StepName::Review => Self::Review(serde_json::from_value(value)?),
            StepName::Situation => Self::Situation(serde_json::from_value(value)?),
            StepName::Reframe => Self::Reframe(serde_json::from_value(value)?),
            StepName::Commitment => Self::Commitment(serde_json::from_value(value)?),
        };
        Ok(payload)
    }

    /// Builds a payload carrying only a coach reflection, with every
    /// extractable field empty. Used for system-authored messages and for
    /// the degraded outcome of a rejected or unparseable model turn.
    pub fn reflection_only(step: StepName, text: impl Into<String>) -> Self {
        let coach_reflection = text.into();
        match step {
            StepName::Goal => Self::Goal(GoalFields {
                coach_reflection,
                ..Default::default()
            }),
            StepName::Reality => Self::Reality(RealityFields {
                coach_reflection,
                ..Default::default()
            }),
            StepName::Options => Self::Options(OptionsFields {
                coach_reflection,
                ..Default::default()
            }),
            StepName::Will => Self::Will(WillFields {
                coach_reflection,
                ..Default::default()
            }),
            StepName::Review => Self::Review(ReviewFields {
                coach_reflection,
                ..Default::default()
            }),
            StepName::Situation => Self::Situation(SituationFields {
                coach_reflection,
                ..Default::default()
            }),
            StepName::Reframe => Self::Reframe(ReframeFields {
                coach_reflection,
                ..Default::default()
            }),
            StepName::Commitment => Self::Commitment(CommitmentFields {
                coach_reflection,
                ..Default::default()
            }),
        }
    }

    /// The coach's conversational reply carried by this payload.
    pub fn coach_reflection(&self) -> &str {
        match self {
            Self::Goal(f) => &f.coach_reflection,
            Self::Reality(f) => &f.coach_reflection,
            Self::Options(f) => &f.coach_reflection,
            Self::Will(f) => &f.coach_reflection,
            Self::Review(f) => &f.coach_reflection,
            Self::Situation(f) => &f.coach_reflection,
            Self::Reframe(f) => &f.coach_reflection,
            Self::Commitment(f) => &f.coach_reflection,
        }
    }

    /// Serializes the payload's fields as a JSON map, without the step tag.
    ///
    /// Generic consumers (field aggregation, reporting) inspect fields by
    /// name through this map instead of reaching into variants.
    pub fn field_map(&self) -> Map<String, Value> {
        let value = match self {
            Self::Goal(f) => serde_json::to_value(f),
            Self::Reality(f) => serde_json::to_value(f),
            Self::Options(f) => serde_json::to_value(f),
            Self::Will(f) => serde_json::to_value(f),
            Self::Review(f) => serde_json::to_value(f),
            Self::Situation(f) => serde_json::to_value(f),
            Self::Reframe(f) => serde_json::to_value(f),
            Self::Commitment(f) => serde_json::to_value(f),
        };
        match value {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// The committed action drafts, when this payload's step yields them.
    pub fn actions(&self) -> Option<&[ActionDraft]> {
        match self {
            Self::Will(f) => f.actions.as_deref(),
            Self::Commitment(f) => f.actions.as_deref(),
            _ => None,
        }
    }

    /// The option items, when this is an options payload.
    pub fn options(&self) -> Option<&[OptionItem]> {
        match self {
            Self::Options(f) => f.options.as_deref(),
            _ => None,
        }
    }
}
