//! Framework and step domain models.
//!
//! A framework is an ordered list of steps walked front to back by the turn
//! orchestrator. Frameworks are immutable once constructed; the catalog owns
//! them for the lifetime of the process.

use super::schema::StepSchema;
use crate::error::{GroveError, Result};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Identifier of a registered coaching framework.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FrameworkId {
    /// Goal-Reality-Options-Will, closed by a review step.
    Grow,
    /// Confidence-transformation framework: situation, reframe, commitment.
    Confidence,
}

/// Name of a framework step.
///
/// Step names are unique within a framework; `Review` is shared by both
/// built-in frameworks as their terminal step.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    Goal,
    Reality,
    Options,
    Will,
    Review,
    Situation,
    Reframe,
    Commitment,
}

/// One step of a coaching framework.
#[derive(Debug, Clone)]
pub struct Step {
    /// The step's name, unique within its framework.
    pub name: StepName,
    /// What the coach is trying to accomplish in this step.
    pub objective: &'static str,
    /// Declarative description of the payload fields the step may extract.
    pub schema: StepSchema,
    /// Fields needed to consider the step substantively addressed.
    ///
    /// Advancement uses its own, looser, per-step criteria; see the
    /// completion evaluator.
    pub required_fields: Vec<&'static str>,
    /// Human-readable guidance injected into the primary prompt.
    pub guidance: &'static str,
    /// Fixed message written when the step is left, if any.
    pub transition: Option<&'static str>,
    /// Fixed message written when the step is entered, if any.
    pub opener: Option<&'static str>,
}

impl Step {
    /// Renders the step's schema with all validation constraints intact.
    pub fn schema_value(&self) -> serde_json::Value {
        self.schema.to_value(&self.required_fields)
    }

    /// Renders the step's schema with numeric/length constraints stripped.
    pub fn stripped_schema_value(&self) -> serde_json::Value {
        super::schema::strip_constraints(&self.schema_value())
    }
}

/// An ordered, immutable coaching framework.
#[derive(Debug, Clone)]
pub struct Framework {
    pub id: FrameworkId,
    steps: Vec<Step>,
}

impl Framework {
    /// Creates a framework from its ordered steps.
    ///
    /// Step names must be unique; duplicates are a programming error in the
    /// catalog and rejected here.
    pub fn new(id: FrameworkId, steps: Vec<Step>) -> Result<Self> {
        if steps.is_empty() {
            return Err(GroveError::internal(format!(
                "framework '{id}' has no steps"
            )));
        }
        for (i, step) in steps.iter().enumerate() {
            if steps[..i].iter().any(|s| s.name == step.name) {
                return Err(GroveError::internal(format!(
                    "duplicate step '{}' in framework '{}'",
                    step.name, id
                )));
            }
        }
        Ok(Self { id, steps })
    }

    /// The steps in walk order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Looks up a step by name.
    pub fn step(&self, name: StepName) -> Result<&Step> {
        self.steps
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| GroveError::UnknownStep {
                framework: self.id.to_string(),
                step: name.to_string(),
            })
    }

    /// The step entered when a session starts.
    pub fn first_step(&self) -> &Step {
        &self.steps[0]
    }

    /// The step that follows `name`, or `None` if `name` is terminal.
    pub fn step_after(&self, name: StepName) -> Option<&Step> {
        let index = self.steps.iter().position(|s| s.name == name)?;
        self.steps.get(index + 1)
    }

    /// Whether `name` is the framework's terminal step.
    pub fn is_terminal(&self, name: StepName) -> bool {
        self.steps.last().map(|s| s.name) == Some(name)
    }
}
