//! GROVE core: domain models and decision logic for AI-assisted coaching
//! sessions.
//!
//! The engine walks a user through a structured coaching framework, extracts
//! structured facts from free-text turns through an external language model,
//! decides when a step is done enough to advance, enforces safety rules, and
//! synthesizes a report from the accumulated reflections.
//!
//! This crate holds everything with real invariants: the framework catalog,
//! field aggregation, the safety gate, the completion evaluator, the report
//! synthesizer, and the traits behind which storage and the language model
//! live. Orchestration sits in `grove-application`; collaborator
//! implementations in `grove-interaction` and `grove-infrastructure`.

pub mod action;
pub mod aggregate;
pub mod completion;
pub mod error;
pub mod framework;
pub mod llm;
pub mod reflection;
pub mod report;
pub mod safety;
pub mod session;

// Re-export common error type
pub use error::{GroveError, Result};
