//! Reflection domain module.
//!
//! - `model`: the append-only `Reflection` record
//! - `payload`: typed per-step payloads (`StepPayload` and field structs)
//! - `repository`: persistence trait implemented by the infrastructure crate

mod model;
mod payload;
mod repository;

pub use model::Reflection;
pub use payload::{
    ActionDraft, CommitmentFields, GoalFields, OptionItem, OptionsFields, RealityFields,
    ReframeFields, ReviewFields, SituationFields, StepPayload, WillFields,
};
pub use repository::ReflectionRepository;
