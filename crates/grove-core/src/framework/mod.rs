//! Framework domain module.
//!
//! - `model`: framework and step domain models (`Framework`, `Step`,
//!   `FrameworkId`, `StepName`)
//! - `schema`: declarative field schemas and constraint stripping
//! - `catalog`: built-in framework definitions and lookup

mod catalog;
mod model;
mod schema;

pub use catalog::FrameworkCatalog;
pub use model::{Framework, FrameworkId, Step, StepName};
pub use schema::{FieldKind, FieldSpec, StepSchema, strip_constraints};
