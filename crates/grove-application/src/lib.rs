//! GROVE use cases: per-turn orchestration, the generation pipeline, review
//! closure, and report generation.
//!
//! Everything here composes the domain logic from `grove-core` with the
//! collaborators behind its traits: storage repositories
//! (`grove-infrastructure`) and language models (`grove-interaction`).

pub mod pipeline;
pub mod report_usecase;
pub mod synthesis;
pub mod turn;

#[cfg(test)]
mod test_support;

pub use pipeline::{DegradeReason, GenerationContext, GenerationPipeline, GenerationResult};
pub use report_usecase::ReportUseCase;
pub use synthesis::{ReviewSynthesisUseCase, SynthesisOutcome};
pub use turn::{MAX_USER_INPUT_CHARS, TurnOutcome, TurnUseCase};
