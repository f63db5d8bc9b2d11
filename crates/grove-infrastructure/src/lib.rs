//! Repository implementations for GROVE.
//!
//! Two families: in-memory stores for tests and embedded use, and a
//! TOML-file store persisting each session (with its reflection history) as
//! one atomically written document.

pub mod memory;
pub mod storage;
pub mod toml_session_repository;

pub use memory::{
    InMemoryActionRepository, InMemoryIncidentRepository, InMemoryReflectionRepository,
    InMemorySessionRepository,
};
pub use toml_session_repository::TomlSessionRepository;
