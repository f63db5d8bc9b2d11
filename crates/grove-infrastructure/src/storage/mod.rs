//! Low-level storage primitives.

mod atomic_toml;

pub use atomic_toml::{AtomicTomlError, AtomicTomlFile};
