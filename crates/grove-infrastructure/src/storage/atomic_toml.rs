//! Atomic TOML file operations.
//!
//! A thin layer for safe access to TOML documents on disk. Updates are
//! all-or-nothing via a temporary file plus atomic rename, with an explicit
//! fsync before the rename so a crash never leaves a torn document behind.

use serde::{Serialize, de::DeserializeOwned};
use std::fs::{self, File};
use std::io::Write as IoWrite;
use std::marker::PhantomData;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during atomic TOML operations.
#[derive(Debug, Error)]
pub enum AtomicTomlError {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parse error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// TOML serialization error.
    #[error("TOML serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// A handle to one TOML document written atomically.
pub struct AtomicTomlFile<T> {
    path: PathBuf,
    _phantom: PhantomData<T>,
}

impl<T> AtomicTomlFile<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Creates a new handle for the document at `path`.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _phantom: PhantomData,
        }
    }

    /// Loads and deserializes the document.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(T))`: successfully loaded and deserialized
    /// - `Ok(None)`: file doesn't exist or is empty
    /// - `Err`: failed to read or parse the file
    pub fn load(&self) -> Result<Option<T>, AtomicTomlError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(None);
        }
        let data: T = toml::from_str(&content)?;
        Ok(Some(data))
    }

    /// Serializes and saves the document atomically.
    ///
    /// Writes to `<path>.tmp`, fsyncs, then renames over the target.
    pub fn save(&self, data: &T) -> Result<(), AtomicTomlError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(data)?;

        let tmp_path = self.path.with_extension("toml.tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            tmp.write_all(content.as_bytes())?;
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        name: String,
        count: u32,
    }

    #[test]
    fn missing_and_empty_files_load_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let file: AtomicTomlFile<Doc> = AtomicTomlFile::new(dir.path().join("missing.toml"));
        assert!(file.load().unwrap().is_none());

        let empty_path = dir.path().join("empty.toml");
        fs::write(&empty_path, "  \n").unwrap();
        let empty: AtomicTomlFile<Doc> = AtomicTomlFile::new(empty_path);
        assert!(empty.load().unwrap().is_none());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let file: AtomicTomlFile<Doc> = AtomicTomlFile::new(dir.path().join("doc.toml"));
        let doc = Doc {
            name: "grove".into(),
            count: 3,
        };
        file.save(&doc).unwrap();
        assert_eq!(file.load().unwrap().unwrap(), doc);
        // No stray temp file remains after a successful save.
        assert!(!dir.path().join("doc.toml.tmp").exists());
    }

    #[test]
    fn corrupt_documents_surface_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "not [valid toml").unwrap();
        let file: AtomicTomlFile<Doc> = AtomicTomlFile::new(path);
        assert!(matches!(file.load(), Err(AtomicTomlError::Parse(_))));
    }
}
