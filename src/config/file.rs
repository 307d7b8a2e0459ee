//! File-based document source.

use std::path::{Path, PathBuf};

use super::source::DocumentSource;
use super::ConfigError;

const EXTENSION: &str = "conf";

/// A document source that reads `<dir>/<name>.conf` files.
///
/// Every document is required: a missing file is an error.
#[derive(Debug, Clone)]
pub struct DirSource {
    dir: PathBuf,
}

impl DirSource {
    /// Creates a source rooted at `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Path of the file backing the named document.
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{EXTENSION}"))
    }
}

impl Default for DirSource {
    fn default() -> Self {
        Self::new("config")
    }
}

impl DocumentSource for DirSource {
    fn read(&self, name: &str) -> Result<String, ConfigError> {
        let path = self.path_of(name);
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ConfigError::ResourceNotFound(path.display().to_string()))
            }
            Err(e) => Err(ConfigError::ReadError { path, source: e }),
        }
    }
}
