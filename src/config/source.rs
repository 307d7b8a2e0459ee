use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use super::parser::parse;
use super::value::Section;
use super::ConfigError;

/// Where configuration documents are read from.
///
/// Documents are addressed by name (`app`, `model`, `env.dev`); the source
/// decides how a name maps to storage.
pub trait DocumentSource: Send + Sync + fmt::Debug {
    /// Returns the raw text of the named document.
    fn read(&self, name: &str) -> Result<String, ConfigError>;
}

/// A set of named documents held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    documents: HashMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(name, text);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.documents.insert(name.into(), text.into());
    }
}

impl DocumentSource for MemorySource {
    fn read(&self, name: &str) -> Result<String, ConfigError> {
        self.documents
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::ResourceNotFound(name.to_string()))
    }
}

/// Reads and parses the named document.
pub fn load_document(source: &dyn DocumentSource, name: &str) -> Result<Section, ConfigError> {
    let text = source.read(name)?;
    let document = parse(&text);
    debug!(document = name, sections = document.len(), "Parsed config document");
    Ok(document)
}

/// Moves each top-level section of `document` into `root`.
///
/// A section already present in `root` under the same name is replaced
/// whole; sections are not merged key by key.
pub fn merge_top_level(root: &Section, document: Section) {
    for (key, value) in document.entries() {
        root.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Value;

    #[test]
    fn test_memory_source_missing_document() {
        let source = MemorySource::new().with_document("app", "a:\n- k: v\n");

        assert!(source.read("app").is_ok());
        assert!(matches!(
            source.read("model"),
            Err(ConfigError::ResourceNotFound(ref n)) if n == "model"
        ));
    }

    #[test]
    fn test_later_document_replaces_section() {
        let source = MemorySource::new()
            .with_document("app", "db:\n- host: a\n- port: 1\nweb:\n- port: 80\n")
            .with_document("env.prod", "db:\n- host: b\n");

        let root = Section::new();
        merge_top_level(&root, load_document(&source, "app").unwrap());
        merge_top_level(&root, load_document(&source, "env.prod").unwrap());

        let db = root.get("db").and_then(|v| v.as_section()).unwrap();
        assert_eq!(db.get("host"), Some(Value::from("b")));
        assert_eq!(db.get("port"), None);
        assert!(root.contains_key("web"));
    }
}
