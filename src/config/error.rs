use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("config document not found: {0}")]
    ResourceNotFound(String),

    #[error("failed to read config document '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("'application.env' is not set; cannot select the environment document")]
    MissingEnvironment,

    #[error("section not found: {0}")]
    SectionNotFound(String),

    #[error("cannot convert '{value}' at '{key}' to {target}")]
    TypeCoercion {
        key: String,
        target: &'static str,
        value: String,
    },

    #[error("value at '{key}' is {found}, expected {expected}")]
    IncompatibleValue {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("referenced value not found: {0}")]
    MissingReference(String),

    #[error("invalid reference path (only 'section.key' is supported): {0}")]
    InvalidReferencePath(String),

    #[error("cannot reference non-scalar value: {0}")]
    NonScalarReference(String),

    #[error("unclosed reference (missing '}}') in '{0}'")]
    UnclosedReference(String),

    #[error("circular reference detected while resolving '{0}'")]
    CircularReference(String),

    #[error("failed to project configuration: {0}")]
    Projection(String),

    #[error("failed to deserialize config: {0}")]
    Deserialize(#[from] serde_json::Error),
}
