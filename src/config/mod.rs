//! Configuration loading, lookup and reload.

mod builder;
mod env;
mod error;
mod file;
mod parser;
mod project;
mod registry;
mod resolve;
mod source;
mod tree;
mod value;

pub use builder::RegistryBuilder;
pub use env::EnvOverrides;
pub use error::ConfigError;
pub use file::DirSource;
pub use parser::parse;
pub use project::{infer_scalars, project};
pub use registry::{version_number, Registry, Snapshot, DEV, PROD, STAGING};
pub use resolve::resolve;
pub use source::{load_document, merge_top_level, DocumentSource, MemorySource};
pub use tree::ConfigTree;
pub use value::{Entries, Section, Value};
