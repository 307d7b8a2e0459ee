pub mod config;

pub use config::{ConfigError, ConfigTree, Registry, Section, Value};
