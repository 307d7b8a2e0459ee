//! The active configuration and its reload cycle.

use std::ops::Deref;
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use serde::de::DeserializeOwned;
use tracing::{error, info};

use super::builder::{Loader, RegistryBuilder};
use super::project::infer_scalars;
use super::tree::ConfigTree;
use super::value::Value;
use super::ConfigError;

/// Section holding the environment tag and version.
pub(crate) const APPLICATION: &str = "application";
const VERSION_KEY: &str = "version";

pub const DEV: &str = "dev";
pub const STAGING: &str = "staging";
pub const PROD: &str = "prod";

/// One fully loaded configuration tree and the environment it was loaded for.
///
/// Dereferences to [`ConfigTree`] for lookups.
#[derive(Debug)]
pub struct Snapshot {
    tree: ConfigTree,
    environment: String,
}

impl Snapshot {
    pub(crate) fn new(tree: ConfigTree, environment: String) -> Self {
        Self { tree, environment }
    }

    pub fn tree(&self) -> &ConfigTree {
        &self.tree
    }

    /// The environment tag, read from `application.env` at load time.
    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn is_dev(&self) -> bool {
        self.environment == DEV
    }

    pub fn is_staging(&self) -> bool {
        self.environment == STAGING
    }

    pub fn is_prod(&self) -> bool {
        self.environment == PROD
    }

    /// The `application.version` value.
    pub fn version(&self) -> Result<Option<String>, ConfigError> {
        self.tree.get(Some(APPLICATION), VERSION_KEY)
    }

    /// A non-negative number derived from [`version`](Self::version).
    pub fn version_number(&self) -> Result<Option<i32>, ConfigError> {
        Ok(self.version()?.as_deref().map(version_number))
    }

    /// Deserializes the whole tree into `T`.
    ///
    /// Text that reads as a boolean, integer or float is handed to serde as
    /// that type, so a numeric-looking value cannot fill a `String` field.
    pub fn extract<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        let document = infer_scalars(self.tree.to_document()?);
        Ok(serde_json::from_value(document)?)
    }
}

impl Deref for Snapshot {
    type Target = ConfigTree;

    fn deref(&self) -> &ConfigTree {
        &self.tree
    }
}

/// Holder of the active configuration.
///
/// A registry always holds a complete snapshot: it can only be created by a
/// successful load, and [`reload`](Self::reload) swaps in a new snapshot
/// only once it has been fully built. Readers are never blocked; a read
/// racing a reload sees either the old or the new snapshot.
///
/// Handles obtained from a snapshot keep pointing at that snapshot's tree
/// after a reload.
#[derive(Debug)]
pub struct Registry {
    loader: Loader,
    current: ArcSwap<Snapshot>,
    reload_lock: Mutex<()>,
}

impl Registry {
    /// Creates a builder. See [`RegistryBuilder`].
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub(crate) fn bootstrap(loader: Loader) -> Result<Self, ConfigError> {
        let snapshot = loader.load()?;
        info!(environment = %snapshot.environment, "Configuration loaded");
        Ok(Self {
            loader,
            current: ArcSwap::from_pointee(snapshot),
            reload_lock: Mutex::new(()),
        })
    }

    /// Reloads every document and replaces the active snapshot.
    ///
    /// Concurrent reloads run one at a time. On failure the active snapshot
    /// is kept.
    pub fn reload(&self) -> Result<(), ConfigError> {
        let _guard = self.reload_lock.lock().unwrap_or_else(PoisonError::into_inner);
        match self.loader.load() {
            Ok(next) => {
                info!(environment = %next.environment, "Configuration reloaded");
                self.current.store(Arc::new(next));
                Ok(())
            }
            Err(e) => {
                error!("Failed to reload configuration: {}. Keeping current configuration.", e);
                Err(e)
            }
        }
    }

    /// The active snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    pub fn environment(&self) -> String {
        self.current.load().environment.clone()
    }

    pub fn is_dev(&self) -> bool {
        self.current.load().is_dev()
    }

    pub fn is_staging(&self) -> bool {
        self.current.load().is_staging()
    }

    pub fn is_prod(&self) -> bool {
        self.current.load().is_prod()
    }

    pub fn version(&self) -> Result<Option<String>, ConfigError> {
        self.snapshot().version()
    }

    pub fn version_number(&self) -> Result<Option<i32>, ConfigError> {
        self.snapshot().version_number()
    }

    /// Names of the top-level sections.
    pub fn keys(&self) -> Vec<String> {
        self.snapshot().keys()
    }

    pub fn get_value(&self, section: Option<&str>, key: &str) -> Result<Option<Value>, ConfigError> {
        self.snapshot().get_value(section, key)
    }

    pub fn get(&self, section: Option<&str>, key: &str) -> Result<Option<String>, ConfigError> {
        self.snapshot().get(section, key)
    }

    pub fn get_int(&self, section: Option<&str>, key: &str) -> Result<Option<i32>, ConfigError> {
        self.snapshot().get_int(section, key)
    }

    pub fn get_long(&self, section: Option<&str>, key: &str) -> Result<Option<i64>, ConfigError> {
        self.snapshot().get_long(section, key)
    }

    pub fn get_bool(&self, section: Option<&str>, key: &str) -> Result<Option<bool>, ConfigError> {
        self.snapshot().get_bool(section, key)
    }

    pub fn get_array(
        &self,
        section: Option<&str>,
        key: &str,
    ) -> Result<Option<Vec<String>>, ConfigError> {
        self.snapshot().get_array(section, key)
    }

    pub fn get_sub_section(
        &self,
        section: Option<&str>,
        key: &str,
    ) -> Result<Option<ConfigTree>, ConfigError> {
        self.snapshot().get_sub_section(section, key)
    }

    /// Stores a value in the active snapshot. The section must exist.
    pub fn put(&self, section: Option<&str>, key: &str, value: Value) -> Result<(), ConfigError> {
        self.snapshot().put(section, key, value)
    }

    /// Projects the active snapshot into a JSON document.
    pub fn to_document(&self) -> Result<serde_json::Value, ConfigError> {
        self.snapshot().to_document()
    }

    /// Deserializes the active snapshot into `T`. See [`Snapshot::extract`].
    pub fn extract<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        self.snapshot().extract()
    }
}

/// Folds the UTF-16 code units of `version` into a 31-bit hash.
///
/// The result is stable across runs and platforms.
pub fn version_number(version: &str) -> i32 {
    let hash = version
        .encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)));
    if hash >= 0 {
        hash
    } else {
        (hash + i32::MAX) & i32::MAX
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DirSource, MemorySource};
    use serde::Deserialize;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const APP: &str = "application:\n\t- name: demo\n\t- env: dev\n\t- version: 1.0\n\
                       server:\n\t- host: localhost\n\t- port: 8080\n\t- debug: true\n";

    fn memory_registry() -> Registry {
        let source = MemorySource::new()
            .with_document("app", APP)
            .with_document("model", "model:\n\t- tables: users, posts\n")
            .with_document("env.dev", "server:\n\t- host: dev.local\n\t- port: 9090\n\t- debug: true\n");
        Registry::builder().with_source(source).build().unwrap()
    }

    fn write_documents(dir: &Path, env_doc: &str) {
        fs::write(dir.join("app.conf"), APP).unwrap();
        fs::write(dir.join("model.conf"), "model:\n\t- tables: users\n").unwrap();
        fs::write(dir.join("env.dev.conf"), env_doc).unwrap();
    }

    #[test]
    fn test_bootstrap_and_lookup() {
        let registry = memory_registry();

        assert_eq!(registry.environment(), "dev");
        assert!(registry.is_dev());
        assert!(!registry.is_staging());
        assert!(!registry.is_prod());
        assert_eq!(registry.get(Some("server"), "host").unwrap().as_deref(), Some("dev.local"));
        assert_eq!(registry.get_int(Some("server"), "port").unwrap(), Some(9090));
        assert_eq!(registry.get_bool(Some("server"), "debug").unwrap(), Some(true));
        assert_eq!(
            registry.get_array(Some("model"), "tables").unwrap(),
            Some(vec!["users".to_string(), "posts".to_string()])
        );

        let mut keys = registry.keys();
        keys.sort();
        assert_eq!(keys, vec!["application", "model", "server"]);
    }

    #[test]
    fn test_put_requires_existing_section() {
        let registry = memory_registry();

        registry.put(Some("server"), "computed", Value::Long(7)).unwrap();
        assert_eq!(registry.get_long(Some("server"), "computed").unwrap(), Some(7));
        assert!(matches!(
            registry.put(Some("nope"), "k", Value::from("v")),
            Err(ConfigError::SectionNotFound(_))
        ));
    }

    #[test]
    fn test_version() {
        let registry = memory_registry();

        assert_eq!(registry.version().unwrap().as_deref(), Some("1.0"));
        assert_eq!(registry.version_number().unwrap(), Some(48563));
    }

    #[test]
    fn test_version_number_is_non_negative() {
        assert_eq!(version_number(""), 0);
        assert_eq!(version_number("1.0"), 48563);
        // Hashes to i32::MIN
        assert_eq!(version_number("polygenelubricants"), i32::MAX);
        assert!(version_number("2.14.0-beta.3+build.20240611") >= 0);
    }

    #[test]
    fn test_extract() {
        #[derive(Debug, Deserialize)]
        struct AppConfig {
            server: Server,
            model: Model,
        }

        #[derive(Debug, Deserialize)]
        struct Server {
            host: String,
            port: u16,
            debug: bool,
        }

        #[derive(Debug, Deserialize)]
        struct Model {
            tables: String,
        }

        let config: AppConfig = memory_registry().extract().unwrap();

        assert_eq!(config.server.host, "dev.local");
        assert_eq!(config.server.port, 9090);
        assert!(config.server.debug);
        assert_eq!(config.model.tables, "users, posts");
    }

    #[test]
    fn test_extract_type_mismatch() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Bad {
            server: BadServer,
        }

        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct BadServer {
            host: u16,
        }

        let result = memory_registry().extract::<Bad>();
        assert!(matches!(result, Err(ConfigError::Deserialize(_))));
    }

    #[test]
    fn test_reload_picks_up_changes() {
        let dir = TempDir::new().unwrap();
        write_documents(dir.path(), "server:\n\t- port: 1\n");
        let registry = Registry::builder().with_dir(dir.path()).build().unwrap();
        assert_eq!(registry.get_int(Some("server"), "port").unwrap(), Some(1));

        write_documents(dir.path(), "server:\n\t- port: 2\n");
        registry.reload().unwrap();

        assert_eq!(registry.get_int(Some("server"), "port").unwrap(), Some(2));
    }

    #[test]
    fn test_handles_keep_old_tree_after_reload() {
        let dir = TempDir::new().unwrap();
        write_documents(dir.path(), "server:\n\t- port: 1\n");
        let registry = Registry::builder().with_dir(dir.path()).build().unwrap();

        let old_snapshot = registry.snapshot();
        let old_server = registry.get_sub_section(None, "server").unwrap().unwrap();

        write_documents(dir.path(), "server:\n\t- port: 2\n");
        registry.reload().unwrap();
        registry.put(Some("server"), "added", Value::from("new")).unwrap();

        assert_eq!(old_server.get(None, "port").unwrap().as_deref(), Some("1"));
        assert_eq!(old_server.get(None, "added").unwrap(), None);
        assert_eq!(old_snapshot.get(Some("server"), "port").unwrap().as_deref(), Some("1"));

        // Nothing cached on the old tree leaks into the new one
        old_server.put(None, "stale", Value::from("x")).unwrap();
        assert_eq!(registry.get(Some("server"), "stale").unwrap(), None);
    }

    #[test]
    fn test_reload_frees_previous_tree() {
        let dir = TempDir::new().unwrap();
        write_documents(dir.path(), "server:\n\t- port: 1\n\t- tls:\n\t\t- on: true\n");
        let registry = Registry::builder().with_dir(dir.path()).build().unwrap();

        let old_root = registry.snapshot().root().downgrade();
        let tls = registry.get_sub_section(Some("server"), "tls").unwrap().unwrap();
        assert_eq!(tls.get_bool(None, "on").unwrap(), Some(true));
        drop(tls);

        registry.reload().unwrap();

        assert!(old_root.upgrade().is_none());
        assert_eq!(registry.get_int(Some("server"), "port").unwrap(), Some(1));
    }

    #[test]
    fn test_failed_reload_keeps_snapshot() {
        let dir = TempDir::new().unwrap();
        write_documents(dir.path(), "server:\n\t- port: 1\n");
        let registry = Registry::builder().with_dir(dir.path()).build().unwrap();

        fs::remove_file(dir.path().join("env.dev.conf")).unwrap();
        let result = registry.reload();

        assert!(matches!(result, Err(ConfigError::ResourceNotFound(_))));
        assert_eq!(registry.get_int(Some("server"), "port").unwrap(), Some(1));
    }

    #[test]
    fn test_bootstrap_missing_document() {
        let dir = TempDir::new().unwrap();
        let result = Registry::builder().with_source(DirSource::new(dir.path())).build();

        assert!(matches!(result, Err(ConfigError::ResourceNotFound(ref p)) if p.ends_with("app.conf")));
    }

    #[test]
    fn test_readers_see_whole_snapshots_during_reload() {
        let dir = TempDir::new().unwrap();
        write_documents(dir.path(), "server:\n\t- a: 1\n\t- b: 1\n");
        let registry = Registry::builder().with_dir(dir.path()).build().unwrap();
        write_documents(dir.path(), "server:\n\t- a: 2\n\t- b: 2\n");

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..200 {
                        let snapshot = registry.snapshot();
                        let a = snapshot.get(Some("server"), "a").unwrap();
                        let b = snapshot.get(Some("server"), "b").unwrap();
                        assert_eq!(a, b);
                    }
                });
            }
            scope.spawn(|| {
                for _ in 0..20 {
                    registry.reload().unwrap();
                }
            });
        });

        assert_eq!(registry.get(Some("server"), "a").unwrap().as_deref(), Some("2"));
    }
}
