use std::path::Path;
use std::sync::Arc;

use tracing::error;

use super::env::EnvOverrides;
use super::file::DirSource;
use super::registry::{Registry, Snapshot, APPLICATION};
use super::source::{load_document, merge_top_level, DocumentSource};
use super::tree::ConfigTree;
use super::value::Section;
use super::ConfigError;

const ENV_KEY: &str = "env";
const ENV_PLACEHOLDER: &str = "${env}";

/// Builder for a [`Registry`].
///
/// Three documents are loaded, in order:
///
/// 1. the application document (`app`),
/// 2. the model document (`model`),
/// 3. the environment document (`env.${env}`), where `${env}` is replaced by
///    the value of `application.env` from the first two.
///
/// A top-level section in a later document replaces the same-named section
/// from an earlier one entirely.
///
/// ## Example
///
/// ```no_run
/// use dragon_cfg::Registry;
///
/// // Reads config/app.conf, config/model.conf, then config/env.<env>.conf
/// let registry = Registry::builder()
///     .with_dir("config")
///     .with_env("MYAPP", "__")
///     .build()?;
///
/// let port = registry.get_int(Some("server"), "port")?.unwrap_or(8080);
/// if registry.is_dev() {
///     println!("listening on {port}");
/// }
/// # Ok::<(), dragon_cfg::ConfigError>(())
/// ```
#[derive(Debug, Default)]
#[must_use = "builders do nothing until .build() is called"]
pub struct RegistryBuilder {
    loader: Loader,
}

impl RegistryBuilder {
    /// Reads documents from `<dir>/<name>.conf`. Defaults to `config`.
    pub fn with_dir(self, dir: impl AsRef<Path>) -> Self {
        self.with_source(DirSource::new(dir))
    }

    /// Reads documents from a custom source.
    pub fn with_source(mut self, source: impl DocumentSource + 'static) -> Self {
        self.loader.source = Arc::new(source);
        self
    }

    /// Names the application document. Defaults to `app`.
    pub fn with_app_document(mut self, name: impl Into<String>) -> Self {
        self.loader.app_document = name.into();
        self
    }

    /// Names the model document. Defaults to `model`.
    pub fn with_model_document(mut self, name: impl Into<String>) -> Self {
        self.loader.model_document = name.into();
        self
    }

    /// Names the environment document. `${env}` in `template` is replaced by
    /// the environment tag. Defaults to `env.${env}`.
    pub fn with_env_document(mut self, template: impl Into<String>) -> Self {
        self.loader.env_document = template.into();
        self
    }

    /// Overrides entries from environment variables with the given prefix.
    ///
    /// With prefix `MYAPP` and separator `__`, `MYAPP__DATABASE__HOST=db`
    /// sets `database.host`. Overrides are applied before the environment
    /// tag is read and again after the environment document, so they take
    /// precedence over every document.
    pub fn with_env(mut self, prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        self.loader.overrides = Some(EnvOverrides::new(prefix, separator));
        self
    }

    /// Loads all documents and builds the registry.
    pub fn build(self) -> Result<Registry, ConfigError> {
        Registry::bootstrap(self.loader)
    }
}

/// Loads a complete configuration tree from its documents.
#[derive(Debug, Clone)]
pub(crate) struct Loader {
    source: Arc<dyn DocumentSource>,
    app_document: String,
    model_document: String,
    env_document: String,
    overrides: Option<EnvOverrides>,
}

impl Default for Loader {
    fn default() -> Self {
        Self {
            source: Arc::new(DirSource::default()),
            app_document: "app".to_string(),
            model_document: "model".to_string(),
            env_document: format!("env.{ENV_PLACEHOLDER}"),
            overrides: None,
        }
    }
}

impl Loader {
    /// Builds a fresh snapshot. Nothing is shared with earlier snapshots.
    pub(crate) fn load(&self) -> Result<Snapshot, ConfigError> {
        let root = Section::new();
        self.merge(&root, &self.app_document)?;
        self.merge(&root, &self.model_document)?;
        self.apply_overrides(&root);

        let tree = ConfigTree::new(root);
        let environment = match tree.get(Some(APPLICATION), ENV_KEY) {
            Ok(Some(environment)) => environment,
            Ok(None) | Err(ConfigError::SectionNotFound(_)) => {
                return Err(ConfigError::MissingEnvironment)
            }
            Err(e) => return Err(e),
        };

        let env_document = self.env_document.replace(ENV_PLACEHOLDER, &environment);
        self.merge(tree.root(), &env_document)?;
        self.apply_overrides(tree.root());

        Ok(Snapshot::new(tree, environment))
    }

    fn merge(&self, root: &Section, name: &str) -> Result<(), ConfigError> {
        let document = load_document(self.source.as_ref(), name).inspect_err(|e| {
            error!(document = name, error = %e, "Failed to load config document");
        })?;
        merge_top_level(root, document);
        Ok(())
    }

    fn apply_overrides(&self, root: &Section) {
        if let Some(overrides) = &self.overrides {
            overrides.apply(root);
        }
    }
}
