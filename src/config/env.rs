//! Environment-variable overrides.

use tracing::debug;

use super::value::{Section, Value};

/// Maps `PREFIX<sep>SECTION<sep>KEY=value` variables onto tree entries.
///
/// Path segments are lower-cased. A variable naming fewer than two segments
/// has no section to live in and is ignored. Values are stored as text.
#[derive(Debug, Clone)]
pub struct EnvOverrides {
    prefix: String,
    separator: String,
}

impl EnvOverrides {
    pub fn new(prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        let separator = separator.into();
        assert!(!separator.is_empty(), "separator must not be empty");
        Self {
            prefix: prefix.into(),
            separator,
        }
    }

    /// Applies matching variables from the process environment.
    pub fn apply(&self, root: &Section) -> usize {
        self.apply_vars(root, std::env::vars())
    }

    /// Applies matching variables from `vars`, returning how many were applied.
    pub fn apply_vars(&self, root: &Section, vars: impl IntoIterator<Item = (String, String)>) -> usize {
        let prefix_with_sep = format!("{}{}", self.prefix, self.separator);
        let mut applied = 0;

        for (key, value) in vars {
            let Some(path_str) = key.strip_prefix(&prefix_with_sep) else {
                continue;
            };
            let path: Vec<String> = path_str
                .split(&self.separator)
                .map(|s| s.to_lowercase())
                .collect();
            if path.len() < 2 || path.iter().any(|s| s.is_empty()) {
                continue;
            }

            debug!(variable = %key, path = %path.join("."), "Applying config override");
            set_at_path(root, &path, value);
            applied += 1;
        }

        applied
    }
}

/// Stores `value` as text at `path`, creating sections along the way.
///
/// A non-section value sitting where a section is needed is replaced.
fn set_at_path(section: &Section, path: &[String], value: String) {
    let Some((first, rest)) = path.split_first() else {
        return;
    };

    if rest.is_empty() {
        section.insert(first.clone(), Value::Text(value));
        return;
    }

    let nested = match section.get(first).and_then(|v| v.as_section()) {
        Some(nested) => nested,
        None => {
            let nested = Section::new();
            section.insert(first.clone(), Value::Section(nested.clone()));
            nested
        }
    };
    set_at_path(&nested, rest, value);
}
