//! Typed, memoizing access to a configuration tree.

use std::fmt;

use super::parser::parse;
use super::project::project;
use super::resolve::resolve;
use super::value::{Section, Value};
use super::ConfigError;

/// A handle onto a configuration tree, or onto one of its sub-sections.
///
/// Lookups take an optional section name: `None` reads a key directly from
/// this handle's own section, `Some(name)` reads from the named child section.
/// Text values have their `${...}` references resolved on every read.
///
/// The typed getters convert a value on first use and write the converted
/// value back into the tree, so later reads skip the conversion. Reading the
/// same key through a different getter converts again from the cached value
/// and replaces it; the last conversion wins. Concurrent first reads of one
/// key may each convert and write back, with the same last-writer-wins result.
///
/// ## Example
///
/// ```
/// use dragon_cfg::ConfigTree;
///
/// let tree = ConfigTree::parse("server:\n- port: 8080\n- url: http://localhost:${port}\n");
///
/// assert_eq!(tree.get_int(Some("server"), "port")?, Some(8080));
/// assert_eq!(
///     tree.get(Some("server"), "url")?.as_deref(),
///     Some("http://localhost:8080")
/// );
/// # Ok::<(), dragon_cfg::ConfigError>(())
/// ```
#[derive(Clone)]
pub struct ConfigTree {
    values: Section,
    root: Section,
}

impl ConfigTree {
    /// Wraps a root section.
    pub fn new(root: Section) -> Self {
        Self {
            values: root.clone(),
            root,
        }
    }

    /// Parses a single document into a tree.
    pub fn parse(text: &str) -> Self {
        Self::new(parse(text))
    }

    /// The section this handle reads from.
    pub fn section(&self) -> &Section {
        &self.values
    }

    /// The top-level section that `${section.key}` references resolve against.
    pub fn root(&self) -> &Section {
        &self.root
    }

    pub fn keys(&self) -> Vec<String> {
        self.values.keys()
    }

    /// Returns the value at `(section, key)`, with references resolved if it is text.
    ///
    /// Returns `Ok(None)` if the key is absent.
    pub fn get_value(&self, section: Option<&str>, key: &str) -> Result<Option<Value>, ConfigError> {
        let scope = self.scope(section)?;
        match scope.get(key) {
            None => Ok(None),
            Some(Value::Text(raw)) => Ok(Some(Value::Text(resolve(&raw, &scope, &self.root)?))),
            Some(value) => Ok(Some(value)),
        }
    }

    /// Stores `value` at `(section, key)`.
    ///
    /// The section must already exist.
    pub fn put(&self, section: Option<&str>, key: &str, value: Value) -> Result<(), ConfigError> {
        self.scope(section)?.insert(key, value);
        Ok(())
    }

    /// Returns the value as text.
    ///
    /// Text is not written back, so its references are resolved again on
    /// each read. Any other scalar is cached in its text form.
    pub fn get(&self, section: Option<&str>, key: &str) -> Result<Option<String>, ConfigError> {
        self.coerce_and_cache(
            section,
            key,
            |value| match value {
                Value::Text(s) => Some(s.clone()),
                _ => None,
            },
            |value| {
                let text = render(key, value, "text")?;
                Ok((text.clone(), Value::Text(text)))
            },
        )
    }

    /// Returns the value as a 32-bit integer.
    pub fn get_int(&self, section: Option<&str>, key: &str) -> Result<Option<i32>, ConfigError> {
        self.coerce_and_cache(
            section,
            key,
            |value| match value {
                Value::Int(n) => Some(*n),
                _ => None,
            },
            |value| {
                let n = parse_number(key, value, "int")?;
                Ok((n, Value::Int(n)))
            },
        )
    }

    /// Returns the value as a 64-bit integer.
    pub fn get_long(&self, section: Option<&str>, key: &str) -> Result<Option<i64>, ConfigError> {
        self.coerce_and_cache(
            section,
            key,
            |value| match value {
                Value::Long(n) => Some(*n),
                _ => None,
            },
            |value| {
                let n = parse_number(key, value, "long")?;
                Ok((n, Value::Long(n)))
            },
        )
    }

    /// Returns the value as a boolean.
    ///
    /// `true` in any letter case is `true`; every other text is `false`.
    pub fn get_bool(&self, section: Option<&str>, key: &str) -> Result<Option<bool>, ConfigError> {
        self.coerce_and_cache(
            section,
            key,
            |value| match value {
                Value::Bool(b) => Some(*b),
                _ => None,
            },
            |value| {
                let b = render(key, value, "bool")?.eq_ignore_ascii_case("true");
                Ok((b, Value::Bool(b)))
            },
        )
    }

    /// Returns the value split on commas.
    ///
    /// One whitespace character on either side of each comma is dropped.
    /// Empty items are kept.
    pub fn get_array(
        &self,
        section: Option<&str>,
        key: &str,
    ) -> Result<Option<Vec<String>>, ConfigError> {
        self.coerce_and_cache(
            section,
            key,
            |value| match value {
                Value::Array(items) => Some(items.clone()),
                _ => None,
            },
            |value| {
                let items = split_list(&render(key, value, "array")?);
                Ok((items.clone(), Value::Array(items)))
            },
        )
    }

    /// Returns a handle onto a nested section.
    ///
    /// The handle shares the section with this tree: writes through either
    /// are visible through both.
    pub fn get_sub_section(
        &self,
        section: Option<&str>,
        key: &str,
    ) -> Result<Option<ConfigTree>, ConfigError> {
        self.coerce_and_cache(
            section,
            key,
            |value| match value {
                Value::SubTree(inner) => Some(self.nested(inner.clone())),
                _ => None,
            },
            |value| match value {
                Value::Section(inner) => {
                    Ok((self.nested(inner.clone()), Value::SubTree(inner.clone())))
                }
                other => Err(ConfigError::IncompatibleValue {
                    key: key.to_string(),
                    expected: "a section",
                    found: other.kind(),
                }),
            },
        )
    }

    /// Projects this handle's section into a JSON document.
    pub fn to_document(&self) -> Result<serde_json::Value, ConfigError> {
        project(self)
    }

    fn nested(&self, values: Section) -> Self {
        Self {
            values,
            root: self.root.clone(),
        }
    }

    fn scope(&self, section: Option<&str>) -> Result<Section, ConfigError> {
        match section {
            None => Ok(self.values.clone()),
            Some(name) => self
                .values
                .get(name)
                .and_then(|value| value.as_section())
                .ok_or_else(|| ConfigError::SectionNotFound(name.to_string())),
        }
    }

    /// Returns the cached typed value if present, otherwise converts the
    /// stored value and writes the conversion back in its place.
    fn coerce_and_cache<T>(
        &self,
        section: Option<&str>,
        key: &str,
        cached: impl Fn(&Value) -> Option<T>,
        coerce: impl Fn(&Value) -> Result<(T, Value), ConfigError>,
    ) -> Result<Option<T>, ConfigError> {
        let Some(value) = self.get_value(section, key)? else {
            return Ok(None);
        };
        if let Some(hit) = cached(&value) {
            return Ok(Some(hit));
        }

        let (converted, replacement) = coerce(&value)?;
        self.put(section, key, replacement)?;
        Ok(Some(converted))
    }
}

// Handles compare and print by their own section only.
impl PartialEq for ConfigTree {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl fmt::Debug for ConfigTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigTree").field("values", &self.values).finish()
    }
}

fn render(key: &str, value: &Value, expected: &'static str) -> Result<String, ConfigError> {
    value.render().ok_or_else(|| ConfigError::IncompatibleValue {
        key: key.to_string(),
        expected,
        found: value.kind(),
    })
}

fn parse_number<N: std::str::FromStr>(
    key: &str,
    value: &Value,
    target: &'static str,
) -> Result<N, ConfigError> {
    let text = render(key, value, target)?;
    text.parse().map_err(|_| ConfigError::TypeCoercion {
        key: key.to_string(),
        target,
        value: text,
    })
}

/// Splits on `,`, dropping a single whitespace character on either side.
fn split_list(text: &str) -> Vec<String> {
    let count = text.split(',').count();
    text.split(',')
        .enumerate()
        .map(|(i, item)| {
            let item = if i > 0 { strip_one_leading(item) } else { item };
            let item = if i + 1 < count { strip_one_trailing(item) } else { item };
            item.to_string()
        })
        .collect()
}

fn strip_one_leading(s: &str) -> &str {
    match s.chars().next() {
        Some(c) if c.is_whitespace() => &s[c.len_utf8()..],
        _ => s,
    }
}

fn strip_one_trailing(s: &str) -> &str {
    match s.chars().next_back() {
        Some(c) if c.is_whitespace() => &s[..s.len() - c.len_utf8()],
        _ => s,
    }
}
