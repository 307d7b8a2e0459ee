//! Node types of the configuration tree.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
#[cfg(test)]
use std::sync::Weak;

use indexmap::IndexMap;

/// Key/value storage behind a [`Section`].
pub type Entries = IndexMap<String, Value>;

/// A single node in the configuration tree.
///
/// Values start out as [`Value::Text`] or [`Value::Section`] when parsed; the
/// typed accessors on [`ConfigTree`](super::ConfigTree) replace them in place
/// with the coerced variant on first use.
///
/// [`Value::SubTree`] marks a section that has been handed out as its own
/// handle. It holds only the section itself; the handle is rebuilt around it
/// on each access, so nothing stored in a tree points back at its root.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Section(Section),
    Int(i32),
    Long(i64),
    Bool(bool),
    Array(Vec<String>),
    SubTree(Section),
}

impl Value {
    /// Short variant name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Text(_) => "text",
            Value::Section(_) => "a section",
            Value::Int(_) => "an int",
            Value::Long(_) => "a long",
            Value::Bool(_) => "a bool",
            Value::Array(_) => "an array",
            Value::SubTree(_) => "a sub-section",
        }
    }

    /// Textual form of a scalar value.
    ///
    /// Arrays render joined with `,`. Returns `None` for sections.
    pub fn render(&self) -> Option<String> {
        match self {
            Value::Text(s) => Some(s.clone()),
            Value::Int(n) => Some(n.to_string()),
            Value::Long(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Array(items) => Some(items.join(",")),
            Value::Section(_) | Value::SubTree(_) => None,
        }
    }

    /// The mapping behind a section or sub-tree value.
    pub fn as_section(&self) -> Option<Section> {
        match self {
            Value::Section(section) | Value::SubTree(section) => Some(section.clone()),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

/// A shared, mutable mapping of keys to values.
///
/// Cloning a `Section` yields another handle to the same mapping, so a
/// write through one handle is visible through every other.
#[derive(Clone, Default)]
pub struct Section {
    entries: Arc<RwLock<Entries>>,
}

impl Section {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Entries) -> Self {
        Self {
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    /// Returns a copy of the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.read().get(key).cloned()
    }

    /// Stores `value` under `key`, returning the previous value.
    pub fn insert(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.write().insert(key.into(), value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    /// Point-in-time copy of all entries, in insertion order.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    #[cfg(test)]
    pub(crate) fn downgrade(&self) -> Weak<RwLock<Entries>> {
        Arc::downgrade(&self.entries)
    }

    /// Whether both handles refer to the same mapping.
    pub fn ptr_eq(&self, other: &Section) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }

    // Writers only ever perform a single insert, so a poisoned lock still
    // guards a consistent map.
    fn read(&self) -> RwLockReadGuard<'_, Entries> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Entries> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PartialEq for Section {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.entries() == other.entries()
    }
}

impl fmt::Debug for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_mapping() {
        let section = Section::new();
        let other = section.clone();
        other.insert("port", Value::from("8080"));

        assert!(section.ptr_eq(&other));
        assert_eq!(section.get("port"), Some(Value::from("8080")));
    }

    #[test]
    fn test_render_scalars() {
        assert_eq!(Value::Int(-3).render().as_deref(), Some("-3"));
        assert_eq!(Value::Bool(true).render().as_deref(), Some("true"));
        assert_eq!(
            Value::Array(vec!["a".into(), "b".into()]).render().as_deref(),
            Some("a,b")
        );
        assert_eq!(Value::Section(Section::new()).render(), None);
    }

    #[test]
    fn test_as_section_unwraps_sub_tree() {
        let section = Section::new();

        let inner = Value::SubTree(section.clone()).as_section().unwrap();
        assert!(inner.ptr_eq(&section));
        assert!(Value::from("x").as_section().is_none());
    }
}
