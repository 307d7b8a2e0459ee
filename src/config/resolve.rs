//! Reference resolution for configuration values.
//!
//! Supports `${key}` for a key in the same section and `${section.key}` for a
//! key in a top-level section. Only one level of dotting is supported, so
//! `${a.b.c}` is rejected rather than walked.
//!
//! A referenced value that itself contains references is resolved first, in
//! the scope of the section that owns it.

use super::value::Section;
use super::ConfigError;

const OPEN: &str = "${";
const CLOSE: char = '}';

/// Nested resolutions allowed before a chain is treated as a cycle.
const MAX_DEPTH: usize = 64;

/// Resolves every `${...}` reference in `text`.
///
/// Plain names are looked up in `scope`; dotted names start from `root`.
pub fn resolve(text: &str, scope: &Section, root: &Section) -> Result<String, ConfigError> {
    resolve_at(text, scope, root, 0)
}

fn resolve_at(
    text: &str,
    scope: &Section,
    root: &Section,
    depth: usize,
) -> Result<String, ConfigError> {
    if !text.contains(OPEN) {
        return Ok(text.to_string());
    }
    if depth >= MAX_DEPTH {
        return Err(ConfigError::CircularReference(text.to_string()));
    }

    let mut result = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(OPEN) {
        result.push_str(&rest[..start]);
        let after = &rest[start + OPEN.len()..];
        let end = after
            .find(CLOSE)
            .ok_or_else(|| ConfigError::UnclosedReference(text.to_string()))?;

        result.push_str(&lookup(&after[..end], scope, root, depth)?);
        // Scanning resumes after the substituted text
        rest = &after[end + CLOSE.len_utf8()..];
    }

    result.push_str(rest);
    Ok(result)
}

/// Looks up a reference name and returns its fully resolved text.
fn lookup(name: &str, scope: &Section, root: &Section, depth: usize) -> Result<String, ConfigError> {
    let not_found = || ConfigError::MissingReference(name.to_string());

    let (owner, key) = match name.find('.') {
        Some(dot) if dot > 0 => {
            let (head, tail) = (&name[..dot], &name[dot + 1..]);
            if tail.contains('.') {
                return Err(ConfigError::InvalidReferencePath(name.to_string()));
            }
            let owner = root
                .get(head)
                .and_then(|value| value.as_section())
                .ok_or_else(not_found)?;
            (owner, tail)
        }
        _ => (scope.clone(), name),
    };

    let value = owner.get(key).ok_or_else(not_found)?;
    let text = value
        .render()
        .ok_or_else(|| ConfigError::NonScalarReference(name.to_string()))?;

    resolve_at(&text, &owner, root, depth + 1)
}
