//! Conversion of a configuration tree into a JSON document.

use serde_json::{Map, Number, Value as Json};

use super::resolve::resolve;
use super::tree::ConfigTree;
use super::value::{Section, Value};
use super::ConfigError;

/// Projects the tree's section into a JSON object.
///
/// Sections become objects, arrays become arrays of strings, cached typed
/// scalars keep their type, and text is emitted with its references resolved.
pub fn project(tree: &ConfigTree) -> Result<Json, ConfigError> {
    let mut path = Vec::new();
    project_section(tree.section(), tree.root(), &mut path).map(Json::Object)
}

/// `path` holds the sections currently being projected, outermost first.
fn project_section(
    section: &Section,
    root: &Section,
    path: &mut Vec<Section>,
) -> Result<Map<String, Json>, ConfigError> {
    if path.iter().any(|open| open.ptr_eq(section)) {
        return Err(ConfigError::Projection(format!(
            "section contains itself at depth {}",
            path.len()
        )));
    }
    path.push(section.clone());

    let mut object = Map::new();
    for (key, value) in section.entries() {
        let json = match value {
            Value::Section(inner) | Value::SubTree(inner) => {
                Json::Object(project_section(&inner, root, path)?)
            }
            Value::Array(items) => Json::Array(items.into_iter().map(Json::String).collect()),
            Value::Text(raw) => Json::String(resolve(&raw, section, root)?),
            Value::Int(n) => Json::from(n),
            Value::Long(n) => Json::from(n),
            Value::Bool(b) => Json::Bool(b),
        };
        object.insert(key, json);
    }

    path.pop();
    Ok(object)
}

/// Replaces string scalars with the most specific type they parse as:
/// boolean, integer, float, or string (fallback).
///
/// Items of string arrays are left as strings.
pub fn infer_scalars(json: Json) -> Json {
    match json {
        Json::String(s) => infer_scalar(s),
        Json::Object(map) => Json::Object(
            map.into_iter()
                .map(|(key, value)| (key, infer_scalars(value)))
                .collect(),
        ),
        other => other,
    }
}

fn infer_scalar(s: String) -> Json {
    // Unlike get_bool, only "false" itself becomes false
    if s.eq_ignore_ascii_case("true") {
        return Json::Bool(true);
    }
    if s.eq_ignore_ascii_case("false") {
        return Json::Bool(false);
    }

    // Plain decimal digits only: "+1" and "1e3" stay text
    if looks_like_integer(&s) {
        if let Ok(i) = s.parse::<i64>() {
            return Json::from(i);
        }
    }

    if s.contains('.') {
        if let Some(n) = s.parse::<f64>().ok().and_then(Number::from_f64) {
            return Json::Number(n);
        }
    }

    Json::String(s)
}

fn looks_like_integer(s: &str) -> bool {
    let s = s.strip_prefix('-').unwrap_or(s);
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}
