//! `{{ var }}` substitution.
//!
//! This is not a template language: a placeholder holds a
//! single dotted variable path and is replaced by that variable's text.
//! Unknown variables render as empty text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;

use super::{resolve_path, to_text, Vars};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([^}]+?)\s*\}\}").expect("placeholder regex is valid"));

/// Substitute every `{{ path }}` placeholder in `template`.
pub fn substitute(template: &str, vars: &Vars) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures<'_>| {
            resolve_path(vars, &caps[1]).map(to_text).unwrap_or_default()
        })
        .into_owned()
}

/// If `template` is exactly one placeholder, return the referenced path.
pub fn sole_reference(template: &str) -> Option<&str> {
    let trimmed = template.trim();
    let caps = PLACEHOLDER.captures(trimmed)?;
    let whole = caps.get(0)?;
    if whole.start() == 0 && whole.end() == trimmed.len() {
        caps.get(1).map(|m| m.as_str())
    } else {
        None
    }
}

/// Substitute placeholders inside every string of a JSON value.
///
/// A string consisting of a single placeholder takes the referenced value
/// with its original type, so `"{{ ports }}"` yields the list itself.
pub fn substitute_value(value: &JsonValue, vars: &Vars) -> JsonValue {
    match value {
        JsonValue::String(s) => {
            if let Some(found) = sole_reference(s).and_then(|path| resolve_path(vars, path)) {
                return found.clone();
            }
            JsonValue::String(substitute(s, vars))
        }
        JsonValue::Array(items) => {
            JsonValue::Array(items.iter().map(|v| substitute_value(v, vars)).collect())
        }
        JsonValue::Object(map) => JsonValue::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute_value(v, vars)))
                .collect(),
        ),
        other => other.clone(),
    }
}
