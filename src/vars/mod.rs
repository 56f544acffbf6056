//! Variable system for Choreo.
//!
//! This module provides the layered variable scope used by every executor
//! layer:
//! - Precedence (role defaults < global < facts < play < role vars <
//!   role params < task < loop item), applied by merge order
//! - Deterministic, non-mutating deep merge
//! - Dotted path lookup and truthiness helpers
//!
//! A scope is a plain ordered map. Each layer of the engine produces a *new*
//! merged map rather than mutating a shared one, so no locking is needed
//! between phases.

pub mod template;

use indexmap::IndexMap;
use serde_json::Value as JsonValue;

pub use template::{substitute, substitute_value};

/// A variable scope: ordered name to value map.
pub type Vars = IndexMap<String, JsonValue>;

/// Merge variable layers left to right; later layers win.
///
/// Nested objects are merged key by key, any other value replaces the
/// earlier one outright. Inputs are never mutated.
pub fn merge(layers: &[&Vars]) -> Vars {
    let mut merged = Vars::new();
    for layer in layers {
        for (key, value) in layer.iter() {
            let combined = match merged.get(key) {
                Some(existing) => deep_merge(existing, value),
                None => value.clone(),
            };
            merged.insert(key.clone(), combined);
        }
    }
    merged
}

/// Deep merge two JSON values (overlay takes precedence).
pub fn deep_merge(base: &JsonValue, overlay: &JsonValue) -> JsonValue {
    match (base, overlay) {
        (JsonValue::Object(base_map), JsonValue::Object(overlay_map)) => {
            let mut merged = base_map.clone();
            for (key, value) in overlay_map {
                if let Some(base_value) = base_map.get(key) {
                    merged.insert(key.clone(), deep_merge(base_value, value));
                } else {
                    merged.insert(key.clone(), value.clone());
                }
            }
            JsonValue::Object(merged)
        }
        // For non-objects, overlay wins
        (_, overlay) => overlay.clone(),
    }
}

/// Look up a dotted path such as `web.port` or `packages.0`.
pub fn resolve_path<'a>(vars: &'a Vars, path: &str) -> Option<&'a JsonValue> {
    let mut parts = path.split('.').map(str::trim);
    let root = parts.next().filter(|p| !p.is_empty())?;
    let mut current = vars.get(root)?;

    for part in parts {
        current = match current {
            JsonValue::Object(map) => map.get(part)?,
            JsonValue::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Check if a JSON value is truthy
pub fn is_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        JsonValue::String(s) => {
            !matches!(s.trim().to_lowercase().as_str(), "" | "false" | "no" | "off" | "0")
        }
        JsonValue::Array(a) => !a.is_empty(),
        JsonValue::Object(o) => !o.is_empty(),
    }
}

/// Render a value as plain text for substitution.
pub fn to_text(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => s.clone(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

/// Build a scope from `(name, value)` pairs.
pub fn vars_from<I, K>(pairs: I) -> Vars
where
    I: IntoIterator<Item = (K, JsonValue)>,
    K: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}
