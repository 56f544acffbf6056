//! Condition evaluation for `when` and `until` clauses.
//!
//! The core only needs "evaluate(condition, scope) -> bool". Boolean
//! conditions are answered directly; expressions are handed to an injected
//! [`ConditionEvaluator`]. The bundled [`LiteralEvaluator`] covers literal
//! tokens, bare variable names, `not` and `is defined` checks.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::vars::{is_truthy, resolve_path, substitute, Vars};

/// A condition attached to a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    /// A boolean literal
    Bool(bool),
    /// An opaque expression evaluated by a [`ConditionEvaluator`]
    Expression(String),
}

impl Condition {
    /// Create a condition from a string expression
    pub fn expression(expr: impl Into<String>) -> Self {
        Condition::Expression(expr.into())
    }
}

impl From<bool> for Condition {
    fn from(value: bool) -> Self {
        Condition::Bool(value)
    }
}

impl From<&str> for Condition {
    fn from(value: &str) -> Self {
        Condition::Expression(value.to_string())
    }
}

impl From<String> for Condition {
    fn from(value: String) -> Self {
        Condition::Expression(value)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Bool(b) => write!(f, "{}", b),
            Condition::Expression(expr) => write!(f, "{}", expr),
        }
    }
}

/// Evaluates expression conditions against a variable scope.
pub trait ConditionEvaluator: Send + Sync {
    /// Evaluate `expression` against `scope`.
    fn evaluate_expression(&self, expression: &str, scope: &Vars) -> Result<bool>;

    /// Evaluate any condition. Boolean literals never reach the expression path.
    fn evaluate(&self, condition: &Condition, scope: &Vars) -> Result<bool> {
        match condition {
            Condition::Bool(b) => Ok(*b),
            Condition::Expression(expr) => self.evaluate_expression(expr, scope),
        }
    }
}

const TRUTHY: &[&str] = &["true", "yes", "on", "1"];
const FALSY: &[&str] = &["false", "no", "off", "0", ""];

/// Default evaluator: variable substitution followed by a literal match.
#[derive(Debug, Clone)]
pub struct LiteralEvaluator {
    /// Reject expressions that are not understood instead of treating them as true
    pub strict: bool,
}

impl Default for LiteralEvaluator {
    fn default() -> Self {
        Self { strict: true }
    }
}

impl LiteralEvaluator {
    /// Create a strict evaluator
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an evaluator that treats unknown expressions as true
    pub fn lenient() -> Self {
        Self { strict: false }
    }

    fn literal(text: &str) -> Option<bool> {
        let lowered = text.trim().to_lowercase();
        if TRUTHY.contains(&lowered.as_str()) {
            Some(true)
        } else if FALSY.contains(&lowered.as_str()) {
            Some(false)
        } else {
            None
        }
    }

    fn is_identifier(text: &str) -> bool {
        !text.is_empty()
            && text
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '.')
    }
}

impl ConditionEvaluator for LiteralEvaluator {
    fn evaluate_expression(&self, expression: &str, scope: &Vars) -> Result<bool> {
        let expr = expression.trim();

        if let Some(inner) = expr.strip_prefix("not ") {
            return self.evaluate_expression(inner, scope).map(|v| !v);
        }

        if let Some(name) = expr.strip_suffix(" is not defined") {
            return Ok(resolve_path(scope, name.trim()).is_none());
        }
        if let Some(name) = expr.strip_suffix(" is defined") {
            return Ok(resolve_path(scope, name.trim()).is_some());
        }

        let substituted = substitute(expr, scope);
        if let Some(value) = Self::literal(&substituted) {
            return Ok(value);
        }

        let bare = substituted.trim();
        if Self::is_identifier(bare) {
            if let Some(value) = resolve_path(scope, bare) {
                return Ok(is_truthy(value));
            }
        }

        if self.strict {
            Err(Error::condition(
                expression,
                format!("'{}' is not a recognised boolean", bare),
            ))
        } else {
            Ok(true)
        }
    }
}
