//! Task definition and results for Choreo
//!
//! This module provides:
//! - Task struct with module, args, conditions, loops and modifiers
//! - Loop sources and their resolution against a scope
//! - TaskResult, the append-only record of one invocation on one host

use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::executor::condition::Condition;
use crate::vars::template::sole_reference;
use crate::vars::{resolve_path, substitute_value, Vars};

/// Default number of retries when `until` is set without `retries`.
pub const DEFAULT_RETRIES: u32 = 3;

/// Default delay between retries.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Where a loop takes its items from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LoopSource {
    /// A literal list of items
    Items(Vec<JsonValue>),
    /// A variable reference such as `{{ packages }}`
    Expression(String),
}

impl LoopSource {
    /// Resolve the loop items against a scope.
    ///
    /// A reference that resolves to a list yields that list. Anything else
    /// collapses to a single item holding the substituted value.
    pub fn resolve(&self, scope: &Vars) -> Vec<JsonValue> {
        match self {
            LoopSource::Items(items) => items.iter().map(|i| substitute_value(i, scope)).collect(),
            LoopSource::Expression(expr) => {
                let referenced = sole_reference(expr)
                    .and_then(|path| resolve_path(scope, path))
                    .or_else(|| resolve_path(scope, expr.trim()));
                match referenced {
                    Some(JsonValue::Array(items)) => items.clone(),
                    _ => vec![substitute_value(&JsonValue::String(expr.clone()), scope)],
                }
            }
        }
    }
}

impl From<Vec<JsonValue>> for LoopSource {
    fn from(items: Vec<JsonValue>) -> Self {
        LoopSource::Items(items)
    }
}

/// A task to be executed
///
/// Tasks are read-only once loaded; loop expansion produces new copies.
/// Handlers are tasks too and are matched by `name` or `listen`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Task name (displayed during execution)
    #[serde(default)]
    pub name: String,
    /// Module to execute
    pub module: String,
    /// Module arguments
    #[serde(default)]
    pub args: IndexMap<String, JsonValue>,
    /// Skip the task when this evaluates false
    #[serde(default)]
    pub when: Option<Condition>,
    /// Items to loop over
    #[serde(default, rename = "loop")]
    pub loop_items: Option<LoopSource>,
    /// Loop variable name (default: "item")
    #[serde(default = "default_loop_var")]
    pub loop_var: String,
    /// Task-local variables
    #[serde(default)]
    pub vars: Vars,
    /// Tags for task filtering
    #[serde(default)]
    pub tags: Vec<String>,
    /// Whether to ignore errors
    #[serde(default)]
    pub ignore_errors: bool,
    /// Run task only once (not on each host)
    #[serde(default)]
    pub run_once: bool,
    /// Delegate task to another host
    #[serde(default)]
    pub delegate_to: Option<String>,
    /// Handlers to notify on change
    #[serde(default)]
    pub notify: Vec<String>,
    /// Extra notification names this task answers to when used as a handler
    #[serde(default)]
    pub listen: Vec<String>,
    /// Retry until this condition holds
    #[serde(default)]
    pub until: Option<Condition>,
    /// Maximum number of retries
    #[serde(default)]
    pub retries: Option<u32>,
    /// Delay between retries
    #[serde(default, with = "humantime_serde")]
    pub delay: Option<Duration>,
    /// Per-invocation timeout passed to the runner
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

fn default_loop_var() -> String {
    "item".to_string()
}

impl Default for Task {
    fn default() -> Self {
        Self {
            name: String::new(),
            module: String::new(),
            args: IndexMap::new(),
            when: None,
            loop_items: None,
            loop_var: default_loop_var(),
            vars: Vars::new(),
            tags: Vec::new(),
            ignore_errors: false,
            run_once: false,
            delegate_to: None,
            notify: Vec::new(),
            listen: Vec::new(),
            until: None,
            retries: None,
            delay: None,
            timeout: None,
        }
    }
}

impl Task {
    /// Create a new task with the given name and module
    pub fn new(name: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
            ..Default::default()
        }
    }

    /// Add an argument to the task
    pub fn arg(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    /// Set the when condition
    pub fn when(mut self, condition: impl Into<Condition>) -> Self {
        self.when = Some(condition.into());
        self
    }

    /// Set loop items
    pub fn loop_over(mut self, items: Vec<JsonValue>) -> Self {
        self.loop_items = Some(LoopSource::Items(items));
        self
    }

    /// Loop over the list held by a variable reference
    pub fn loop_ref(mut self, expr: impl Into<String>) -> Self {
        self.loop_items = Some(LoopSource::Expression(expr.into()));
        self
    }

    /// Set a task variable
    pub fn var(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Add a tag
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Set ignore_errors
    pub fn ignore_errors(mut self, ignore: bool) -> Self {
        self.ignore_errors = ignore;
        self
    }

    /// Set run_once
    pub fn run_once(mut self, run_once: bool) -> Self {
        self.run_once = run_once;
        self
    }

    /// Delegate the task to a named host
    pub fn delegate_to(mut self, host: impl Into<String>) -> Self {
        self.delegate_to = Some(host.into());
        self
    }

    /// Add a handler to notify
    pub fn notify(mut self, handler: impl Into<String>) -> Self {
        self.notify.push(handler.into());
        self
    }

    /// Add a listen name (handlers only)
    pub fn listen(mut self, name: impl Into<String>) -> Self {
        self.listen.push(name.into());
        self
    }

    /// Retry until the condition holds
    pub fn until(mut self, condition: impl Into<Condition>, retries: u32, delay: Duration) -> Self {
        self.until = Some(condition.into());
        self.retries = Some(retries);
        self.delay = Some(delay);
        self
    }

    /// Set the runner timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Name used in results and events; falls back to the module name.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.module
        } else {
            &self.name
        }
    }

    /// Whether a notification name addresses this handler.
    pub fn answers_to(&self, notification: &str) -> bool {
        self.name == notification || self.listen.iter().any(|l| l == notification)
    }

    /// Copy of this task for one loop iteration, with the loop removed.
    pub fn iteration(&self, item: &JsonValue, index: usize) -> Task {
        let mut copy = self.clone();
        copy.loop_items = None;
        copy.vars.insert(self.loop_var.clone(), item.clone());
        copy.vars
            .insert(format!("{}_index", self.loop_var), JsonValue::from(index));
        copy
    }

    /// Effective retry count when `until` is set.
    pub fn effective_retries(&self) -> u32 {
        self.retries.unwrap_or(DEFAULT_RETRIES)
    }

    /// Effective delay between retries.
    pub fn effective_delay(&self) -> Duration {
        self.delay.unwrap_or(DEFAULT_RETRY_DELAY)
    }
}

/// Result of executing a task on one host
///
/// Results are never mutated once appended to a result list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    /// Host the task ran on
    pub host: String,
    /// Task name
    pub task: String,
    /// Whether the invocation succeeded
    pub success: bool,
    /// Whether something was changed
    pub changed: bool,
    /// Optional message from the task
    #[serde(default)]
    pub msg: Option<String>,
    /// Module-specific result data
    #[serde(default)]
    pub data: IndexMap<String, JsonValue>,
    /// Error text for failed invocations
    #[serde(default)]
    pub error: Option<String>,
    /// When the invocation started
    pub started_at: DateTime<Utc>,
    /// When the invocation ended
    pub ended_at: DateTime<Utc>,
    /// Loop item this result belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<JsonValue>,
    /// Index of the loop item
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_index: Option<usize>,
    /// Failure contained by `ignore_errors`
    #[serde(default)]
    pub ignored: bool,
}

impl TaskResult {
    /// Create a successful result
    pub fn ok(host: impl Into<String>, task: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            host: host.into(),
            task: task.into(),
            success: true,
            changed: false,
            msg: None,
            data: IndexMap::new(),
            error: None,
            started_at: now,
            ended_at: now,
            item: None,
            item_index: None,
            ignored: false,
        }
    }

    /// Create a changed result
    pub fn changed(host: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            changed: true,
            ..Self::ok(host, task)
        }
    }

    /// Create a failed result
    pub fn failed(
        host: impl Into<String>,
        task: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        let error = error.into();
        Self {
            success: false,
            msg: Some(error.clone()),
            error: Some(error),
            ..Self::ok(host, task)
        }
    }

    /// Set the message
    pub fn with_msg(mut self, msg: impl Into<String>) -> Self {
        self.msg = Some(msg.into());
        self
    }

    /// Add a data entry
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Set the start and end timestamps
    pub fn with_timing(mut self, started_at: DateTime<Utc>, ended_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self.ended_at = ended_at;
        self
    }

    /// Whether this result counts as a failure
    pub fn is_failed(&self) -> bool {
        !self.success
    }

    /// Failure text, falling back to the message
    pub fn failure_message(&self) -> String {
        self.error
            .clone()
            .or_else(|| self.msg.clone())
            .unwrap_or_else(|| "task reported failure".to_string())
    }

    /// The result as a JSON object, exposed to `until` conditions as `result`.
    pub fn to_value(&self) -> JsonValue {
        serde_json::json!({
            "success": self.success,
            "failed": !self.success,
            "changed": self.changed,
            "msg": self.msg,
            "data": self.data,
        })
    }
}
