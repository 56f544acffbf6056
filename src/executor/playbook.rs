//! Playbook and play definitions for Choreo
//!
//! These values are produced by a loader upstream of the core and treated as
//! read-only during execution.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};
use crate::executor::task::Task;
use crate::vars::Vars;

/// Execution strategy for a play.
///
/// Only linear semantics are executed; other names are carried through.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Strategy {
    /// Run each task on all hosts before moving to the next
    #[default]
    Linear,
    /// Any other strategy name
    Other(String),
}

impl From<String> for Strategy {
    fn from(value: String) -> Self {
        if value.eq_ignore_ascii_case("linear") {
            Strategy::Linear
        } else {
            Strategy::Other(value)
        }
    }
}

impl From<Strategy> for String {
    fn from(value: Strategy) -> Self {
        match value {
            Strategy::Linear => "linear".to_string(),
            Strategy::Other(name) => name,
        }
    }
}

/// A role applied by a play, with optional parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RoleRefDef")]
pub struct RoleRef {
    /// Role name
    pub role: String,
    /// Parameters layered over the role's vars
    pub vars: Vars,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RoleRefDef {
    Name(String),
    Full {
        role: String,
        #[serde(default)]
        vars: Vars,
    },
}

impl From<RoleRefDef> for RoleRef {
    fn from(def: RoleRefDef) -> Self {
        match def {
            RoleRefDef::Name(role) => RoleRef::new(role),
            RoleRefDef::Full { role, vars } => RoleRef { role, vars },
        }
    }
}

impl RoleRef {
    /// Reference a role by name
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            vars: Vars::new(),
        }
    }

    /// Add a role parameter
    pub fn var(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }
}

/// A single play: a host pattern plus ordered task lists
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Play {
    /// Play name
    pub name: String,
    /// Host pattern expression (comma or semicolon separated tokens)
    pub hosts: String,
    /// Play variables
    #[serde(default)]
    pub vars: Vars,
    /// Tasks run before fact gathering
    #[serde(default)]
    pub pre_tasks: Vec<Task>,
    /// Roles applied after fact gathering
    #[serde(default)]
    pub roles: Vec<RoleRef>,
    /// Main task list
    #[serde(default)]
    pub tasks: Vec<Task>,
    /// Tasks run after the main list
    #[serde(default)]
    pub post_tasks: Vec<Task>,
    /// Handlers, run at most once each after post_tasks when notified
    #[serde(default)]
    pub handlers: Vec<Task>,
    /// Gather facts before the main tasks (None defers to the scope/config)
    #[serde(default)]
    pub gather_facts: Option<bool>,
    /// Batch size for rolling execution
    #[serde(default)]
    pub serial: Option<usize>,
    /// Execution strategy
    #[serde(default)]
    pub strategy: Strategy,
}

impl Play {
    /// Create a new play
    pub fn new(name: impl Into<String>, hosts: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hosts: hosts.into(),
            ..Default::default()
        }
    }

    /// Add a task to the main list
    pub fn add_task(&mut self, task: Task) {
        self.tasks.push(task);
    }

    /// Add a handler
    pub fn add_handler(&mut self, handler: Task) {
        self.handlers.push(handler);
    }

    /// Set a play variable
    pub fn set_var(&mut self, key: impl Into<String>, value: impl Into<JsonValue>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Split the host expression into pattern tokens
    pub fn host_patterns(&self) -> Vec<&str> {
        self.hosts
            .split([',', ';'])
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect()
    }

    /// Check the structural invariants the core relies on.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::PlaybookValidation("play has no name".to_string()));
        }
        if self.host_patterns().is_empty() {
            return Err(Error::PlaybookValidation(format!(
                "play '{}' has no host pattern",
                self.name
            )));
        }
        Ok(())
    }
}

/// A complete playbook containing multiple plays
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Playbook {
    /// Name of the playbook
    #[serde(default)]
    pub name: String,
    /// Global variables for the playbook
    #[serde(default)]
    pub vars: Vars,
    /// Plays in this playbook
    pub plays: Vec<Play>,
}

impl Playbook {
    /// Create a new empty playbook
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add a play to the playbook
    pub fn add_play(&mut self, play: Play) {
        self.plays.push(play);
    }

    /// Parse a playbook document from YAML.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let playbook: Playbook = serde_yaml::from_str(content)?;
        playbook.validate()?;
        Ok(playbook)
    }

    /// Load a playbook from a YAML file; the file stem names an unnamed playbook.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut playbook = Self::from_yaml(&content)?;
        if playbook.name.is_empty() {
            playbook.name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("playbook")
                .to_string();
        }
        Ok(playbook)
    }

    /// At least one play, each with a name and a host pattern.
    pub fn validate(&self) -> Result<()> {
        if self.plays.is_empty() {
            return Err(Error::PlaybookValidation(
                "playbook contains no plays".to_string(),
            ));
        }
        self.plays.iter().try_for_each(Play::validate)
    }
}
