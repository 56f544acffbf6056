//! Role definitions for Choreo
//!
//! A role is a reusable bundle of tasks, handlers, vars and defaults plus
//! a list of dependencies on other roles. Roles form a directed graph that
//! the [`DependencyResolver`] orders.

pub mod resolver;

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::Result;
use crate::executor::task::Task;
use crate::vars::Vars;

pub use resolver::{DependencyBinding, DependencyResolver};

/// A role containing reusable automation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Role {
    /// Role name
    pub name: String,
    /// Tasks applied when the role runs
    #[serde(default)]
    pub tasks: Vec<Task>,
    /// Handlers contributed to the play
    #[serde(default)]
    pub handlers: Vec<Task>,
    /// Role vars (override play vars for role tasks)
    #[serde(default)]
    pub vars: Vars,
    /// Role defaults (lowest precedence)
    #[serde(default)]
    pub defaults: Vars,
    /// Roles that must run before this one
    #[serde(default)]
    pub dependencies: Vec<RoleDependency>,
}

impl Role {
    /// Create a new role
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add a task
    pub fn with_task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    /// Add a handler
    pub fn with_handler(mut self, handler: Task) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Set a role default
    pub fn with_default(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.defaults.insert(key.into(), value.into());
        self
    }

    /// Set a role var
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Declare a dependency
    pub fn depends_on(mut self, dependency: impl Into<RoleDependency>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    /// Load a list of roles from a YAML document.
    pub fn load_all(path: impl AsRef<Path>) -> Result<Vec<Role>> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }
}

/// A dependency edge declared by a role
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RoleDependencyDef")]
pub struct RoleDependency {
    /// Name of the required role
    pub role: String,
    /// Version constraint, carried for diagnostics
    pub version: Option<String>,
    /// Variables the dependency runs with
    pub vars: Vars,
    /// Tags applied to the dependency's tasks
    pub tags: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RoleDependencyDef {
    Name(String),
    Full {
        role: String,
        #[serde(default)]
        version: Option<String>,
        #[serde(default)]
        vars: Vars,
        #[serde(default)]
        tags: Vec<String>,
    },
}

impl From<RoleDependencyDef> for RoleDependency {
    fn from(def: RoleDependencyDef) -> Self {
        match def {
            RoleDependencyDef::Name(role) => RoleDependency::new(role),
            RoleDependencyDef::Full {
                role,
                version,
                vars,
                tags,
            } => RoleDependency {
                role,
                version,
                vars,
                tags,
            },
        }
    }
}

impl RoleDependency {
    /// Depend on a role by name
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            ..Default::default()
        }
    }

    /// Add a variable for the dependency
    pub fn var(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Add a tag inherited by the dependency's tasks
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

impl From<&str> for RoleDependency {
    fn from(role: &str) -> Self {
        RoleDependency::new(role)
    }
}

impl From<String> for RoleDependency {
    fn from(role: String) -> Self {
        RoleDependency::new(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_builder() {
        let role = Role::new("web")
            .with_default("port", 80)
            .with_var("user", "www")
            .depends_on("common")
            .depends_on(RoleDependency::new("tls").var("port", 443).tag("security"))
            .with_task(Task::new("install", "package"));

        assert_eq!(role.dependencies.len(), 2);
        assert_eq!(role.dependencies[1].vars["port"], json!(443));
        assert_eq!(role.dependencies[1].tags, vec!["security".to_string()]);
        assert_eq!(role.defaults["port"], json!(80));
    }

    #[test]
    fn test_dependency_deserializes_short_and_long_form() {
        let role: Role = serde_yaml::from_str(
            r#"
name: app
dependencies:
  - common
  - role: db
    version: "1.2"
    vars: { port: 5432 }
"#,
        )
        .unwrap();
        assert_eq!(role.dependencies[0], RoleDependency::new("common"));
        assert_eq!(role.dependencies[1].version.as_deref(), Some("1.2"));
        assert_eq!(role.dependencies[1].vars["port"], json!(5432));
    }
}
