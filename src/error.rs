//! Error types for Choreo.
//!
//! This module defines the error types used throughout the orchestration
//! core. Every failure is returned as a value; nothing in the core panics or
//! aborts the process.

use std::path::PathBuf;
use thiserror::Error;

use crate::executor::task::TaskResult;

/// Result type alias for Choreo operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Choreo.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Playbook Errors
    // ========================================================================
    /// Error validating playbook structure.
    #[error("Playbook validation failed: {0}")]
    PlaybookValidation(String),

    /// A play failed and halted the playbook.
    #[error("Play '{play}' failed: {source}")]
    PlayFailed {
        /// Play name
        play: String,
        /// The error that halted the play
        #[source]
        source: Box<Error>,
    },

    // ========================================================================
    // Task Errors
    // ========================================================================
    /// Task execution failed.
    #[error("Task '{task}' failed on host '{host}': {message}")]
    TaskFailed {
        /// Task name
        task: String,
        /// Target host
        host: String,
        /// Error message
        message: String,
    },

    /// The delegate host named by `delegate_to` is not in the inventory.
    #[error("Task '{task}' delegates to unknown host '{host}'")]
    DelegateNotFound {
        /// Task name
        task: String,
        /// Delegate host name
        host: String,
    },

    /// Fact gathering failed for a play.
    #[error("Fact gathering failed on host '{host}': {message}")]
    FactGathering {
        /// Target host
        host: String,
        /// Error message
        message: String,
    },

    /// The runner returned an error for a task invocation.
    #[error("Runner failed executing task '{task}': {message}")]
    Runner {
        /// Task name
        task: String,
        /// Error message
        message: String,
    },

    // ========================================================================
    // Condition Errors
    // ========================================================================
    /// A `when`/`until` expression could not be evaluated.
    #[error("Cannot evaluate condition '{expression}': {message}")]
    Condition {
        /// The raw expression
        expression: String,
        /// Error message
        message: String,
    },

    // ========================================================================
    // Inventory Errors
    // ========================================================================
    /// Host not found in inventory.
    #[error("Host '{0}' not found in inventory")]
    HostNotFound(String),

    /// A host pattern could not be resolved.
    #[error("Invalid host pattern '{pattern}': {message}")]
    InventoryPattern {
        /// The offending pattern token
        pattern: String,
        /// Error message
        message: String,
    },

    /// Error loading inventory.
    #[error("Failed to load inventory from '{path}': {message}")]
    InventoryLoad {
        /// Path to inventory
        path: PathBuf,
        /// Error message
        message: String,
    },

    // ========================================================================
    // Role Errors
    // ========================================================================
    /// Role dependency cycle.
    #[error("Circular role dependency detected at role '{0}'")]
    DependencyCycle(String),

    /// A role depends on a role that was never registered.
    #[error("Role '{dependent}' depends on unknown role '{dependency}'")]
    MissingDependency {
        /// The missing role name
        dependency: String,
        /// The role that declared the dependency
        dependent: String,
    },

    /// Role not found.
    #[error("Role '{0}' not found")]
    RoleNotFound(String),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid configuration value.
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidConfig {
        /// Configuration key
        key: String,
        /// Error message
        message: String,
    },

    // ========================================================================
    // IO / Serialization Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl Error {
    /// Creates a new task failed error.
    pub fn task_failed(
        task: impl Into<String>,
        host: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::TaskFailed {
            task: task.into(),
            host: host.into(),
            message: message.into(),
        }
    }

    /// Creates a new runner error.
    pub fn runner(task: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Runner {
            task: task.into(),
            message: message.into(),
        }
    }

    /// Creates a new condition error.
    pub fn condition(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Condition {
            expression: expression.into(),
            message: message.into(),
        }
    }

    /// Returns true if `ignore_errors` on the failing task may contain this error.
    ///
    /// Configuration errors such as an unknown delegate host are never
    /// containable.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::TaskFailed { .. } | Error::Runner { .. })
    }

    /// Returns the error code for CLI exit status.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::PlayFailed { source, .. } => source.exit_code(),
            Error::TaskFailed { .. } | Error::Runner { .. } => 2,
            Error::FactGathering { .. } => 3,
            Error::PlaybookValidation(_) => 4,
            Error::InventoryLoad { .. }
            | Error::InventoryPattern { .. }
            | Error::HostNotFound(_)
            | Error::DelegateNotFound { .. } => 5,
            Error::DependencyCycle(_)
            | Error::MissingDependency { .. }
            | Error::RoleNotFound(_) => 6,
            _ => 1,
        }
    }
}

/// A failed run, paired with every result accumulated before the failure.
///
/// Callers observe exactly how far execution progressed and decide whether
/// the partial results are usable.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct RunFailure {
    /// The error that stopped execution
    #[source]
    pub error: Error,
    /// Results produced before (and including) the failing step
    pub results: Vec<TaskResult>,
}

impl RunFailure {
    /// Pairs an error with the partial results.
    pub fn new(error: Error, results: Vec<TaskResult>) -> Self {
        Self { error, results }
    }

    /// Splits the failure into its parts.
    pub fn into_parts(self) -> (Error, Vec<TaskResult>) {
        (self.error, self.results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_errors() {
        assert!(Error::task_failed("t", "h1", "boom").is_recoverable());
        assert!(Error::runner("t", "cancelled").is_recoverable());
        assert!(!Error::DelegateNotFound {
            task: "t".into(),
            host: "ghost".into()
        }
        .is_recoverable());
        assert!(!Error::DependencyCycle("a".into()).is_recoverable());
    }

    #[test]
    fn test_exit_code_unwraps_play_failure() {
        let err = Error::PlayFailed {
            play: "web".into(),
            source: Box::new(Error::DependencyCycle("a".into())),
        };
        assert_eq!(err.exit_code(), 6);
        assert!(err.to_string().contains("web"));
    }

    #[test]
    fn test_run_failure_keeps_results() {
        let failure = RunFailure::new(Error::HostNotFound("h9".into()), Vec::new());
        assert_eq!(failure.to_string(), "Host 'h9' not found in inventory");
        let (error, results) = failure.into_parts();
        assert!(matches!(error, Error::HostNotFound(_)));
        assert!(results.is_empty());
    }
}
