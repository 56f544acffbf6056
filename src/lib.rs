//! # Choreo - Declarative Orchestration Core
//!
//! Choreo takes a tree of plays (target hosts plus ordered tasks) and drives
//! their execution against a fleet: it merges variables, evaluates
//! conditionals, expands loops and orders reusable roles by their
//! dependencies. The actual work on a host is delegated to a [`Runner`].
//!
//! ## Core Concepts
//!
//! - **Playbooks**: ordered plays plus top-level variables
//! - **Plays**: a host pattern with pre_tasks, roles, tasks, post_tasks and handlers
//! - **Tasks**: one module invocation with `when`, `loop`, `delegate_to`,
//!   `run_once`, `ignore_errors` and retry modifiers
//! - **Roles**: reusable task bundles ordered by declared dependencies
//! - **Handlers**: tasks run at most once per play when notified
//! - **Events**: immutable lifecycle records delivered to injected sinks
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                   Playbook Executor                      │
//! │       (plays in order, baseline scope, partial results)  │
//! └─────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                     Play Executor                        │
//! │  (hosts, batches, facts, roles, phases, handlers)        │
//! └─────────────────────────────────────────────────────────┘
//!          │                   │                    │
//!          ▼                   ▼                    ▼
//! ┌─────────────────┐ ┌──────────────────┐ ┌─────────────────┐
//! │  Task Execution │ │  Scope Merger    │ │ Role Resolver   │
//! │  Unit           │ │  (vars layers)   │ │ (topo order)    │
//! └─────────────────┘ └──────────────────┘ └─────────────────┘
//!          │
//!          ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │        Runner / Inventory / Event sinks (injected)       │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use choreo::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let inventory = StaticInventory::load("hosts.yml")?;
//!     let playbook = Playbook::load("site.yml")?;
//!
//!     let executor = Executor::new(Arc::new(inventory), Arc::new(DryRunner::new()))
//!         .with_sink(Arc::new(TracingSink));
//!
//!     match executor.execute(&playbook, &Vars::new()).await {
//!         Ok(results) => println!("{} results", results.len()),
//!         Err(failure) => eprintln!("{} ({} results)", failure, failure.results.len()),
//!     }
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

// Re-export commonly used items in prelude
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    // Error handling
    pub use crate::error::{Error, Result, RunFailure};

    // Execution engine
    pub use crate::executor::condition::{Condition, ConditionEvaluator, LiteralEvaluator};
    pub use crate::executor::playbook::{Play, Playbook, RoleRef, Strategy};
    pub use crate::executor::task::{LoopSource, Task, TaskResult};
    pub use crate::executor::{Executor, ExecutorConfig, PlaybookExecutor};

    // Inventory
    pub use crate::inventory::{Group, Host, StaticInventory};

    // Roles
    pub use crate::roles::{DependencyResolver, Role, RoleDependency};

    // Events
    pub use crate::callback::{Event, EventBus, EventKind, RecordingSink, TracingSink};

    // Runners
    pub use crate::runner::DryRunner;

    // Core traits
    pub use crate::traits::*;

    // Variables
    pub use crate::vars::{merge, Vars};
}

// ============================================================================
// Core Modules
// ============================================================================

/// Error types and result aliases for Choreo operations.
pub mod error;

/// Collaborator contracts: runner, inventory and event sink.
pub mod traits;

/// Variable scopes, layered merge and `{{ var }}` substitution.
pub mod vars;

// ============================================================================
// Orchestration
// ============================================================================

/// Playbook, play and task execution.
///
/// The task execution unit, the play executor and the playbook executor
/// all live here, along with the data types they consume.
pub mod executor;

/// Roles and deterministic dependency ordering.
pub mod roles;

/// Lifecycle events and the bundled sinks.
pub mod callback;

// ============================================================================
// Infrastructure
// ============================================================================

/// Host and group inventory.
pub mod inventory;

/// Bundled runners.
pub mod runner;

/// Layered configuration (files, environment).
pub mod config;

pub use error::{Error, Result, RunFailure};
pub use traits::{EventSink, Inventory, RunOptions, Runner};

/// Returns the current version of Choreo.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Returns detailed version information including build metadata.
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION"),
        target: std::env::consts::ARCH,
        profile: if cfg!(debug_assertions) {
            "debug"
        } else {
            "release"
        },
    }
}

/// Version information for the Choreo build.
#[derive(Debug, Clone)]
pub struct VersionInfo {
    /// Semantic version string
    pub version: &'static str,
    /// Target architecture
    pub target: &'static str,
    /// Build profile (debug or release)
    pub profile: &'static str,
}

impl std::fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "choreo {} ({}, {})", self.version, self.target, self.profile)
    }
}
