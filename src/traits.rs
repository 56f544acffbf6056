//! Collaborator contracts consumed by the Choreo orchestration core.
//!
//! The core decides *what* runs *where* and in which order. Everything that
//! touches the outside world sits behind one of these traits and is
//! injected into the executor at construction:
//!
//! - [`Runner`] executes one task against a host set
//! - [`Inventory`] resolves host patterns and single hosts
//! - [`EventSink`] receives lifecycle events

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::callback::Event;
use crate::error::Result;
use crate::executor::task::{Task, TaskResult};
use crate::inventory::Host;
use crate::vars::Vars;

// ============================================================================
// Runner
// ============================================================================

/// Options threaded through every Runner call.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Per-invocation timeout; enforced by the runner, never by the core
    pub timeout: Option<Duration>,
    /// Report what would change without changing it
    pub check_mode: bool,
    /// Ambient cancellation; a cancelled runner should return an error promptly
    pub cancel: CancellationToken,
}

/// Executes one task definition against a host set.
///
/// On success the runner returns exactly one [`TaskResult`] per host. The
/// order is unspecified; the core reorders results to match `hosts`.
/// Concurrency across hosts is the runner's business.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use choreo::prelude::*;
///
/// #[derive(Debug)]
/// struct EchoRunner;
///
/// #[async_trait]
/// impl Runner for EchoRunner {
///     async fn run(
///         &self,
///         task: &Task,
///         hosts: &[Host],
///         _vars: &Vars,
///         _options: &RunOptions,
///     ) -> Result<Vec<TaskResult>> {
///         Ok(hosts
///             .iter()
///             .map(|h| TaskResult::ok(&h.name, task.display_name()))
///             .collect())
///     }
/// }
/// ```
#[async_trait]
pub trait Runner: Send + Sync + Debug {
    /// Run `task` on every host in `hosts` with the given scope.
    async fn run(
        &self,
        task: &Task,
        hosts: &[Host],
        vars: &Vars,
        options: &RunOptions,
    ) -> Result<Vec<TaskResult>>;
}

// ============================================================================
// Inventory
// ============================================================================

/// Resolves host patterns and single hosts.
pub trait Inventory: Send + Sync {
    /// Hosts matched by one pattern token, in inventory order.
    fn get_hosts(&self, pattern: &str) -> Result<Vec<Host>>;

    /// A single host by name (used for delegation).
    fn get_host(&self, name: &str) -> Result<Host>;
}

// ============================================================================
// Events
// ============================================================================

/// Receives lifecycle events.
///
/// Delivery is synchronous and best-effort. A sink must return promptly;
/// the core does not guard against a sink that blocks.
pub trait EventSink: Send + Sync {
    /// Called for every emitted event.
    fn on_event(&self, event: &Event);
}
