//! Core orchestration engine for Choreo
//!
//! This module provides the sequential execution engine with:
//! - Playbook executor (plays in document order, shared baseline scope)
//! - Play executor (pre_tasks, facts, roles, tasks, post_tasks, handlers)
//! - Task execution unit (when, loop, delegation, run_once, retries)
//!
//! The core never runs anything itself. Every invocation is handed to the
//! injected [`Runner`]; hosts come from the injected [`Inventory`]; events
//! go to the sinks on the executor's [`EventBus`].

pub mod condition;
pub mod dispatch;
pub mod play;
pub mod playbook;
pub mod task;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::callback::{Event, EventBus, EventKind};
use crate::error::{Error, Result, RunFailure};
use crate::executor::condition::{Condition, ConditionEvaluator, LiteralEvaluator};
use crate::executor::playbook::{Playbook, Strategy};
use crate::executor::task::TaskResult;
use crate::roles::{DependencyResolver, Role};
use crate::traits::{EventSink, Inventory, RunOptions, Runner};
use crate::vars::{merge, Vars};

pub use playbook::Play;
pub use task::Task;

/// Configuration for the executor
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorConfig {
    /// Gather facts when neither the play nor the scope decides
    pub gather_facts: bool,
    /// Strategy applied to plays that do not name one
    pub strategy: Strategy,
    /// Default per-task timeout passed to the runner
    pub task_timeout: Option<Duration>,
    /// Ask the runner not to make changes
    pub check_mode: bool,
    /// Reject condition expressions the evaluator does not understand
    pub strict_conditions: bool,
    /// Only run tasks carrying one of these tags (empty: run everything)
    pub tags: Vec<String>,
    /// Never run tasks carrying one of these tags
    pub skip_tags: Vec<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            gather_facts: true,
            strategy: Strategy::Linear,
            task_timeout: None,
            check_mode: false,
            strict_conditions: true,
            tags: Vec::new(),
            skip_tags: Vec::new(),
        }
    }
}

/// The orchestration engine.
///
/// Holds its collaborators explicitly; there is no global state. One
/// executor may run any number of playbooks, one at a time.
pub struct Executor {
    pub(crate) config: ExecutorConfig,
    pub(crate) inventory: Arc<dyn Inventory>,
    pub(crate) runner: Arc<dyn Runner>,
    pub(crate) events: EventBus,
    pub(crate) roles: DependencyResolver,
    evaluator: Option<Arc<dyn ConditionEvaluator>>,
    cancel: CancellationToken,
}

/// Alias kept for callers that think in terms of playbooks.
pub type PlaybookExecutor = Executor;

impl Executor {
    /// Create an executor over an inventory and a runner
    pub fn new(inventory: Arc<dyn Inventory>, runner: Arc<dyn Runner>) -> Self {
        Self {
            config: ExecutorConfig::default(),
            inventory,
            runner,
            events: EventBus::new(),
            roles: DependencyResolver::new(),
            evaluator: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the configuration
    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Register an event sink
    pub fn with_sink(self, sink: Arc<dyn EventSink>) -> Self {
        self.events.register(sink);
        self
    }

    /// Use a custom condition evaluator instead of the literal one
    pub fn with_evaluator(mut self, evaluator: Arc<dyn ConditionEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Make roles available to plays
    pub fn with_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        for role in roles {
            self.roles.add_role(role);
        }
        self
    }

    /// Share an external cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Current configuration
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// The event bus, for registering sinks after construction
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// The registered roles
    pub fn roles(&self) -> &DependencyResolver {
        &self.roles
    }

    /// Cancel in-flight and future runner calls
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token carried into every runner call
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub(crate) fn evaluate(&self, condition: &Condition, scope: &Vars) -> Result<bool> {
        match &self.evaluator {
            Some(evaluator) => evaluator.evaluate(condition, scope),
            None => LiteralEvaluator {
                strict: self.config.strict_conditions,
            }
            .evaluate(condition, scope),
        }
    }

    pub(crate) fn run_options(&self, task: &Task) -> RunOptions {
        RunOptions {
            timeout: task.timeout.or(self.config.task_timeout),
            check_mode: self.config.check_mode,
            cancel: self.cancel.clone(),
        }
    }

    /// Run a complete playbook.
    ///
    /// Playbook vars are merged with `extra_vars` (extra vars win) into the
    /// baseline scope of every play. The first failing play stops the run;
    /// the returned [`RunFailure`] carries every result produced so far.
    #[instrument(skip(self, playbook, extra_vars), fields(playbook = %playbook.name))]
    pub async fn execute(
        &self,
        playbook: &Playbook,
        extra_vars: &Vars,
    ) -> std::result::Result<Vec<TaskResult>, RunFailure> {
        if let Err(e) = playbook.validate() {
            warn!("Rejected playbook '{}': {}", playbook.name, e);
            self.events
                .emit(Event::new(EventKind::Error).playbook(&playbook.name).error(&e));
            return Err(RunFailure::new(e, Vec::new()));
        }

        info!("Starting playbook: {}", playbook.name);
        self.events
            .emit(Event::new(EventKind::PlaybookStart).playbook(&playbook.name));

        let global = merge(&[&playbook.vars, extra_vars]);
        let mut results = Vec::new();

        for play in &playbook.plays {
            if let Err(e) = self.run_play(play, &global, &mut results).await {
                let error = Error::PlayFailed {
                    play: play.name.clone(),
                    source: Box::new(e),
                };
                self.events.emit(
                    Event::new(EventKind::PlaybookComplete)
                        .playbook(&playbook.name)
                        .error(&error),
                );
                return Err(RunFailure::new(error, results));
            }
        }

        info!(
            "Playbook completed: {} ({} results)",
            playbook.name,
            results.len()
        );
        self.events
            .emit(Event::new(EventKind::PlaybookComplete).playbook(&playbook.name));
        Ok(results)
    }

    /// Run a single play against a baseline scope.
    pub async fn execute_play(
        &self,
        play: &Play,
        vars: &Vars,
    ) -> std::result::Result<Vec<TaskResult>, RunFailure> {
        let mut results = Vec::new();
        match self.run_play(play, vars, &mut results).await {
            Ok(()) => Ok(results),
            Err(e) => Err(RunFailure::new(e, results)),
        }
    }

    /// Run one task against a candidate host set.
    pub async fn execute_task(
        &self,
        task: &Task,
        hosts: &[crate::inventory::Host],
        scope: &Vars,
    ) -> std::result::Result<Vec<TaskResult>, RunFailure> {
        let mut results = Vec::new();
        match self.run_task("", task, hosts, scope, &mut results).await {
            Ok(()) => Ok(results),
            Err(e) => Err(RunFailure::new(e, results)),
        }
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("config", &self.config)
            .field("runner", &self.runner)
            .field("events", &self.events)
            .field("roles", &self.roles.len())
            .finish()
    }
}
