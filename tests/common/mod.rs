//! Shared test utilities and fixtures for the Choreo test suite.
//!
//! This module provides:
//! - `MockRunner`: records every invocation and scripts failures,
//!   changes, runner errors and eventual success for retries
//! - `MockInventory`: a static host list that records lookups
//! - Builders for executors wired to the mocks
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value as JsonValue;

use choreo::callback::RecordingSink;
use choreo::error::{Error, Result};
use choreo::executor::task::{Task, TaskResult};
use choreo::executor::{Executor, ExecutorConfig};
use choreo::inventory::{Host, StaticInventory};
use choreo::traits::{Inventory, RunOptions, Runner};
use choreo::vars::Vars;

// ============================================================================
// Mock Runner
// ============================================================================

/// One recorded runner call
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub task: String,
    pub module: String,
    pub hosts: Vec<String>,
    pub vars: Vars,
    pub options_timeout: Option<std::time::Duration>,
}

impl RecordedCall {
    /// Scope value seen by the runner
    pub fn var(&self, name: &str) -> Option<&JsonValue> {
        self.vars.get(name)
    }
}

/// Scriptable runner recording every call
#[derive(Debug, Default)]
pub struct MockRunner {
    calls: RwLock<Vec<RecordedCall>>,
    failing: RwLock<HashMap<String, HashSet<String>>>,
    changing: RwLock<HashSet<String>>,
    erroring: RwLock<HashSet<String>>,
    short_results: RwLock<HashSet<String>>,
    ready_after: RwLock<HashMap<String, u32>>,
    attempts: RwLock<HashMap<(String, String), u32>>,
    facts: RwLock<HashMap<String, Vars>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail `task` on `host`
    pub fn fail_on(&self, task: &str, host: &str) -> &Self {
        self.failing
            .write()
            .entry(task.to_string())
            .or_default()
            .insert(host.to_string());
        self
    }

    /// Report `task` as changed on every host
    pub fn change(&self, task: &str) -> &Self {
        self.changing.write().insert(task.to_string());
        self
    }

    /// Return an error (instead of results) for `task`
    pub fn error_on(&self, task: &str) -> &Self {
        self.erroring.write().insert(task.to_string());
        self
    }

    /// Return one result fewer than the number of hosts for `task`
    pub fn short_results(&self, task: &str) -> &Self {
        self.short_results.write().insert(task.to_string());
        self
    }

    /// Set `data.ready` true from the n-th attempt of `task` on each host
    pub fn ready_after(&self, task: &str, attempts: u32) -> &Self {
        self.ready_after.write().insert(task.to_string(), attempts);
        self
    }

    /// Facts returned by the `setup` module for `host`
    pub fn with_facts(&self, host: &str, facts: Vars) -> &Self {
        self.facts.write().insert(host.to_string(), facts);
        self
    }

    /// Every call, in order
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.read().clone()
    }

    /// Calls for one task name
    pub fn calls_for(&self, task: &str) -> Vec<RecordedCall> {
        self.calls
            .read()
            .iter()
            .filter(|c| c.task == task)
            .cloned()
            .collect()
    }

    /// Number of calls excluding fact gathering
    pub fn task_call_count(&self) -> usize {
        self.calls.read().iter().filter(|c| c.module != "setup").count()
    }

    /// Task names in call order, excluding fact gathering
    pub fn task_order(&self) -> Vec<String> {
        self.calls
            .read()
            .iter()
            .filter(|c| c.module != "setup")
            .map(|c| c.task.clone())
            .collect()
    }
}

#[async_trait]
impl Runner for MockRunner {
    async fn run(
        &self,
        task: &Task,
        hosts: &[Host],
        vars: &Vars,
        options: &RunOptions,
    ) -> Result<Vec<TaskResult>> {
        let name = task.display_name().to_string();
        self.calls.write().push(RecordedCall {
            task: name.clone(),
            module: task.module.clone(),
            hosts: hosts.iter().map(|h| h.name.clone()).collect(),
            vars: vars.clone(),
            options_timeout: options.timeout,
        });

        if options.cancel.is_cancelled() {
            return Err(Error::runner(&name, "cancelled"));
        }
        if self.erroring.read().contains(&name) {
            return Err(Error::runner(&name, "connection reset"));
        }

        let failing = self.failing.read().get(&name).cloned().unwrap_or_default();
        let changed = self.changing.read().contains(&name);
        let ready_after = self.ready_after.read().get(&name).copied();

        let mut results: Vec<TaskResult> = hosts
            .iter()
            .map(|host| {
                let attempt = {
                    let mut attempts = self.attempts.write();
                    let count = attempts.entry((name.clone(), host.name.clone())).or_insert(0);
                    *count += 1;
                    *count
                };

                let mut result = if failing.contains(&host.name) {
                    TaskResult::failed(&host.name, &name, format!("{} failed on {}", name, host.name))
                } else if changed {
                    TaskResult::changed(&host.name, &name)
                } else {
                    TaskResult::ok(&host.name, &name)
                };

                if task.module == "setup" {
                    if let Some(facts) = self.facts.read().get(&host.name) {
                        for (key, value) in facts {
                            result = result.with_data(key.clone(), value.clone());
                        }
                    }
                }
                if let Some(n) = ready_after {
                    result = result.with_data("ready", attempt >= n);
                }
                result
            })
            .collect();

        // runners may answer in any order
        results.reverse();
        if self.short_results.read().contains(&name) {
            results.pop();
        }
        Ok(results)
    }
}

// ============================================================================
// Mock Inventory
// ============================================================================

/// Inventory over a fixed host list; records every pattern lookup
#[derive(Debug, Default)]
pub struct MockInventory {
    inner: StaticInventory,
    lookups: RwLock<Vec<String>>,
}

impl MockInventory {
    pub fn new(hosts: &[&str]) -> Self {
        Self {
            inner: StaticInventory::from_hosts(hosts.iter().map(|h| Host::new(*h))),
            lookups: RwLock::new(Vec::new()),
        }
    }

    pub fn from_static(inner: StaticInventory) -> Self {
        Self {
            inner,
            lookups: RwLock::new(Vec::new()),
        }
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.read().clone()
    }
}

impl Inventory for MockInventory {
    fn get_hosts(&self, pattern: &str) -> Result<Vec<Host>> {
        self.lookups.write().push(pattern.to_string());
        self.inner.get_hosts(pattern)
    }

    fn get_host(&self, name: &str) -> Result<Host> {
        self.inner.get_host(name)
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Executor configuration with fact gathering disabled
pub fn quiet_config() -> ExecutorConfig {
    ExecutorConfig {
        gather_facts: false,
        ..Default::default()
    }
}

/// Everything a test needs to drive an executor and inspect what happened
pub struct Harness {
    pub executor: Executor,
    pub runner: Arc<MockRunner>,
    pub inventory: Arc<MockInventory>,
    pub events: Arc<RecordingSink>,
}

impl Harness {
    /// Executor over `hosts` with facts disabled
    pub fn new(hosts: &[&str]) -> Self {
        Self::with_config(hosts, quiet_config())
    }

    pub fn with_config(hosts: &[&str], config: ExecutorConfig) -> Self {
        Self::from_inventory(MockInventory::new(hosts), config)
    }

    pub fn from_inventory(inventory: MockInventory, config: ExecutorConfig) -> Self {
        let runner = Arc::new(MockRunner::new());
        let inventory = Arc::new(inventory);
        let events = Arc::new(RecordingSink::new());
        let executor = Executor::new(inventory.clone(), runner.clone())
            .with_config(config)
            .with_sink(events.clone());
        Self {
            executor,
            runner,
            inventory,
            events,
        }
    }
}

/// Host list from names
pub fn hosts(names: &[&str]) -> Vec<Host> {
    names.iter().map(|n| Host::new(*n)).collect()
}

/// Host names of a result list, in order
pub fn result_hosts(results: &[TaskResult]) -> Vec<String> {
    results.iter().map(|r| r.host.clone()).collect()
}
