//! Bundled runners.
//!
//! Transports live outside this crate. [`DryRunner`] lets the launcher walk
//! a playbook end to end: it records every invocation and reports success
//! without touching any host.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use tracing::info;

use crate::error::{Error, Result};
use crate::executor::task::{Task, TaskResult};
use crate::inventory::Host;
use crate::traits::{RunOptions, Runner};
use crate::vars::{substitute_value, Vars};

/// One recorded runner call.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// Task name
    pub task: String,
    /// Module name
    pub module: String,
    /// Target host names, in call order
    pub hosts: Vec<String>,
    /// Arguments after variable substitution
    pub args: JsonValue,
}

/// Runner that records what would run and succeeds without side effects.
#[derive(Debug, Default)]
pub struct DryRunner {
    invocations: Mutex<Vec<Invocation>>,
}

impl DryRunner {
    /// Create a new dry runner
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call made so far
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().clone()
    }

    fn facts(host: &Host) -> Vec<(&'static str, JsonValue)> {
        vec![
            ("inventory_hostname", JsonValue::from(host.name.clone())),
            ("address", JsonValue::from(host.address())),
            ("connection", JsonValue::from(host.connection.connection.to_string())),
        ]
    }
}

#[async_trait]
impl Runner for DryRunner {
    async fn run(
        &self,
        task: &Task,
        hosts: &[Host],
        vars: &Vars,
        options: &RunOptions,
    ) -> Result<Vec<TaskResult>> {
        if options.cancel.is_cancelled() {
            return Err(Error::runner(task.display_name(), "cancelled"));
        }

        let args = JsonValue::Object(task.args.clone().into_iter().collect());
        let args = substitute_value(&args, vars);
        let names: Vec<String> = hosts.iter().map(|h| h.name.clone()).collect();
        info!(
            "[dry-run] {} ({}) on {}",
            task.display_name(),
            task.module,
            names.join(", ")
        );

        self.invocations.lock().push(Invocation {
            task: task.display_name().to_string(),
            module: task.module.clone(),
            hosts: names,
            args: args.clone(),
        });

        let now = Utc::now();
        Ok(hosts
            .iter()
            .map(|host| {
                let mut result = TaskResult::ok(&host.name, task.display_name())
                    .with_msg(format!("would run {}", task.module))
                    .with_timing(now, Utc::now());
                if task.module == "setup" {
                    for (key, value) in Self::facts(host) {
                        result = result.with_data(key, value);
                    }
                } else {
                    result = result.with_data("args", args.clone());
                }
                result
            })
            .collect())
    }
}
