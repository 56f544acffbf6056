//! Task execution unit
//!
//! Decides, for one task and one candidate host set, whether the task runs,
//! how many times, and on which hosts, then hands each invocation to the
//! runner. Decision order:
//!
//! 1. `when` false: skip (no result, no runner call)
//! 2. `loop`: one invocation per item against every candidate host
//! 3. `delegate_to`: one invocation against the named inventory host
//! 4. `run_once`: one invocation against the first candidate host
//! 5. otherwise: one invocation against every candidate host

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use tracing::{debug, instrument, warn};

use crate::callback::{Event, EventKind};
use crate::error::{Error, Result, RunFailure};
use crate::executor::condition::Condition;
use crate::executor::task::{Task, TaskResult};
use crate::executor::Executor;
use crate::inventory::Host;
use crate::vars::{merge, substitute, Vars};

impl Executor {
    /// Execute `task` against `hosts`, appending its results.
    ///
    /// Failed results are appended before the failure is returned, so the
    /// caller always sees how far the task got.
    #[instrument(skip_all, fields(task = %task.display_name()))]
    pub(crate) async fn run_task(
        &self,
        play: &str,
        task: &Task,
        hosts: &[Host],
        scope: &Vars,
        results: &mut Vec<TaskResult>,
    ) -> Result<()> {
        let name = task.display_name();
        let task_scope = merge(&[scope, &task.vars]);
        let hosts = unique_hosts(hosts);

        if let Some(condition) = &task.when {
            if !self.evaluate(condition, &task_scope)? {
                debug!("Skipping task '{}': condition '{}' is false", name, condition);
                self.events
                    .emit(Event::new(EventKind::TaskSkipped).play(play).task(name));
                return Ok(());
            }
        }

        if let Some(source) = &task.loop_items {
            let items = source.resolve(&task_scope);
            debug!("Task '{}' loops over {} items", name, items.len());

            for (index, item) in items.iter().enumerate() {
                let iteration = task.iteration(item, index);
                let iteration_scope = merge(&[scope, &iteration.vars]);
                let outcome = self.invoke(play, &iteration, &hosts, &iteration_scope).await;
                let (error, mut batch) = match outcome {
                    Ok(batch) => (None, batch),
                    Err(failure) => {
                        let (error, batch) = failure.into_parts();
                        (Some(error), batch)
                    }
                };
                for result in &mut batch {
                    result.item = Some(item.clone());
                    result.item_index = Some(index);
                }
                if let Some(error) = error {
                    results.extend(batch);
                    return Err(error);
                }
                self.settle(task, batch, results)?;
            }
            return Ok(());
        }

        let targets = if let Some(delegate) = &task.delegate_to {
            let delegate = substitute(delegate, &task_scope);
            let host = self
                .inventory
                .get_host(&delegate)
                .map_err(|_| Error::DelegateNotFound {
                    task: name.to_string(),
                    host: delegate.clone(),
                })?;
            debug!("Task '{}' delegated to '{}'", name, host.name);
            vec![host]
        } else if task.run_once {
            match hosts.first() {
                Some(first) => vec![first.clone()],
                None => {
                    debug!("Task '{}' is run_once with no candidate hosts", name);
                    return Ok(());
                }
            }
        } else {
            hosts
        };

        match self.invoke(play, task, &targets, &task_scope).await {
            Ok(batch) => self.settle(task, batch, results),
            Err(failure) => {
                let (error, batch) = failure.into_parts();
                results.extend(batch);
                Err(error)
            }
        }
    }

    /// Append a batch and apply the `ignore_errors` policy.
    fn settle(
        &self,
        task: &Task,
        mut batch: Vec<TaskResult>,
        results: &mut Vec<TaskResult>,
    ) -> Result<()> {
        let failure = batch
            .iter()
            .find(|r| r.is_failed())
            .map(|r| Error::task_failed(task.display_name(), &r.host, r.failure_message()));

        match failure {
            Some(error) if task.ignore_errors && error.is_recoverable() => {
                warn!("{} (ignored)", error);
                for result in batch.iter_mut().filter(|r| r.is_failed()) {
                    result.ignored = true;
                }
                results.extend(batch);
                Ok(())
            }
            Some(error) => {
                results.extend(batch);
                Err(error)
            }
            None => {
                results.extend(batch);
                Ok(())
            }
        }
    }

    /// One logical invocation: runner call, retries, events.
    ///
    /// Runner errors become failed results for every target. An `until`
    /// condition that cannot be evaluated fails every result still passing
    /// and is returned together with the batch.
    pub(crate) async fn invoke(
        &self,
        play: &str,
        task: &Task,
        targets: &[Host],
        scope: &Vars,
    ) -> std::result::Result<Vec<TaskResult>, RunFailure> {
        if targets.is_empty() {
            return Ok(Vec::new());
        }

        let name = task.display_name();
        self.events
            .emit(Event::new(EventKind::TaskStart).play(play).task(name));

        let mut batch = self.call_runner(task, targets, scope).await;
        let mut condition_error = None;
        if let Some(until) = &task.until {
            if let Err(e) = self.retry_until(task, until, targets, scope, &mut batch).await {
                warn!("Task '{}': {}", name, e);
                for result in batch.iter_mut().filter(|r| !r.is_failed()) {
                    result.success = false;
                    result.error = Some(e.to_string());
                }
                condition_error = Some(e);
            }
        }

        for result in &batch {
            let event = if result.is_failed() {
                Event::new(EventKind::TaskFailed).error(result.failure_message())
            } else {
                Event::new(EventKind::TaskComplete)
            };
            self.events.emit(event.play(play).task(name).host(&result.host));
        }

        match condition_error {
            Some(error) => Err(RunFailure::new(error, batch)),
            None => Ok(batch),
        }
    }

    async fn call_runner(&self, task: &Task, targets: &[Host], scope: &Vars) -> Vec<TaskResult> {
        let name = task.display_name();
        let options = self.run_options(task);
        let started = Utc::now();

        let outcome = self
            .runner
            .run(task, targets, scope, &options)
            .await
            .map_err(|e| e.to_string())
            .and_then(|returned| order_by_hosts(returned, targets));

        match outcome {
            Ok(ordered) => ordered,
            Err(message) => {
                warn!("Runner failed for task '{}': {}", name, message);
                let ended = Utc::now();
                targets
                    .iter()
                    .map(|host| {
                        TaskResult::failed(&host.name, name, &message).with_timing(started, ended)
                    })
                    .collect()
            }
        }
    }

    /// Re-run hosts whose `until` condition does not hold yet.
    ///
    /// `batch` is updated in place, so it holds the latest attempt on every
    /// host even when the condition fails to evaluate.
    async fn retry_until(
        &self,
        task: &Task,
        until: &Condition,
        targets: &[Host],
        scope: &Vars,
        batch: &mut [TaskResult],
    ) -> Result<()> {
        let retries = task.effective_retries();
        let delay = task.effective_delay();
        let mut attempts = vec![1u32; batch.len()];
        let mut retried = 0;
        let mut outcome = Ok(());

        loop {
            let mut pending = Vec::new();
            for (index, result) in batch.iter().enumerate() {
                match self.until_holds(until, scope, result) {
                    Ok(true) => {}
                    Ok(false) => pending.push(index),
                    Err(e) => {
                        outcome = Err(e);
                        break;
                    }
                }
            }

            if outcome.is_err() || pending.is_empty() {
                break;
            }

            if retried >= retries {
                for index in pending {
                    let result = &mut batch[index];
                    result.success = false;
                    result.error = Some(format!(
                        "condition '{}' not met after {} attempts",
                        until, attempts[index]
                    ));
                }
                break;
            }

            retried += 1;
            debug!(
                "Retrying task '{}' on {} hosts ({}/{})",
                task.display_name(),
                pending.len(),
                retried,
                retries
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.cancel.cancelled() => {}
            }

            let retry_hosts: Vec<Host> = pending.iter().map(|&i| targets[i].clone()).collect();
            let retried_batch = self.call_runner(task, &retry_hosts, scope).await;
            for (index, result) in pending.into_iter().zip(retried_batch) {
                batch[index] = result;
                attempts[index] += 1;
            }
        }

        for (result, attempts) in batch.iter_mut().zip(attempts) {
            result.data.insert("attempts".to_string(), attempts.into());
        }
        outcome
    }

    fn until_holds(&self, until: &Condition, scope: &Vars, result: &TaskResult) -> Result<bool> {
        let mut result_scope = scope.clone();
        result_scope.insert("result".to_string(), result.to_value());
        self.evaluate(until, &result_scope)
    }
}

/// Drop repeated host names, first occurrence wins.
fn unique_hosts(hosts: &[Host]) -> Vec<Host> {
    let mut seen = HashSet::new();
    hosts
        .iter()
        .filter(|host| seen.insert(host.name.as_str()))
        .cloned()
        .collect()
}

/// Match runner results to `targets`, one per host, in target order.
fn order_by_hosts(
    returned: Vec<TaskResult>,
    targets: &[Host],
) -> std::result::Result<Vec<TaskResult>, String> {
    if returned.len() != targets.len() {
        return Err(format!(
            "runner returned {} results for {} hosts",
            returned.len(),
            targets.len()
        ));
    }

    let mut by_host: HashMap<String, TaskResult> =
        returned.into_iter().map(|r| (r.host.clone(), r)).collect();

    targets
        .iter()
        .map(|host| {
            by_host
                .remove(&host.name)
                .ok_or_else(|| format!("runner returned no result for host '{}'", host.name))
        })
        .collect()
}
