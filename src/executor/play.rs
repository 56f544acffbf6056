//! Play executor
//!
//! Per play: resolve hosts, then for each serial batch run
//! `pre_tasks -> facts -> roles -> tasks -> post_tasks -> handlers`.
//! A task failure not contained by `ignore_errors` halts the play and
//! handlers do not run.

use std::collections::{HashMap, HashSet};

use serde_json::Value as JsonValue;
use tracing::{debug, info, instrument, warn};

use crate::callback::{Event, EventKind};
use crate::error::{Error, Result};
use crate::executor::playbook::{Play, Strategy};
use crate::executor::task::{Task, TaskResult};
use crate::executor::Executor;
use crate::inventory::Host;
use crate::roles::Role;
use crate::vars::{is_truthy, merge, Vars};

/// Tag that bypasses the `tags` filter.
const ALWAYS_TAG: &str = "always";

/// A role scheduled for a play, with what it inherits from its dependents.
struct RolePlan<'a> {
    role: &'a Role,
    params: Vars,
    tags: Vec<String>,
}

/// Notification name to the hosts it was raised for.
type Notifications = HashMap<String, HashSet<String>>;

impl Executor {
    #[instrument(skip_all, fields(play = %play.name))]
    pub(crate) async fn run_play(
        &self,
        play: &Play,
        global: &Vars,
        results: &mut Vec<TaskResult>,
    ) -> Result<()> {
        info!("Starting play: {}", play.name);
        self.events
            .emit(Event::new(EventKind::PlayStart).play(&play.name));

        match self.run_play_batches(play, global, results).await {
            Ok(()) => {
                info!("Play completed: {}", play.name);
                self.events
                    .emit(Event::new(EventKind::PlayComplete).play(&play.name));
                Ok(())
            }
            Err(e) => {
                self.events
                    .emit(Event::new(EventKind::Error).play(&play.name).error(&e));
                Err(e)
            }
        }
    }

    async fn run_play_batches(
        &self,
        play: &Play,
        global: &Vars,
        results: &mut Vec<TaskResult>,
    ) -> Result<()> {
        let hosts = self.resolve_hosts(play)?;
        if hosts.is_empty() {
            warn!("No hosts matched for play: {}", play.name);
            return Ok(());
        }
        debug!("Play '{}' targets {} hosts", play.name, hosts.len());

        let strategy = match &play.strategy {
            Strategy::Linear => &self.config.strategy,
            other => other,
        };
        if let Strategy::Other(name) = strategy {
            warn!(
                "Strategy '{}' is not supported, running play '{}' linearly",
                name, play.name
            );
        }

        let roles = self.plan_roles(play)?;

        let batch_size = play.serial.filter(|n| *n > 0).unwrap_or(hosts.len());
        for (index, batch) in hosts.chunks(batch_size).enumerate() {
            if play.serial.is_some() {
                info!(
                    "Play '{}' batch {} ({} hosts)",
                    play.name,
                    index + 1,
                    batch.len()
                );
            }
            self.run_batch(play, batch, global, &roles, results).await?;
        }
        Ok(())
    }

    async fn run_batch(
        &self,
        play: &Play,
        hosts: &[Host],
        global: &Vars,
        roles: &[RolePlan<'_>],
        results: &mut Vec<TaskResult>,
    ) -> Result<()> {
        let mut notified = Notifications::new();

        let pre_scope = merge(&[global, &play.vars]);
        self.run_phase(play, &play.pre_tasks, hosts, &pre_scope, &[], &mut notified, results)
            .await?;

        let facts = if self.gather_enabled(play, &pre_scope) {
            self.gather_facts(&play.name, hosts, &pre_scope).await?
        } else {
            debug!("Fact gathering disabled for play '{}'", play.name);
            Vars::new()
        };
        let scope = merge(&[global, &facts, &play.vars]);

        let mut handlers: Vec<(&Task, Vars)> =
            play.handlers.iter().map(|h| (h, scope.clone())).collect();

        for plan in roles {
            let role = plan.role;
            debug!("Applying role '{}'", role.name);
            let role_scope = merge(&[&role.defaults, &scope, &role.vars, &plan.params]);
            self.run_phase(play, &role.tasks, hosts, &role_scope, &plan.tags, &mut notified, results)
                .await?;
            handlers.extend(role.handlers.iter().map(|h| (h, role_scope.clone())));
        }

        self.run_phase(play, &play.tasks, hosts, &scope, &[], &mut notified, results)
            .await?;
        self.run_phase(play, &play.post_tasks, hosts, &scope, &[], &mut notified, results)
            .await?;

        self.run_handlers(&play.name, &handlers, hosts, &notified, results)
            .await
    }

    /// Run one task list in order, collecting handler notifications.
    #[allow(clippy::too_many_arguments)]
    async fn run_phase(
        &self,
        play: &Play,
        tasks: &[Task],
        hosts: &[Host],
        scope: &Vars,
        inherited_tags: &[String],
        notified: &mut Notifications,
        results: &mut Vec<TaskResult>,
    ) -> Result<()> {
        for task in tasks {
            if !self.selected(task, inherited_tags) {
                debug!("Task '{}' filtered out by tags", task.display_name());
                continue;
            }
            let start = results.len();
            self.run_task(&play.name, task, hosts, scope, results).await?;
            self.record_notifications(&play.name, task, &results[start..], notified);
        }
        Ok(())
    }

    fn record_notifications(
        &self,
        play: &str,
        task: &Task,
        new_results: &[TaskResult],
        notified: &mut Notifications,
    ) {
        if task.notify.is_empty() {
            return;
        }
        for result in new_results.iter().filter(|r| r.success && r.changed) {
            for name in &task.notify {
                if notified
                    .entry(name.clone())
                    .or_default()
                    .insert(result.host.clone())
                {
                    debug!("Handler '{}' notified for host '{}'", name, result.host);
                    self.events.emit(
                        Event::new(EventKind::HandlerNotified)
                            .play(play)
                            .task(name)
                            .host(&result.host),
                    );
                }
            }
        }
    }

    /// Run every notified handler once, in declaration order.
    async fn run_handlers(
        &self,
        play: &str,
        handlers: &[(&Task, Vars)],
        hosts: &[Host],
        notified: &Notifications,
        results: &mut Vec<TaskResult>,
    ) -> Result<()> {
        if notified.is_empty() {
            return Ok(());
        }

        let mut ran = HashSet::new();
        for (handler, scope) in handlers {
            let targets: Vec<Host> = hosts
                .iter()
                .filter(|host| {
                    notified
                        .iter()
                        .any(|(name, set)| handler.answers_to(name) && set.contains(&host.name))
                })
                .cloned()
                .collect();

            if targets.is_empty() || !ran.insert(handler.display_name()) {
                continue;
            }

            info!(
                "Running handler '{}' on {} hosts",
                handler.display_name(),
                targets.len()
            );
            self.run_task(play, handler, &targets, scope, results).await?;
        }
        Ok(())
    }

    /// De-duplicated union of every host pattern token, first occurrence wins.
    fn resolve_hosts(&self, play: &Play) -> Result<Vec<Host>> {
        let mut seen = HashSet::new();
        let mut hosts = Vec::new();
        for pattern in play.host_patterns() {
            for host in self.inventory.get_hosts(pattern)? {
                if seen.insert(host.name.clone()) {
                    hosts.push(host);
                }
            }
        }
        Ok(hosts)
    }

    /// Order the play's roles and bind dependency and play parameters.
    fn plan_roles<'a>(&'a self, play: &Play) -> Result<Vec<RolePlan<'a>>> {
        if play.roles.is_empty() {
            return Ok(Vec::new());
        }

        let order = self
            .roles
            .resolve_from(play.roles.iter().map(|r| r.role.as_str()))?;
        let mut bindings = self.roles.bindings(&order);

        let plans = order
            .into_iter()
            .map(|role| {
                let binding = bindings.remove(&role.name).unwrap_or_default();
                let play_params: Vec<&Vars> = play
                    .roles
                    .iter()
                    .filter(|r| r.role == role.name)
                    .map(|r| &r.vars)
                    .collect();
                let mut layers = vec![&binding.vars];
                layers.extend(play_params);
                RolePlan {
                    role,
                    params: merge(&layers),
                    tags: binding.tags.clone(),
                }
            })
            .collect::<Vec<_>>();

        debug!(
            "Play '{}' applies roles: {}",
            play.name,
            plans
                .iter()
                .map(|p| p.role.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(plans)
    }

    fn gather_enabled(&self, play: &Play, scope: &Vars) -> bool {
        play.gather_facts.unwrap_or_else(|| {
            scope
                .get("gather_facts")
                .map(is_truthy)
                .unwrap_or(self.config.gather_facts)
        })
    }

    /// Run the `setup` module and expose its data as `hostvars.<host>`.
    async fn gather_facts(&self, play: &str, hosts: &[Host], scope: &Vars) -> Result<Vars> {
        debug!("Gathering facts for {} hosts", hosts.len());
        let setup = Task::new("Gathering Facts", "setup");
        let batch = self
            .invoke(play, &setup, hosts, scope)
            .await
            .map_err(|failure| failure.error)?;

        let mut hostvars = serde_json::Map::new();
        for result in batch {
            if result.is_failed() {
                return Err(Error::FactGathering {
                    message: result.failure_message(),
                    host: result.host,
                });
            }
            hostvars.insert(result.host, JsonValue::Object(result.data.into_iter().collect()));
        }

        let mut facts = Vars::new();
        facts.insert("hostvars".to_string(), JsonValue::Object(hostvars));
        Ok(facts)
    }

    fn selected(&self, task: &Task, inherited_tags: &[String]) -> bool {
        let tags: Vec<&str> = task
            .tags
            .iter()
            .chain(inherited_tags)
            .map(String::as_str)
            .collect();

        if self.config.skip_tags.iter().any(|t| tags.contains(&t.as_str())) {
            return false;
        }
        self.config.tags.is_empty()
            || tags.contains(&ALWAYS_TAG)
            || self.config.tags.iter().any(|t| tags.contains(&t.as_str()))
    }
}
