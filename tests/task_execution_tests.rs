//! Tests for the task execution unit
//!
//! Covers `when` skipping, loops, delegation, run_once, runner error
//! handling, result ordering, `ignore_errors`, retries and cancellation.

mod common;

use std::time::Duration;

use choreo::callback::EventKind;
use choreo::error::Error;
use choreo::executor::task::Task;
use choreo::vars::{vars_from, Vars};
use common::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_test::{assert_err, assert_ok};

// ============================================================================
// Skipping
// ============================================================================

#[tokio::test]
async fn test_false_condition_skips_without_runner_call() {
    let h = Harness::new(&["h1", "h2"]);
    let task = Task::new("never", "debug").when(false);

    let results = assert_ok!(h.executor.execute_task(&task, &hosts(&["h1", "h2"]), &Vars::new()).await);

    assert!(results.is_empty());
    assert_eq!(h.runner.calls().len(), 0);
    assert_eq!(h.events.count(EventKind::TaskSkipped), 1);
    assert_eq!(h.events.count(EventKind::TaskStart), 0);
}

#[tokio::test]
async fn test_condition_reads_task_vars_and_scope() {
    let h = Harness::new(&["h1"]);
    let scope = vars_from([("deploy", json!("yes"))]);

    let runs = Task::new("runs", "debug").when("{{ deploy }}");
    assert_eq!(
        assert_ok!(h.executor.execute_task(&runs, &hosts(&["h1"]), &scope).await).len(),
        1
    );

    let overridden = Task::new("overridden", "debug")
        .when("{{ deploy }}")
        .var("deploy", false);
    assert!(assert_ok!(h.executor.execute_task(&overridden, &hosts(&["h1"]), &scope).await).is_empty());
    assert_eq!(h.runner.task_order(), vec!["runs"]);
}

#[tokio::test]
async fn test_unrecognised_condition_is_an_error_when_strict() {
    let h = Harness::new(&["h1"]);
    let task = Task::new("odd", "debug").when("{{ missing }} == 3");

    let failure = assert_err!(h.executor.execute_task(&task, &hosts(&["h1"]), &Vars::new()).await);
    assert!(matches!(failure.error, Error::Condition { .. }));
    assert!(h.runner.calls().is_empty());
}

// ============================================================================
// Loops
// ============================================================================

#[tokio::test]
async fn test_loop_runs_every_item_on_every_host_in_iteration_order() {
    let h = Harness::new(&["h1", "h2"]);
    let task = Task::new("install", "package")
        .arg("name", "{{ item }}")
        .loop_over(vec![json!("git"), json!("vim"), json!("curl")]);

    let results = assert_ok!(h.executor.execute_task(&task, &hosts(&["h1", "h2"]), &Vars::new()).await);

    assert_eq!(results.len(), 6);
    assert_eq!(
        result_hosts(&results),
        vec!["h1", "h2", "h1", "h2", "h1", "h2"]
    );
    let items: Vec<_> = results.iter().map(|r| r.item.clone().unwrap()).collect();
    assert_eq!(
        items,
        vec![json!("git"), json!("git"), json!("vim"), json!("vim"), json!("curl"), json!("curl")]
    );
    assert_eq!(results[5].item_index, Some(2));

    let calls = h.runner.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[1].var("item"), Some(&json!("vim")));
    assert_eq!(calls[1].var("item_index"), Some(&json!(1)));
}

#[tokio::test]
async fn test_loop_over_variable_reference() {
    let h = Harness::new(&["h1"]);
    let scope = vars_from([("users", json!(["alice", "bob"]))]);
    let task = Task::new("add user", "user")
        .loop_ref("{{ users }}")
        .tag("users");

    let results = assert_ok!(h.executor.execute_task(&task, &hosts(&["h1"]), &scope).await);
    assert_eq!(results.len(), 2);
    assert_eq!(results[1].item, Some(json!("bob")));
}

#[tokio::test]
async fn test_custom_loop_var() {
    let h = Harness::new(&["h1"]);
    let mut task = Task::new("pkg", "package").loop_over(vec![json!("a")]);
    task.loop_var = "pkg".to_string();

    assert_ok!(h.executor.execute_task(&task, &hosts(&["h1"]), &Vars::new()).await);
    let call = &h.runner.calls()[0];
    assert_eq!(call.var("pkg"), Some(&json!("a")));
    assert_eq!(call.var("pkg_index"), Some(&json!(0)));
    assert!(call.var("item").is_none());
}

#[tokio::test]
async fn test_loop_wins_over_run_once() {
    let h = Harness::new(&["h1", "h2"]);
    let task = Task::new("looped", "debug")
        .loop_over(vec![json!(1), json!(2)])
        .run_once(true);

    let results = assert_ok!(h.executor.execute_task(&task, &hosts(&["h1", "h2"]), &Vars::new()).await);
    assert_eq!(results.len(), 4);
}

#[tokio::test]
async fn test_empty_loop_produces_nothing() {
    let h = Harness::new(&["h1"]);
    let task = Task::new("nothing", "debug").loop_over(Vec::new());

    let results = assert_ok!(h.executor.execute_task(&task, &hosts(&["h1"]), &Vars::new()).await);
    assert!(results.is_empty());
    assert!(h.runner.calls().is_empty());
}

// ============================================================================
// Targeting
// ============================================================================

#[tokio::test]
async fn test_run_once_targets_first_host() {
    let h = Harness::new(&["h1", "h2", "h3"]);
    let task = Task::new("migrate", "command").run_once(true);

    let results = assert_ok!(
        h.executor
            .execute_task(&task, &hosts(&["h2", "h1", "h3"]), &Vars::new())
            .await
    );

    assert_eq!(result_hosts(&results), vec!["h2"]);
    assert_eq!(h.runner.calls()[0].hosts, vec!["h2"]);
}

#[tokio::test]
async fn test_run_once_without_hosts_does_nothing() {
    let h = Harness::new(&["h1"]);
    let task = Task::new("migrate", "command").run_once(true);

    let results = assert_ok!(h.executor.execute_task(&task, &[], &Vars::new()).await);
    assert!(results.is_empty());
    assert!(h.runner.calls().is_empty());
}

#[tokio::test]
async fn test_delegation_targets_inventory_host() {
    let h = Harness::new(&["h1", "h2", "lb"]);
    let scope = vars_from([("balancer", json!("lb"))]);
    let task = Task::new("drain", "command").delegate_to("{{ balancer }}");

    let results = assert_ok!(h.executor.execute_task(&task, &hosts(&["h1", "h2"]), &scope).await);

    assert_eq!(result_hosts(&results), vec!["lb"]);
    assert_eq!(h.runner.calls()[0].hosts, vec!["lb"]);
}

#[tokio::test]
async fn test_unknown_delegate_is_not_containable() {
    let h = Harness::new(&["h1"]);
    let task = Task::new("drain", "command")
        .delegate_to("ghost")
        .ignore_errors(true);

    let failure = assert_err!(h.executor.execute_task(&task, &hosts(&["h1"]), &Vars::new()).await);

    match failure.error {
        Error::DelegateNotFound { task, host } => {
            assert_eq!(task, "drain");
            assert_eq!(host, "ghost");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(failure.results.is_empty());
    assert!(h.runner.calls().is_empty());
}

#[tokio::test]
async fn test_empty_host_list_never_calls_runner() {
    let h = Harness::new(&["h1"]);
    let task = Task::new("noop", "debug");

    let results = assert_ok!(h.executor.execute_task(&task, &[], &Vars::new()).await);
    assert!(results.is_empty());
    assert!(h.runner.calls().is_empty());
}

// ============================================================================
// Runner results
// ============================================================================

#[tokio::test]
async fn test_results_follow_target_order() {
    // MockRunner answers in reverse order
    let h = Harness::new(&["a", "b", "c"]);
    let task = Task::new("ping", "ping");

    let results = assert_ok!(h.executor.execute_task(&task, &hosts(&["a", "b", "c"]), &Vars::new()).await);
    assert_eq!(result_hosts(&results), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_repeated_candidate_hosts_run_once_each() {
    let h = Harness::new(&["h1", "h2"]);
    let task = Task::new("ping", "ping");

    let results = assert_ok!(
        h.executor
            .execute_task(&task, &hosts(&["h1", "h1", "h2", "h1"]), &Vars::new())
            .await
    );

    assert_eq!(result_hosts(&results), vec!["h1", "h2"]);
    assert!(results.iter().all(|r| r.success));
    assert_eq!(h.runner.calls_for("ping")[0].hosts, vec!["h1", "h2"]);
}

#[tokio::test]
async fn test_runner_error_fails_every_target() {
    let h = Harness::new(&["h1", "h2"]);
    h.runner.error_on("ping");
    let task = Task::new("ping", "ping");

    let failure = assert_err!(h.executor.execute_task(&task, &hosts(&["h1", "h2"]), &Vars::new()).await);

    assert!(matches!(failure.error, Error::TaskFailed { .. }));
    assert_eq!(failure.results.len(), 2);
    assert!(failure.results.iter().all(|r| r.is_failed()));
    assert!(failure.results[0]
        .failure_message()
        .contains("connection reset"));
}

#[tokio::test]
async fn test_short_runner_answer_fails_every_target() {
    let h = Harness::new(&["h1", "h2"]);
    h.runner.short_results("ping");
    let task = Task::new("ping", "ping").ignore_errors(true);

    let results = assert_ok!(h.executor.execute_task(&task, &hosts(&["h1", "h2"]), &Vars::new()).await);
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.is_failed() && r.ignored));
    assert!(results[0].failure_message().contains("2 hosts"));
}

#[tokio::test]
async fn test_failure_without_ignore_errors_keeps_results() {
    let h = Harness::new(&["h1", "h2"]);
    h.runner.fail_on("deploy", "h2");
    let task = Task::new("deploy", "copy");

    let failure = assert_err!(h.executor.execute_task(&task, &hosts(&["h1", "h2"]), &Vars::new()).await);

    match &failure.error {
        Error::TaskFailed { task, host, .. } => {
            assert_eq!(task, "deploy");
            assert_eq!(host, "h2");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(failure.results.len(), 2);
    assert!(failure.results[0].success);
    assert!(!failure.results[1].ignored);
    assert_eq!(h.events.count(EventKind::TaskFailed), 1);
    assert_eq!(h.events.count(EventKind::TaskComplete), 1);
}

#[tokio::test]
async fn test_ignore_errors_marks_failures() {
    let h = Harness::new(&["h1", "h2"]);
    h.runner.fail_on("deploy", "h1");
    let task = Task::new("deploy", "copy").ignore_errors(true);

    let results = assert_ok!(h.executor.execute_task(&task, &hosts(&["h1", "h2"]), &Vars::new()).await);

    assert!(results[0].is_failed());
    assert!(results[0].ignored);
    assert!(results[1].success);
    assert!(!results[1].ignored);
}

#[tokio::test]
async fn test_loop_failure_stops_remaining_items() {
    let h = Harness::new(&["h1"]);
    h.runner.fail_on("pkg", "h1");
    let task = Task::new("pkg", "package").loop_over(vec![json!("a"), json!("b")]);

    let failure = assert_err!(h.executor.execute_task(&task, &hosts(&["h1"]), &Vars::new()).await);
    assert_eq!(failure.results.len(), 1);
    assert_eq!(h.runner.calls().len(), 1);
}

#[tokio::test]
async fn test_timeout_is_passed_to_runner() {
    let h = Harness::with_config(
        &["h1"],
        choreo::executor::ExecutorConfig {
            task_timeout: Some(Duration::from_secs(30)),
            ..quiet_config()
        },
    );

    let default = Task::new("default", "ping");
    let own = Task::new("own", "ping").timeout(Duration::from_secs(5));
    assert_ok!(h.executor.execute_task(&default, &hosts(&["h1"]), &Vars::new()).await);
    assert_ok!(h.executor.execute_task(&own, &hosts(&["h1"]), &Vars::new()).await);

    let calls = h.runner.calls();
    assert_eq!(calls[0].options_timeout, Some(Duration::from_secs(30)));
    assert_eq!(calls[1].options_timeout, Some(Duration::from_secs(5)));
}

// ============================================================================
// Retries
// ============================================================================

#[tokio::test]
async fn test_until_retries_until_condition_holds() {
    let h = Harness::new(&["h1", "h2"]);
    h.runner.ready_after("wait", 3);
    let task = Task::new("wait", "wait_for").until(
        "{{ result.data.ready }}",
        5,
        Duration::from_millis(1),
    );

    let results = assert_ok!(h.executor.execute_task(&task, &hosts(&["h1", "h2"]), &Vars::new()).await);

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.success));
    assert_eq!(results[0].data.get("attempts"), Some(&json!(3)));
    assert_eq!(h.runner.calls_for("wait").len(), 3);
    // one start event per logical invocation
    assert_eq!(h.events.count(EventKind::TaskStart), 1);
}

#[tokio::test]
async fn test_until_exhausted_fails() {
    let h = Harness::new(&["h1"]);
    h.runner.ready_after("wait", 10);
    let task = Task::new("wait", "wait_for").until(
        "{{ result.data.ready }}",
        2,
        Duration::from_millis(1),
    );

    let failure = assert_err!(h.executor.execute_task(&task, &hosts(&["h1"]), &Vars::new()).await);

    let result = &failure.results[0];
    assert!(result.is_failed());
    assert_eq!(result.data.get("attempts"), Some(&json!(3)));
    assert!(result.failure_message().contains("not met after 3 attempts"));
}

#[tokio::test]
async fn test_unevaluable_until_keeps_runner_results() {
    let h = Harness::new(&["h1", "h2"]);
    let task = Task::new("wait", "wait_for").until("result.rc == 0", 2, Duration::from_millis(1));

    let failure = assert_err!(h.executor.execute_task(&task, &hosts(&["h1", "h2"]), &Vars::new()).await);

    assert!(matches!(failure.error, Error::Condition { .. }));
    assert_eq!(result_hosts(&failure.results), vec!["h1", "h2"]);
    assert!(failure.results.iter().all(|r| r.is_failed()));
    assert_eq!(h.runner.calls_for("wait").len(), 1);
    assert_eq!(h.events.count(EventKind::TaskStart), 1);
    assert_eq!(h.events.count(EventKind::TaskFailed), 2);
}

#[tokio::test]
async fn test_unevaluable_until_in_loop_keeps_item_results() {
    let h = Harness::new(&["h1"]);
    let task = Task::new("wait", "wait_for")
        .loop_over(vec![json!("a"), json!("b")])
        .until("result.rc == 0", 1, Duration::from_millis(1));

    let failure = assert_err!(h.executor.execute_task(&task, &hosts(&["h1"]), &Vars::new()).await);

    assert!(matches!(failure.error, Error::Condition { .. }));
    assert_eq!(failure.results.len(), 1);
    assert_eq!(failure.results[0].item, Some(json!("a")));
    assert_eq!(h.runner.calls_for("wait").len(), 1);
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_cancelled_executor_fails_tasks() {
    let h = Harness::new(&["h1"]);
    h.executor.cancel();
    let task = Task::new("ping", "ping");

    let failure = assert_err!(h.executor.execute_task(&task, &hosts(&["h1"]), &Vars::new()).await);
    assert!(failure.results[0].failure_message().contains("cancelled"));
    assert!(h.executor.cancellation_token().is_cancelled());
}
