//! Lifecycle event types
//!
//! An [`Event`] is an immutable, timestamped record of one lifecycle
//! transition. It carries the play, task, host and error context needed to
//! rebuild a timeline without consulting executor state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Playbook execution started
    PlaybookStart,
    /// Playbook execution finished (success or failure)
    PlaybookComplete,
    /// Play started
    PlayStart,
    /// Play finished successfully
    PlayComplete,
    /// Task about to be handed to the runner
    TaskStart,
    /// Task finished on a host
    TaskComplete,
    /// Task skipped by its `when` condition
    TaskSkipped,
    /// Task failed on a host
    TaskFailed,
    /// A handler was notified for a host
    HandlerNotified,
    /// An error stopped a play or the playbook
    Error,
}

impl EventKind {
    /// Wire name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PlaybookStart => "playbook_start",
            EventKind::PlaybookComplete => "playbook_complete",
            EventKind::PlayStart => "play_start",
            EventKind::PlayComplete => "play_complete",
            EventKind::TaskStart => "task_start",
            EventKind::TaskComplete => "task_complete",
            EventKind::TaskSkipped => "task_skipped",
            EventKind::TaskFailed => "task_failed",
            EventKind::HandlerNotified => "handler_notified",
            EventKind::Error => "error",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique event id
    pub id: Uuid,
    /// When the event was created
    pub timestamp: DateTime<Utc>,
    /// What happened
    pub kind: EventKind,
    /// Playbook name, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playbook: Option<String>,
    /// Play name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub play: Option<String>,
    /// Task name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    /// Host name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Error text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Event {
    /// Create an event of the given kind stamped with the current time
    pub fn new(kind: EventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            kind,
            playbook: None,
            play: None,
            task: None,
            host: None,
            error: None,
        }
    }

    /// Attach the playbook name
    pub fn playbook(mut self, name: impl Into<String>) -> Self {
        self.playbook = Some(name.into());
        self
    }

    /// Attach the play name
    pub fn play(mut self, name: impl Into<String>) -> Self {
        self.play = Some(name.into());
        self
    }

    /// Attach the task name
    pub fn task(mut self, name: impl Into<String>) -> Self {
        self.task = Some(name.into());
        self
    }

    /// Attach the host name
    pub fn host(mut self, name: impl Into<String>) -> Self {
        self.host = Some(name.into());
        self
    }

    /// Attach error text
    pub fn error(mut self, error: impl ToString) -> Self {
        self.error = Some(error.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_snake_case_kind() {
        let event = Event::new(EventKind::TaskFailed)
            .play("web")
            .task("install")
            .host("h1")
            .error("boom");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "task_failed");
        assert_eq!(json["host"], "h1");
        assert!(json.get("playbook").is_none());
        assert_eq!(EventKind::HandlerNotified.to_string(), "handler_notified");
    }

    #[test]
    fn test_event_ids_are_unique() {
        let a = Event::new(EventKind::PlayStart);
        let b = Event::new(EventKind::PlayStart);
        assert_ne!(a.id, b.id);
    }
}
