//! Lifecycle events for Choreo.
//!
//! Every executor layer emits [`Event`]s through an [`EventBus`] owned by
//! the executor. Sinks are injected at construction; two are bundled:
//!
//! - [`TracingSink`] mirrors events into the `tracing` log
//! - [`RecordingSink`] keeps an in-memory timeline, handy for tests and
//!   post-run reports

pub mod manager;
pub mod types;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::traits::EventSink;

pub use manager::EventBus;
pub use types::{Event, EventKind};

/// Writes every event to the `tracing` log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn on_event(&self, event: &Event) {
        let play = event.play.as_deref().unwrap_or("-");
        let task = event.task.as_deref().unwrap_or("-");
        let host = event.host.as_deref().unwrap_or("-");
        match event.kind {
            EventKind::PlaybookStart | EventKind::PlaybookComplete => {
                info!(
                    kind = %event.kind,
                    playbook = event.playbook.as_deref().unwrap_or("-"),
                    "playbook event"
                );
            }
            EventKind::PlayStart | EventKind::PlayComplete => {
                info!(kind = %event.kind, play, "play event");
            }
            EventKind::TaskFailed => {
                warn!(
                    play,
                    task,
                    host,
                    error = event.error.as_deref().unwrap_or(""),
                    "task failed"
                );
            }
            EventKind::Error => {
                error!(
                    play,
                    error = event.error.as_deref().unwrap_or(""),
                    "execution error"
                );
            }
            _ => debug!(kind = %event.kind, play, task, host, "task event"),
        }
    }
}

/// Keeps every event in memory, in delivery order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Kinds of the recorded events, in order
    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().iter().map(|e| e.kind).collect()
    }

    /// Number of recorded events of `kind`
    pub fn count(&self, kind: EventKind) -> usize {
        self.events.lock().iter().filter(|e| e.kind == kind).count()
    }

    /// Drop all recorded events
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for RecordingSink {
    fn on_event(&self, event: &Event) {
        self.events.lock().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_counts() {
        let sink = RecordingSink::new();
        sink.on_event(&Event::new(EventKind::TaskStart));
        sink.on_event(&Event::new(EventKind::TaskFailed).error("boom"));
        sink.on_event(&Event::new(EventKind::TaskStart));

        assert_eq!(sink.count(EventKind::TaskStart), 2);
        assert_eq!(sink.events()[1].error.as_deref(), Some("boom"));

        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_tracing_sink_accepts_every_kind() {
        let sink = TracingSink;
        for kind in [
            EventKind::PlaybookStart,
            EventKind::PlayStart,
            EventKind::TaskFailed,
            EventKind::Error,
            EventKind::HandlerNotified,
        ] {
            sink.on_event(&Event::new(kind));
        }
    }
}
