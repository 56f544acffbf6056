//! Event bus dispatching lifecycle events to registered sinks.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::callback::types::Event;
use crate::traits::EventSink;

/// Fan-out of events to every registered sink, in registration order.
///
/// The bus is owned by one executor instance; there is no process-wide
/// registry. Dispatch is synchronous and never fails.
#[derive(Default)]
pub struct EventBus {
    sinks: RwLock<Vec<Arc<dyn EventSink>>>,
    paused: RwLock<bool>,
}

impl EventBus {
    /// Create a bus with no sinks
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bus from a list of sinks
    pub fn with_sinks(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self {
            sinks: RwLock::new(sinks),
            paused: RwLock::new(false),
        }
    }

    /// Register another sink
    pub fn register(&self, sink: Arc<dyn EventSink>) {
        self.sinks.write().push(sink);
    }

    /// Number of registered sinks
    pub fn sink_count(&self) -> usize {
        self.sinks.read().len()
    }

    /// Stop delivering events until [`resume`](Self::resume)
    pub fn pause(&self) {
        *self.paused.write() = true;
    }

    /// Resume delivery
    pub fn resume(&self) {
        *self.paused.write() = false;
    }

    /// Deliver an event to every sink
    pub fn emit(&self, event: Event) {
        if *self.paused.read() {
            return;
        }
        // clone the list so a sink may register another sink
        let sinks: Vec<Arc<dyn EventSink>> = self.sinks.read().clone();
        for sink in sinks {
            sink.on_event(&event);
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("sinks", &self.sink_count())
            .field("paused", &*self.paused.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::{EventKind, RecordingSink};

    #[test]
    fn test_emit_reaches_every_sink() {
        let first = Arc::new(RecordingSink::new());
        let second = Arc::new(RecordingSink::new());
        let bus = EventBus::with_sinks(vec![first.clone(), second.clone()]);

        bus.emit(Event::new(EventKind::PlayStart).play("web"));

        assert_eq!(first.kinds(), vec![EventKind::PlayStart]);
        assert_eq!(second.kinds(), vec![EventKind::PlayStart]);
    }

    #[test]
    fn test_pause_and_resume() {
        let sink = Arc::new(RecordingSink::new());
        let bus = EventBus::new();
        bus.register(sink.clone());

        bus.pause();
        bus.emit(Event::new(EventKind::TaskStart));
        bus.resume();
        bus.emit(Event::new(EventKind::TaskComplete));

        assert_eq!(sink.kinds(), vec![EventKind::TaskComplete]);
    }
}
