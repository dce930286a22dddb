//! Engine events and post-commit hooks.
//!
//! Every terminal or phase change in a session produces an [`Event`].
//! Subscribers (badge evaluation, task-progress tracking) register as
//! [`EventSink`]s on the engine and are invoked in subscription order,
//! strictly after the triggering state has been durably committed.
//! `SessionCompleted` fires exactly once per session, never on
//! cancellation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::session::SessionStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SessionStarted {
        session_id: Uuid,
        user_id: Uuid,
        at: DateTime<Utc>,
    },
    PhaseAdvanced {
        session_id: Uuid,
        user_id: Uuid,
        from: SessionStatus,
        to: SessionStatus,
        at: DateTime<Utc>,
    },
    SessionCompleted {
        session_id: Uuid,
        user_id: Uuid,
        total_work_secs: u64,
        total_break_secs: u64,
        completed_cycles: u32,
        earned_steps: u64,
        at: DateTime<Utc>,
    },
    SessionCancelled {
        session_id: Uuid,
        user_id: Uuid,
        at: DateTime<Utc>,
    },
}

/// Receiver for post-commit engine events.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &Event);
}

/// Ordered list of post-commit hooks.
///
/// Sinks are invoked in the order they subscribed. Publication is
/// fire-and-forget; a sink cannot veto or roll back the state change
/// that produced the event.
#[derive(Default)]
pub struct EventBus {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn subscribe(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn publish(&self, event: &Event) {
        for sink in &self.sinks {
            sink.publish(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder {
        tag: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl EventSink for Recorder {
        fn publish(&self, _event: &Event) {
            self.log.lock().unwrap().push(self.tag);
        }
    }

    #[test]
    fn sinks_run_in_subscription_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        bus.subscribe(Arc::new(Recorder {
            tag: "first",
            log: log.clone(),
        }));
        bus.subscribe(Arc::new(Recorder {
            tag: "second",
            log: log.clone(),
        }));

        bus.publish(&Event::SessionCancelled {
            session_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            at: Utc::now(),
        });

        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    }
}
