// SPDX-License-Identifier: GPL-3.0-only

//! Progress notifications emitted by lifecycle and apply operations
//!
//! Every operation reports `Begin` followed by exactly one of `End`, `Skip`
//! or `Fail`. Nothing in the library depends on a sink consuming them.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ResolverConfig,
    VolumeCreate,
    VolumeClone,
    VolumePromote,
    VolumeDestroy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventState {
    Begin,
    End,
    Skip,
    Fail(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    /// Volume or resource the event refers to
    pub subject: String,
    pub state: EventState,
}

impl Event {
    pub fn new(kind: EventKind, subject: impl Into<String>, state: EventState) -> Self {
        Self {
            kind,
            subject: subject.into(),
            state,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self.state, EventState::Begin)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            EventState::Fail(reason) => {
                write!(f, "{:?} {} failed: {}", self.kind, self.subject, reason)
            }
            state => write!(f, "{:?} {} {:?}", self.kind, self.subject, state),
        }
    }
}

/// Receiver for progress notifications
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &Event);

    fn begin(&self, kind: EventKind, subject: &str) {
        self.emit(&Event::new(kind, subject, EventState::Begin));
    }

    fn end(&self, kind: EventKind, subject: &str) {
        self.emit(&Event::new(kind, subject, EventState::End));
    }

    fn skip(&self, kind: EventKind, subject: &str) {
        self.emit(&Event::new(kind, subject, EventState::Skip));
    }

    fn fail(&self, kind: EventKind, subject: &str, reason: &dyn fmt::Display) {
        self.emit(&Event::new(kind, subject, EventState::Fail(reason.to_string())));
    }
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &Event) {}
}

/// Forwards events to `tracing` at debug level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &Event) {
        match event.state {
            EventState::Fail(_) => tracing::warn!("{event}"),
            _ => tracing::debug!("{event}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Collect(Mutex<Vec<Event>>);

    impl EventSink for Collect {
        fn emit(&self, event: &Event) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    #[test]
    fn helpers_emit_matching_states() {
        let sink = Collect::default();
        sink.begin(EventKind::VolumeClone, "tank/a");
        sink.fail(EventKind::VolumeClone, "tank/a", &"boom");

        let events = sink.0.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].state, EventState::Begin);
        assert!(!events[0].is_terminal());
        assert_eq!(events[1].state, EventState::Fail("boom".to_string()));
        assert!(events[1].to_string().contains("failed: boom"));
    }
}
