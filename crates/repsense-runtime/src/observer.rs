//! Change notifications for hosts (UI, voice coach, loggers)

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use repsense_core::FrameTime;
use repsense_signal::Phase;

/// Which saved pose an event refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceSlot {
    Start,
    End,
}

/// Something a host may want to react to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    PhaseChanged {
        limb: String,
        from: Phase,
        to: Phase,
        at: FrameTime,
    },
    RepCompleted {
        reps: u64,
        at: FrameTime,
    },
    ReferenceSaved {
        slot: ReferenceSlot,
        joints: usize,
    },
    ReferenceCleared,
    SessionReset,
}

/// Receiver of session events, called synchronously from the frame context
pub trait SessionObserver {
    fn on_event(&mut self, event: &SessionEvent);
}

impl<F> SessionObserver for F
where
    F: FnMut(&SessionEvent),
{
    fn on_event(&mut self, event: &SessionEvent) {
        self(event)
    }
}

/// Observer that keeps every event; clones share one log
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<SessionEvent>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events
    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().clone()
    }

    /// Take recorded events, leaving the log empty
    pub fn drain(&self) -> Vec<SessionEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl SessionObserver for EventRecorder {
    fn on_event(&mut self, event: &SessionEvent) {
        self.events.lock().push(event.clone());
    }
}
