//! Thread-shareable session handle
//!
//! Frames may arrive on an estimator thread while a UI thread reads the
//! count. Every call takes the lock for its whole duration, so frames still
//! run one at a time to completion.

use std::sync::Arc;

use parking_lot::Mutex;

use repsense_core::{FrameTime, LandmarkFrame, RepsenseResult};
use repsense_pose::ReferencePose;
use repsense_signal::Phase;

use crate::{FrameReport, Session, SessionConfig, SessionObserver, SessionStats};

#[derive(Debug, Clone)]
pub struct SharedSession {
    inner: Arc<Mutex<Session>>,
}

impl SharedSession {
    pub fn new(config: SessionConfig) -> RepsenseResult<Self> {
        Ok(Self::from_session(Session::new(config)?))
    }

    pub fn from_session(session: Session) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    pub fn process_frame(&self, frame: Option<&LandmarkFrame>, now: FrameTime) -> FrameReport {
        self.inner.lock().process_frame(frame, now)
    }

    /// Save the start reference, returning a copy of it
    pub fn save_reference(&self, frame: &LandmarkFrame) -> RepsenseResult<ReferencePose> {
        self.inner.lock().save_reference(frame).cloned()
    }

    pub fn save_end_reference(&self, frame: &LandmarkFrame) -> RepsenseResult<ReferencePose> {
        self.inner.lock().save_end_reference(frame).cloned()
    }

    pub fn clear_reference(&self) {
        self.inner.lock().clear_reference();
    }

    pub fn reset(&self) {
        self.inner.lock().reset();
    }

    pub fn subscribe<O>(&self, observer: O)
    where
        O: SessionObserver + Send + 'static,
    {
        self.inner.lock().subscribe(observer);
    }

    pub fn rep_count(&self) -> u64 {
        self.inner.lock().rep_count()
    }

    pub fn phase(&self) -> Phase {
        self.inner.lock().phase()
    }

    pub fn has_reference(&self) -> bool {
        self.inner.lock().reference().is_some()
    }

    pub fn stats(&self) -> SessionStats {
        self.inner.lock().stats()
    }

    /// Run `f` with exclusive access to the session
    pub fn with<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        f(&mut self.inner.lock())
    }
}
