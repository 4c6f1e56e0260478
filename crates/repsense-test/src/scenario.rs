//! End-to-end scenarios: a synthetic subject driving a live session

use repsense_core::{FrameTime, RepsenseResult};
use repsense_runtime::{FrameReport, Session, SessionConfig};
use repsense_signal::{LimbTransition, Phase};

use crate::simulator::{BodyAngles, SyntheticSubject, Trajectory};

/// Summary of one scripted run
#[derive(Debug, Clone, Default)]
pub struct ScenarioOutcome {
    pub frames: usize,
    pub detected: usize,
    pub transitions: Vec<LimbTransition>,
    /// Repetitions credited during this run
    pub reps: u64,
    /// Best match score seen, if a reference was saved
    pub best_score: Option<f32>,
    pub last_report: Option<FrameReport>,
}

impl ScenarioOutcome {
    pub fn final_phase(&self) -> Phase {
        self.last_report
            .as_ref()
            .map(FrameReport::phase)
            .unwrap_or(Phase::None)
    }
}

/// Session plus subject on a shared clock
pub struct Scenario {
    session: Session,
    subject: SyntheticSubject,
    fps: u32,
    clock: FrameTime,
}

impl Scenario {
    pub fn new(config: SessionConfig, subject: SyntheticSubject, fps: u32) -> RepsenseResult<Self> {
        Ok(Self {
            session: Session::new(config)?,
            subject,
            fps,
            clock: FrameTime::ZERO,
        })
    }

    /// Save the subject's exact pose as the start reference
    pub fn save_reference(&mut self, pose: &BodyAngles) -> RepsenseResult<()> {
        let frame = self.subject.exact(pose);
        self.session.save_reference(&frame).map(|_| ())
    }

    pub fn save_end_reference(&mut self, pose: &BodyAngles) -> RepsenseResult<()> {
        let frame = self.subject.exact(pose);
        self.session.save_end_reference(&frame).map(|_| ())
    }

    /// Perform `trajectory` frame by frame, continuing from the last run
    pub fn run(&mut self, trajectory: &Trajectory) -> ScenarioOutcome {
        let frames = self.subject.perform(trajectory, self.fps, self.clock);
        let mut outcome = ScenarioOutcome::default();

        for (at, frame) in frames {
            let report = self.session.process_frame(frame.as_ref(), at);
            outcome.frames += 1;
            if report.detected {
                outcome.detected += 1;
            }
            outcome.reps += report.credited;
            outcome.transitions.extend(report.transitions.iter().cloned());
            if let Some(score) = report.score() {
                outcome.best_score = Some(outcome.best_score.map_or(score, |best| best.max(score)));
            }
            self.clock = at;
            outcome.last_report = Some(report);
        }

        let frame_micros = 1_000_000 / u64::from(self.fps.max(1));
        self.clock = self.clock + std::time::Duration::from_micros(frame_micros);
        outcome
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn subject_mut(&mut self) -> &mut SyntheticSubject {
        &mut self.subject
    }

    pub fn clock(&self) -> FrameTime {
        self.clock
    }
}
