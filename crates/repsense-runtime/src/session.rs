//! Session engine - the single owner of live exercise state

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use repsense_core::{AngleMap, FrameTime, LandmarkFrame, RepsenseError, RepsenseResult};
use repsense_pose::{
    aggregate_distance, extract_angles, is_near_match, mean_angle, MatchReport, MatchScorer,
    MissingJointPolicy, ReferencePose,
};
use repsense_signal::{LimbSet, LimbTransition, Phase, PhaseInput, SmootherBank};

use crate::{PhaseDrive, ReferenceSlot, SessionConfig, SessionEvent, SessionObserver};

/// Smoother key for the whole-pose distance to the start reference
const START_DISTANCE: &str = "distance";
/// Smoother key for the whole-pose distance to the end reference
const END_DISTANCE: &str = "end";

/// Live frame against the saved start reference
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    /// Aggregate distance this frame, degrees
    pub raw_distance: f32,
    /// Aggregate distance after smoothing
    pub distance: f32,
    pub near_match: bool,
    pub score: MatchReport,
    /// Reference landmarks mapped onto the live frame, `None` when either
    /// frame lacks both shoulders
    pub aligned_reference: Option<LandmarkFrame>,
}

/// Everything a host may display after one frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub at: FrameTime,
    /// At least one joint could be measured
    pub detected: bool,
    pub raw_angles: AngleMap,
    pub angles: AngleMap,
    /// Present once a start reference is saved and at least one compared
    /// joint was measured this frame
    pub comparison: Option<Comparison>,
    /// Smoothed distance to the end reference, when one is saved and
    /// comparable
    pub end_distance: Option<f32>,
    pub phases: Vec<(String, Phase)>,
    pub transitions: Vec<LimbTransition>,
    /// Repetitions credited by this frame
    pub credited: u64,
    pub reps: u64,
}

impl FrameReport {
    pub fn score(&self) -> Option<f32> {
        self.comparison.as_ref().map(|c| c.score.score)
    }

    /// Coaching hints, e.g. "increase angle for left_elbow"
    pub fn feedback(&self) -> Vec<String> {
        self.comparison
            .as_ref()
            .map(|c| c.score.feedback.iter().map(ToString::to_string).collect())
            .unwrap_or_default()
    }

    /// Phase of the first limb
    pub fn phase(&self) -> Phase {
        self.phases.first().map(|(_, p)| *p).unwrap_or(Phase::None)
    }
}

/// Diagnostic counters; they survive `reset`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub frames_processed: u64,
    /// Frames with no detection or no measurable joint
    pub frames_skipped: u64,
    pub transitions: u64,
    /// Repetitions credited over the session's lifetime
    pub reps: u64,
    pub resets: u64,
}

/// Pose tracking and rep counting for one subject
pub struct Session {
    config: SessionConfig,
    compared: Vec<String>,
    limb_joints: Vec<(String, Vec<String>)>,
    angles: SmootherBank,
    distances: SmootherBank,
    scorer: MatchScorer,
    limbs: LimbSet,
    reference: Option<ReferencePose>,
    end_reference: Option<ReferencePose>,
    observers: Vec<Box<dyn SessionObserver + Send>>,
    stats: SessionStats,
    last_frame: FrameTime,
}

impl Session {
    /// Validate `config` and build a session with no reference and zero reps
    pub fn new(config: SessionConfig) -> RepsenseResult<Self> {
        config.validate()?;

        let compared = config.compared_joints();
        let limb_joints: Vec<(String, Vec<String>)> = config
            .resolved_limbs()
            .into_iter()
            .map(|limb| (limb.name, limb.joints))
            .collect();
        let limbs = LimbSet::new(
            limb_joints.iter().map(|(name, _)| name.clone()),
            config.phase.machine.clone(),
            config.phase.credit,
        )?;

        info!(
            joints = config.joints.len(),
            limbs = limb_joints.len(),
            drive = ?config.phase.drive,
            "session started"
        );

        Ok(Self {
            angles: SmootherBank::new(config.smoothing.angle_alpha),
            distances: SmootherBank::new(config.smoothing.distance_alpha),
            scorer: MatchScorer::new(
                compared.iter().cloned(),
                config.score.clone(),
                config.missing_joints,
            )?,
            compared,
            limb_joints,
            limbs,
            reference: None,
            end_reference: None,
            observers: Vec::new(),
            stats: SessionStats::default(),
            last_frame: FrameTime::ZERO,
            config,
        })
    }

    /// Register an observer; it hears every later event
    pub fn subscribe<O>(&mut self, observer: O)
    where
        O: SessionObserver + Send + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    /// Run one frame to completion. `None` means the estimator found nobody.
    ///
    /// Never fails: a frame without a usable signal leaves phases and
    /// counters untouched.
    pub fn process_frame(&mut self, frame: Option<&LandmarkFrame>, now: FrameTime) -> FrameReport {
        self.stats.frames_processed += 1;
        self.last_frame = now;

        let visible = match (frame, self.config.min_visibility) {
            (Some(frame), Some(min)) => Some(frame.filter_visible(min)),
            (Some(frame), None) => Some(frame.clone()),
            (None, _) => None,
        };
        let raw_angles = visible
            .as_ref()
            .map(|frame| extract_angles(frame, &self.config.joints))
            .unwrap_or_default();

        let Some(visible) = visible.filter(|_| !raw_angles.is_empty()) else {
            self.stats.frames_skipped += 1;
            trace!(at = ?now, detected = frame.is_some(), "frame skipped");
            return self.idle_report(now, raw_angles);
        };

        let angles = self.angles.smooth_angles(&raw_angles);
        let policy = self.config.missing_joints;

        // Frames with no compared joint leave the comparison smoothers alone
        let comparison = self.reference.as_ref().and_then(|reference| {
            let score = self.scorer.score(&angles, &reference.angles)?;
            let raw_distance = aggregate_distance(
                &angles,
                &reference.angles,
                joint_refs(&self.compared),
                policy,
            );
            Some(Comparison {
                raw_distance,
                distance: self.distances.update(START_DISTANCE, raw_distance),
                near_match: is_near_match(
                    &angles,
                    &reference.angles,
                    joint_refs(&self.compared),
                    self.config.near_match_tolerance,
                    policy,
                ),
                score,
                aligned_reference: reference.aligned_to(&visible),
            })
        });
        let end_distance = self
            .end_reference
            .as_ref()
            .filter(|reference| comparable(&angles, &reference.angles, &self.compared, policy))
            .map(|reference| {
                let raw = aggregate_distance(
                    &angles,
                    &reference.angles,
                    joint_refs(&self.compared),
                    policy,
                );
                self.distances.update(END_DISTANCE, raw)
            });

        let inputs: Vec<(String, Option<PhaseInput>)> = self
            .limb_joints
            .iter()
            .map(|(limb, joints)| {
                let input = limb_input(
                    self.config.phase.drive,
                    limb,
                    joints,
                    &angles,
                    self.reference.as_ref(),
                    self.end_reference.as_ref(),
                    policy,
                    &mut self.distances,
                );
                (limb.clone(), input)
            })
            .collect();

        let update = self.limbs.update(now, |limb| {
            inputs
                .iter()
                .find(|(name, _)| name == limb)
                .and_then(|(_, input)| *input)
        });

        for LimbTransition { limb, transition } in &update.transitions {
            self.stats.transitions += 1;
            emit(
                &mut self.observers,
                &SessionEvent::PhaseChanged {
                    limb: limb.clone(),
                    from: transition.from,
                    to: transition.to,
                    at: transition.at,
                },
            );
        }
        if update.credited > 0 {
            self.stats.reps += update.credited;
            emit(
                &mut self.observers,
                &SessionEvent::RepCompleted {
                    reps: self.limbs.reps(),
                    at: now,
                },
            );
        }

        FrameReport {
            at: now,
            detected: true,
            raw_angles,
            angles,
            comparison,
            end_distance,
            phases: self.limbs.phases(),
            transitions: update.transitions,
            credited: update.credited,
            reps: self.limbs.reps(),
        }
    }

    fn idle_report(&self, now: FrameTime, raw_angles: AngleMap) -> FrameReport {
        FrameReport {
            at: now,
            detected: false,
            raw_angles,
            angles: AngleMap::new(),
            comparison: None,
            end_distance: None,
            phases: self.limbs.phases(),
            transitions: Vec::new(),
            credited: 0,
            reps: self.limbs.reps(),
        }
    }

    /// Freeze `frame` as the start reference, replacing any previous one
    pub fn save_reference(&mut self, frame: &LandmarkFrame) -> RepsenseResult<&ReferencePose> {
        let reference = self.capture(frame, ReferenceSlot::Start)?;
        self.distances.reset();
        self.scorer.reset();
        Ok(&*self.reference.insert(reference))
    }

    /// Freeze `frame` as the end pose of a pose-pair exercise
    pub fn save_end_reference(&mut self, frame: &LandmarkFrame) -> RepsenseResult<&ReferencePose> {
        if self.reference.is_none() {
            return Err(RepsenseError::NoReference);
        }
        let reference = self.capture(frame, ReferenceSlot::End)?;
        self.distances.reset();
        Ok(&*self.end_reference.insert(reference))
    }

    fn capture(
        &mut self,
        frame: &LandmarkFrame,
        slot: ReferenceSlot,
    ) -> RepsenseResult<ReferencePose> {
        let reference = ReferencePose::capture(
            frame,
            &self.config.joints,
            self.config.min_visibility,
            self.last_frame,
        )
        .map_err(|err| {
            warn!(?slot, "reference frame has no measurable joints");
            err
        })?;
        info!(?slot, joints = reference.angles.len(), "reference saved");
        emit(
            &mut self.observers,
            &SessionEvent::ReferenceSaved {
                slot,
                joints: reference.angles.len(),
            },
        );
        Ok(reference)
    }

    /// Drop both references and their smoothed distances
    pub fn clear_reference(&mut self) {
        self.reference = None;
        self.end_reference = None;
        self.distances.reset();
        self.scorer.reset();
        debug!("reference cleared");
        emit(&mut self.observers, &SessionEvent::ReferenceCleared);
    }

    /// Clear references, smoother state, phases and the rep count
    pub fn reset(&mut self) {
        self.reference = None;
        self.end_reference = None;
        self.angles.reset();
        self.distances.reset();
        self.scorer.reset();
        self.limbs.reset();
        self.stats.resets += 1;
        info!(resets = self.stats.resets, "session reset");
        emit(&mut self.observers, &SessionEvent::SessionReset);
    }

    pub fn rep_count(&self) -> u64 {
        self.limbs.reps()
    }

    /// Phase of the first limb
    pub fn phase(&self) -> Phase {
        self.limbs.primary_phase()
    }

    pub fn limb_phase(&self, limb: &str) -> Option<Phase> {
        self.limbs.phase(limb)
    }

    pub fn phases(&self) -> Vec<(String, Phase)> {
        self.limbs.phases()
    }

    pub fn reference(&self) -> Option<&ReferencePose> {
        self.reference.as_ref()
    }

    pub fn end_reference(&self) -> Option<&ReferencePose> {
        self.end_reference.as_ref()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("reps", &self.limbs.reps())
            .field("phases", &self.limbs.phases())
            .field("reference", &self.reference.is_some())
            .field("end_reference", &self.end_reference.is_some())
            .field("observers", &self.observers.len())
            .field("stats", &self.stats)
            .finish()
    }
}

fn emit(observers: &mut [Box<dyn SessionObserver + Send>], event: &SessionEvent) {
    for observer in observers.iter_mut() {
        observer.on_event(event);
    }
}

fn joint_refs(joints: &[String]) -> impl Iterator<Item = &str> {
    joints.iter().map(String::as_str)
}

/// Whether any joint can contribute to a distance under `policy`
fn comparable(
    live: &AngleMap,
    reference: &AngleMap,
    joints: &[String],
    policy: MissingJointPolicy,
) -> bool {
    policy == MissingJointPolicy::ZeroFill
        || joints
            .iter()
            .any(|j| live.contains_key(j) && reference.contains_key(j))
}

/// Smoothed distance from the limb's joints to `reference`, keyed per limb
fn limb_distance(
    key: &str,
    limb: &str,
    joints: &[String],
    angles: &AngleMap,
    reference: &ReferencePose,
    policy: MissingJointPolicy,
    distances: &mut SmootherBank,
) -> Option<f32> {
    if !comparable(angles, &reference.angles, joints, policy) {
        return None;
    }
    let raw = aggregate_distance(angles, &reference.angles, joint_refs(joints), policy);
    Some(distances.update(&format!("{key}:{limb}"), raw))
}

/// This frame's driving signal for one limb, `None` when it has none
#[allow(clippy::too_many_arguments)]
fn limb_input(
    drive: PhaseDrive,
    limb: &str,
    joints: &[String],
    angles: &AngleMap,
    start: Option<&ReferencePose>,
    end: Option<&ReferencePose>,
    policy: MissingJointPolicy,
    distances: &mut SmootherBank,
) -> Option<PhaseInput> {
    match drive {
        PhaseDrive::Angles => mean_angle(angles, joint_refs(joints)).map(PhaseInput::Signal),
        PhaseDrive::ReferenceDistance => {
            limb_distance("distance", limb, joints, angles, start?, policy, distances)
                .map(PhaseInput::Signal)
        }
        PhaseDrive::PosePair => {
            let (start, end) = (start?, end?);
            let to_start = limb_distance("start", limb, joints, angles, start, policy, distances)?;
            let to_end = limb_distance("end", limb, joints, angles, end, policy, distances)?;
            Some(PhaseInput::PosePair { to_start, to_end })
        }
    }
}
