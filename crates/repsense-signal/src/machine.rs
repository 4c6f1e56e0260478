//! Phase Machine - hysteresis-gated phase transitions and repetition counting
//!
//! Every frame the rule proposes a candidate phase. A candidate must stay
//! unchanged for the stability window before it is committed; a candidate
//! that flips back earlier is discarded. Committing the completion edge
//! counts one repetition.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use repsense_core::{FrameTime, RepsenseError, RepsenseResult};

use crate::{Phase, PhaseInput, PhaseRule};

/// Transition that credits a repetition when committed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEdge {
    pub from: Phase,
    pub to: Phase,
}

impl CompletionEdge {
    pub fn new(from: Phase, to: Phase) -> Self {
        Self { from, to }
    }

    #[inline]
    pub fn matches(&self, from: Phase, to: Phase) -> bool {
        self.from == from && self.to == to
    }
}

/// Phase machine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineConfig {
    /// Candidate derivation
    pub rule: PhaseRule,
    /// Committed phase at start and after reset
    pub initial: Phase,
    /// Edge counted as one repetition
    pub completion: CompletionEdge,
    /// Minimum time a candidate must be stable before it commits
    pub stability_window_ms: u64,
    /// Phase passed through on the way between the edge's ends; committing
    /// it does not break a pending completion
    #[serde(default)]
    pub transit: Option<Phase>,
}

impl MachineConfig {
    /// Limb-flexion cycle: small angle is `Up`, large angle is `Down`,
    /// a rep completes on `Down -> Up`
    pub fn flexion(low: f32, high: f32) -> Self {
        Self {
            rule: PhaseRule::Threshold {
                low,
                high,
                below: Phase::Up,
                above: Phase::Down,
            },
            initial: Phase::Down,
            completion: CompletionEdge::new(Phase::Down, Phase::Up),
            stability_window_ms: 100,
            transit: None,
        }
    }

    /// Saved pose-pair form, a rep completes on `AtStart -> AtEnd`
    pub fn pose_pair(start_threshold: f32, end_threshold: f32) -> Self {
        Self {
            rule: PhaseRule::PosePair {
                start_threshold,
                end_threshold,
            },
            initial: Phase::None,
            completion: CompletionEdge::new(Phase::AtStart, Phase::AtEnd),
            stability_window_ms: 100,
            transit: Some(Phase::InBetween),
        }
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.stability_window_ms = window.as_millis() as u64;
        self
    }

    pub fn with_initial(mut self, initial: Phase) -> Self {
        self.initial = initial;
        self
    }

    #[inline]
    pub fn stability_window(&self) -> Duration {
        Duration::from_millis(self.stability_window_ms)
    }

    /// The completion edge must be reachable: its target must be a
    /// candidate the rule emits and its source either the initial phase or
    /// an emitted candidate.
    pub fn validate(&self) -> RepsenseResult<()> {
        self.rule.validate()?;
        let CompletionEdge { from, to } = self.completion;
        let from_ok = from == self.initial || self.rule.produces(from);
        let to_ok = self.rule.produces(to);
        let through_transit = self.transit.is_some_and(|t| t == from || t == to);
        if !from_ok || !to_ok || through_transit || from == to {
            return Err(RepsenseError::UnreachableCompletion {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }
}

/// Candidate awaiting the stability window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTransition {
    pub candidate: Phase,
    pub since: FrameTime,
}

/// A committed phase change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTransition {
    pub from: Phase,
    pub to: Phase,
    pub at: FrameTime,
    /// The transition matched the completion edge
    pub completed: bool,
}

/// Single hysteresis-gated phase machine
#[derive(Debug, Clone)]
pub struct PhaseMachine {
    config: MachineConfig,
    committed: Phase,
    /// Last committed phase other than the transit phase
    settled: Phase,
    pending: Option<PendingTransition>,
    completions: u64,
}

impl PhaseMachine {
    pub fn new(config: MachineConfig) -> Self {
        Self {
            committed: config.initial,
            settled: config.initial,
            config,
            pending: None,
            completions: 0,
        }
    }

    /// Feed one frame of signal. Returns the transition if one committed.
    ///
    /// Input the rule cannot classify leaves the machine untouched.
    pub fn update(&mut self, input: PhaseInput, now: FrameTime) -> Option<PhaseTransition> {
        let Some(candidate) = self.config.rule.candidate(input, self.committed) else {
            trace!(?input, "phase input skipped");
            return None;
        };

        let since = match self.pending {
            Some(pending) if pending.candidate == candidate => pending.since,
            _ => {
                debug!(%candidate, committed = %self.committed, "candidate changed");
                self.pending = Some(PendingTransition {
                    candidate,
                    since: now,
                });
                return None;
            }
        };

        if candidate == self.committed || now.since(since) < self.config.stability_window() {
            return None;
        }

        let from = self.committed;
        let is_transit = |phase: Phase| self.config.transit == Some(phase);
        let completed =
            !is_transit(candidate) && self.config.completion.matches(self.settled, candidate);
        if !is_transit(candidate) {
            self.settled = candidate;
        }
        self.committed = candidate;
        if completed {
            self.completions += 1;
        }
        info!(%from, to = %candidate, completed, completions = self.completions, "phase committed");

        Some(PhaseTransition {
            from,
            to: candidate,
            at: now,
            completed,
        })
    }

    /// Currently committed phase
    pub fn phase(&self) -> Phase {
        self.committed
    }

    pub fn pending(&self) -> Option<PendingTransition> {
        self.pending
    }

    /// Completion edges committed since creation or the last reset
    pub fn completions(&self) -> u64 {
        self.completions
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Back to the initial phase with no pending candidate and zero count
    pub fn reset(&mut self) {
        self.committed = self.config.initial;
        self.settled = self.config.initial;
        self.pending = None;
        self.completions = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: i64) -> FrameTime {
        FrameTime::from_millis(ms)
    }

    fn curl() -> PhaseMachine {
        PhaseMachine::new(MachineConfig::flexion(50.0, 150.0))
    }

    #[test]
    fn test_first_candidate_never_commits_immediately() {
        let mut m = curl();
        assert_eq!(m.update(PhaseInput::Signal(30.0), at(0)), None);
        assert_eq!(m.phase(), Phase::Down);
        assert_eq!(
            m.pending(),
            Some(PendingTransition {
                candidate: Phase::Up,
                since: at(0)
            })
        );
    }

    #[test]
    fn test_stable_candidate_commits_after_window() {
        let mut m = curl();
        m.update(PhaseInput::Signal(30.0), at(0));
        assert_eq!(m.update(PhaseInput::Signal(30.0), at(50)), None);
        assert_eq!(m.update(PhaseInput::Signal(30.0), at(99)), None);
        let t = m.update(PhaseInput::Signal(30.0), at(100)).unwrap();
        assert_eq!(t.from, Phase::Down);
        assert_eq!(t.to, Phase::Up);
        assert!(t.completed);
        assert_eq!(m.completions(), 1);

        // Staying put commits nothing further
        assert_eq!(m.update(PhaseInput::Signal(30.0), at(300)), None);
        assert_eq!(m.completions(), 1);
    }

    #[test]
    fn test_flicker_resets_the_window() {
        let mut m = curl();
        m.update(PhaseInput::Signal(30.0), at(0));
        m.update(PhaseInput::Signal(30.0), at(60));
        // Jitter back above the high threshold
        m.update(PhaseInput::Signal(170.0), at(70));
        // Candidate restarts here
        m.update(PhaseInput::Signal(30.0), at(80));
        assert_eq!(m.update(PhaseInput::Signal(30.0), at(150)), None);
        assert!(m.update(PhaseInput::Signal(30.0), at(180)).is_some());
    }

    #[test]
    fn test_only_completion_edge_counts() {
        let mut m = curl();
        m.update(PhaseInput::Signal(30.0), at(0));
        m.update(PhaseInput::Signal(30.0), at(100));
        m.update(PhaseInput::Signal(170.0), at(200));
        let t = m.update(PhaseInput::Signal(170.0), at(300)).unwrap();
        assert_eq!((t.from, t.to), (Phase::Up, Phase::Down));
        assert!(!t.completed);
        assert_eq!(m.completions(), 1);
    }

    #[test]
    fn test_dead_band_holds_committed_phase() {
        let mut m = curl();
        m.update(PhaseInput::Signal(100.0), at(0));
        m.update(PhaseInput::Signal(100.0), at(500));
        assert_eq!(m.phase(), Phase::Down);
        assert_eq!(m.completions(), 0);
    }

    #[test]
    fn test_skipped_input_keeps_pending() {
        let mut m = curl();
        m.update(PhaseInput::Signal(30.0), at(0));
        let pair = PhaseInput::PosePair {
            to_start: 1.0,
            to_end: 1.0,
        };
        assert_eq!(m.update(pair, at(50)), None);
        assert!(m.update(PhaseInput::Signal(30.0), at(120)).is_some());
    }

    #[test]
    fn test_pose_pair_cycle() {
        let mut m = PhaseMachine::new(MachineConfig::pose_pair(30.0, 30.0));
        let start = PhaseInput::PosePair {
            to_start: 5.0,
            to_end: 120.0,
        };
        let middle = PhaseInput::PosePair {
            to_start: 60.0,
            to_end: 60.0,
        };
        let end = PhaseInput::PosePair {
            to_start: 120.0,
            to_end: 5.0,
        };

        m.update(start, at(0));
        assert_eq!(m.update(start, at(100)).map(|t| t.to), Some(Phase::AtStart));
        m.update(middle, at(200));
        assert_eq!(m.update(middle, at(300)).map(|t| t.to), Some(Phase::InBetween));
        m.update(end, at(400));
        let t = m.update(end, at(500)).unwrap();
        // Passing through InBetween still completes the edge
        assert_eq!((t.from, t.to), (Phase::InBetween, Phase::AtEnd));
        assert!(t.completed);

        // Leaving the end pose and coming back without visiting the start does not count
        m.update(middle, at(600));
        m.update(middle, at(700));
        m.update(end, at(710));
        assert!(!m.update(end, at(810)).unwrap().completed);

        m.update(start, at(900));
        m.update(start, at(1000));
        m.update(end, at(1010));
        let t = m.update(end, at(1110)).unwrap();
        assert_eq!((t.from, t.to), (Phase::AtStart, Phase::AtEnd));
        assert!(t.completed);
        assert_eq!(m.completions(), 2);
    }

    #[test]
    fn test_reset() {
        let mut m = curl();
        m.update(PhaseInput::Signal(30.0), at(0));
        m.update(PhaseInput::Signal(30.0), at(100));
        assert_eq!(m.completions(), 1);
        m.reset();
        assert_eq!(m.completions(), 0);
        assert_eq!(m.phase(), Phase::Down);
        assert_eq!(m.pending(), None);
    }

    #[test]
    fn test_validate_completion_edge() {
        assert!(MachineConfig::flexion(50.0, 150.0).validate().is_ok());
        assert!(MachineConfig::pose_pair(20.0, 20.0).validate().is_ok());

        let mut bad = MachineConfig::flexion(50.0, 150.0);
        bad.completion = CompletionEdge::new(Phase::AtStart, Phase::AtEnd);
        assert!(matches!(
            bad.validate(),
            Err(RepsenseError::UnreachableCompletion { .. })
        ));

        let mut transit_end = MachineConfig::pose_pair(20.0, 20.0);
        transit_end.completion = CompletionEdge::new(Phase::AtStart, Phase::InBetween);
        assert!(transit_end.validate().is_err());
    }
}
