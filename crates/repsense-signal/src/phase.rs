//! Phases and the rules that derive a candidate phase from smoothed signals

use serde::{Deserialize, Serialize};

use repsense_core::{RepsenseError, RepsenseResult};

/// Exercise phase label
///
/// Limb-flexion exercises cycle `Up`/`Down`; saved pose-pair exercises use
/// `AtStart`/`AtEnd`/`InBetween`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    None,
    Up,
    Down,
    AtStart,
    AtEnd,
    InBetween,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::None => "none",
            Phase::Up => "up",
            Phase::Down => "down",
            Phase::AtStart => "at-start",
            Phase::AtEnd => "at-end",
            Phase::InBetween => "in-between",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One frame of driving signal for a phase machine
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PhaseInput {
    /// A single smoothed scalar (joint angle, limb aggregate, reference distance)
    Signal(f32),
    /// Smoothed distances to the saved start and end poses
    PosePair { to_start: f32, to_end: f32 },
}

/// Mapping from smoothed signal to candidate phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PhaseRule {
    /// `signal < low` gives `below`, `signal > high` gives `above`; anything
    /// in between holds the committed phase
    Threshold {
        low: f32,
        high: f32,
        below: Phase,
        above: Phase,
    },
    /// Near the start pose gives `AtStart`, near the end pose `AtEnd`,
    /// otherwise `InBetween`. Start wins when both are near.
    PosePair {
        start_threshold: f32,
        end_threshold: f32,
    },
}

impl PhaseRule {
    /// Candidate phase for this frame, `None` if the input does not fit
    /// the rule
    pub fn candidate(&self, input: PhaseInput, committed: Phase) -> Option<Phase> {
        match (self, input) {
            (
                PhaseRule::Threshold {
                    low,
                    high,
                    below,
                    above,
                },
                PhaseInput::Signal(value),
            ) => {
                if !value.is_finite() {
                    return None;
                }
                Some(if value < *low {
                    *below
                } else if value > *high {
                    *above
                } else {
                    committed
                })
            }
            (
                PhaseRule::PosePair {
                    start_threshold,
                    end_threshold,
                },
                PhaseInput::PosePair { to_start, to_end },
            ) => {
                if !to_start.is_finite() || !to_end.is_finite() {
                    return None;
                }
                Some(if to_start < *start_threshold {
                    Phase::AtStart
                } else if to_end < *end_threshold {
                    Phase::AtEnd
                } else {
                    Phase::InBetween
                })
            }
            _ => None,
        }
    }

    /// Phases this rule can emit as a candidate
    pub fn produces(&self, phase: Phase) -> bool {
        match self {
            PhaseRule::Threshold { below, above, .. } => phase == *below || phase == *above,
            PhaseRule::PosePair { .. } => {
                matches!(phase, Phase::AtStart | Phase::AtEnd | Phase::InBetween)
            }
        }
    }

    /// True for rules fed by `PhaseInput::PosePair`
    pub fn is_pose_pair(&self) -> bool {
        matches!(self, PhaseRule::PosePair { .. })
    }

    pub fn validate(&self) -> RepsenseResult<()> {
        match self {
            PhaseRule::Threshold { low, high, .. } => {
                check_finite("low threshold", *low)?;
                check_finite("high threshold", *high)?;
                if low > high {
                    return Err(RepsenseError::InvertedThresholds {
                        low: *low,
                        high: *high,
                    });
                }
            }
            PhaseRule::PosePair {
                start_threshold,
                end_threshold,
            } => {
                check_non_negative("start threshold", *start_threshold)?;
                check_non_negative("end threshold", *end_threshold)?;
            }
        }
        Ok(())
    }
}

fn check_finite(name: &'static str, value: f32) -> RepsenseResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(RepsenseError::InvalidParameter { name, value })
    }
}

fn check_non_negative(name: &'static str, value: f32) -> RepsenseResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(RepsenseError::InvalidParameter { name, value })
    }
}
