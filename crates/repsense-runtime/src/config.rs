//! Session configuration
//!
//! Supplied once at session start and validated there; nothing in here is
//! consulted for errors during per-frame processing.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use repsense_core::{JointTable, RepsenseError, RepsenseResult};
use repsense_pose::{MissingJointPolicy, ScoreConfig};
use repsense_signal::{validate_alpha, CompletionEdge, MachineConfig, Phase, PhaseRule, RepCredit};

/// Name of the implicit limb used when a distance drive lists no limbs
pub const WHOLE_POSE: &str = "pose";

/// EMA alphas per use site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Per-joint angles
    pub angle_alpha: f32,
    /// Aggregate distances to saved references (slower)
    pub distance_alpha: f32,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            angle_alpha: 0.5,
            distance_alpha: 0.3,
        }
    }
}

/// Signal feeding the phase machines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseDrive {
    /// Mean smoothed angle of each limb's joints
    Angles,
    /// Smoothed aggregate distance from each limb's joints to the start pose
    ReferenceDistance,
    /// Smoothed distances to the start and end poses
    PosePair,
}

impl PhaseDrive {
    fn label(self) -> &'static str {
        match self {
            PhaseDrive::Angles => "joint angle",
            PhaseDrive::ReferenceDistance => "reference distance",
            PhaseDrive::PosePair => "pose pair",
        }
    }
}

/// One independently tracked limb
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimbConfig {
    pub name: String,
    /// Driving joints. Distance drives fall back to the compared joints
    /// when empty.
    #[serde(default)]
    pub joints: Vec<String>,
}

impl LimbConfig {
    pub fn new<I, S>(name: impl Into<String>, joints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            joints: joints.into_iter().map(Into::into).collect(),
        }
    }
}

/// Phase tracking configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseConfig {
    pub drive: PhaseDrive,
    pub machine: MachineConfig,
    #[serde(default)]
    pub limbs: Vec<LimbConfig>,
    #[serde(default)]
    pub credit: RepCredit,
}

/// Complete static configuration of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub joints: JointTable,
    /// Joints used by the comparators; every table joint when `None`
    pub compare_joints: Option<Vec<String>>,
    pub smoothing: SmoothingConfig,
    pub score: ScoreConfig,
    /// Per-joint tolerance for the near-match test, degrees
    pub near_match_tolerance: f32,
    pub missing_joints: MissingJointPolicy,
    /// Landmarks scored below this are treated as absent
    pub min_visibility: Option<f32>,
    pub phase: PhaseConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::bicep_curl()
    }
}

impl SessionConfig {
    fn base(phase: PhaseConfig) -> Self {
        Self {
            joints: JointTable::standard(),
            compare_joints: None,
            smoothing: SmoothingConfig::default(),
            score: ScoreConfig::default(),
            near_match_tolerance: 15.0,
            missing_joints: MissingJointPolicy::default(),
            min_visibility: Some(0.5),
            phase,
        }
    }

    /// Per-arm curls credited independently
    pub fn bicep_curl() -> Self {
        Self::base(PhaseConfig {
            drive: PhaseDrive::Angles,
            machine: MachineConfig::flexion(50.0, 150.0),
            limbs: vec![
                LimbConfig::new("left_arm", ["left_elbow"]),
                LimbConfig::new("right_arm", ["right_elbow"]),
            ],
            credit: RepCredit::Independent,
        })
    }

    /// Both knees averaged; standing back up completes a rep
    pub fn squat() -> Self {
        Self::base(PhaseConfig {
            drive: PhaseDrive::Angles,
            machine: MachineConfig {
                rule: PhaseRule::Threshold {
                    low: 100.0,
                    high: 160.0,
                    below: Phase::Down,
                    above: Phase::Up,
                },
                initial: Phase::Up,
                completion: CompletionEdge::new(Phase::Down, Phase::Up),
                stability_window_ms: 100,
                transit: None,
            },
            limbs: vec![LimbConfig::new("legs", ["left_knee", "right_knee"])],
            credit: RepCredit::Independent,
        })
    }

    /// Reps counted by returning close to a saved pose: distance below the
    /// threshold is `Up`, a rep completes on `Down -> Up`
    pub fn reference_reps() -> Self {
        let mut config = Self::base(PhaseConfig {
            drive: PhaseDrive::ReferenceDistance,
            machine: MachineConfig {
                rule: PhaseRule::Threshold {
                    low: 150.0,
                    high: 150.0,
                    below: Phase::Up,
                    above: Phase::Down,
                },
                initial: Phase::Down,
                completion: CompletionEdge::new(Phase::Down, Phase::Up),
                stability_window_ms: 100,
                transit: None,
            },
            limbs: Vec::new(),
            credit: RepCredit::Independent,
        });
        config.smoothing.distance_alpha = 0.3;
        config
    }

    /// Free-form exercise between two saved poses
    pub fn pose_pair() -> Self {
        Self::base(PhaseConfig {
            drive: PhaseDrive::PosePair,
            machine: MachineConfig::pose_pair(40.0, 40.0),
            limbs: Vec::new(),
            credit: RepCredit::Independent,
        })
    }

    pub fn from_json_str(json: &str) -> RepsenseResult<Self> {
        let config: SessionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> RepsenseResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Joints the comparators walk, in order
    pub fn compared_joints(&self) -> Vec<String> {
        match &self.compare_joints {
            Some(joints) => joints.clone(),
            None => self.joints.names().map(str::to_string).collect(),
        }
    }

    /// Limbs with their driving joints resolved
    pub fn resolved_limbs(&self) -> Vec<LimbConfig> {
        let compared = self.compared_joints();
        if self.phase.limbs.is_empty() && self.phase.drive != PhaseDrive::Angles {
            return vec![LimbConfig::new(WHOLE_POSE, compared)];
        }
        self.phase
            .limbs
            .iter()
            .map(|limb| {
                if limb.joints.is_empty() && self.phase.drive != PhaseDrive::Angles {
                    LimbConfig::new(limb.name.clone(), compared.clone())
                } else {
                    limb.clone()
                }
            })
            .collect()
    }

    /// Every check that can fail, run once before the first frame
    pub fn validate(&self) -> RepsenseResult<()> {
        self.joints.validate()?;

        for joint in self.compared_joints() {
            self.joints.require(&joint)?;
        }
        for joint in self.score.weights.keys() {
            self.joints.require(joint)?;
        }
        self.score.validate()?;

        validate_alpha("angle", self.smoothing.angle_alpha)?;
        validate_alpha("distance", self.smoothing.distance_alpha)?;

        if !self.near_match_tolerance.is_finite() || self.near_match_tolerance < 0.0 {
            return Err(RepsenseError::InvalidParameter {
                name: "near-match tolerance",
                value: self.near_match_tolerance,
            });
        }
        if let Some(min) = self.min_visibility {
            if !(0.0..=1.0).contains(&min) {
                return Err(RepsenseError::InvalidParameter {
                    name: "minimum visibility",
                    value: min,
                });
            }
        }

        self.phase.machine.validate()?;
        let pose_pair_drive = self.phase.drive == PhaseDrive::PosePair;
        if pose_pair_drive != self.phase.machine.rule.is_pose_pair() {
            return Err(RepsenseError::IncompatibleRule(self.phase.drive.label()));
        }

        let limbs = self.resolved_limbs();
        if limbs.is_empty() {
            return Err(RepsenseError::NoLimbs);
        }
        let mut names = HashSet::new();
        for limb in &limbs {
            if !names.insert(limb.name.as_str()) {
                return Err(RepsenseError::DuplicateLimb(limb.name.clone()));
            }
            if limb.joints.is_empty() {
                return Err(RepsenseError::EmptyLimb(limb.name.clone()));
            }
            for joint in &limb.joints {
                self.joints.require(joint)?;
            }
        }
        Ok(())
    }
}
