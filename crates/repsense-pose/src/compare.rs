//! Pose comparison - live joint angles against a saved reference
//!
//! Three comparators over the same joints:
//! - aggregate distance, a continuous signal for rep thresholds
//! - near-match, true only when every joint is within tolerance
//! - weighted match score (0-100) with per-joint coaching feedback

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use repsense_core::{AngleMap, RepsenseError, RepsenseResult};
use repsense_signal::{validate_alpha, Ema};

/// What a joint missing from either map contributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingJointPolicy {
    /// Missing angle reads as 0 on that side
    ZeroFill,
    /// Joint is left out of sums, weights and the near-match conjunction
    #[default]
    Exclude,
}

/// Signed `live - reference` for one joint, `None` if the policy drops it
fn joint_diff(
    live: &AngleMap,
    reference: &AngleMap,
    joint: &str,
    policy: MissingJointPolicy,
) -> Option<f32> {
    match (live.get(joint), reference.get(joint)) {
        (Some(l), Some(r)) => Some(l - r),
        (l, r) => match policy {
            MissingJointPolicy::Exclude => None,
            MissingJointPolicy::ZeroFill => {
                Some(l.copied().unwrap_or(0.0) - r.copied().unwrap_or(0.0))
            }
        },
    }
}

/// Sum of absolute angle differences over `joints`
pub fn aggregate_distance<'a, I>(
    live: &AngleMap,
    reference: &AngleMap,
    joints: I,
    policy: MissingJointPolicy,
) -> f32
where
    I: IntoIterator<Item = &'a str>,
{
    joints
        .into_iter()
        .filter_map(|j| joint_diff(live, reference, j, policy))
        .map(f32::abs)
        .sum()
}

/// True when every joint differs by at most `tolerance` degrees
///
/// A single outlier fails the pose. Under `Exclude` at least one joint must
/// be comparable, so an empty frame never reads as a match.
pub fn is_near_match<'a, I>(
    live: &AngleMap,
    reference: &AngleMap,
    joints: I,
    tolerance: f32,
    policy: MissingJointPolicy,
) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    let mut compared = 0usize;
    for joint in joints {
        match joint_diff(live, reference, joint, policy) {
            Some(diff) if diff.abs() <= tolerance => compared += 1,
            Some(_) => return false,
            None => {}
        }
    }
    compared > 0 || policy == MissingJointPolicy::ZeroFill
}

/// Which way a joint should move to approach the reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Increase,
    Decrease,
}

/// Coaching hint for one joint off by more than the feedback threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointFeedback {
    pub joint: String,
    pub direction: Direction,
    /// Signed `live - reference` in degrees
    pub difference: f32,
}

impl std::fmt::Display for JointFeedback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verb = match self.direction {
            Direction::Increase => "increase",
            Direction::Decrease => "decrease",
        };
        write!(f, "{} angle for {}", verb, self.joint)
    }
}

/// Match scorer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreConfig {
    /// Per-joint weights, joints not listed weigh 1.0
    pub weights: BTreeMap<String, f32>,
    /// Score lost per degree of smoothed error
    pub multiplier: f32,
    /// Joints off by more than this many degrees get feedback
    pub feedback_threshold: f32,
    /// Smoothing of the average error
    pub alpha: f32,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            weights: BTreeMap::new(),
            multiplier: 5.0,
            feedback_threshold: 10.0,
            alpha: 0.3,
        }
    }
}

impl ScoreConfig {
    pub fn weight(&self, joint: &str) -> f32 {
        self.weights.get(joint).copied().unwrap_or(1.0)
    }

    pub fn validate(&self) -> RepsenseResult<()> {
        validate_alpha("score", self.alpha)?;
        for (joint, &weight) in &self.weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(RepsenseError::InvalidWeight {
                    joint: joint.clone(),
                    weight,
                });
            }
        }
        if !self.multiplier.is_finite() || self.multiplier < 0.0 {
            return Err(RepsenseError::InvalidParameter {
                name: "score multiplier",
                value: self.multiplier,
            });
        }
        if !self.feedback_threshold.is_finite() || self.feedback_threshold < 0.0 {
            return Err(RepsenseError::InvalidParameter {
                name: "feedback threshold",
                value: self.feedback_threshold,
            });
        }
        Ok(())
    }
}

/// One frame of match scoring
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MatchReport {
    /// 0 (far) to 100 (identical)
    pub score: f32,
    /// Weighted mean absolute error this frame
    pub avg_error: f32,
    pub smoothed_error: f32,
    pub feedback: Vec<JointFeedback>,
    /// Joints that contributed to the error
    pub compared: usize,
}

/// Weighted, smoothed 0-100 match score
#[derive(Debug, Clone)]
pub struct MatchScorer {
    config: ScoreConfig,
    policy: MissingJointPolicy,
    joints: Vec<String>,
    error: Ema,
}

impl MatchScorer {
    pub fn new<I, S>(
        joints: I,
        config: ScoreConfig,
        policy: MissingJointPolicy,
    ) -> RepsenseResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        config.validate()?;
        Ok(Self {
            error: Ema::new(config.alpha),
            policy,
            joints: joints.into_iter().map(Into::into).collect(),
            config,
        })
    }

    /// Score `live` against `reference` and advance the error smoother
    ///
    /// Returns `None` and leaves the smoother untouched when no joint could
    /// be compared.
    pub fn score(&mut self, live: &AngleMap, reference: &AngleMap) -> Option<MatchReport> {
        let mut weighted_total = 0.0f32;
        let mut total_weight = 0.0f32;
        let mut compared = 0usize;
        let mut feedback = Vec::new();

        for joint in &self.joints {
            let Some(diff) = joint_diff(live, reference, joint, self.policy) else {
                continue;
            };
            let weight = self.config.weight(joint);
            weighted_total += weight * diff.abs();
            total_weight += weight;
            compared += 1;

            if diff.abs() > self.config.feedback_threshold {
                feedback.push(JointFeedback {
                    joint: joint.clone(),
                    direction: if diff > 0.0 {
                        Direction::Decrease
                    } else {
                        Direction::Increase
                    },
                    difference: diff,
                });
            }
        }

        if compared == 0 {
            return None;
        }
        let avg_error = if total_weight > 0.0 {
            weighted_total / total_weight
        } else {
            0.0
        };
        let smoothed_error = self.error.update(avg_error);

        Some(MatchReport {
            score: score_from_error(smoothed_error, self.config.multiplier),
            avg_error,
            smoothed_error,
            feedback,
            compared,
        })
    }

    pub fn config(&self) -> &ScoreConfig {
        &self.config
    }

    pub fn policy(&self) -> MissingJointPolicy {
        self.policy
    }

    pub fn reset(&mut self) {
        self.error.reset();
    }
}

/// `max(0, 100 - error * multiplier)`
#[inline]
pub fn score_from_error(error: f32, multiplier: f32) -> f32 {
    (100.0 - error * multiplier).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const JOINTS: [&str; 3] = ["left_elbow", "right_elbow", "left_knee"];

    fn angles(values: &[(&str, f32)]) -> AngleMap {
        values.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn scorer(config: ScoreConfig) -> MatchScorer {
        MatchScorer::new(JOINTS, config, MissingJointPolicy::Exclude).unwrap()
    }

    #[test]
    fn test_aggregate_distance() {
        let live = angles(&[("left_elbow", 90.0), ("right_elbow", 100.0), ("left_knee", 170.0)]);
        let reference =
            angles(&[("left_elbow", 80.0), ("right_elbow", 110.0), ("left_knee", 170.0)]);
        let d = aggregate_distance(&live, &reference, JOINTS, MissingJointPolicy::Exclude);
        assert!((d - 20.0).abs() < 1e-4);
    }

    #[test]
    fn test_missing_joint_policies() {
        let live = angles(&[("left_elbow", 90.0)]);
        let reference = angles(&[("left_elbow", 90.0), ("left_knee", 160.0)]);

        let zero = aggregate_distance(&live, &reference, JOINTS, MissingJointPolicy::ZeroFill);
        assert!((zero - 160.0).abs() < 1e-4);
        let excluded = aggregate_distance(&live, &reference, JOINTS, MissingJointPolicy::Exclude);
        assert_eq!(excluded, 0.0);
    }

    #[test]
    fn test_near_match_is_conjunctive() {
        let reference =
            angles(&[("left_elbow", 90.0), ("right_elbow", 90.0), ("left_knee", 170.0)]);
        let mut live = reference.clone();
        let policy = MissingJointPolicy::Exclude;
        assert!(is_near_match(&live, &reference, JOINTS, 0.0, policy));

        live.insert("left_knee".into(), 140.0);
        assert!(!is_near_match(&live, &reference, JOINTS, 15.0, policy));
        assert!(is_near_match(&live, &reference, JOINTS, 30.0, policy));
    }

    #[test]
    fn test_near_match_with_nothing_comparable() {
        let empty = AngleMap::new();
        let reference = angles(&[("left_elbow", 90.0)]);
        let (exclude, zero_fill) = (MissingJointPolicy::Exclude, MissingJointPolicy::ZeroFill);
        assert!(!is_near_match(&empty, &reference, JOINTS, 10.0, exclude));
        // Zero-fill reads the missing elbow as 0 degrees
        assert!(!is_near_match(&empty, &reference, JOINTS, 10.0, zero_fill));
        assert!(is_near_match(&empty, &empty, JOINTS, 0.0, zero_fill));
    }

    #[test]
    fn test_identical_pose_scores_100() {
        let reference =
            angles(&[("left_elbow", 45.0), ("right_elbow", 50.0), ("left_knee", 175.0)]);
        let report = scorer(ScoreConfig::default())
            .score(&reference, &reference)
            .unwrap();
        assert_eq!(report.score, 100.0);
        assert_eq!(report.compared, 3);
        assert!(report.feedback.is_empty());
    }

    #[test]
    fn test_weighted_error_and_feedback() {
        let mut weights = BTreeMap::new();
        weights.insert("left_elbow".to_string(), 3.0);
        let mut scorer = scorer(ScoreConfig {
            weights,
            ..ScoreConfig::default()
        });

        let reference =
            angles(&[("left_elbow", 90.0), ("right_elbow", 90.0), ("left_knee", 170.0)]);
        let live = angles(&[("left_elbow", 110.0), ("right_elbow", 90.0), ("left_knee", 150.0)]);
        let report = scorer.score(&live, &reference).unwrap();

        // (3 * 20 + 1 * 0 + 1 * 20) / 5
        assert!((report.avg_error - 16.0).abs() < 1e-4);
        assert!((report.score - 20.0).abs() < 1e-3);

        let hints: Vec<String> = report.feedback.iter().map(ToString::to_string).collect();
        assert_eq!(
            hints,
            vec![
                "decrease angle for left_elbow".to_string(),
                "increase angle for left_knee".to_string(),
            ]
        );
    }

    #[test]
    fn test_error_is_smoothed_across_frames() {
        let config = ScoreConfig {
            alpha: 0.5,
            ..ScoreConfig::default()
        };
        let mut scorer =
            MatchScorer::new(["left_elbow"], config, MissingJointPolicy::Exclude).unwrap();
        let reference = angles(&[("left_elbow", 90.0)]);
        scorer.score(&angles(&[("left_elbow", 110.0)]), &reference);
        let report = scorer.score(&reference, &reference).unwrap();
        assert_eq!(report.avg_error, 0.0);
        assert!((report.smoothed_error - 10.0).abs() < 1e-4);
        assert!((report.score - 50.0).abs() < 1e-3);

        scorer.reset();
        assert_eq!(scorer.score(&reference, &reference).unwrap().score, 100.0);
    }

    #[test]
    fn test_score_clamps_at_zero() {
        let reference = angles(&[("left_elbow", 10.0)]);
        let live = angles(&[("left_elbow", 170.0)]);
        let report = scorer(ScoreConfig::default()).score(&live, &reference).unwrap();
        assert_eq!(report.score, 0.0);
    }

    #[test]
    fn test_nothing_comparable_leaves_error_untouched() {
        let mut scorer = scorer(ScoreConfig {
            alpha: 0.5,
            ..ScoreConfig::default()
        });
        let reference = angles(&[("left_elbow", 90.0)]);
        scorer.score(&angles(&[("left_elbow", 110.0)]), &reference);

        // Elbow occluded: no report, and no phantom zero-error sample
        for _ in 0..5 {
            assert_eq!(scorer.score(&AngleMap::new(), &reference), None);
        }
        let report = scorer.score(&reference, &reference).unwrap();
        assert!((report.smoothed_error - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_zero_fill_scores_missing_joints() {
        let mut scorer =
            MatchScorer::new(JOINTS, ScoreConfig::default(), MissingJointPolicy::ZeroFill)
                .unwrap();
        let report = scorer
            .score(&AngleMap::new(), &angles(&[("left_elbow", 30.0)]))
            .unwrap();
        assert_eq!(report.compared, 3);
        assert!((report.avg_error - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_config_validation() {
        assert!(ScoreConfig::default().validate().is_ok());
        let mut weights = BTreeMap::new();
        weights.insert("left_elbow".to_string(), -1.0);
        let bad = ScoreConfig {
            weights,
            ..ScoreConfig::default()
        };
        assert!(matches!(bad.validate(), Err(RepsenseError::InvalidWeight { .. })));
    }

    #[test]
    fn test_scorer_rejects_invalid_config() {
        let frozen = ScoreConfig {
            alpha: 0.0,
            ..ScoreConfig::default()
        };
        assert!(matches!(
            MatchScorer::new(JOINTS, frozen, MissingJointPolicy::Exclude),
            Err(RepsenseError::InvalidAlpha { name: "score", .. })
        ));

        let negative = ScoreConfig {
            multiplier: -1.0,
            ..ScoreConfig::default()
        };
        assert!(MatchScorer::new(JOINTS, negative, MissingJointPolicy::Exclude).is_err());
    }

    proptest! {
        #[test]
        fn prop_identical_maps_always_match(
            a in 0.0f32..=180.0, b in 0.0f32..=180.0, c in 0.0f32..=180.0,
            tolerance in 0.0f32..45.0,
        ) {
            let map = angles(&[("left_elbow", a), ("right_elbow", b), ("left_knee", c)]);
            for policy in [MissingJointPolicy::ZeroFill, MissingJointPolicy::Exclude] {
                prop_assert!(is_near_match(&map, &map, JOINTS, tolerance, policy));
                prop_assert_eq!(aggregate_distance(&map, &map, JOINTS, policy), 0.0);
            }
        }

        #[test]
        fn prop_single_outlier_fails(
            base in 20.0f32..160.0, tolerance in 0.0f32..10.0, excess in 0.5f32..15.0,
        ) {
            let reference =
                angles(&[("left_elbow", base), ("right_elbow", base), ("left_knee", base)]);
            let mut live = reference.clone();
            live.insert("right_elbow".into(), base + tolerance + excess);
            let policy = MissingJointPolicy::Exclude;
            prop_assert!(!is_near_match(&live, &reference, JOINTS, tolerance, policy));
        }

        #[test]
        fn prop_score_monotone_and_bounded(
            e1 in 0.0f32..100.0, e2 in 0.0f32..100.0, k in 0.0f32..20.0,
        ) {
            let (lo, hi) = if e1 <= e2 { (e1, e2) } else { (e2, e1) };
            let s_lo = score_from_error(lo, k);
            let s_hi = score_from_error(hi, k);
            prop_assert!(s_hi <= s_lo);
            prop_assert!((0.0..=100.0).contains(&s_hi));
        }
    }
}
