//! Synthetic subject for end-to-end testing
//!
//! Renders the 33-point landmark frame of a stick figure posed by a handful
//! of joint angles, placed anywhere in the frame, then runs it through
//! estimator noise. Seeded, so every stream is reproducible.

use rand::rngs::StdRng;
use rand::SeedableRng;

use repsense_core::{FrameTime, Landmark, LandmarkFrame, LandmarkIndex};

use crate::noise::{EstimatorNoise, NoiseConfig, NoiseStats};

/// Joint angles that pose the figure, degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyAngles {
    pub left_elbow: f32,
    pub right_elbow: f32,
    /// Upper arm away from the torso
    pub left_shoulder: f32,
    pub right_shoulder: f32,
    pub left_knee: f32,
    pub right_knee: f32,
}

impl BodyAngles {
    /// Arms hanging, legs straight
    pub fn standing() -> Self {
        Self {
            left_elbow: 170.0,
            right_elbow: 170.0,
            left_shoulder: 15.0,
            right_shoulder: 15.0,
            left_knee: 175.0,
            right_knee: 175.0,
        }
    }

    pub fn with_elbows(mut self, degrees: f32) -> Self {
        self.left_elbow = degrees;
        self.right_elbow = degrees;
        self
    }

    pub fn with_knees(mut self, degrees: f32) -> Self {
        self.left_knee = degrees;
        self.right_knee = degrees;
        self
    }

    pub fn lerp(&self, other: &BodyAngles, t: f32) -> BodyAngles {
        let mix = |a: f32, b: f32| a + (b - a) * t;
        BodyAngles {
            left_elbow: mix(self.left_elbow, other.left_elbow),
            right_elbow: mix(self.right_elbow, other.right_elbow),
            left_shoulder: mix(self.left_shoulder, other.left_shoulder),
            right_shoulder: mix(self.right_shoulder, other.right_shoulder),
            left_knee: mix(self.left_knee, other.left_knee),
            right_knee: mix(self.right_knee, other.right_knee),
        }
    }
}

/// Piecewise-linear angle script
#[derive(Debug, Clone)]
pub struct Trajectory {
    start: BodyAngles,
    /// `(duration_ms, target)`; each segment moves linearly to its target
    segments: Vec<(u64, BodyAngles)>,
}

impl Trajectory {
    pub fn new(start: BodyAngles) -> Self {
        Self {
            start,
            segments: Vec::new(),
        }
    }

    /// Stay at the current pose
    pub fn hold(mut self, ms: u64) -> Self {
        let current = self.end_pose();
        self.segments.push((ms, current));
        self
    }

    pub fn move_to(mut self, target: BodyAngles, ms: u64) -> Self {
        self.segments.push((ms, target));
        self
    }

    /// `reps` bicep curls from standing: lift, hold at the top, lower, rest
    pub fn curls(reps: usize, top: f32, move_ms: u64, hold_ms: u64) -> Self {
        let rest = BodyAngles::standing();
        let mut trajectory = Self::new(rest).hold(hold_ms);
        for _ in 0..reps {
            trajectory = trajectory
                .move_to(rest.with_elbows(top), move_ms)
                .hold(hold_ms)
                .move_to(rest, move_ms)
                .hold(hold_ms);
        }
        trajectory
    }

    /// `reps` squats from standing down to `depth` knee angle
    pub fn squats(reps: usize, depth: f32, move_ms: u64, hold_ms: u64) -> Self {
        let rest = BodyAngles::standing();
        let mut trajectory = Self::new(rest).hold(hold_ms);
        for _ in 0..reps {
            trajectory = trajectory
                .move_to(rest.with_knees(depth), move_ms)
                .hold(hold_ms)
                .move_to(rest, move_ms)
                .hold(hold_ms);
        }
        trajectory
    }

    pub fn end_pose(&self) -> BodyAngles {
        self.segments.last().map(|(_, pose)| *pose).unwrap_or(self.start)
    }

    pub fn duration_ms(&self) -> u64 {
        self.segments.iter().map(|(ms, _)| ms).sum()
    }

    /// Pose at `t_ms`; clamps past the end
    pub fn at(&self, t_ms: u64) -> BodyAngles {
        let mut from = self.start;
        let mut elapsed = 0;
        for &(ms, target) in &self.segments {
            if t_ms < elapsed + ms {
                let t = (t_ms - elapsed) as f32 / ms as f32;
                return from.lerp(&target, t);
            }
            elapsed += ms;
            from = target;
        }
        from
    }
}

/// Where the figure stands in the frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Mid-shoulder position
    pub center: (f32, f32),
    /// 1.0 is a subject filling about two thirds of the frame height
    pub scale: f32,
    /// Camera roll, radians
    pub roll: f32,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            center: (0.5, 0.3),
            scale: 1.0,
            roll: 0.0,
        }
    }
}

impl Placement {
    fn place(&self, x: f32, y: f32) -> Landmark {
        let (sin, cos) = self.roll.sin_cos();
        let (rx, ry) = (x * cos - y * sin, x * sin + y * cos);
        Landmark::new(
            self.center.0 + rx * self.scale,
            self.center.1 + ry * self.scale,
        )
        .with_visibility(0.99)
    }
}

const SHOULDER_HALF_WIDTH: f32 = 0.1;
const HIP_HALF_WIDTH: f32 = 0.07;
const TORSO: f32 = 0.25;
const UPPER_ARM: f32 = 0.15;
const FOREARM: f32 = 0.13;
const THIGH: f32 = 0.2;
const SHIN: f32 = 0.2;

fn rotate((x, y): (f32, f32), degrees: f32) -> (f32, f32) {
    let (sin, cos) = degrees.to_radians().sin_cos();
    (x * cos - y * sin, x * sin + y * cos)
}

fn offset(from: (f32, f32), dir: (f32, f32), length: f32) -> (f32, f32) {
    (from.0 + dir.0 * length, from.1 + dir.1 * length)
}

fn unit(from: (f32, f32), to: (f32, f32)) -> (f32, f32) {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let len = (dx * dx + dy * dy).sqrt();
    (dx / len, dy / len)
}

/// Exact landmarks for `angles` in body coordinates (origin mid-shoulder,
/// y down), placed by `placement`
pub fn render_pose(angles: &BodyAngles, placement: &Placement) -> LandmarkFrame {
    let mut frame = LandmarkFrame::empty();
    let mut put = |index: LandmarkIndex, p: (f32, f32)| {
        frame.set(index.index(), placement.place(p.0, p.1));
    };

    put(LandmarkIndex::Nose, (0.0, -0.12));

    // side = -1 is the subject's left, drawn on the image's left
    for side in [-1.0f32, 1.0] {
        let left = side < 0.0;
        let (shoulder_idx, elbow_idx, wrist_idx, hip_idx, knee_idx, ankle_idx) = if left {
            (
                LandmarkIndex::LeftShoulder,
                LandmarkIndex::LeftElbow,
                LandmarkIndex::LeftWrist,
                LandmarkIndex::LeftHip,
                LandmarkIndex::LeftKnee,
                LandmarkIndex::LeftAnkle,
            )
        } else {
            (
                LandmarkIndex::RightShoulder,
                LandmarkIndex::RightElbow,
                LandmarkIndex::RightWrist,
                LandmarkIndex::RightHip,
                LandmarkIndex::RightKnee,
                LandmarkIndex::RightAnkle,
            )
        };
        let (shoulder_deg, elbow_deg, knee_deg) = if left {
            (angles.left_shoulder, angles.left_elbow, angles.left_knee)
        } else {
            (angles.right_shoulder, angles.right_elbow, angles.right_knee)
        };

        let shoulder = (side * SHOULDER_HALF_WIDTH, 0.0);
        let hip = (side * HIP_HALF_WIDTH, TORSO);

        // Upper arm swings outward from the torso line
        let torso_dir = unit(shoulder, hip);
        let elbow = offset(shoulder, rotate(torso_dir, -side * shoulder_deg), UPPER_ARM);
        // Forearm opens elbow_deg from the upper arm, folding forward
        let wrist = offset(elbow, rotate(unit(elbow, shoulder), side * elbow_deg), FOREARM);

        let knee = offset(hip, (0.0, 1.0), THIGH);
        let ankle = offset(knee, rotate(unit(knee, hip), -side * knee_deg), SHIN);

        put(shoulder_idx, shoulder);
        put(elbow_idx, elbow);
        put(wrist_idx, wrist);
        put(hip_idx, hip);
        put(knee_idx, knee);
        put(ankle_idx, ankle);
    }
    frame
}

/// Seeded subject performing a trajectory in front of a noisy estimator
#[derive(Debug)]
pub struct SyntheticSubject {
    placement: Placement,
    noise: EstimatorNoise,
    rng: StdRng,
}

impl SyntheticSubject {
    pub fn new(placement: Placement, noise: NoiseConfig, seed: u64) -> Self {
        Self {
            placement,
            noise: EstimatorNoise::new(noise),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Centered subject, exact landmarks
    pub fn clean() -> Self {
        Self::new(Placement::default(), NoiseConfig::clean(), 0)
    }

    pub fn move_to(&mut self, placement: Placement) {
        self.placement = placement;
    }

    pub fn placement(&self) -> Placement {
        self.placement
    }

    /// Landmarks without noise
    pub fn exact(&self, angles: &BodyAngles) -> LandmarkFrame {
        render_pose(angles, &self.placement)
    }

    /// What the estimator reports for `angles`; `None` for a dropped frame
    pub fn observe(&mut self, angles: &BodyAngles) -> Option<LandmarkFrame> {
        let exact = render_pose(angles, &self.placement);
        self.noise.apply(&exact, &mut self.rng)
    }

    /// Every frame of `trajectory` at `fps`, timestamped from `start`
    pub fn perform(
        &mut self,
        trajectory: &Trajectory,
        fps: u32,
        start: FrameTime,
    ) -> Vec<(FrameTime, Option<LandmarkFrame>)> {
        let step_us = 1_000_000 / i64::from(fps.max(1));
        let frames = trajectory.duration_ms() as i64 * 1000 / step_us;
        (0..=frames)
            .map(|i| {
                let offset_us = i * step_us;
                let pose = trajectory.at((offset_us / 1000) as u64);
                let at = FrameTime::from_micros(start.as_micros() + offset_us);
                (at, self.observe(&pose))
            })
            .collect()
    }

    pub fn noise_stats(&self) -> &NoiseStats {
        self.noise.stats()
    }
}
