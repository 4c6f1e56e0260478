//! Landmarks - body keypoints delivered by an external pose estimator
//!
//! Coordinates are normalized to the frame (roughly [0, 1] per axis, origin
//! top-left). The engine never mutates a delivered frame.

use serde::{Deserialize, Serialize};

/// Canonical 33-point body topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum LandmarkIndex {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl LandmarkIndex {
    pub const COUNT: usize = 33;

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Single estimated keypoint
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    /// Relative depth, 0 when the estimator is 2D only
    #[serde(default)]
    pub z: f32,
    /// Estimator confidence that the point is visible
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f32>,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            z: 0.0,
            visibility: None,
        }
    }

    pub fn with_z(mut self, z: f32) -> Self {
        self.z = z;
        self
    }

    pub fn with_visibility(mut self, visibility: f32) -> Self {
        self.visibility = Some(visibility);
        self
    }

    /// A landmark without a visibility score counts as visible
    pub fn is_visible(&self, min_visibility: f32) -> bool {
        self.visibility.map_or(true, |v| v >= min_visibility)
    }

    /// Planar distance to another landmark
    pub fn distance(&self, other: &Landmark) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Planar midpoint, visibility is the weaker of the two
    pub fn midpoint(&self, other: &Landmark) -> Landmark {
        Landmark {
            x: (self.x + other.x) * 0.5,
            y: (self.y + other.y) * 0.5,
            z: (self.z + other.z) * 0.5,
            visibility: match (self.visibility, other.visibility) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            },
        }
    }
}

/// One frame of landmarks indexed by the fixed body topology
///
/// Any slot may be absent (occlusion). Consumers treat an absent slot as
/// "no data for this point this frame", never as an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    points: Vec<Option<Landmark>>,
}

impl LandmarkFrame {
    /// Frame with every slot absent
    pub fn empty() -> Self {
        Self {
            points: vec![None; LandmarkIndex::COUNT],
        }
    }

    /// Dense frame; slots beyond the topology are dropped, missing tail
    /// slots are absent
    pub fn from_landmarks(landmarks: &[Landmark]) -> Self {
        let mut frame = Self::empty();
        for (slot, landmark) in frame.points.iter_mut().zip(landmarks) {
            *slot = Some(*landmark);
        }
        frame
    }

    /// Sparse frame from `(index, landmark)` pairs
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (usize, Landmark)>,
    {
        let mut frame = Self::empty();
        for (index, landmark) in pairs {
            frame.set(index, landmark);
        }
        frame
    }

    /// Landmark at `index`, if present
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.points.get(index).and_then(Option::as_ref)
    }

    #[inline]
    pub fn landmark(&self, index: LandmarkIndex) -> Option<&Landmark> {
        self.get(index.index())
    }

    /// Set a slot; out-of-range indices are ignored
    pub fn set(&mut self, index: usize, landmark: Landmark) {
        if let Some(slot) = self.points.get_mut(index) {
            *slot = Some(landmark);
        }
    }

    pub fn clear(&mut self, index: usize) {
        if let Some(slot) = self.points.get_mut(index) {
            *slot = None;
        }
    }

    /// Number of present landmarks
    pub fn present(&self) -> usize {
        self.points.iter().filter(|p| p.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.present() == 0
    }

    /// Iterate present landmarks with their indices
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Landmark)> {
        self.points
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.as_ref().map(|l| (i, l)))
    }

    /// Apply `f` to every present landmark, keeping absent slots absent
    pub fn map<F>(&self, mut f: F) -> LandmarkFrame
    where
        F: FnMut(&Landmark) -> Landmark,
    {
        LandmarkFrame {
            points: self.points.iter().map(|p| p.as_ref().map(&mut f)).collect(),
        }
    }

    /// Copy with landmarks below `min_visibility` removed
    pub fn filter_visible(&self, min_visibility: f32) -> LandmarkFrame {
        LandmarkFrame {
            points: self
                .points
                .iter()
                .map(|p| p.filter(|l| l.is_visible(min_visibility)))
                .collect(),
        }
    }
}

impl Default for LandmarkFrame {
    fn default() -> Self {
        Self::empty()
    }
}
