//! Reference alignment
//!
//! Maps a saved landmark frame into the live frame with a similarity
//! transform fitted on one anchor pair (the shoulders by default), so a
//! reference overlay or comparison is not thrown off by the subject standing
//! closer, farther or at another heading than when it was captured.

use repsense_core::{Landmark, LandmarkFrame, LandmarkIndex};

/// Saved anchors closer than this cannot define a scale
const MIN_ANCHOR_SPAN: f32 = 1e-6;

/// Left/right anchor pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchors {
    pub left: Landmark,
    pub right: Landmark,
}

impl Anchors {
    pub fn new(left: Landmark, right: Landmark) -> Self {
        Self { left, right }
    }

    /// Both anchors from a frame, `None` if either is absent
    pub fn from_frame(
        frame: &LandmarkFrame,
        left: LandmarkIndex,
        right: LandmarkIndex,
    ) -> Option<Self> {
        Some(Self {
            left: *frame.landmark(left)?,
            right: *frame.landmark(right)?,
        })
    }

    pub fn shoulders(frame: &LandmarkFrame) -> Option<Self> {
        Self::from_frame(frame, LandmarkIndex::LeftShoulder, LandmarkIndex::RightShoulder)
    }

    pub fn midpoint(&self) -> (f32, f32) {
        ((self.left.x + self.right.x) * 0.5, (self.left.y + self.right.y) * 0.5)
    }

    pub fn span(&self) -> f32 {
        self.left.distance(&self.right)
    }

    /// Heading of left -> right in radians
    pub fn bearing(&self) -> f32 {
        (self.right.y - self.left.y).atan2(self.right.x - self.left.x)
    }
}

/// Rotation + uniform scale + translation in the image plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityTransform {
    /// Radians
    pub rotation: f32,
    pub scale: f32,
    /// Point mapped onto `target`
    pub source: (f32, f32),
    pub target: (f32, f32),
}

impl SimilarityTransform {
    pub fn identity() -> Self {
        Self {
            rotation: 0.0,
            scale: 1.0,
            source: (0.0, 0.0),
            target: (0.0, 0.0),
        }
    }

    /// Transform taking `saved` anchors onto `current` anchors
    ///
    /// Returns `None` for coincident saved anchors; no transform is better
    /// than a degenerate one.
    pub fn fit(saved: &Anchors, current: &Anchors) -> Option<Self> {
        let saved_span = saved.span();
        if !saved_span.is_finite() || saved_span < MIN_ANCHOR_SPAN {
            return None;
        }
        let scale = current.span() / saved_span;
        let rotation = current.bearing() - saved.bearing();
        if !scale.is_finite() || !rotation.is_finite() {
            return None;
        }
        Some(Self {
            rotation,
            scale,
            source: saved.midpoint(),
            target: current.midpoint(),
        })
    }

    /// Translate to the source origin, rotate, scale, translate to target
    pub fn apply(&self, landmark: &Landmark) -> Landmark {
        let (sin, cos) = self.rotation.sin_cos();
        let dx = landmark.x - self.source.0;
        let dy = landmark.y - self.source.1;
        Landmark {
            x: (dx * cos - dy * sin) * self.scale + self.target.0,
            y: (dx * sin + dy * cos) * self.scale + self.target.1,
            z: landmark.z * self.scale,
            visibility: landmark.visibility,
        }
    }

    pub fn apply_frame(&self, frame: &LandmarkFrame) -> LandmarkFrame {
        frame.map(|l| self.apply(l))
    }
}

/// Saved frame aligned onto the live frame by shoulder anchors
///
/// `None` when either frame lacks a shoulder; the caller skips the overlay
/// for that frame.
pub fn align_reference(saved: &LandmarkFrame, current: &LandmarkFrame) -> Option<LandmarkFrame> {
    let transform =
        SimilarityTransform::fit(&Anchors::shoulders(saved)?, &Anchors::shoulders(current)?)?;
    Some(transform.apply_frame(saved))
}
