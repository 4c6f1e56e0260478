//! Reference poses

use serde::{Deserialize, Serialize};

use repsense_core::{AngleMap, FrameTime, JointTable, LandmarkFrame, RepsenseError, RepsenseResult};

use crate::{align_reference, extract_visible_angles};

/// A landmark frame frozen as a comparison target, with its derived angles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePose {
    pub landmarks: LandmarkFrame,
    pub angles: AngleMap,
    pub captured_at: FrameTime,
}

impl ReferencePose {
    /// Freeze `frame`; fails if no joint in `table` can be measured on it
    pub fn capture(
        frame: &LandmarkFrame,
        table: &JointTable,
        min_visibility: Option<f32>,
        captured_at: FrameTime,
    ) -> RepsenseResult<Self> {
        let angles = extract_visible_angles(frame, table, min_visibility);
        if angles.is_empty() {
            return Err(RepsenseError::EmptyReference);
        }
        Ok(Self {
            landmarks: frame.clone(),
            angles,
            captured_at,
        })
    }

    /// Saved landmarks mapped into `current` by shoulder alignment
    pub fn aligned_to(&self, current: &LandmarkFrame) -> Option<LandmarkFrame> {
        align_reference(&self.landmarks, current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repsense_core::{Landmark, LandmarkIndex};

    fn bent_left_arm() -> LandmarkFrame {
        LandmarkFrame::from_pairs([
            (LandmarkIndex::LeftShoulder.index(), Landmark::new(0.4, 0.3)),
            (LandmarkIndex::RightShoulder.index(), Landmark::new(0.6, 0.3)),
            (LandmarkIndex::LeftElbow.index(), Landmark::new(0.4, 0.5)),
            (LandmarkIndex::LeftWrist.index(), Landmark::new(0.3, 0.5)),
        ])
    }

    #[test]
    fn test_capture_derives_angles() {
        let reference = ReferencePose::capture(
            &bent_left_arm(),
            &JointTable::standard(),
            None,
            FrameTime::from_millis(5),
        )
        .unwrap();
        assert_eq!(reference.angles.len(), 1);
        assert!((reference.angles["left_elbow"] - 90.0).abs() < 1e-3);
        assert_eq!(reference.captured_at, FrameTime::from_millis(5));
    }

    #[test]
    fn test_capture_rejects_unmeasurable_frame() {
        let err = ReferencePose::capture(
            &LandmarkFrame::empty(),
            &JointTable::standard(),
            None,
            FrameTime::ZERO,
        )
        .unwrap_err();
        assert!(matches!(err, RepsenseError::EmptyReference));
    }

    #[test]
    fn test_aligned_to_same_frame_is_identity() {
        let frame = bent_left_arm();
        let reference =
            ReferencePose::capture(&frame, &JointTable::standard(), None, FrameTime::ZERO).unwrap();
        let aligned = reference.aligned_to(&frame).unwrap();
        for (i, l) in frame.iter() {
            let a = aligned.get(i).unwrap();
            assert!((a.x - l.x).abs() < 1e-5 && (a.y - l.y).abs() < 1e-5);
        }
    }
}
