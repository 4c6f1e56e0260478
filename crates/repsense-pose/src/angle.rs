//! Joint angles
//!
//! The angle at vertex B between segments B->A and B->C, in degrees.

use repsense_core::{AngleMap, JointTable, Landmark, LandmarkFrame};

/// Unsigned interior angle at `b`, in [0, 180]
///
/// Coincident points are not checked: valid limbs are never zero-length.
pub fn joint_angle(a: &Landmark, b: &Landmark, c: &Landmark) -> f32 {
    let raw = (c.y - b.y).atan2(c.x - b.x) - (a.y - b.y).atan2(a.x - b.x);
    let mut angle = raw.abs().to_degrees();
    if angle > 180.0 {
        angle = 360.0 - angle;
    }
    angle.clamp(0.0, 180.0)
}

/// Angles for every joint in `table` whose three landmarks are present
///
/// Joints with an absent landmark are omitted, never defaulted. An empty
/// frame yields an empty map.
pub fn extract_angles(frame: &LandmarkFrame, table: &JointTable) -> AngleMap {
    table
        .iter()
        .filter_map(|joint| {
            let a = frame.get(joint.a)?;
            let b = frame.get(joint.b)?;
            let c = frame.get(joint.c)?;
            let angle = joint_angle(a, b, c);
            angle.is_finite().then(|| (joint.name.clone(), angle))
        })
        .collect()
}

/// `extract_angles` after dropping landmarks below `min_visibility`
pub fn extract_visible_angles(
    frame: &LandmarkFrame,
    table: &JointTable,
    min_visibility: Option<f32>,
) -> AngleMap {
    match min_visibility {
        Some(min) => extract_angles(&frame.filter_visible(min), table),
        None => extract_angles(frame, table),
    }
}

/// Mean of the named angles present in `angles`, `None` if none are
pub fn mean_angle<'a, I>(angles: &AngleMap, joints: I) -> Option<f32>
where
    I: IntoIterator<Item = &'a str>,
{
    let (sum, n) = joints
        .into_iter()
        .filter_map(|j| angles.get(j))
        .fold((0.0f32, 0usize), |(sum, n), a| (sum + a, n + 1));
    (n > 0).then(|| sum / n as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use repsense_core::LandmarkIndex;

    fn p(x: f32, y: f32) -> Landmark {
        Landmark::new(x, y)
    }

    #[test]
    fn test_straight_line() {
        let angle = joint_angle(&p(0.0, 0.0), &p(0.5, 0.0), &p(1.0, 0.0));
        assert!((angle - 180.0).abs() < 1e-3);
    }

    #[test]
    fn test_right_angle() {
        let angle = joint_angle(&p(0.0, 0.0), &p(0.5, 0.0), &p(0.5, 0.5));
        assert!((angle - 90.0).abs() < 1e-3);
    }

    #[test]
    fn test_reflex_raw_difference_folds() {
        // Bearings of -174 and 135 degrees differ by ~309, which folds to ~51
        let (a, b, c) = (p(0.4, 0.49), p(0.5, 0.5), p(0.4, 0.6));
        let (u, v) = ((a.x - b.x, a.y - b.y), (c.x - b.x, c.y - b.y));
        let norm = (u.0 * u.0 + u.1 * u.1).sqrt() * (v.0 * v.0 + v.1 * v.1).sqrt();
        let cos = (u.0 * v.0 + u.1 * v.1) / norm;
        let expected = cos.acos().to_degrees();
        let angle = joint_angle(&a, &b, &c);
        assert!(expected < 90.0);
        assert!((angle - expected).abs() < 1e-2);
    }

    fn arm(shoulder: Landmark, elbow: Landmark, wrist: Landmark) -> LandmarkFrame {
        LandmarkFrame::from_pairs([
            (LandmarkIndex::LeftShoulder.index(), shoulder),
            (LandmarkIndex::LeftElbow.index(), elbow),
            (LandmarkIndex::LeftWrist.index(), wrist),
        ])
    }

    #[test]
    fn test_extract_only_complete_joints() {
        let frame = arm(p(0.5, 0.3), p(0.5, 0.5), p(0.7, 0.5));
        let angles = extract_angles(&frame, &JointTable::standard());
        assert_eq!(angles.len(), 1);
        assert!((angles["left_elbow"] - 90.0).abs() < 1e-3);
        // left_shoulder needs the hip, which is absent
        assert!(!angles.contains_key("left_shoulder"));
    }

    #[test]
    fn test_extract_empty_frame() {
        let angles = extract_angles(&LandmarkFrame::empty(), &JointTable::standard());
        assert!(angles.is_empty());
    }

    #[test]
    fn test_extract_visible_drops_low_confidence() {
        let frame = arm(
            p(0.5, 0.3),
            p(0.5, 0.5).with_visibility(0.1),
            p(0.7, 0.5),
        );
        let table = JointTable::standard();
        assert_eq!(extract_visible_angles(&frame, &table, None).len(), 1);
        assert!(extract_visible_angles(&frame, &table, Some(0.5)).is_empty());
    }

    #[test]
    fn test_mean_angle() {
        let mut angles = AngleMap::new();
        angles.insert("left_knee".into(), 80.0);
        angles.insert("right_knee".into(), 100.0);
        assert_eq!(mean_angle(&angles, ["left_knee", "right_knee"]), Some(90.0));
        assert_eq!(mean_angle(&angles, ["left_knee", "left_hip"]), Some(80.0));
        assert_eq!(mean_angle(&angles, ["left_hip"]), None);
    }

    proptest! {
        #[test]
        fn prop_symmetric_and_bounded(
            ax in 0.0f32..1.0, ay in 0.0f32..1.0,
            bx in 0.0f32..1.0, by in 0.0f32..1.0,
            cx in 0.0f32..1.0, cy in 0.0f32..1.0,
        ) {
            let (a, b, c) = (p(ax, ay), p(bx, by), p(cx, cy));
            prop_assume!(a.distance(&b) > 1e-3 && c.distance(&b) > 1e-3);
            let forward = joint_angle(&a, &b, &c);
            let backward = joint_angle(&c, &b, &a);
            prop_assert!((0.0..=180.0).contains(&forward));
            prop_assert!((forward - backward).abs() < 1e-4);
        }

        #[test]
        fn prop_collinear_through_vertex_is_straight(
            bx in 0.2f32..0.8, by in 0.2f32..0.8,
            theta in 0.0f32..std::f32::consts::TAU,
            r1 in 0.05f32..0.2, r2 in 0.05f32..0.2,
        ) {
            let (s, c) = theta.sin_cos();
            let a = p(bx + r1 * c, by + r1 * s);
            let cc = p(bx - r2 * c, by - r2 * s);
            let angle = joint_angle(&a, &p(bx, by), &cc);
            prop_assert!((angle - 180.0).abs() < 0.05);
        }
    }
}
