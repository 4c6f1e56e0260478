//! Joint specifications and angle maps
//!
//! A joint is a named triplet of landmark indices `(a, b, c)`; its angle is
//! measured at the vertex `b`. The table is static for a session.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{LandmarkIndex, RepsenseError, RepsenseResult};

/// Joint name -> angle in degrees, in [0, 180]
///
/// Produced fresh every frame. A joint whose landmarks were absent is a
/// missing key, never a sentinel value.
pub type AngleMap = BTreeMap<String, f32>;

/// Named landmark triplet, angle measured at `b`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JointSpec {
    pub name: String,
    pub a: usize,
    pub b: usize,
    pub c: usize,
}

impl JointSpec {
    pub fn new(
        name: impl Into<String>,
        a: LandmarkIndex,
        b: LandmarkIndex,
        c: LandmarkIndex,
    ) -> Self {
        Self {
            name: name.into(),
            a: a.index(),
            b: b.index(),
            c: c.index(),
        }
    }

    fn validate(&self) -> RepsenseResult<()> {
        for index in [self.a, self.b, self.c] {
            if index >= LandmarkIndex::COUNT {
                return Err(RepsenseError::LandmarkIndexOutOfRange {
                    joint: self.name.clone(),
                    index,
                    max: LandmarkIndex::COUNT - 1,
                });
            }
        }
        if self.a == self.b || self.b == self.c || self.a == self.c {
            return Err(RepsenseError::DegenerateJoint(self.name.clone()));
        }
        Ok(())
    }
}

/// Static table of joints tracked for a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JointTable {
    joints: Vec<JointSpec>,
}

impl JointTable {
    /// Build and validate a table
    pub fn new(joints: Vec<JointSpec>) -> RepsenseResult<Self> {
        let table = Self { joints };
        table.validate()?;
        Ok(table)
    }

    /// Elbows, shoulders, hips and knees on both sides
    pub fn standard() -> Self {
        use LandmarkIndex::*;
        Self {
            joints: vec![
                JointSpec::new("left_elbow", LeftShoulder, LeftElbow, LeftWrist),
                JointSpec::new("right_elbow", RightShoulder, RightElbow, RightWrist),
                JointSpec::new("left_shoulder", LeftElbow, LeftShoulder, LeftHip),
                JointSpec::new("right_shoulder", RightElbow, RightShoulder, RightHip),
                JointSpec::new("left_hip", LeftShoulder, LeftHip, LeftKnee),
                JointSpec::new("right_hip", RightShoulder, RightHip, RightKnee),
                JointSpec::new("left_knee", LeftHip, LeftKnee, LeftAnkle),
                JointSpec::new("right_knee", RightHip, RightKnee, RightAnkle),
            ],
        }
    }

    /// Unique names, indices inside the topology, distinct vertices
    pub fn validate(&self) -> RepsenseResult<()> {
        let mut seen = HashSet::new();
        for joint in &self.joints {
            joint.validate()?;
            if !seen.insert(joint.name.as_str()) {
                return Err(RepsenseError::DuplicateJoint(joint.name.clone()));
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&JointSpec> {
        self.joints.iter().find(|j| j.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Fail with `UnknownJoint` unless `name` is in the table
    pub fn require(&self, name: &str) -> RepsenseResult<&JointSpec> {
        self.get(name)
            .ok_or_else(|| RepsenseError::UnknownJoint(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &JointSpec> {
        self.joints.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.joints.iter().map(|j| j.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }
}

impl Default for JointTable {
    fn default() -> Self {
        Self::standard()
    }
}
