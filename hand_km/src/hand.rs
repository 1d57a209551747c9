use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::ArityError;
use crate::joint::{HandJoint, JOINT_COUNT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HandType {
    Left,
    Right,
}

impl FromStr for HandType {
    type Err = ();

    /// Case-insensitive `left` / `right`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LEFT" => Ok(HandType::Left),
            "RIGHT" => Ok(HandType::Right),
            _ => Err(()),
        }
    }
}

impl fmt::Display for HandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HandType::Left => "LEFT",
            HandType::Right => "RIGHT",
        })
    }
}

/// One 3D position per joint, indexed by [`HandJoint`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointPositions([Vector3<f64>; JOINT_COUNT]);

impl JointPositions {
    pub fn from_vec(positions: Vec<Vector3<f64>>) -> Result<Self, ArityError> {
        let actual = positions.len();
        let array: [Vector3<f64>; JOINT_COUNT] =
            positions.try_into().map_err(|_| ArityError {
                what: "joint positions",
                expected: JOINT_COUNT,
                actual,
            })?;
        Ok(Self(array))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vector3<f64>> {
        self.0.iter()
    }

    pub fn map(&self, f: impl FnMut(Vector3<f64>) -> Vector3<f64>) -> Self {
        Self(self.0.map(f))
    }

    /// Distance between a joint and its predecessor; zero for the wrist.
    pub fn bone_length(&self, joint: HandJoint) -> f64 {
        match joint.predecessor() {
            Some(parent) => (self[joint] - self[parent]).norm(),
            None => 0.0,
        }
    }

    /// Wrist to middle-finger-base distance.
    pub fn palm_size(&self) -> f64 {
        self.bone_length(HandJoint::Middle1)
    }
}

impl Default for JointPositions {
    fn default() -> Self {
        Self([Vector3::zeros(); JOINT_COUNT])
    }
}

impl Index<HandJoint> for JointPositions {
    type Output = Vector3<f64>;

    fn index(&self, joint: HandJoint) -> &Vector3<f64> {
        &self.0[joint.index()]
    }
}

impl IndexMut<HandJoint> for JointPositions {
    fn index_mut(&mut self, joint: HandJoint) -> &mut Vector3<f64> {
        &mut self.0[joint.index()]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Seconds since the start of the capture.
    pub timestamp: f64,
    pub world_positions: JointPositions,
    /// Device-native normalized coordinates; carried through, never read by the engine.
    pub normalized_positions: Option<JointPositions>,
}

impl Frame {
    pub fn new(timestamp: f64, world_positions: JointPositions) -> Self {
        Self {
            timestamp,
            world_positions,
            normalized_positions: None,
        }
    }

    /// Same frame with different world positions.
    pub fn with_world_positions(&self, world_positions: JointPositions) -> Self {
        Self {
            timestamp: self.timestamp,
            world_positions,
            normalized_positions: self.normalized_positions,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hand {
    pub name: String,
    pub hand_type: HandType,
    /// Chronological.
    pub frames: Vec<Frame>,
}

impl Hand {
    pub fn new(name: impl Into<String>, hand_type: HandType, frames: Vec<Frame>) -> Self {
        Self {
            name: name.into(),
            hand_type,
            frames,
        }
    }

    pub fn timestamps(&self) -> Vec<f64> {
        self.frames.iter().map(|f| f.timestamp).collect()
    }

    /// Duration between first and last frame in seconds.
    pub fn duration(&self) -> f64 {
        match (self.frames.first(), self.frames.last()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => 0.0,
        }
    }
}

/// A hand after scaling and smoothing, with its canonical bone lengths.
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessedHand {
    pub hand: Hand,
    /// Mean distance of each joint to its predecessor over the whole sequence.
    /// The wrist entry is zero.
    pub average_joint_distance: [f64; JOINT_COUNT],
}

impl PreprocessedHand {
    pub fn name(&self) -> &str {
        &self.hand.name
    }

    pub fn hand_type(&self) -> HandType {
        self.hand.hand_type
    }

    pub fn frames(&self) -> &[Frame] {
        &self.hand.frames
    }

    pub fn average_distance(&self, joint: HandJoint) -> f64 {
        self.average_joint_distance[joint.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hand_type_parses_case_insensitively() {
        assert_eq!("left".parse::<HandType>(), Ok(HandType::Left));
        assert_eq!("RiGhT".parse::<HandType>(), Ok(HandType::Right));
        assert!("both".parse::<HandType>().is_err());
    }

    #[test]
    fn positions_require_one_entry_per_joint() {
        let err = JointPositions::from_vec(vec![Vector3::zeros(); 20]).unwrap_err();
        assert_eq!(err.actual, 20);
        assert!(JointPositions::from_vec(vec![Vector3::zeros(); JOINT_COUNT]).is_ok());
    }

    #[test]
    fn palm_size_is_wrist_to_middle_base() {
        let mut positions = JointPositions::default();
        positions[HandJoint::Middle1] = Vector3::new(0.0, 3.0, 4.0);
        assert_eq!(positions.palm_size(), 5.0);
        assert_eq!(positions.bone_length(HandJoint::Wrist), 0.0);
    }
}
