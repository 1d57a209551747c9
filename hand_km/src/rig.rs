//! Static rest skeleton a sink builds before any keyframes are applied.

use nalgebra::Vector3;

use crate::hand::HandType;
use crate::joint::{HandJoint, JOINT_COUNT};

/// Tail length of tip bones, which have no successor to size them by.
pub const TIP_BONE_LENGTH: f64 = 0.01;

#[derive(Debug, Clone, PartialEq)]
pub struct RestBone {
    pub joint: HandJoint,
    pub name: String,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub head: Vector3<f64>,
    pub tail: Vector3<f64>,
}

impl RestBone {
    pub fn length(&self) -> f64 {
        (self.tail - self.head).norm()
    }
}

/// One bone per joint, indexed by [`HandJoint::index`].
#[derive(Debug, Clone, PartialEq)]
pub struct RestSkeleton {
    pub hand_type: HandType,
    pub bones: Vec<RestBone>,
}

impl RestSkeleton {
    /// Lays out the hand's bones from its average bone lengths.
    ///
    /// The wrist bone takes the `wrist_bone` name of the rig it attaches to
    /// and is as long as the palm. Every other bone starts at its parent's
    /// head and extends sideways (towards +X for a left hand, -X for a right
    /// one) by the length of the bone that follows it.
    pub fn new(
        hand_name: &str,
        hand_type: HandType,
        average_joint_distance: &[f64; JOINT_COUNT],
        wrist_bone: &str,
    ) -> Self {
        let side = match hand_type {
            HandType::Left => 1.0,
            HandType::Right => -1.0,
        };

        let mut bones: Vec<RestBone> = Vec::with_capacity(JOINT_COUNT);
        for joint in HandJoint::ALL {
            let bone = match joint.predecessor() {
                None => RestBone {
                    joint,
                    name: wrist_bone.to_string(),
                    parent: None,
                    children: Vec::new(),
                    head: Vector3::zeros(),
                    tail: Vector3::new(
                        0.0,
                        average_joint_distance[HandJoint::Middle1.index()],
                        0.0,
                    ),
                },
                Some(parent) => {
                    let head = bones[parent.index()].head;
                    let length = match joint.successors().first() {
                        Some(successor) => average_joint_distance[successor.index()],
                        None => TIP_BONE_LENGTH,
                    };
                    RestBone {
                        joint,
                        name: bone_name(hand_name, joint),
                        parent: Some(parent.index()),
                        children: Vec::new(),
                        head,
                        tail: head + Vector3::new(side * length, 0.0, 0.0),
                    }
                }
            };
            bones.push(bone);
        }

        for joint in HandJoint::ALL {
            if let Some(parent) = joint.predecessor() {
                bones[parent.index()].children.push(joint.index());
            }
        }

        Self { hand_type, bones }
    }

    pub fn bone(&self, joint: HandJoint) -> &RestBone {
        &self.bones[joint.index()]
    }

    pub fn parent_name(&self, joint: HandJoint) -> Option<&str> {
        self.bone(joint)
            .parent
            .map(|parent| self.bones[parent].name.as_str())
    }

    /// Indented hierarchy, one bone per line.
    pub fn tree(&self) -> String {
        let mut out = format!("{} hand rig: {} bones\n", self.hand_type, self.bones.len());
        for (i, bone) in self.bones.iter().enumerate() {
            if bone.parent.is_none() {
                self.write_subtree(&mut out, i, 1);
            }
        }
        out
    }

    pub fn print_tree(&self) {
        print!("{}", self.tree());
    }

    fn write_subtree(&self, out: &mut String, idx: usize, depth: usize) {
        let bone = &self.bones[idx];
        let indent = "  ".repeat(depth);
        let root = if bone.parent.is_none() { " (root)" } else { "" };
        out.push_str(&format!("{indent}{}{root} [{:.4}]\n", bone.name, bone.length()));
        for &child in &bone.children {
            self.write_subtree(out, child, depth + 1);
        }
    }
}

/// `"{hand name}_{joint display name}"`, e.g. `Left Hand_Index 1`.
pub fn bone_name(hand_name: &str, joint: HandJoint) -> String {
    format!("{hand_name}_{joint}")
}
