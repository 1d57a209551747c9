//! Fixed joint topology of a tracked hand.
//!
//! 21 joints: the wrist plus four joints (three phalanges and a tip) for each
//! of the five fingers. The tree is rooted at the wrist and every finger is a
//! chain of exactly four joints, so a parent-before-child traversal is just
//! "wrist, first joints, second and third joints, tips".

use std::fmt;

use serde::{Serialize, Serializer};

pub const JOINT_COUNT: usize = 21;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HandJoint {
    Wrist,
    Thumb1,
    Thumb2,
    Thumb3,
    ThumbTip,
    Index1,
    Index2,
    Index3,
    IndexTip,
    Middle1,
    Middle2,
    Middle3,
    MiddleTip,
    Ring1,
    Ring2,
    Ring3,
    RingTip,
    Pinky1,
    Pinky2,
    Pinky3,
    PinkyTip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

use HandJoint::*;

impl HandJoint {
    /// All joints in index order.
    pub const ALL: [HandJoint; JOINT_COUNT] = [
        Wrist, Thumb1, Thumb2, Thumb3, ThumbTip, Index1, Index2, Index3, IndexTip, Middle1,
        Middle2, Middle3, MiddleTip, Ring1, Ring2, Ring3, RingTip, Pinky1, Pinky2, Pinky3,
        PinkyTip,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<HandJoint> {
        Self::ALL.get(index).copied()
    }

    /// Parent joint, `None` only for the wrist.
    pub const fn predecessor(self) -> Option<HandJoint> {
        PREDECESSORS[self.index()]
    }

    /// Children: five for the wrist, none for tips, one for everything else.
    pub fn successors(self) -> &'static [HandJoint] {
        match self {
            Wrist => &FIRST_FINGER_JOINTS,
            ThumbTip | IndexTip | MiddleTip | RingTip | PinkyTip => &[],
            // Non-tip finger joints are followed by the next index in their chain.
            joint => std::slice::from_ref(&JOINTS[joint.index() + 1]),
        }
    }

    pub const fn is_tip(self) -> bool {
        matches!(self, ThumbTip | IndexTip | MiddleTip | RingTip | PinkyTip)
    }

    /// Upper-case identifier, e.g. `INDEX_TIP`.
    pub const fn identifier(self) -> &'static str {
        IDENTIFIERS[self.index()]
    }
}

impl fmt::Display for HandJoint {
    /// Title-cased identifier with spaces: `Index 1`, `Thumb Tip`, `Wrist`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for word in self.identifier().split('_') {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            let mut chars = word.chars();
            if let Some(c) = chars.next() {
                write!(f, "{}{}", c, chars.as_str().to_lowercase())?;
            }
        }
        Ok(())
    }
}

impl Serialize for HandJoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.identifier())
    }
}

static JOINTS: [HandJoint; JOINT_COUNT] = HandJoint::ALL;

const PREDECESSORS: [Option<HandJoint>; JOINT_COUNT] = [
    None,
    Some(Wrist),
    Some(Thumb1),
    Some(Thumb2),
    Some(Thumb3),
    Some(Wrist),
    Some(Index1),
    Some(Index2),
    Some(Index3),
    Some(Wrist),
    Some(Middle1),
    Some(Middle2),
    Some(Middle3),
    Some(Wrist),
    Some(Ring1),
    Some(Ring2),
    Some(Ring3),
    Some(Wrist),
    Some(Pinky1),
    Some(Pinky2),
    Some(Pinky3),
];

const IDENTIFIERS: [&str; JOINT_COUNT] = [
    "WRIST",
    "THUMB_1",
    "THUMB_2",
    "THUMB_3",
    "THUMB_TIP",
    "INDEX_1",
    "INDEX_2",
    "INDEX_3",
    "INDEX_TIP",
    "MIDDLE_1",
    "MIDDLE_2",
    "MIDDLE_3",
    "MIDDLE_TIP",
    "RING_1",
    "RING_2",
    "RING_3",
    "RING_TIP",
    "PINKY_1",
    "PINKY_2",
    "PINKY_3",
    "PINKY_TIP",
];

/// Joints parented directly to the wrist.
pub const FIRST_FINGER_JOINTS: [HandJoint; 5] = [Thumb1, Index1, Middle1, Ring1, Pinky1];

/// Joints parented to another phalanx that still have a successor.
/// Ordered so every second joint precedes the third joint of its finger.
pub const SECOND_AND_THIRD_FINGER_JOINTS: [HandJoint; 10] = [
    Thumb2, Index2, Middle2, Ring2, Pinky2, Thumb3, Index3, Middle3, Ring3, Pinky3,
];

pub const TIP_JOINTS: [HandJoint; 5] = [ThumbTip, IndexTip, MiddleTip, RingTip, PinkyTip];

/// Parent-before-child order over the whole tree.
pub const PROCESSING_ORDER: [HandJoint; JOINT_COUNT] = [
    Wrist, Thumb1, Index1, Middle1, Ring1, Pinky1, Thumb2, Index2, Middle2, Ring2, Pinky2, Thumb3,
    Index3, Middle3, Ring3, Pinky3, ThumbTip, IndexTip, MiddleTip, RingTip, PinkyTip,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_joint_but_the_wrist_has_a_predecessor() {
        for joint in HandJoint::ALL {
            assert_eq!(joint.predecessor().is_none(), joint == Wrist, "{joint}");
        }
    }

    #[test]
    fn tips_have_no_successors() {
        for joint in TIP_JOINTS {
            assert!(joint.is_tip());
            assert!(joint.successors().is_empty());
        }
        for joint in HandJoint::ALL.iter().filter(|j| !j.is_tip() && **j != Wrist) {
            assert_eq!(joint.successors().len(), 1, "{joint}");
        }
        assert_eq!(Wrist.successors().len(), 5);
    }

    #[test]
    fn parent_and_child_relations_agree() {
        for joint in HandJoint::ALL {
            if let Some(parent) = joint.predecessor() {
                assert!(parent.successors().contains(&joint), "{parent} -> {joint}");
            }
            for child in joint.successors() {
                assert_eq!(child.predecessor(), Some(joint));
            }
        }
    }

    #[test]
    fn processing_order_visits_parents_first() {
        let mut seen = [false; JOINT_COUNT];
        for joint in PROCESSING_ORDER {
            if let Some(parent) = joint.predecessor() {
                assert!(seen[parent.index()], "{joint} before {parent}");
            }
            seen[joint.index()] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn index_round_trip() {
        for (i, joint) in HandJoint::ALL.iter().enumerate() {
            assert_eq!(joint.index(), i);
            assert_eq!(HandJoint::from_index(i), Some(*joint));
        }
        assert_eq!(HandJoint::from_index(JOINT_COUNT), None);
    }

    #[test]
    fn display_names() {
        assert_eq!(Wrist.to_string(), "Wrist");
        assert_eq!(Index1.to_string(), "Index 1");
        assert_eq!(ThumbTip.to_string(), "Thumb Tip");
    }
}
