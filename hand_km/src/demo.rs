//! Procedural hand poses for trying the pipeline without capture data.

use std::f64::consts::PI;

use nalgebra::{Rotation3, Vector3};

use crate::hand::{Frame, Hand, HandType, JointPositions};
use crate::joint::{Finger, HandJoint};

struct FingerLayout {
    finger: Finger,
    base: Vector3<f64>,
    direction: Vector3<f64>,
    segments: [f64; 3],
    /// Curl phase offset in radians.
    phase: f64,
}

// Right hand, palm in the XY plane, fingers along +Y, thumb towards +X.
fn layout() -> [FingerLayout; 5] {
    [
        FingerLayout {
            finger: Finger::Thumb,
            base: Vector3::new(0.025, 0.02, 0.0),
            direction: Vector3::new(0.75, 0.66, 0.0),
            segments: [0.035, 0.03, 0.025],
            phase: 0.0,
        },
        FingerLayout {
            finger: Finger::Index,
            base: Vector3::new(0.025, 0.085, 0.0),
            direction: Vector3::new(0.1, 1.0, 0.0),
            segments: [0.045, 0.027, 0.022],
            phase: 0.4,
        },
        FingerLayout {
            finger: Finger::Middle,
            base: Vector3::new(0.0, 0.09, 0.0),
            direction: Vector3::new(0.0, 1.0, 0.0),
            segments: [0.05, 0.03, 0.024],
            phase: 0.8,
        },
        FingerLayout {
            finger: Finger::Ring,
            base: Vector3::new(-0.022, 0.085, 0.0),
            direction: Vector3::new(-0.08, 1.0, 0.0),
            segments: [0.046, 0.028, 0.023],
            phase: 1.2,
        },
        FingerLayout {
            finger: Finger::Pinky,
            base: Vector3::new(-0.042, 0.075, 0.0),
            direction: Vector3::new(-0.18, 1.0, 0.0),
            segments: [0.035, 0.021, 0.02],
            phase: 1.6,
        },
    ]
}

fn first_joint(finger: Finger) -> HandJoint {
    match finger {
        Finger::Thumb => HandJoint::Thumb1,
        Finger::Index => HandJoint::Index1,
        Finger::Middle => HandJoint::Middle1,
        Finger::Ring => HandJoint::Ring1,
        Finger::Pinky => HandJoint::Pinky1,
    }
}

/// Right-hand pose with every finger bent by `curl(finger phase)` per segment.
fn posed_right_hand(curl: impl Fn(f64) -> f64) -> JointPositions {
    let palm_side = Vector3::new(0.0, 0.0, -1.0);
    let mut positions = JointPositions::default();
    for finger in layout() {
        let first = first_joint(finger.finger);
        let along = finger.direction.normalize();
        let bend = curl(finger.phase);

        let mut position = finger.base;
        positions[first] = position;
        for (k, length) in finger.segments.iter().enumerate() {
            let angle = bend * (k + 1) as f64;
            let direction = along * angle.cos() + palm_side * angle.sin();
            position += direction * *length;
            // Chains are stored contiguously from the first joint to the tip.
            if let Some(joint) = HandJoint::from_index(first.index() + k + 1) {
                positions[joint] = position;
            }
        }
    }
    positions
}

fn for_hand(positions: JointPositions, hand_type: HandType) -> JointPositions {
    match hand_type {
        HandType::Right => positions,
        HandType::Left => positions.map(|p| Vector3::new(-p.x, p.y, p.z)),
    }
}

/// A flat open hand with straight fingers, wrist at the origin.
pub fn open_hand(hand_type: HandType) -> JointPositions {
    for_hand(posed_right_hand(|_| 0.0), hand_type)
}

/// A hand that curls its fingers in a rolling wave while the wrist sways.
pub fn waving_hand(hand_type: HandType, frame_count: usize, fps: f64) -> Hand {
    let frames = (0..frame_count)
        .map(|i| {
            let t = i as f64 / fps;
            let pose = posed_right_hand(|phase| 0.35 * (1.0 - (2.0 * PI * 0.5 * t + phase).cos()));
            let sway = Rotation3::from_axis_angle(&Vector3::z_axis(), 0.3 * (2.0 * PI * 1.5 * t).sin());
            let offset = Vector3::new(0.02 * (2.0 * PI * 0.25 * t).sin(), 1.0, 0.3);
            let world = pose.map(|p| sway * p + offset);
            Frame::new(t, for_hand(world, hand_type))
        })
        .collect();

    let name = match hand_type {
        HandType::Left => "Left Hand",
        HandType::Right => "Right Hand",
    };
    Hand::new(name, hand_type, frames)
}
