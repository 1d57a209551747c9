//! Integration tests for the preprocessing and reconstruction path
//!
//! Tests: raw frames → preprocess_hand → reconstruct → world recomposition

use hand_km::config::{PreprocessConfig, ReconstructionConfig};
use hand_km::joint::FIRST_FINGER_JOINTS;
use hand_km::preprocess::preprocess_hand;
use hand_km::reconstruct::reconstruct;
use hand_km::{demo, Frame, Hand, HandJoint, HandType, JointPositions};
use nalgebra::Vector3;

const SPACING: f64 = 0.02;

/// Flat hand with every finger continuing straight along its base direction.
fn straight_hand() -> JointPositions {
    let mut positions = JointPositions::default();
    let bases = [
        (HandJoint::Thumb1, Vector3::new(0.05, 0.01, 0.0)),
        (HandJoint::Index1, Vector3::new(0.03, 0.04, 0.0)),
        (HandJoint::Middle1, Vector3::new(0.0, 0.05, 0.0)),
        (HandJoint::Ring1, Vector3::new(-0.03, 0.04, 0.0)),
        (HandJoint::Pinky1, Vector3::new(-0.05, 0.03, 0.0)),
    ];
    for (first, base) in bases {
        let direction = base.normalize();
        for k in 0..4 {
            let joint = HandJoint::from_index(first.index() + k).unwrap();
            positions[joint] = base + direction * (SPACING * k as f64);
        }
    }
    positions
}

fn steady_hand(hand_type: HandType, positions: JointPositions, frames: usize) -> Hand {
    let frames = (0..frames)
        .map(|i| Frame::new(i as f64 / 30.0, positions))
        .collect();
    Hand::new("Scenario", hand_type, frames)
}

fn exact_lengths() -> ReconstructionConfig {
    ReconstructionConfig {
        use_average_distance: false,
        ..ReconstructionConfig::default()
    }
}

#[test]
fn test_straight_middle_finger_points_along_the_palm() {
    let hand = steady_hand(HandType::Right, straight_hand(), 3);
    let preprocessed = preprocess_hand(&hand, &PreprocessConfig::default()).unwrap();

    for frame in preprocessed.frames() {
        let palm = frame.world_positions.palm_size();
        assert!((palm - 0.1).abs() < 1e-9, "palm size {palm}");
    }

    let animation = reconstruct(&preprocessed, &exact_lengths()).unwrap();
    assert_eq!(animation.frames.len(), 3);
    for pose in &animation.frames {
        let t = pose.joint(HandJoint::Middle1).translation;
        assert!(t.x.abs() < 1e-9, "x = {}", t.x);
        assert!(t.z.abs() < 1e-9, "z = {}", t.z);
        assert!((t.y - 0.1).abs() < 1e-9, "y = {}", t.y);
    }
}

#[test]
fn test_recomposed_pose_matches_preprocessed_positions() {
    for hand_type in [HandType::Left, HandType::Right] {
        let hand = demo::waving_hand(hand_type, 60, 30.0);
        let preprocessed = preprocess_hand(&hand, &PreprocessConfig::default()).unwrap();
        let animation = reconstruct(&preprocessed, &exact_lengths()).unwrap();

        for (pose, frame) in animation.frames.iter().zip(preprocessed.frames()) {
            let rebuilt = pose.world_positions();
            for joint in HandJoint::ALL {
                let expected = frame.world_positions[joint];
                let error = (rebuilt[joint] - expected).norm() / expected.norm().max(1e-3);
                assert!(error < 1e-5, "{hand_type} {joint}: relative error {error}");
            }
        }
    }
}

#[test]
fn test_average_distance_keeps_translation_directions() {
    let hand = demo::waving_hand(HandType::Right, 40, 30.0);
    let preprocessed = preprocess_hand(&hand, &PreprocessConfig::default()).unwrap();
    let averaged = reconstruct(&preprocessed, &ReconstructionConfig::default()).unwrap();
    let measured = reconstruct(&preprocessed, &exact_lengths()).unwrap();

    for (a, m) in averaged.frames.iter().zip(&measured.frames) {
        for joint in HandJoint::ALL.into_iter().skip(1) {
            let ta = a.joint(joint).translation;
            let tm = m.joint(joint).translation;
            assert!((ta.normalize() - tm.normalize()).norm() < 1e-9, "{joint}");
            assert!(
                (ta.norm() - preprocessed.average_distance(joint)).abs() < 1e-12,
                "{joint}"
            );
        }
    }
}

#[test]
fn test_tips_carry_translation_only() {
    let hand = steady_hand(HandType::Left, straight_hand().map(|p| Vector3::new(-p.x, p.y, p.z)), 2);
    let preprocessed = preprocess_hand(&hand, &PreprocessConfig::default()).unwrap();
    let animation = reconstruct(&preprocessed, &exact_lengths()).unwrap();

    let pose = &animation.frames[0];
    for joint in HandJoint::ALL {
        assert_eq!(pose.joint(joint).rotation.is_none(), joint.is_tip(), "{joint}");
    }
    for first in FIRST_FINGER_JOINTS {
        assert!(pose.joint(first).translation.norm() > 0.0);
    }
}
