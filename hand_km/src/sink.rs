//! Hand-off of reconstructed animation to a skeleton consumer.
//!
//! A sink first receives the rest skeleton of a hand, then one keyframe track
//! per bone. Frame numbers are already in the host's convention
//! (`timestamp * fps + start_frame`).

use nalgebra::{UnitQuaternion, Vector3};
use serde::Serialize;
use tracing::debug;

use crate::config::AlignmentConfig;
use crate::error::{ArityError, Error, SinkError};
use crate::hand::HandType;
use crate::joint::{HandJoint, JOINT_COUNT};
use crate::reconstruct::HandAnimation;
use crate::rig::{RestBone, RestSkeleton};

/// One keyframe of one bone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSample {
    pub frame_number: f64,
    pub translation: Vector3<f64>,
    /// `None` for tip bones.
    pub rotation: Option<UnitQuaternion<f64>>,
}

pub trait SkeletonSink {
    /// Creates the static hierarchy of one hand inside `rig`.
    fn build_skeleton(
        &mut self,
        rig: &str,
        hand_name: &str,
        skeleton: &RestSkeleton,
    ) -> Result<(), SinkError>;

    /// Keyframes one bone below the wrist.
    fn animate_bone(
        &mut self,
        hand_name: &str,
        bone: &RestBone,
        samples: &[PoseSample],
    ) -> Result<(), SinkError>;

    /// World placement of the wrist. Rigs that drive the wrist themselves ignore it.
    fn place_root(
        &mut self,
        _hand_name: &str,
        _bone: &RestBone,
        _samples: &[PoseSample],
    ) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Keyframe tracks of every joint, indexed by [`HandJoint::index`].
pub fn joint_tracks(animation: &HandAnimation, alignment: &AlignmentConfig) -> Vec<Vec<PoseSample>> {
    HandJoint::ALL
        .iter()
        .map(|&joint| {
            animation
                .track(joint)
                .map(|(timestamp, pose)| PoseSample {
                    frame_number: alignment.frame_number(timestamp),
                    translation: pose.translation,
                    rotation: pose.rotation,
                })
                .collect()
        })
        .collect()
}

/// Builds the hand's rest skeleton in `sink` and keyframes all of its bones.
pub fn export_hand(
    sink: &mut dyn SkeletonSink,
    animation: &HandAnimation,
    alignment: &AlignmentConfig,
) -> Result<(), Error> {
    let rig = alignment.target_rig()?;
    let target = alignment.target_bone(animation.hand_type)?;
    let skeleton = RestSkeleton::new(
        &animation.name,
        animation.hand_type,
        &animation.average_joint_distance,
        target,
    );
    let tracks = joint_tracks(animation, alignment);
    export_tracks(sink, rig, &animation.name, &skeleton, &tracks)
}

/// Hands `tracks` to `sink`, one per bone of `skeleton`.
pub fn export_tracks(
    sink: &mut dyn SkeletonSink,
    rig: &str,
    hand_name: &str,
    skeleton: &RestSkeleton,
    tracks: &[Vec<PoseSample>],
) -> Result<(), Error> {
    ArityError::check("rest skeleton bones", JOINT_COUNT, skeleton.bones.len())?;
    ArityError::check("joint tracks", skeleton.bones.len(), tracks.len())?;

    let sink_error = |source| Error::Sink {
        hand: hand_name.to_string(),
        source,
    };
    sink.build_skeleton(rig, hand_name, skeleton).map_err(sink_error)?;
    for (bone, samples) in skeleton.bones.iter().zip(tracks) {
        if bone.parent.is_none() {
            sink.place_root(hand_name, bone, samples).map_err(sink_error)?;
        } else {
            sink.animate_bone(hand_name, bone, samples).map_err(sink_error)?;
        }
    }
    debug!(rig, hand = %hand_name, bones = skeleton.bones.len(), "hand exported");
    Ok(())
}

/// Keeps everything it is given in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub hands: Vec<RecordedHand>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedHand {
    pub rig: String,
    pub name: String,
    pub skeleton: RestSkeleton,
    pub root: Vec<PoseSample>,
    /// `(bone name, samples)` in the order they were animated.
    pub tracks: Vec<(String, Vec<PoseSample>)>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hand(&self, name: &str) -> Option<&RecordedHand> {
        self.hands.iter().find(|h| h.name == name)
    }

    fn current(&mut self, hand_name: &str) -> Result<&mut RecordedHand, SinkError> {
        self.hands
            .iter_mut()
            .rev()
            .find(|h| h.name == hand_name)
            .ok_or_else(|| SinkError::new(format!("no skeleton built for hand {hand_name:?}")))
    }
}

impl RecordedHand {
    pub fn track(&self, bone_name: &str) -> Option<&[PoseSample]> {
        self.tracks
            .iter()
            .find(|(name, _)| name == bone_name)
            .map(|(_, samples)| samples.as_slice())
    }
}

impl SkeletonSink for RecordingSink {
    fn build_skeleton(
        &mut self,
        rig: &str,
        hand_name: &str,
        skeleton: &RestSkeleton,
    ) -> Result<(), SinkError> {
        self.hands.push(RecordedHand {
            rig: rig.to_string(),
            name: hand_name.to_string(),
            skeleton: skeleton.clone(),
            root: Vec::new(),
            tracks: Vec::new(),
        });
        Ok(())
    }

    fn animate_bone(
        &mut self,
        hand_name: &str,
        bone: &RestBone,
        samples: &[PoseSample],
    ) -> Result<(), SinkError> {
        self.current(hand_name)?
            .tracks
            .push((bone.name.clone(), samples.to_vec()));
        Ok(())
    }

    fn place_root(
        &mut self,
        hand_name: &str,
        _bone: &RestBone,
        samples: &[PoseSample],
    ) -> Result<(), SinkError> {
        self.current(hand_name)?.root = samples.to_vec();
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct JsonKeyframe {
    frame: f64,
    location: [f64; 3],
    /// `[w, x, y, z]`
    rotation: Option<[f64; 4]>,
}

impl From<&PoseSample> for JsonKeyframe {
    fn from(sample: &PoseSample) -> Self {
        let t = sample.translation;
        JsonKeyframe {
            frame: sample.frame_number,
            location: [t.x, t.y, t.z],
            rotation: sample.rotation.map(|q| [q.w, q.i, q.j, q.k]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct JsonBone {
    name: String,
    joint: HandJoint,
    parent: Option<String>,
    head: [f64; 3],
    tail: [f64; 3],
    keyframes: Vec<JsonKeyframe>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct JsonHand {
    rig: String,
    name: String,
    hand_type: HandType,
    bones: Vec<JsonBone>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
struct JsonRig {
    hands: Vec<JsonHand>,
}

/// Collects every hand into one JSON rig document.
#[derive(Debug, Default)]
pub struct JsonRigSink {
    rig: JsonRig,
}

impl JsonRigSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to_json(&self) -> Result<String, SinkError> {
        serde_json::to_string_pretty(&self.rig)
            .map_err(|e| SinkError::wrap("failed to serialize rig", e))
    }

    fn bone_mut(&mut self, hand_name: &str, bone_name: &str) -> Result<&mut JsonBone, SinkError> {
        self.rig
            .hands
            .iter_mut()
            .rev()
            .find(|h| h.name == hand_name)
            .and_then(|h| h.bones.iter_mut().find(|b| b.name == bone_name))
            .ok_or_else(|| {
                SinkError::new(format!("unknown bone {bone_name:?} of hand {hand_name:?}"))
            })
    }

    fn set_keyframes(
        &mut self,
        hand_name: &str,
        bone: &RestBone,
        samples: &[PoseSample],
    ) -> Result<(), SinkError> {
        self.bone_mut(hand_name, &bone.name)?.keyframes = samples.iter().map(Into::into).collect();
        Ok(())
    }
}

fn array(v: &Vector3<f64>) -> [f64; 3] {
    [v.x, v.y, v.z]
}

impl SkeletonSink for JsonRigSink {
    fn build_skeleton(
        &mut self,
        rig: &str,
        hand_name: &str,
        skeleton: &RestSkeleton,
    ) -> Result<(), SinkError> {
        let bones = skeleton
            .bones
            .iter()
            .map(|bone| JsonBone {
                name: bone.name.clone(),
                joint: bone.joint,
                parent: skeleton.parent_name(bone.joint).map(str::to_string),
                head: array(&bone.head),
                tail: array(&bone.tail),
                keyframes: Vec::new(),
            })
            .collect();
        self.rig.hands.push(JsonHand {
            rig: rig.to_string(),
            name: hand_name.to_string(),
            hand_type: skeleton.hand_type,
            bones,
        });
        Ok(())
    }

    fn animate_bone(
        &mut self,
        hand_name: &str,
        bone: &RestBone,
        samples: &[PoseSample],
    ) -> Result<(), SinkError> {
        self.set_keyframes(hand_name, bone, samples)
    }

    fn place_root(
        &mut self,
        hand_name: &str,
        bone: &RestBone,
        samples: &[PoseSample],
    ) -> Result<(), SinkError> {
        self.set_keyframes(hand_name, bone, samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::reconstruct::{FramePose, LocalPose};
    use serde_json::Value;

    fn animation(frames: usize) -> HandAnimation {
        let mut joints = [LocalPose::default(); JOINT_COUNT];
        for joint in HandJoint::ALL {
            joints[joint.index()] = LocalPose {
                translation: Vector3::new(0.0, 0.01 * joint.index() as f64, 0.0),
                rotation: (!joint.is_tip()).then(UnitQuaternion::identity),
            };
        }
        HandAnimation {
            name: "Left Hand".to_string(),
            hand_type: HandType::Left,
            frames: (0..frames)
                .map(|i| FramePose {
                    frame: i,
                    timestamp: i as f64 * 0.5,
                    joints,
                })
                .collect(),
            skipped_frames: Vec::new(),
            average_joint_distance: [0.02; JOINT_COUNT],
        }
    }

    fn alignment() -> AlignmentConfig {
        AlignmentConfig {
            target_rig: Some("Armature".to_string()),
            left_hand_target: Some("hand.L".to_string()),
            fps: 24.0,
            start_frame: 1.0,
            ..AlignmentConfig::default()
        }
    }

    #[test]
    fn every_bone_gets_a_track_with_host_frame_numbers() {
        let mut sink = RecordingSink::new();
        export_hand(&mut sink, &animation(3), &alignment()).unwrap();

        let hand = sink.hand("Left Hand").unwrap();
        assert_eq!(hand.rig, "Armature");
        assert_eq!(hand.tracks.len(), JOINT_COUNT - 1);
        assert_eq!(hand.root.len(), 3);

        let tip = hand.track("Left Hand_Index Tip").unwrap();
        assert_eq!(
            tip.iter().map(|s| s.frame_number).collect::<Vec<_>>(),
            vec![1.0, 13.0, 25.0]
        );
        assert!(tip.iter().all(|s| s.rotation.is_none()));
        assert!(hand.track("Left Hand_Index 3").unwrap()[0].rotation.is_some());
    }

    #[test]
    fn missing_target_bone_is_a_config_error() {
        let mut sink = RecordingSink::new();
        let mut hand = animation(1);
        hand.hand_type = HandType::Right;
        let err = export_hand(&mut sink, &hand, &alignment()).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::MissingTarget("right hand target bone"))
        ));
        assert!(sink.hands.is_empty());
    }

    #[test]
    fn missing_target_rig_is_checked_first() {
        let mut sink = RecordingSink::new();
        let mut hand = animation(1);
        hand.hand_type = HandType::Right;
        let alignment = AlignmentConfig {
            target_rig: Some(String::new()),
            ..alignment()
        };
        let err = export_hand(&mut sink, &hand, &alignment).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::MissingTarget("target rig"))
        ));
        assert!(sink.hands.is_empty());
    }

    #[test]
    fn track_count_must_match_the_skeleton() {
        let hand = animation(2);
        let skeleton = RestSkeleton::new(&hand.name, hand.hand_type, &hand.average_joint_distance, "hand.L");
        let mut tracks = joint_tracks(&hand, &alignment());
        tracks.pop();

        let mut sink = RecordingSink::new();
        let err = export_tracks(&mut sink, "Armature", &hand.name, &skeleton, &tracks).unwrap_err();
        assert!(matches!(
            err,
            Error::Arity(ArityError {
                expected: 21,
                actual: 20,
                ..
            })
        ));
    }

    #[test]
    fn bones_of_unknown_hands_are_rejected() {
        let skeleton = RestSkeleton::new("Other", HandType::Left, &[0.02; JOINT_COUNT], "hand.L");
        let mut sink = RecordingSink::new();
        let bone = skeleton.bone(HandJoint::Index1);
        assert!(sink.animate_bone("Other", bone, &[]).is_err());
    }

    #[test]
    fn json_rig_contains_hierarchy_and_keyframes() {
        let mut sink = JsonRigSink::new();
        export_hand(&mut sink, &animation(2), &alignment()).unwrap();
        let doc: Value = serde_json::from_str(&sink.to_json().unwrap()).unwrap();

        let hand = &doc["hands"][0];
        assert_eq!(hand["rig"], "Armature");
        assert_eq!(hand["name"], "Left Hand");
        assert_eq!(hand["hand_type"], "LEFT");
        let bones = hand["bones"].as_array().unwrap();
        assert_eq!(bones.len(), JOINT_COUNT);
        assert_eq!(bones[0]["name"], "hand.L");
        assert_eq!(bones[0]["parent"], Value::Null);
        assert_eq!(bones[6]["joint"], "INDEX_2");
        assert_eq!(bones[6]["parent"], "Left Hand_Index 1");
        assert_eq!(bones[6]["keyframes"][1]["frame"], 13.0);
        assert_eq!(bones[6]["keyframes"][0]["rotation"], serde_json::json!([1.0, 0.0, 0.0, 0.0]));
        assert_eq!(bones[8]["keyframes"][0]["rotation"], Value::Null);
    }
}
