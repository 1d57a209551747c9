//! Local-frame reconstruction: world joint positions to parent-relative transforms.
//!
//! Every frame is solved on its own. The wrist gets an orthonormal palm basis,
//! then each joint gets an outgoing basis whose `y` axis points at its
//! successor. A joint's local rotation takes the parent's axes to its own and
//! its local translation is the bone expressed in the parent's axes, so walking
//! the tree from the wrist (see [`FramePose::world_positions`]) rebuilds the
//! measured pose.

use std::num::NonZeroUsize;
use std::thread;
use std::time::Instant;

use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};
use tracing::{debug, info, warn};

use crate::config::{DegenerateFramePolicy, ReconstructionConfig};
use crate::error::{DegenerateStep, Error, PoseDegeneracyError};
use crate::hand::{Frame, HandType, JointPositions, PreprocessedHand};
use crate::joint::{
    HandJoint, FIRST_FINGER_JOINTS, JOINT_COUNT, PROCESSING_ORDER,
    SECOND_AND_THIRD_FINGER_JOINTS, TIP_JOINTS,
};

/// Below this many frames the work stays on the calling thread.
const MIN_FRAMES_PER_WORKER: usize = 64;

/// Transform of a joint relative to its parent's local frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalPose {
    pub translation: Vector3<f64>,
    /// `None` for tips, which have nothing parented to them.
    pub rotation: Option<UnitQuaternion<f64>>,
}

impl Default for LocalPose {
    fn default() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation: None,
        }
    }
}

/// Reconstructed pose of one input frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FramePose {
    /// Index of the source frame in its hand.
    pub frame: usize,
    pub timestamp: f64,
    /// Indexed by [`HandJoint::index`]. The wrist entry holds the wrist's
    /// world position and local-to-world rotation.
    pub joints: [LocalPose; JOINT_COUNT],
}

impl FramePose {
    pub fn joint(&self, joint: HandJoint) -> &LocalPose {
        &self.joints[joint.index()]
    }

    pub fn wrist_position(&self) -> Vector3<f64> {
        self.joint(HandJoint::Wrist).translation
    }

    pub fn wrist_rotation(&self) -> UnitQuaternion<f64> {
        self.joint(HandJoint::Wrist)
            .rotation
            .unwrap_or_else(UnitQuaternion::identity)
    }

    /// Composes the local transforms from the wrist down to every joint.
    pub fn world_positions(&self) -> JointPositions {
        let mut positions = JointPositions::default();
        let mut world_rots = [UnitQuaternion::identity(); JOINT_COUNT];

        for joint in PROCESSING_ORDER {
            let local = self.joint(joint);
            match joint.predecessor() {
                None => {
                    positions[joint] = local.translation;
                    world_rots[joint.index()] = self.wrist_rotation();
                }
                Some(parent) => {
                    let parent_rot = world_rots[parent.index()];
                    positions[joint] = positions[parent] + parent_rot * local.translation;
                    world_rots[joint.index()] = match local.rotation {
                        Some(rotation) => parent_rot * rotation,
                        None => parent_rot,
                    };
                }
            }
        }

        positions
    }
}

/// Every reconstructed frame of one hand.
#[derive(Debug, Clone, PartialEq)]
pub struct HandAnimation {
    pub name: String,
    pub hand_type: HandType,
    pub frames: Vec<FramePose>,
    /// Source frame indices dropped as degenerate.
    pub skipped_frames: Vec<usize>,
    pub average_joint_distance: [f64; JOINT_COUNT],
}

impl HandAnimation {
    /// `(timestamp, pose)` of one joint for every kept frame.
    pub fn track(&self, joint: HandJoint) -> impl Iterator<Item = (f64, &LocalPose)> + '_ {
        self.frames
            .iter()
            .map(move |frame| (frame.timestamp, frame.joint(joint)))
    }
}

/// Per-frame solver. Holds no per-frame state, so it is shared by every worker.
#[derive(Debug, Clone, Copy)]
pub struct Reconstructor {
    hand_type: HandType,
    /// Canonical bone lengths when measured lengths are replaced.
    bone_lengths: Option<[f64; JOINT_COUNT]>,
    epsilon: f64,
}

impl Reconstructor {
    pub fn new(
        hand_type: HandType,
        bone_lengths: Option<[f64; JOINT_COUNT]>,
        epsilon: f64,
    ) -> Self {
        Self {
            hand_type,
            bone_lengths,
            epsilon,
        }
    }

    pub fn for_hand(hand: &PreprocessedHand, config: &ReconstructionConfig) -> Self {
        let bone_lengths = config
            .use_average_distance
            .then_some(hand.average_joint_distance);
        Self::new(hand.hand_type(), bone_lengths, config.collinear_epsilon)
    }

    pub fn reconstruct_frame(
        &self,
        index: usize,
        frame: &Frame,
    ) -> Result<FramePose, PoseDegeneracyError> {
        let p = &frame.world_positions;
        let degenerate = |joint, step| PoseDegeneracyError {
            frame: index,
            joint,
            step,
        };

        // World-to-local bases, rows are the local axes in world space.
        let mut bases = [Matrix3::identity(); JOINT_COUNT];
        let mut joints = [LocalPose::default(); JOINT_COUNT];

        let wrist = self
            .wrist_basis(p)
            .ok_or_else(|| degenerate(HandJoint::Wrist, DegenerateStep::WristBasis))?;
        bases[HandJoint::Wrist.index()] = wrist;
        joints[HandJoint::Wrist.index()] = LocalPose {
            translation: p[HandJoint::Wrist],
            rotation: Some(quaternion(wrist.transpose())),
        };

        let wrist_x = axis(&wrist, 0);
        // Bend axis a finger pointing straight along the palm would get.
        let straight_x = axis(&wrist, 1).cross(&wrist_x);

        for joint in FIRST_FINGER_JOINTS {
            let (_, offset) = self
                .bone(p, joint)
                .ok_or_else(|| degenerate(joint, DegenerateStep::BoneOffset))?;
            let y = self
                .successor_direction(p, joint)
                .ok_or_else(|| degenerate(joint, DegenerateStep::SuccessorDirection))?;
            let x = unit(y.cross(&wrist_x), self.epsilon)
                .or_else(|| orthogonal_to(straight_x, y, self.epsilon))
                .ok_or_else(|| degenerate(joint, DegenerateStep::BendAxis))?;

            let basis = from_axes(x, y);
            bases[joint.index()] = basis;
            joints[joint.index()] = LocalPose {
                translation: wrist * offset,
                rotation: Some(quaternion(wrist * basis.transpose())),
            };
        }

        for joint in SECOND_AND_THIRD_FINGER_JOINTS {
            let parent = parent_of(joint);
            let parent_basis = bases[parent.index()];
            let (along, offset) = self
                .bone(p, joint)
                .ok_or_else(|| degenerate(joint, DegenerateStep::BoneOffset))?;
            let y = self
                .successor_direction(p, joint)
                .ok_or_else(|| degenerate(joint, DegenerateStep::SuccessorDirection))?;
            // Measured directions only; rescaling never changes the bend.
            let x = unit(y.cross(&along), self.epsilon)
                .or_else(|| orthogonal_to(axis(&parent_basis, 0), y, self.epsilon))
                .ok_or_else(|| degenerate(joint, DegenerateStep::BendAxis))?;

            let basis = from_axes(x, y);
            bases[joint.index()] = basis;
            joints[joint.index()] = LocalPose {
                translation: parent_basis * offset,
                rotation: Some(quaternion(parent_basis * basis.transpose())),
            };
        }

        for joint in TIP_JOINTS {
            let parent_basis = bases[parent_of(joint).index()];
            let (_, offset) = self
                .bone(p, joint)
                .ok_or_else(|| degenerate(joint, DegenerateStep::BoneOffset))?;
            joints[joint.index()] = LocalPose {
                translation: parent_basis * offset,
                rotation: None,
            };
        }

        Ok(FramePose {
            frame: index,
            timestamp: frame.timestamp,
            joints,
        })
    }

    /// Palm basis: `y` towards the middle finger, `z` and `x` re-orthogonalized
    /// against the handedness-corrected palm normal.
    fn wrist_basis(&self, p: &JointPositions) -> Option<Matrix3<f64>> {
        let wrist = p[HandJoint::Wrist];
        let index = p[HandJoint::Index1] - wrist;
        let ring = p[HandJoint::Ring1] - wrist;

        let y = unit(p[HandJoint::Middle1] - wrist, self.epsilon)?;
        let palm_normal = match self.hand_type {
            HandType::Left => index.cross(&ring),
            HandType::Right => ring.cross(&index),
        };
        let palm_normal = unit(palm_normal, self.epsilon)?;
        let z = unit(y.cross(&palm_normal), self.epsilon)?;
        let x = unit(y.cross(&z), self.epsilon)?;
        Some(rows(x, y, z))
    }

    /// Unit direction from the joint's parent and the (optionally rescaled) offset.
    fn bone(&self, p: &JointPositions, joint: HandJoint) -> Option<(Vector3<f64>, Vector3<f64>)> {
        let offset = p[joint] - p[parent_of(joint)];
        let along = unit(offset, self.epsilon)?;
        let offset = match &self.bone_lengths {
            Some(lengths) => along * lengths[joint.index()],
            None => offset,
        };
        Some((along, offset))
    }

    fn successor_direction(&self, p: &JointPositions, joint: HandJoint) -> Option<Vector3<f64>> {
        let successor = joint.successors().first().copied()?;
        unit(p[successor] - p[joint], self.epsilon)
    }
}

/// Reconstructs every frame of a hand, fanning frames out over worker threads.
pub fn reconstruct(
    hand: &PreprocessedHand,
    config: &ReconstructionConfig,
) -> Result<HandAnimation, Error> {
    config.validate()?;
    if hand.frames().is_empty() {
        return Err(Error::EmptySequence {
            hand: hand.name().to_string(),
        });
    }

    let now = Instant::now();
    let reconstructor = Reconstructor::for_hand(hand, config);
    let results = reconstruct_frames(&reconstructor, hand.frames());

    let mut frames = Vec::with_capacity(results.len());
    let mut skipped_frames = Vec::new();
    let mut first_failure = None;
    for result in results {
        match result {
            Ok(pose) => frames.push(pose),
            Err(err) => match config.degenerate_frames {
                DegenerateFramePolicy::Abort => return Err(err.into()),
                DegenerateFramePolicy::Skip => {
                    warn!(
                        hand = %hand.name(),
                        frame = err.frame,
                        joint = %err.joint,
                        step = %err.step,
                        "skipping degenerate frame"
                    );
                    skipped_frames.push(err.frame);
                    first_failure.get_or_insert(err);
                }
            },
        }
    }

    if frames.is_empty() {
        if let Some(err) = first_failure {
            return Err(err.into());
        }
    }

    info!(
        hand = %hand.name(),
        frames = frames.len(),
        skipped = skipped_frames.len(),
        timer = now.elapsed().as_secs_f64(),
        "hand reconstructed"
    );

    Ok(HandAnimation {
        name: hand.name().to_string(),
        hand_type: hand.hand_type(),
        frames,
        skipped_frames,
        average_joint_distance: hand.average_joint_distance,
    })
}

fn reconstruct_frames(
    reconstructor: &Reconstructor,
    frames: &[Frame],
) -> Vec<Result<FramePose, PoseDegeneracyError>> {
    let available = thread::available_parallelism().map_or(1, NonZeroUsize::get);
    let workers = available.min(frames.len() / MIN_FRAMES_PER_WORKER).max(1);
    if workers == 1 {
        return frames
            .iter()
            .enumerate()
            .map(|(i, frame)| reconstructor.reconstruct_frame(i, frame))
            .collect();
    }

    let chunk_size = frames.len().div_ceil(workers);
    debug!(workers, chunk_size, "reconstructing frames in parallel");
    thread::scope(|scope| {
        let handles: Vec<_> = frames
            .chunks(chunk_size)
            .enumerate()
            .map(|(chunk, chunk_frames)| {
                scope.spawn(move || {
                    chunk_frames
                        .iter()
                        .enumerate()
                        .map(|(i, frame)| {
                            reconstructor.reconstruct_frame(chunk * chunk_size + i, frame)
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
            })
            .collect()
    })
}

fn parent_of(joint: HandJoint) -> HandJoint {
    joint.predecessor().unwrap_or(HandJoint::Wrist)
}

fn unit(v: Vector3<f64>, epsilon: f64) -> Option<Vector3<f64>> {
    let norm = v.norm();
    (norm.is_finite() && norm > epsilon).then(|| v / norm)
}

/// `v` with its component along the unit vector `y` removed, normalized.
fn orthogonal_to(v: Vector3<f64>, y: Vector3<f64>, epsilon: f64) -> Option<Vector3<f64>> {
    unit(v - y * y.dot(&v), epsilon)
}

fn axis(basis: &Matrix3<f64>, row: usize) -> Vector3<f64> {
    basis.row(row).transpose()
}

fn rows(x: Vector3<f64>, y: Vector3<f64>, z: Vector3<f64>) -> Matrix3<f64> {
    Matrix3::from_rows(&[x.transpose(), y.transpose(), z.transpose()])
}

fn from_axes(x: Vector3<f64>, y: Vector3<f64>) -> Matrix3<f64> {
    rows(x, y, x.cross(&y))
}

fn quaternion(matrix: Matrix3<f64>) -> UnitQuaternion<f64> {
    UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(matrix))
}
