//! Scale normalization, temporal smoothing and average bone lengths.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::PreprocessConfig;
use crate::error::{ConfigError, Error};
use crate::filter::{ChannelSmoother, Passthrough, Smoothing};
use crate::hand::{Frame, Hand, JointPositions, PreprocessedHand};
use crate::joint::{HandJoint, JOINT_COUNT};

/// Palm sizes below this cannot be scaled.
const MIN_PALM_SIZE: f64 = 1e-9;

/// Scales every position so the wrist to middle-finger-base distance equals `palm_size`.
/// `None` when the frame's own palm size is degenerate.
pub fn scale_positions(positions: &JointPositions, palm_size: f64) -> Option<JointPositions> {
    let current = positions.palm_size();
    if !current.is_finite() || current < MIN_PALM_SIZE {
        return None;
    }
    let multiplier = palm_size / current;
    Some(positions.map(|p| p * multiplier))
}

pub fn scale_frames(frames: &[Frame], palm_size: f64) -> Result<Vec<Frame>, ConfigError> {
    frames
        .iter()
        .enumerate()
        .map(|(i, frame)| {
            scale_positions(&frame.world_positions, palm_size)
                .map(|scaled| frame.with_world_positions(scaled))
                .ok_or(ConfigError::DegeneratePalm {
                    frame: i,
                    palm_size: frame.world_positions.palm_size(),
                })
        })
        .collect()
}

/// Low-pass filters each of the 63 coordinate channels across time.
/// Timestamps are preserved; sequences the filter cannot handle are returned unchanged.
pub fn smooth_frames(frames: &[Frame], smoothing: Smoothing) -> Vec<Frame> {
    let timestamps: Vec<f64> = frames.iter().map(|f| f.timestamp).collect();
    let smoother = match ChannelSmoother::new(&timestamps, smoothing) {
        Ok(smoother) => smoother,
        Err(Passthrough::AboveNyquist { cutoff, nyquist }) => {
            warn!(cutoff, nyquist, "cutoff frequency at or above nyquist, smoothing skipped");
            return frames.to_vec();
        }
        Err(Passthrough::BelowResolution { cutoff, lowest }) => {
            warn!(
                cutoff,
                lowest,
                "cutoff period longer than the sequence, smoothing skipped"
            );
            return frames.to_vec();
        }
        Err(reason) => {
            debug!(?reason, "smoothing skipped");
            return frames.to_vec();
        }
    };
    debug!(
        sampling_frequency = smoother.grid().sampling_frequency,
        samples = smoother.grid().len(),
        "smoothing channels"
    );

    let mut smoothed: Vec<JointPositions> = frames.iter().map(|f| f.world_positions).collect();
    let mut channel = vec![0.0; frames.len()];
    for joint in HandJoint::ALL {
        for axis in 0..3 {
            for (value, frame) in channel.iter_mut().zip(frames) {
                *value = frame.world_positions[joint][axis];
            }
            let filtered = smoother.smooth(&timestamps, &channel);
            for (positions, value) in smoothed.iter_mut().zip(filtered) {
                positions[joint][axis] = value;
            }
        }
    }

    frames
        .iter()
        .zip(smoothed)
        .map(|(frame, positions)| frame.with_world_positions(positions))
        .collect()
}

/// Mean joint-to-predecessor distance over all frames; zero for the wrist.
pub fn average_joint_distances(frames: &[Frame]) -> [f64; JOINT_COUNT] {
    let mut sums = [0.0; JOINT_COUNT];
    if frames.is_empty() {
        return sums;
    }
    for frame in frames {
        for joint in HandJoint::ALL {
            sums[joint.index()] += frame.world_positions.bone_length(joint);
        }
    }
    sums.map(|sum| sum / frames.len() as f64)
}

/// Scales, smooths and measures one hand.
pub fn preprocess_hand(hand: &Hand, config: &PreprocessConfig) -> Result<PreprocessedHand, Error> {
    config.validate()?;
    if hand.frames.is_empty() {
        return Err(Error::EmptySequence {
            hand: hand.name.clone(),
        });
    }

    let now = Instant::now();
    let scaled = scale_frames(&hand.frames, config.palm_size)?;
    let smoothed = smooth_frames(&scaled, config.smoothing());
    let average_joint_distance = average_joint_distances(&smoothed);
    info!(
        hand = %hand.name,
        frames = smoothed.len(),
        duration = hand.duration(),
        timer = now.elapsed().as_secs_f64(),
        "hand preprocessed"
    );

    Ok(PreprocessedHand {
        hand: Hand::new(hand.name.clone(), hand.hand_type, smoothed),
        average_joint_distance,
    })
}

/// Preprocesses every hand independently; one failing hand does not affect the others.
pub fn preprocess_data(
    hands: &[Hand],
    config: &PreprocessConfig,
) -> Vec<Result<PreprocessedHand, Error>> {
    hands.iter().map(|hand| preprocess_hand(hand, config)).collect()
}
