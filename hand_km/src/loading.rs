//! Loading hand animation data from JSON.
//!
//! Expected layout: a root list of hands, each
//! `{ "name", "handType", "animationData": [frame, ...] }`, each frame
//! `{ "timestamp", "worldPositions": [{x, y, z}; 21], "normalizedPositions"? }`.
//! Every nested failure is wrapped with the context of the level that was
//! being converted, so the full [`InvalidDataError::chain`] reads from the
//! file down to the offending value.

use std::fs;
use std::path::Path;

use nalgebra::Vector3;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::InvalidDataError;
use crate::hand::{Frame, Hand, HandType, JointPositions};
use crate::joint::JOINT_COUNT;

#[derive(Deserialize)]
struct JsonVector {
    x: f64,
    y: f64,
    z: f64,
}

/// Reads and validates every hand stored in a JSON file.
pub fn load_json(path: impl AsRef<Path>) -> Result<Vec<Hand>, InvalidDataError> {
    let path = path.as_ref();
    let context = || format!("Could not load data from file {}", path.display());

    info!(path = %path.display(), "loading hand data");
    let data = fs::read_to_string(path).map_err(|e| InvalidDataError::wrap(context(), e))?;
    let hands = parse_hands(&data).map_err(|e| InvalidDataError::wrap(context(), e))?;
    info!(hands = hands.len(), "hand data loaded");
    Ok(hands)
}

/// Parses and validates a JSON document holding a list of hands.
pub fn parse_hands(json: &str) -> Result<Vec<Hand>, InvalidDataError> {
    let root: Value = serde_json::from_str(json)
        .map_err(|e| InvalidDataError::wrap("Could not load data: malformed JSON.", e))?;
    hands_from_value(&root)
}

pub fn hands_from_value(root: &Value) -> Result<Vec<Hand>, InvalidDataError> {
    let list = root
        .as_array()
        .ok_or_else(|| InvalidDataError::new("Could not load data: root object must be of type list."))?;

    list.iter()
        .enumerate()
        .map(|(i, hand_data)| {
            hand_from_value(hand_data).map_err(|e| {
                InvalidDataError::wrap(format!("Could not load data for hand with index {i}."), e)
            })
        })
        .collect()
}

pub fn hand_from_value(data: &Value) -> Result<Hand, InvalidDataError> {
    const CONTEXT: &str = "Could not convert data to a hand";

    let name = match data.get("name") {
        None => return Err(InvalidDataError::new(format!("{CONTEXT}: name not found."))),
        Some(Value::String(name)) => name.clone(),
        Some(other) => {
            return Err(InvalidDataError::new(format!(
                "{CONTEXT}: invalid name type (is {}, expects string).",
                type_name(other)
            )))
        }
    };

    let hand_type = match data.get("handType") {
        None => return Err(InvalidDataError::new(format!("{CONTEXT}: hand type not found."))),
        Some(value) => value
            .as_str()
            .and_then(|s| s.parse::<HandType>().ok())
            .ok_or_else(|| {
                InvalidDataError::new(format!("{CONTEXT}: unrecognized hand type ({value})."))
            })?,
    };

    let frames_data = match data.get("animationData") {
        None => {
            return Err(InvalidDataError::new(format!(
                "{CONTEXT}: animation data not found."
            )))
        }
        Some(Value::Array(frames)) => frames,
        Some(other) => {
            return Err(InvalidDataError::new(format!(
                "{CONTEXT}: animation data must be of type list (it is {}).",
                type_name(other)
            )))
        }
    };

    let mut frames: Vec<Frame> = Vec::with_capacity(frames_data.len());
    for (i, frame_data) in frames_data.iter().enumerate() {
        let frame = frame_from_value(frame_data)
            .map_err(|e| InvalidDataError::wrap(format!("{CONTEXT}: invalid frame {i}."), e))?;
        if let Some(previous) = frames.last() {
            if frame.timestamp < previous.timestamp {
                return Err(InvalidDataError::new(format!(
                    "{CONTEXT}: frame {i} timestamp ({}) precedes frame {} ({}).",
                    frame.timestamp,
                    i - 1,
                    previous.timestamp
                )));
            }
        }
        frames.push(frame);
    }

    debug!(hand = %name, hand_type = %hand_type, frames = frames.len(), "hand converted");
    Ok(Hand::new(name, hand_type, frames))
}

pub fn frame_from_value(data: &Value) -> Result<Frame, InvalidDataError> {
    const CONTEXT: &str = "Could not convert data to a frame";

    let timestamp = match data.get("timestamp") {
        None => return Err(InvalidDataError::new(format!("{CONTEXT}: timestamp not found."))),
        Some(value) => value.as_f64().filter(|t| t.is_finite()).ok_or_else(|| {
            InvalidDataError::new(format!(
                "{CONTEXT}: invalid timestamp type (is {}, expects float or int).",
                type_name(value)
            ))
        })?,
    };

    let normalized_positions = data
        .get("normalizedPositions")
        .map(|value| {
            positions_from_value(value).map_err(|e| {
                InvalidDataError::wrap(
                    format!("{CONTEXT}: invalid normalized positions list."),
                    e,
                )
            })
        })
        .transpose()?;

    let world_positions = match data.get("worldPositions") {
        None => {
            return Err(InvalidDataError::new(format!(
                "{CONTEXT}: world positions not found."
            )))
        }
        Some(value) => positions_from_value(value).map_err(|e| {
            InvalidDataError::wrap(format!("{CONTEXT}: invalid world position list."), e)
        })?,
    };

    Ok(Frame {
        timestamp,
        world_positions,
        normalized_positions,
    })
}

pub fn positions_from_value(data: &Value) -> Result<JointPositions, InvalidDataError> {
    const CONTEXT: &str = "Could not convert data to a list of positions";

    let list = data.as_array().ok_or_else(|| {
        InvalidDataError::new(format!(
            "{CONTEXT}: data must be of type list (it is {}).",
            type_name(data)
        ))
    })?;
    if list.len() != JOINT_COUNT {
        return Err(InvalidDataError::new(format!(
            "{CONTEXT}: invalid number of positions in the list (has {}, expected {JOINT_COUNT}).",
            list.len()
        )));
    }

    let vectors = list
        .iter()
        .enumerate()
        .map(|(i, v)| {
            JsonVector::deserialize(v)
                .map(|v| Vector3::new(v.x, v.y, v.z))
                .map_err(|e| {
                    InvalidDataError::wrap(
                        format!("{CONTEXT}: invalid position data at index {i}."),
                        e,
                    )
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    JointPositions::from_vec(vectors).map_err(|e| InvalidDataError::wrap(CONTEXT, e))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
