use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::joint::HandJoint;

/// Separator between messages when an [`InvalidDataError`] chain is rendered.
pub const CAUSE_SEPARATOR: &str = "\n";

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    InvalidData(#[from] InvalidDataError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    PoseDegeneracy(#[from] PoseDegeneracyError),

    #[error(transparent)]
    Arity(#[from] ArityError),

    #[error("hand {hand:?} has no frames")]
    EmptySequence { hand: String },

    #[error("failed to access {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration file {}", path.display())]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("skeleton sink failed for hand {hand:?}")]
    Sink {
        hand: String,
        #[source]
        source: SinkError,
    },
}

/// Structurally invalid input data, with the context of every enclosing level.
#[derive(Debug)]
pub struct InvalidDataError {
    message: String,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl InvalidDataError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps `cause` with a message describing the enclosing context.
    pub fn wrap(message: impl Into<String>, cause: impl StdError + Send + Sync + 'static) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(cause)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Every message from this error down to the root cause.
    pub fn messages(&self) -> Vec<String> {
        let mut messages = vec![self.message.clone()];
        let mut cause = self.source.as_deref().map(|e| e as &(dyn StdError + 'static));
        while let Some(err) = cause {
            match err.downcast_ref::<InvalidDataError>() {
                Some(inner) => messages.push(inner.message.clone()),
                None => messages.push(err.to_string()),
            }
            cause = err.source();
        }
        messages
    }

    /// The whole cause chain joined by [`CAUSE_SEPARATOR`].
    pub fn chain(&self) -> String {
        self.messages().join(CAUSE_SEPARATOR)
    }
}

impl fmt::Display for InvalidDataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for InvalidDataError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn StdError + 'static))
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("palm size must be a positive finite number (got {0})")]
    PalmSize(f64),

    #[error("cutoff frequency must be a non-negative finite number (got {0})")]
    CutoffFrequency(f64),

    #[error("filter order must be within {min}..={max} (got {value})")]
    FilterOrder { value: usize, min: usize, max: usize },

    #[error("samples per frame must be within {min}..={max} (got {value})")]
    SamplesPerFrame { value: usize, min: usize, max: usize },

    #[error("frames per second must be a positive finite number (got {0})")]
    Fps(f64),

    #[error("start frame must be finite (got {0})")]
    StartFrame(f64),

    #[error("collinearity epsilon must be a positive finite number (got {0})")]
    CollinearEpsilon(f64),

    #[error("{0} is not set")]
    MissingTarget(&'static str),

    #[error("frame {frame} has a degenerate palm (wrist to middle finger distance {palm_size:e})")]
    DegeneratePalm { frame: usize, palm_size: f64 },
}

/// Which step of the local-frame reconstruction hit a degenerate vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegenerateStep {
    WristBasis,
    BoneOffset,
    SuccessorDirection,
    BendAxis,
}

impl fmt::Display for DegenerateStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DegenerateStep::WristBasis => "wrist basis",
            DegenerateStep::BoneOffset => "bone offset",
            DegenerateStep::SuccessorDirection => "successor direction",
            DegenerateStep::BendAxis => "bend axis",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("degenerate pose in frame {frame} at joint {joint} ({step})")]
pub struct PoseDegeneracyError {
    pub frame: usize,
    pub joint: HandJoint,
    pub step: DegenerateStep,
}

/// Two arrays that must run in parallel have different lengths.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{what}: has {actual}, expected {expected}")]
pub struct ArityError {
    pub what: &'static str,
    pub expected: usize,
    pub actual: usize,
}

impl ArityError {
    pub fn check(what: &'static str, expected: usize, actual: usize) -> Result<(), ArityError> {
        if expected == actual {
            Ok(())
        } else {
            Err(ArityError {
                what,
                expected,
                actual,
            })
        }
    }
}

/// Failure reported by a skeleton sink implementation.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct SinkError {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl SinkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn wrap(message: impl Into<String>, cause: impl StdError + Send + Sync + 'static) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(cause)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_lists_every_level() {
        let inner = InvalidDataError::new("invalid position data.");
        let mid = InvalidDataError::wrap("invalid world position list.", inner);
        let outer = InvalidDataError::wrap("invalid frame 5.", mid);

        assert_eq!(
            outer.messages(),
            vec![
                "invalid frame 5.".to_string(),
                "invalid world position list.".to_string(),
                "invalid position data.".to_string(),
            ]
        );
        assert_eq!(
            outer.chain(),
            "invalid frame 5.\ninvalid world position list.\ninvalid position data."
        );
    }

    #[test]
    fn chain_includes_foreign_causes() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = InvalidDataError::wrap("could not load data", io);
        assert_eq!(err.messages(), vec!["could not load data", "no such file"]);
    }

    #[test]
    fn arity_check() {
        assert!(ArityError::check("tracks", 21, 21).is_ok());
        let err = ArityError::check("tracks", 21, 20).unwrap_err();
        assert_eq!(err.to_string(), "tracks: has 20, expected 21");
    }
}
