use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{ConfigError, Error};
use crate::filter::Smoothing;
use crate::hand::HandType;

pub const FILTER_ORDER_RANGE: (usize, usize) = (1, 32);
pub const SAMPLES_PER_FRAME_RANGE: (usize, usize) = (1, 64);

/// Scaling and smoothing applied before reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Wrist to middle-finger-base distance every frame is scaled to.
    pub palm_size: f64,
    /// Hz; lower is smoother, 0 disables smoothing.
    pub cutoff_frequency: f64,
    /// Number of second-order filter sections.
    pub filter_order: usize,
    pub samples_per_frame: usize,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            palm_size: 0.1,
            cutoff_frequency: 6.0,
            filter_order: 6,
            samples_per_frame: 2,
        }
    }
}

impl PreprocessConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.palm_size.is_finite() && self.palm_size > 0.0) {
            return Err(ConfigError::PalmSize(self.palm_size));
        }
        if !(self.cutoff_frequency.is_finite() && self.cutoff_frequency >= 0.0) {
            return Err(ConfigError::CutoffFrequency(self.cutoff_frequency));
        }
        let (min, max) = FILTER_ORDER_RANGE;
        if !(min..=max).contains(&self.filter_order) {
            return Err(ConfigError::FilterOrder {
                value: self.filter_order,
                min,
                max,
            });
        }
        let (min, max) = SAMPLES_PER_FRAME_RANGE;
        if !(min..=max).contains(&self.samples_per_frame) {
            return Err(ConfigError::SamplesPerFrame {
                value: self.samples_per_frame,
                min,
                max,
            });
        }
        Ok(())
    }

    pub fn smoothing(&self) -> Smoothing {
        Smoothing {
            cutoff_frequency: self.cutoff_frequency,
            filter_order: self.filter_order,
            samples_per_frame: self.samples_per_frame,
        }
    }
}

/// What to do with a frame whose geometry cannot define a basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegenerateFramePolicy {
    /// Drop the frame from every track of the hand and keep going.
    #[default]
    Skip,
    /// Fail the whole hand.
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReconstructionConfig {
    /// Replace measured bone lengths by the sequence averages.
    pub use_average_distance: bool,
    pub degenerate_frames: DegenerateFramePolicy,
    /// Vectors shorter than this are treated as zero.
    pub collinear_epsilon: f64,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            use_average_distance: true,
            degenerate_frames: DegenerateFramePolicy::Skip,
            collinear_epsilon: 1e-9,
        }
    }
}

impl ReconstructionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.collinear_epsilon.is_finite() && self.collinear_epsilon > 0.0) {
            return Err(ConfigError::CollinearEpsilon(self.collinear_epsilon));
        }
        Ok(())
    }
}

/// Placement of the hands on a target rig.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AlignmentConfig {
    /// Rig both hands are added to.
    pub target_rig: Option<String>,
    /// Bone of the target rig the left wrist attaches to.
    pub left_hand_target: Option<String>,
    pub right_hand_target: Option<String>,
    pub start_frame: f64,
    pub fps: f64,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            target_rig: None,
            left_hand_target: None,
            right_hand_target: None,
            start_frame: 1.0,
            fps: 24.0,
        }
    }
}

impl AlignmentConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.fps.is_finite() && self.fps > 0.0) {
            return Err(ConfigError::Fps(self.fps));
        }
        if !self.start_frame.is_finite() {
            return Err(ConfigError::StartFrame(self.start_frame));
        }
        Ok(())
    }

    /// Host frame number of a timestamp in seconds.
    pub fn frame_number(&self, timestamp: f64) -> f64 {
        timestamp * self.fps + self.start_frame
    }

    pub fn target_rig(&self) -> Result<&str, ConfigError> {
        self.target_rig
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or(ConfigError::MissingTarget("target rig"))
    }

    pub fn target_bone(&self, hand_type: HandType) -> Result<&str, ConfigError> {
        let (target, label) = match hand_type {
            HandType::Left => (&self.left_hand_target, "left hand target bone"),
            HandType::Right => (&self.right_hand_target, "right hand target bone"),
        };
        target
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or(ConfigError::MissingTarget(label))
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub preprocess: PreprocessConfig,
    pub reconstruction: ReconstructionConfig,
    pub alignment: AlignmentConfig,
}

impl Config {
    pub fn from_json(path: impl AsRef<Path>) -> Result<Config, Error> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_json::from_str(&data).map_err(|source| Error::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.preprocess.validate()?;
        self.reconstruction.validate()?;
        self.alignment.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.preprocess.palm_size, 0.1);
        assert_eq!(config.preprocess.filter_order, 6);
        assert!(config.reconstruction.use_average_distance);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let bad = |f: fn(&mut PreprocessConfig)| {
            let mut config = PreprocessConfig::default();
            f(&mut config);
            config.validate().unwrap_err()
        };
        assert_eq!(bad(|c| c.palm_size = 0.0), ConfigError::PalmSize(0.0));
        assert_eq!(bad(|c| c.palm_size = -1.0), ConfigError::PalmSize(-1.0));
        assert_eq!(
            bad(|c| c.cutoff_frequency = -0.5),
            ConfigError::CutoffFrequency(-0.5)
        );
        assert!(matches!(
            bad(|c| c.filter_order = 0),
            ConfigError::FilterOrder { value: 0, .. }
        ));
        assert!(matches!(
            bad(|c| c.samples_per_frame = 65),
            ConfigError::SamplesPerFrame { value: 65, .. }
        ));

        let alignment = AlignmentConfig {
            fps: 0.0,
            ..AlignmentConfig::default()
        };
        assert_eq!(alignment.validate(), Err(ConfigError::Fps(0.0)));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: Config = serde_json::from_str(
            r#"{
                "preprocess": { "palm_size": 0.12 },
                "reconstruction": { "degenerate_frames": "abort" },
                "alignment": { "left_hand_target": "hand.L", "fps": 30 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.preprocess.palm_size, 0.12);
        assert_eq!(config.preprocess.cutoff_frequency, 6.0);
        assert_eq!(
            config.reconstruction.degenerate_frames,
            DegenerateFramePolicy::Abort
        );
        assert_eq!(config.alignment.fps, 30.0);
        assert_eq!(config.alignment.target_bone(HandType::Left), Ok("hand.L"));
        assert_eq!(
            config.alignment.target_rig(),
            Err(ConfigError::MissingTarget("target rig"))
        );
        assert_eq!(
            config.alignment.target_bone(HandType::Right),
            Err(ConfigError::MissingTarget("right hand target bone"))
        );
    }

    #[test]
    fn frame_numbers() {
        let alignment = AlignmentConfig {
            fps: 30.0,
            start_frame: 10.0,
            ..AlignmentConfig::default()
        };
        assert_eq!(alignment.frame_number(0.0), 10.0);
        assert_eq!(alignment.frame_number(0.5), 25.0);
    }
}
