//! Hand motion capture retargeting.
//!
//! Tracked world positions of the 21 hand joints are normalized, smoothed and
//! turned into parent-relative joint transforms that a skeletal rig can play
//! back.

pub mod config;
pub mod demo;
pub mod error;
pub mod filter;
pub mod hand;
pub mod joint;
pub mod loading;
pub mod pipeline;
pub mod preprocess;
pub mod reconstruct;
pub mod rig;
pub mod sink;

pub use config::Config;
pub use error::Error;
pub use hand::{Frame, Hand, HandType, JointPositions, PreprocessedHand};
pub use joint::HandJoint;
pub use reconstruct::{FramePose, HandAnimation, LocalPose};
