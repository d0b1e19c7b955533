//! Two-hand tracking, stabilization and pinch-to-control mapping over per-frame
//! skeletal keypoint detections.

pub mod assign;
pub mod config;
pub mod error;
pub mod gestures;
pub mod landmark;
pub mod metrics;
pub mod pipeline;
pub mod replay;
pub mod signal;
pub mod smoothing;
pub mod stabilizer;
pub mod tracker;

pub use error::{Error, Result};
pub use pipeline::{ControlPipeline, Frame, FrameOutput, HandTracker, PoseFeed};
