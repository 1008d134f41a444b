//! Depth-to-color alignment for stereo depth camera captures.
//!
//! Takes a directory of 16-bit depth PNGs plus the rig's camera-info JSON
//! document and rewrites every depth frame into the color camera's viewpoint,
//! so depth and color pixels can later be fused into consistent 3D data.
//!
//! [`calibration`] turns the document into an immutable [`CalibrationModel`];
//! [`reproject`] is the pure per-frame core (unproject, rigid transform,
//! forward projection, occlusion resolution); [`batch`] fans the core out
//! across frames and aggregates per-frame failures.

pub mod batch;
pub mod calibration;
pub mod cli;
pub mod reproject;
pub mod types;

pub use batch::{BatchReport, FrameError};
pub use calibration::{CalibrationModel, CameraExtrinsics, CameraIntrinsics, ParseError};
pub use reproject::reproject;
pub use types::{DepthFrame, NO_DEPTH};
