//! Vision module: frames, landmarks and region sampling
//!
//! This module provides:
//! - `Frame` RGB8 frames with crop averaging and area resizing
//! - `LandmarkDetector` trait for pluggable face-mesh backends
//! - `RegionSampler` turning frames into a `RegionTraceSet`
//!
//! # Design
//!
//! No detector is bundled. Callers inject landmarks from any source (a
//! face-mesh model, a tracker, annotation files) through the trait or via
//! [`RegionSampler::push_with_landmarks`].
//!
//! # Example
//!
//! ```ignore
//! use vitalcam_signals::vision::{FaceLandmarks, Frame, RegionSampler};
//!
//! let mut sampler = RegionSampler::new(config.regions.clone(), my_detector);
//! for frame in frames {
//!     sampler.push_frame(&frame);
//! }
//! let traces = sampler.finish(config.sample_rate)?;
//! ```

mod face_roi;
mod image_ops;
mod sampler;

pub use face_roi::{crop_half_side, region_crop, FaceLandmarks, LandmarkDetector};
pub use image_ops::{CropRect, Frame};
pub use sampler::{sample_frame, FrameSample, RegionSampler};
