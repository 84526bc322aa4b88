//! Landmark detection trait and per-region crop geometry.
//!
//! Landmarks are face-mesh points in pixel coordinates. Every sampled region
//! is a square crop centred on one landmark, with a half-side derived from
//! the distance between two reference landmarks so crops scale with the face.

use super::image_ops::{CropRect, Frame};
use crate::config::RegionLayout;
use crate::trace::RegionId;

/// Face-mesh landmarks of one frame, `[x, y]` in pixels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaceLandmarks {
    pub points: Vec<[f32; 2]>,
}

impl FaceLandmarks {
    pub fn new(points: Vec<[f32; 2]>) -> Self {
        Self { points }
    }

    /// Landmark position truncated to integer pixels.
    pub fn pixel(&self, index: RegionId) -> Option<(i64, i64)> {
        self.points
            .get(index as usize)
            .map(|&[x, y]| (x as i64, y as i64))
    }
}

/// Pluggable landmark backend
///
/// Implement this trait to feed landmarks from a face-mesh model, a
/// tracker, or a precomputed annotation file. Returning `None` marks the
/// frame as faceless; its samples become zeros.
pub trait LandmarkDetector {
    fn detect(&mut self, frame: &Frame) -> Option<FaceLandmarks>;
}

impl<F> LandmarkDetector for F
where
    F: FnMut(&Frame) -> Option<FaceLandmarks>,
{
    fn detect(&mut self, frame: &Frame) -> Option<FaceLandmarks> {
        self(frame)
    }
}

/// Crop half-side: `floor(|p_a - p_b| / divisor)` over integer landmark pixels.
pub fn crop_half_side(landmarks: &FaceLandmarks, layout: &RegionLayout) -> Option<i64> {
    let [a, b] = layout.reference_pair;
    let (ax, ay) = landmarks.pixel(a)?;
    let (bx, by) = landmarks.pixel(b)?;
    let dist = (((ax - bx).pow(2) + (ay - by).pow(2)) as f64).sqrt();
    Some((dist / layout.size_divisor as f64).floor() as i64)
}

/// Clipped crop of `region` for a frame of `width × height`.
pub fn region_crop(
    landmarks: &FaceLandmarks,
    region: RegionId,
    half: i64,
    width: u32,
    height: u32,
) -> Option<CropRect> {
    let (x, y) = landmarks.pixel(region)?;
    Some(CropRect::centered(x, y, half, width, height))
}
