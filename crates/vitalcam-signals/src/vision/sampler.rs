//! Region sampler
//!
//! Turns a video into per-region colour traces. For every frame the
//! landmark detector is queried, each configured region is cropped around
//! its landmark and averaged to one RGB sample, and SSR regions also keep
//! an area-resized patch of their crop.
//!
//! Frames without a face (or without a required landmark) contribute zero
//! samples and zero patches, so every trace keeps one entry per frame.

use ndarray::Array3;

use super::face_roi::{crop_half_side, region_crop, FaceLandmarks, LandmarkDetector};
use super::image_ops::Frame;
use crate::config::RegionLayout;
use crate::error::Result;
use crate::trace::{PatchStack, RegionId, RegionTrace, RegionTraceSet};

/// Samples of one frame, in layout order.
#[derive(Debug, Clone)]
pub struct FrameSample {
    /// Mean RGB per landmark region
    pub means: Vec<[f32; 3]>,
    /// Resized crop per SSR region
    pub patches: Vec<Array3<f32>>,
}

/// Sample every configured region of one frame.
///
/// `None` landmarks give an all-zero sample.
pub fn sample_frame(
    frame: &Frame,
    landmarks: Option<&FaceLandmarks>,
    layout: &RegionLayout,
) -> FrameSample {
    let size = layout.ssr_patch_size;
    let half = landmarks.and_then(|lm| crop_half_side(lm, layout));
    let crop = |region| match (landmarks, half) {
        (Some(lm), Some(half)) => region_crop(lm, region, half, frame.width(), frame.height()),
        _ => None,
    };

    FrameSample {
        means: layout
            .landmarks
            .iter()
            .map(|&region| crop(region).map_or([0.0; 3], |rect| frame.roi_mean_rgb(rect)))
            .collect(),
        patches: sampled_ssr_regions(layout)
            .map(|region| match crop(region) {
                Some(rect) => frame.crop_resize_area(rect, size),
                None => Array3::zeros((size, size, 3)),
            })
            .collect(),
    }
}

/// SSR regions that are also sampled landmarks, in configuration order.
fn sampled_ssr_regions(layout: &RegionLayout) -> impl Iterator<Item = RegionId> + '_ {
    layout
        .ssr_regions
        .iter()
        .filter(|region| layout.landmarks.contains(region))
        .copied()
}

/// Accumulates frame samples into a [`RegionTraceSet`].
pub struct RegionSampler<D> {
    layout: RegionLayout,
    detector: D,
    /// Per landmark region, one sample per frame
    samples: Vec<Vec<[f32; 3]>>,
    /// Per SSR region, one patch per frame
    patches: Vec<Vec<Array3<f32>>>,
    frame_count: usize,
    faceless_frames: usize,
    incomplete_frames: usize,
}

impl<D: LandmarkDetector> RegionSampler<D> {
    pub fn new(layout: RegionLayout, detector: D) -> Self {
        for region in &layout.ssr_regions {
            if !layout.landmarks.contains(region) {
                log::warn!("SSR region {region} is not a sampled landmark, ignoring");
            }
        }
        let ssr_count = sampled_ssr_regions(&layout).count();

        Self {
            samples: vec![Vec::new(); layout.landmarks.len()],
            patches: vec![Vec::new(); ssr_count],
            layout,
            detector,
            frame_count: 0,
            faceless_frames: 0,
            incomplete_frames: 0,
        }
    }

    pub fn layout(&self) -> &RegionLayout {
        &self.layout
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Detect landmarks and sample one frame.
    pub fn push_frame(&mut self, frame: &Frame) {
        let landmarks = self.detector.detect(frame);
        self.push_with_landmarks(frame, landmarks.as_ref());
    }

    /// Sample one frame with externally supplied landmarks.
    pub fn push_with_landmarks(&mut self, frame: &Frame, landmarks: Option<&FaceLandmarks>) {
        match landmarks {
            None => self.faceless_frames += 1,
            Some(lm) if !self.covers_layout(lm) => self.incomplete_frames += 1,
            Some(_) => {}
        }

        let sample = sample_frame(frame, landmarks, &self.layout);
        for (trace, mean) in self.samples.iter_mut().zip(sample.means) {
            trace.push(mean);
        }
        for (stack, patch) in self.patches.iter_mut().zip(sample.patches) {
            stack.push(patch);
        }
        self.frame_count += 1;
    }

    fn covers_layout(&self, landmarks: &FaceLandmarks) -> bool {
        let n = landmarks.points.len();
        self.layout
            .landmarks
            .iter()
            .chain(self.layout.reference_pair.iter())
            .all(|&idx| (idx as usize) < n)
    }

    /// Assemble the traces of all pushed frames sampled at `fs` Hz.
    pub fn finish(self, fs: f32) -> Result<RegionTraceSet> {
        if self.faceless_frames > 0 {
            log::info!(
                "{} of {} frames had no face, sampled as zeros",
                self.faceless_frames,
                self.frame_count
            );
        }
        if self.incomplete_frames > 0 {
            log::warn!(
                "{} of {} frames lacked required landmark indices",
                self.incomplete_frames,
                self.frame_count
            );
        }

        let mut stacks: Vec<(RegionId, PatchStack)> = sampled_ssr_regions(&self.layout)
            .zip(self.patches)
            .filter_map(|(region, frames)| PatchStack::from_frames(&frames).map(|s| (region, s)))
            .collect();

        let mut traces = Vec::with_capacity(self.samples.len());
        for (&region, samples) in self.layout.landmarks.iter().zip(&self.samples) {
            let trace = RegionTrace::from_samples(region, samples);
            let trace = match stacks.iter().position(|(r, _)| *r == region) {
                Some(i) => trace.with_patches(stacks.swap_remove(i).1)?,
                None => trace,
            };
            traces.push(trace);
        }

        RegionTraceSet::new(fs, traces)
    }
}
