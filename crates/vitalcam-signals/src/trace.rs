//! Per-region colour traces.
//!
//! A [`RegionTrace`] holds the mean R, G, B intensity of one tracked face
//! region for every processed frame, stored as a `3 × T` matrix (rows are
//! channels). Regions sampled for SSR additionally carry a [`PatchStack`] of
//! small resized crops. A [`RegionTraceSet`] groups the traces of one
//! recording and guarantees that every region has the same frame count.

use ndarray::{s, Array1, Array2, Array3, Array4, ArrayView1, ArrayView2, ArrayView3, ArrayView4, Axis};

use crate::error::{Result, SignalError};

/// Face-mesh landmark index the region is centred on.
pub type RegionId = u32;

pub const RED: usize = 0;
pub const GREEN: usize = 1;
pub const BLUE: usize = 2;

/// Per-frame `H × W × 3` patches of one region, shape `(T, H, W, 3)`.
#[derive(Debug, Clone)]
pub struct PatchStack {
    frames: Array4<f32>,
}

impl PatchStack {
    /// Wrap a `(T, H, W, 3)` tensor. Returns `None` when the last axis is not RGB.
    pub fn new(frames: Array4<f32>) -> Option<Self> {
        if frames.shape()[3] != 3 {
            return None;
        }
        Some(Self { frames })
    }

    /// Stack equally sized `H × W × 3` frames.
    pub fn from_frames(frames: &[Array3<f32>]) -> Option<Self> {
        let (h, w) = match frames.first() {
            Some(f) => (f.shape()[0], f.shape()[1]),
            None => return Self::new(Array4::zeros((0, 0, 0, 3))),
        };
        let mut stacked = Array4::zeros((frames.len(), h, w, 3));
        for (t, frame) in frames.iter().enumerate() {
            if frame.shape() != [h, w, 3] {
                return None;
            }
            stacked.index_axis_mut(Axis(0), t).assign(frame);
        }
        Self::new(stacked)
    }

    pub fn len(&self) -> usize {
        self.frames.shape()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn frames(&self) -> ArrayView4<'_, f32> {
        self.frames.view()
    }

    pub fn frame(&self, t: usize) -> ArrayView3<'_, f32> {
        self.frames.index_axis(Axis(0), t)
    }

    fn trim_start(&self, offset: usize) -> Self {
        let offset = offset.min(self.len());
        Self {
            frames: self.frames.slice(s![offset.., .., .., ..]).to_owned(),
        }
    }
}

/// Colour trace of one region.
#[derive(Debug, Clone)]
pub struct RegionTrace {
    region: RegionId,
    channels: Array2<f32>,
    patches: Option<PatchStack>,
}

impl RegionTrace {
    /// Build from per-frame `[r, g, b]` samples.
    pub fn from_samples(region: RegionId, samples: &[[f32; 3]]) -> Self {
        let channels = Array2::from_shape_fn((3, samples.len()), |(c, t)| samples[t][c]);
        Self {
            region,
            channels,
            patches: None,
        }
    }

    /// Build from separate channel arrays, which must have equal length.
    pub fn from_channels(
        region: RegionId,
        r: Array1<f32>,
        g: Array1<f32>,
        b: Array1<f32>,
    ) -> Result<Self> {
        let n = r.len();
        for len in [g.len(), b.len()] {
            if len != n {
                return Err(SignalError::MisalignedTraces {
                    region,
                    expected: n,
                    actual: len,
                });
            }
        }
        let mut channels = Array2::zeros((3, n));
        channels.row_mut(RED).assign(&r);
        channels.row_mut(GREEN).assign(&g);
        channels.row_mut(BLUE).assign(&b);
        Ok(Self {
            region,
            channels,
            patches: None,
        })
    }

    /// Attach a patch stack; its frame count must match the trace.
    pub fn with_patches(mut self, patches: PatchStack) -> Result<Self> {
        if patches.len() != self.len() {
            return Err(SignalError::MisalignedTraces {
                region: self.region,
                expected: self.len(),
                actual: patches.len(),
            });
        }
        self.patches = Some(patches);
        Ok(self)
    }

    pub fn region(&self) -> RegionId {
        self.region
    }

    pub fn len(&self) -> usize {
        self.channels.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `3 × T` channel matrix.
    pub fn channels(&self) -> ArrayView2<'_, f32> {
        self.channels.view()
    }

    pub fn red(&self) -> ArrayView1<'_, f32> {
        self.channels.row(RED)
    }

    pub fn green(&self) -> ArrayView1<'_, f32> {
        self.channels.row(GREEN)
    }

    pub fn blue(&self) -> ArrayView1<'_, f32> {
        self.channels.row(BLUE)
    }

    pub fn patches(&self) -> Option<&PatchStack> {
        self.patches.as_ref()
    }

    /// Drop the first `offset` frames (clamped to the trace length).
    pub fn trim_start(&self, offset: usize) -> Self {
        let offset = offset.min(self.len());
        Self {
            region: self.region,
            channels: self.channels.slice(s![.., offset..]).to_owned(),
            patches: self.patches.as_ref().map(|p| p.trim_start(offset)),
        }
    }
}

/// All region traces of one recording, frame-aligned.
#[derive(Debug, Clone)]
pub struct RegionTraceSet {
    fs: f32,
    traces: Vec<RegionTrace>,
}

impl RegionTraceSet {
    /// Validate and group traces sampled at `fs` Hz.
    pub fn new(fs: f32, traces: Vec<RegionTrace>) -> Result<Self> {
        if !(fs.is_finite() && fs > 0.0) {
            return Err(SignalError::InvalidSampleRate(fs));
        }
        if let Some(first) = traces.first() {
            let expected = first.len();
            if let Some(bad) = traces.iter().find(|t| t.len() != expected) {
                return Err(SignalError::MisalignedTraces {
                    region: bad.region(),
                    expected,
                    actual: bad.len(),
                });
            }
        }
        Ok(Self { fs, traces })
    }

    pub fn fs(&self) -> f32 {
        self.fs
    }

    /// Number of frames per trace.
    pub fn frame_count(&self) -> usize {
        self.traces.first().map_or(0, RegionTrace::len)
    }

    pub fn num_regions(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    pub fn traces(&self) -> &[RegionTrace] {
        &self.traces
    }

    pub fn get(&self, region: RegionId) -> Option<&RegionTrace> {
        self.traces.iter().find(|t| t.region() == region)
    }

    /// Drop the first `offset` frames of every trace.
    pub fn trim_start(&self, offset: usize) -> Self {
        Self {
            fs: self.fs,
            traces: self.traces.iter().map(|t| t.trim_start(offset)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_samples_layout() {
        let trace = RegionTrace::from_samples(151, &[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        assert_eq!(trace.len(), 2);
        assert_eq!(trace.red().to_vec(), vec![1.0, 4.0]);
        assert_eq!(trace.green().to_vec(), vec![2.0, 5.0]);
        assert_eq!(trace.blue().to_vec(), vec![3.0, 6.0]);
    }

    #[test]
    fn test_from_channels_rejects_length_mismatch() {
        let err = RegionTrace::from_channels(
            10,
            Array1::zeros(5),
            Array1::zeros(5),
            Array1::zeros(4),
        );
        assert!(matches!(err, Err(SignalError::MisalignedTraces { region: 10, .. })));
    }

    #[test]
    fn test_set_rejects_misaligned_regions() {
        let a = RegionTrace::from_samples(1, &[[0.0; 3]; 10]);
        let b = RegionTrace::from_samples(2, &[[0.0; 3]; 9]);
        assert!(RegionTraceSet::new(30.0, vec![a, b]).is_err());
    }

    #[test]
    fn test_set_rejects_bad_sample_rate() {
        assert!(matches!(
            RegionTraceSet::new(0.0, vec![]),
            Err(SignalError::InvalidSampleRate(_))
        ));
        assert!(RegionTraceSet::new(f32::NAN, vec![]).is_err());
    }

    #[test]
    fn test_trim_start_keeps_alignment() {
        let samples: Vec<[f32; 3]> = (0..20).map(|i| [i as f32; 3]).collect();
        let patches = PatchStack::new(Array4::zeros((20, 4, 4, 3))).unwrap();
        let trace = RegionTrace::from_samples(151, &samples)
            .with_patches(patches)
            .unwrap();
        let set = RegionTraceSet::new(30.0, vec![trace]).unwrap();

        let trimmed = set.trim_start(5);
        assert_eq!(trimmed.frame_count(), 15);
        let t = trimmed.get(151).unwrap();
        assert_eq!(t.red()[0], 5.0);
        assert_eq!(t.patches().unwrap().len(), 15);

        assert_eq!(set.trim_start(100).frame_count(), 0);
    }

    #[test]
    fn test_patch_stack_requires_rgb() {
        assert!(PatchStack::new(Array4::zeros((2, 4, 4, 1))).is_none());
        let frames = vec![Array3::zeros((2, 2, 3)), Array3::zeros((3, 2, 3))];
        assert!(PatchStack::from_frames(&frames).is_none());
    }
}
