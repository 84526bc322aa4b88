//! Amplitude spectrum of a real waveform.

use ndarray::{Array1, ArrayView1};
use num_complex::Complex32;
use rustfft::FftPlanner;

use crate::config::Band;

/// Non-negative half of a DFT amplitude spectrum.
///
/// `freqs[0] == 0` and bins are spaced `fs / n` apart, where `n` is the
/// length of the transformed waveform.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    freqs: Array1<f32>,
    magnitudes: Array1<f32>,
    bin_width: f32,
}

impl Spectrum {
    pub fn empty() -> Self {
        Self {
            freqs: Array1::zeros(0),
            magnitudes: Array1::zeros(0),
            bin_width: 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }

    pub fn freqs(&self) -> ArrayView1<'_, f32> {
        self.freqs.view()
    }

    pub fn magnitudes(&self) -> ArrayView1<'_, f32> {
        self.magnitudes.view()
    }

    /// Frequency spacing between bins (Hz), 0 for an empty spectrum.
    pub fn bin_width(&self) -> f32 {
        self.bin_width
    }

    /// Indices of bins whose frequency lies inside `band` (inclusive).
    pub fn band_bins(&self, band: Band) -> std::ops::Range<usize> {
        let start = self.freqs.iter().position(|&f| f >= band.low);
        let end = self.freqs.iter().rposition(|&f| f <= band.high);
        match (start, end) {
            (Some(s), Some(e)) if s <= e => s..e + 1,
            _ => 0..0,
        }
    }

    /// Local maxima inside `bins`, strongest first.
    ///
    /// A bin is a peak when it is strictly greater than its left neighbour and
    /// not smaller than its right neighbour (neighbours outside the spectrum
    /// are ignored). Equal magnitudes keep ascending bin order.
    pub fn peaks_in(&self, bins: std::ops::Range<usize>) -> Vec<usize> {
        let mags = &self.magnitudes;
        let n = mags.len();
        let mut peaks: Vec<usize> = bins
            .filter(|&i| {
                let left = i == 0 || mags[i] > mags[i - 1];
                let right = i + 1 >= n || mags[i] >= mags[i + 1];
                left && right && mags[i] > 0.0
            })
            .collect();
        peaks.sort_by(|&a, &b| mags[b].total_cmp(&mags[a]));
        peaks
    }
}

/// Amplitude spectrum `|DFT|` over the full waveform length.
///
/// Keeps bins `0..n/2`. Waveforms shorter than two samples give an empty
/// spectrum.
pub fn amplitude_spectrum(signal: ArrayView1<'_, f32>, fs: f32) -> Spectrum {
    let n = signal.len();
    if n < 2 || !(fs > 0.0) {
        return Spectrum::empty();
    }

    let mut buffer: Vec<Complex32> = signal.iter().map(|&s| Complex32::new(s, 0.0)).collect();
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n);
    fft.process(&mut buffer);

    let half_n = n / 2;
    let bin_width = fs / n as f32;
    Spectrum {
        freqs: Array1::from_shape_fn(half_n, |k| k as f32 * bin_width),
        magnitudes: buffer.iter().take(half_n).map(|c| c.norm()).collect(),
        bin_width,
    }
}
