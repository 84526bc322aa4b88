//! Zero-phase Butterworth band-pass filtering.
//!
//! The band-pass is an order-`N` Butterworth high-pass at the lower cutoff
//! followed by an order-`N` Butterworth low-pass at the upper cutoff, each
//! realised as second-order sections (plus one first-order section for odd
//! `N`) designed with the pre-warped bilinear transform.
//! [`BandPassFilter::apply`] runs the cascade forward and then backward over
//! an odd-reflection padded copy of the input, which cancels the phase
//! response and squares the magnitude response.
//!
//! # Reference
//! Gustafsson, F. (1996). "Determining the initial states in forward-backward
//! filtering". IEEE Trans. Signal Processing 44(4).

use ndarray::{Array1, ArrayView1};
use num_complex::Complex64;
use std::f64::consts::PI;

use crate::config::Band;
use crate::error::{Result, SignalError};

/// Highest supported Butterworth order per band edge.
pub const MAX_FILTER_ORDER: usize = 8;

/// IIR section of order one or two, `a0` normalised to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    b: [f64; 3],
    a: [f64; 2],
}

impl Biquad {
    /// Second-order low-pass at `fc` Hz with pole quality `q`.
    pub fn lowpass(fc: f64, fs: f64, q: f64) -> Self {
        let k = (PI * fc / fs).tan();
        let k2 = k * k;
        let norm = 1.0 / (1.0 + k / q + k2);
        let b0 = k2 * norm;
        Self {
            b: [b0, 2.0 * b0, b0],
            a: [2.0 * (k2 - 1.0) * norm, (1.0 - k / q + k2) * norm],
        }
    }

    /// Second-order high-pass at `fc` Hz with pole quality `q`.
    pub fn highpass(fc: f64, fs: f64, q: f64) -> Self {
        let k = (PI * fc / fs).tan();
        let k2 = k * k;
        let norm = 1.0 / (1.0 + k / q + k2);
        Self {
            b: [norm, -2.0 * norm, norm],
            a: [2.0 * (k2 - 1.0) * norm, (1.0 - k / q + k2) * norm],
        }
    }

    /// First-order low-pass at `fc` Hz.
    pub fn lowpass_first_order(fc: f64, fs: f64) -> Self {
        let k = (PI * fc / fs).tan();
        let norm = 1.0 / (1.0 + k);
        Self {
            b: [k * norm, k * norm, 0.0],
            a: [(k - 1.0) * norm, 0.0],
        }
    }

    /// First-order high-pass at `fc` Hz.
    pub fn highpass_first_order(fc: f64, fs: f64) -> Self {
        let k = (PI * fc / fs).tan();
        let norm = 1.0 / (1.0 + k);
        Self {
            b: [norm, -norm, 0.0],
            a: [(k - 1.0) * norm, 0.0],
        }
    }

    /// Gain at 0 Hz.
    pub fn dc_gain(&self) -> f64 {
        (self.b[0] + self.b[1] + self.b[2]) / (1.0 + self.a[0] + self.a[1])
    }

    /// Magnitude response at `freq` Hz.
    pub fn gain(&self, freq: f64, fs: f64) -> f64 {
        let z1 = Complex64::from_polar(1.0, -2.0 * PI * freq / fs);
        let z2 = z1 * z1;
        let num = Complex64::new(self.b[0], 0.0) + z1 * self.b[1] + z2 * self.b[2];
        let den = Complex64::new(1.0, 0.0) + z1 * self.a[0] + z2 * self.a[1];
        (num / den).norm()
    }

    /// Filter in place (direct form I), starting from the steady state of a
    /// constant input equal to the first sample.
    fn run(&self, data: &mut [f64]) {
        let Some(&first) = data.first() else {
            return;
        };
        let [b0, b1, b2] = self.b;
        let [a1, a2] = self.a;
        let settled = self.dc_gain() * first;
        let (mut x1, mut x2) = (first, first);
        let (mut y1, mut y2) = (settled, settled);
        for sample in data.iter_mut() {
            let x0 = *sample;
            let y0 = b0 * x0 + b1 * x1 + b2 * x2 - a1 * y1 - a2 * y2;
            *sample = y0;
            x2 = x1;
            x1 = x0;
            y2 = y1;
            y1 = y0;
        }
    }
}

/// Pole qualities of an order-`order` Butterworth prototype, one per
/// conjugate pole pair, plus `None` for the real pole of an odd order.
fn butterworth_q(order: usize) -> Vec<Option<f64>> {
    let mut qs: Vec<Option<f64>> = (0..order / 2)
        .map(|k| {
            let angle = PI * (2 * k + 1) as f64 / (2 * order) as f64;
            Some(1.0 / (2.0 * angle.sin()))
        })
        .collect();
    if order % 2 == 1 {
        qs.push(None);
    }
    qs
}

/// Zero-phase band-pass over a fixed band.
#[derive(Debug, Clone)]
pub struct BandPassFilter {
    band: Band,
    sample_rate: f32,
    order: usize,
    sections: Vec<Biquad>,
}

impl BandPassFilter {
    /// Design an order-`order` Butterworth high-pass/low-pass pair.
    ///
    /// `order` is clamped to `1..=MAX_FILTER_ORDER`. Fails when `fs` is not
    /// positive or the band does not satisfy `0 < low < high < fs/2`.
    pub fn new(band: Band, fs: f32, order: usize) -> Result<Self> {
        if !(fs.is_finite() && fs > 0.0) {
            return Err(SignalError::InvalidSampleRate(fs));
        }
        if !band.is_valid_for(fs) {
            return Err(SignalError::InvalidBand {
                low: band.low,
                high: band.high,
                fs,
            });
        }
        let order = order.clamp(1, MAX_FILTER_ORDER);
        let fs64 = fs as f64;
        let (low, high) = (band.low as f64, band.high as f64);
        let qs = butterworth_q(order);

        let mut sections = Vec::with_capacity(2 * qs.len());
        sections.extend(qs.iter().map(|q| match q {
            Some(q) => Biquad::highpass(low, fs64, *q),
            None => Biquad::highpass_first_order(low, fs64),
        }));
        sections.extend(qs.iter().map(|q| match q {
            Some(q) => Biquad::lowpass(high, fs64, *q),
            None => Biquad::lowpass_first_order(high, fs64),
        }));
        Ok(Self {
            band,
            sample_rate: fs,
            order,
            sections,
        })
    }

    pub fn band(&self) -> Band {
        self.band
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Edge padding length: three times the band-pass coefficient count, or
    /// one period of the lower cutoff when that is longer.
    pub fn pad_len(&self) -> usize {
        let period = (self.sample_rate / self.band.low).ceil() as usize;
        (3 * (2 * self.order + 1)).max(period)
    }

    /// Single-pass magnitude response at `freq` Hz; [`Self::apply`] realises
    /// its square.
    pub fn gain(&self, freq: f32) -> f32 {
        let fs = self.sample_rate as f64;
        self.sections
            .iter()
            .map(|s| s.gain(freq as f64, fs))
            .product::<f64>() as f32
    }

    /// Forward-backward filter. Output length equals input length.
    pub fn apply(&self, signal: ArrayView1<'_, f32>) -> Array1<f32> {
        let n = signal.len();
        if n == 0 {
            return Array1::zeros(0);
        }
        let x: Vec<f64> = signal.iter().map(|&v| v as f64).collect();
        let pad = self.pad_len().min(n - 1);

        // Odd reflection about both end points
        let mut ext = Vec::with_capacity(n + 2 * pad);
        ext.extend((1..=pad).rev().map(|i| 2.0 * x[0] - x[i]));
        ext.extend_from_slice(&x);
        ext.extend((1..=pad).map(|i| 2.0 * x[n - 1] - x[n - 1 - i]));

        self.cascade(&mut ext);
        ext.reverse();
        self.cascade(&mut ext);
        ext.reverse();

        ext[pad..pad + n].iter().map(|&v| v as f32).collect()
    }

    fn cascade(&self, data: &mut [f64]) {
        for section in &self.sections {
            section.run(data);
        }
    }
}
