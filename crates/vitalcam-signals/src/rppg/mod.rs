//! Remote Photoplethysmography (rPPG) pulse extraction
//!
//! Turns a region's colour trace into a single pulse waveform. Every method
//! is a variant of [`RppgMethod`] and shares one entry point,
//! [`RppgMethod::extract`], so candidate evaluation can iterate over methods
//! uniformly.
//!
//! Implements:
//! - **GREEN**, **CHROM**, **GBGR**, **POS**: channel combinations
//! - **LGI**, **OMIT**, **PBV**: projections against illumination or blood-volume directions
//! - **PCA**, **ICA**: blind source separation, one designated component
//! - **SSR**: spatial subspace rotation over per-frame skin patches
//!
//! A method that cannot produce a finite waveform returns zeros of the trace
//! length; only configuration mistakes are reported as errors.

mod chrominance;
mod decomposition;
mod linalg;
mod projection;
mod ssr;

pub use chrominance::{chrom, gbgr, green, pos};
pub use decomposition::{ica, pca, IcaParams};
pub use projection::{lgi, omit, pbv};
pub use ssr::ssr;

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::ExtractionConfig;
use crate::dsp::stats;
use crate::error::{Result, SignalError};
use crate::trace::RegionTrace;

/// rPPG extraction method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RppgMethod {
    /// Chrominance-based (De Haan 2013)
    Chrom,
    /// Green channel only
    Green,
    /// Local Group Invariance (Pilz 2018)
    Lgi,
    /// Plane-Orthogonal-to-Skin (Wang 2017)
    Pos,
    /// Green-over-blue plus green-over-red ratio
    Gbgr,
    /// Independent component analysis, designated source
    Ica,
    /// Orthogonal Matrix Image Transformation (Casado 2023)
    Omit,
    /// Blood-volume pulse signature (De Haan 2014)
    Pbv,
    /// Principal component analysis, designated component
    Pca,
    /// Spatial Subspace Rotation (Wang 2015), needs patch stacks
    Ssr,
}

impl RppgMethod {
    pub const ALL: [RppgMethod; 10] = [
        RppgMethod::Chrom,
        RppgMethod::Green,
        RppgMethod::Lgi,
        RppgMethod::Pos,
        RppgMethod::Gbgr,
        RppgMethod::Ica,
        RppgMethod::Omit,
        RppgMethod::Pbv,
        RppgMethod::Pca,
        RppgMethod::Ssr,
    ];

    /// Stable method identifier used in output records.
    pub fn id(&self) -> &'static str {
        match self {
            RppgMethod::Chrom => "CHROM",
            RppgMethod::Green => "GREEN",
            RppgMethod::Lgi => "LGI",
            RppgMethod::Pos => "POS",
            RppgMethod::Gbgr => "GBGR",
            RppgMethod::Ica => "ICA",
            RppgMethod::Omit => "OMIT",
            RppgMethod::Pbv => "PBV",
            RppgMethod::Pca => "PCA",
            RppgMethod::Ssr => "SSR",
        }
    }

    /// True for methods that read patch stacks instead of channel means.
    pub fn requires_patches(&self) -> bool {
        matches!(self, RppgMethod::Ssr)
    }

    /// Extract the pulse waveform of `trace` sampled at `fs` Hz.
    ///
    /// The output always has the trace's length. Degenerate or numerically
    /// singular inputs give an all-zero waveform.
    ///
    /// # Errors
    /// - [`SignalError::InvalidSampleRate`] for a non-positive `fs`
    /// - [`SignalError::MissingPatchStack`] for SSR on a trace without patches
    pub fn extract(
        &self,
        trace: &RegionTrace,
        fs: f32,
        params: &ExtractionConfig,
    ) -> Result<Array1<f32>> {
        if !(fs.is_finite() && fs > 0.0) {
            return Err(SignalError::InvalidSampleRate(fs));
        }
        let patches = match (self.requires_patches(), trace.patches()) {
            (true, None) => return Err(SignalError::MissingPatchStack(trace.region())),
            (_, patches) => patches,
        };

        let n = trace.len();
        if n == 0 {
            return Ok(Array1::zeros(0));
        }

        let channels = trace.channels();
        let waveform = match self {
            RppgMethod::Chrom => chrom(channels),
            RppgMethod::Green => Some(green(channels)),
            RppgMethod::Lgi => lgi(channels),
            RppgMethod::Pos => Some(pos(channels, fs, params.pos_window_secs)),
            RppgMethod::Gbgr => Some(gbgr(channels)),
            RppgMethod::Ica => ica(
                channels,
                &IcaParams {
                    component: params.ica_component,
                    max_iter: params.ica_max_iter,
                    tolerance: params.ica_tolerance,
                },
            ),
            RppgMethod::Omit => omit(channels),
            RppgMethod::Pbv => pbv(channels),
            RppgMethod::Pca => pca(channels, params.pca_component),
            RppgMethod::Ssr => patches.map(|p| ssr(p, fs, params.ssr_window_secs)),
        };

        match waveform {
            Some(w) if w.len() == n && stats::all_finite(w.view()) => Ok(w),
            _ => {
                log::debug!(
                    "{} produced no finite waveform for region {}, using zeros",
                    self.id(),
                    trace.region()
                );
                Ok(Array1::zeros(n))
            }
        }
    }
}

impl fmt::Display for RppgMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for RppgMethod {
    type Err = SignalError;

    /// Case-insensitive method id.
    fn from_str(s: &str) -> Result<Self> {
        RppgMethod::ALL
            .into_iter()
            .find(|m| m.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SignalError::UnknownMethod(s.to_string()))
    }
}
