//! Error types for the signal pipeline.
//!
//! Only configuration mistakes surface as errors. Degenerate regions and
//! numerically singular decompositions are recovered inside the pipeline
//! (flat-zero waveform, zero score or a `None` estimate).

use thiserror::Error;

use crate::config::ConfigError;
use crate::trace::RegionId;

#[derive(Error, Debug)]
pub enum SignalError {
    #[error("unknown extraction method id: {0}")]
    UnknownMethod(String),

    #[error("invalid band [{low}, {high}] Hz for sample rate {fs} Hz (need 0 < low < high < fs/2)")]
    InvalidBand { low: f32, high: f32, fs: f32 },

    #[error("sample rate must be positive and finite, got {0}")]
    InvalidSampleRate(f32),

    #[error("region {region} has {actual} samples, expected {expected}")]
    MisalignedTraces {
        region: RegionId,
        expected: usize,
        actual: usize,
    },

    #[error("region {0} has no patch stack (required by SSR)")]
    MissingPatchStack(RegionId),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, SignalError>;
