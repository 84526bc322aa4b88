//! # vitalcam-signals
//!
//! Camera-based vital sign extraction.
//!
//! This crate provides:
//! - **Region sampling**: per-landmark colour traces and SSR patch stacks from video frames
//! - **rPPG algorithms**: CHROM, GREEN, LGI, POS, GBGR, ICA, OMIT, PBV, PCA and SSR
//! - **DSP functions**: zero-phase band-pass, amplitude spectrum, harmonic-aware rate estimation
//! - **Quality scoring and selection**: the best (region, method) candidate per recording
//!
//! ## Example
//!
//! ```ignore
//! use vitalcam_signals::{Pipeline, PipelineConfig, RegionTraceSet};
//!
//! let config = PipelineConfig::from_file_with_env("vitalcam.toml")?;
//! let pipeline = Pipeline::new(config)?;
//!
//! let report = pipeline.run("video_face_32", &traces)?;
//! if let Some(best) = report.best() {
//!     println!("{} @ region {}: {:?}", best.method, best.region, best.heart_rate);
//! }
//! ```

pub mod config;
pub mod dsp;
pub mod error;
pub mod pipeline;
pub mod reference;
pub mod report;
pub mod rppg;
pub mod selector;
pub mod trace;
pub mod vision;

#[cfg(test)]
mod tests_proptest;

pub use config::{Band, ConfigError, PipelineConfig, QualityIndex};
pub use dsp::{QualityScores, RateEstimate, RateKind};
pub use error::{Result, SignalError};
pub use pipeline::{CandidateResult, Pipeline};
pub use reference::{ReferenceConfig, ReferenceRates, ReferenceSignal};
pub use report::{CandidateRecord, RecordingReport};
pub use rppg::RppgMethod;
pub use selector::Selector;
pub use trace::{PatchStack, RegionId, RegionTrace, RegionTraceSet};
