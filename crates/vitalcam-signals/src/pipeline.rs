//! Candidate evaluation
//!
//! Every (region, method) pair of a recording becomes one
//! [`CandidateResult`]:
//!
//! 1. Extract the pulse waveform ([`RppgMethod::extract`]); a flat waveform
//!    has no estimates and zero spectral quality
//! 2. Band-pass it to the heart band (zero-phase) and take its amplitude spectrum
//! 3. Estimate heart rate (harmonic-aware) and score the filtered waveform
//! 4. Band-pass the raw waveform to the respiration band and estimate respiration rate
//!
//! Pairs are independent; with the `parallel` feature they are evaluated on
//! the rayon pool and collected back in enumeration order (method-major,
//! region-minor).

use ndarray::{Array1, ArrayView1};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::dsp::{
    amplitude_spectrum, stats, BandPassFilter, QualityScorer, QualityScorerConfig, QualityScores,
    RateEstimate, RateEstimator, RateEstimatorConfig, Spectrum,
};
use crate::error::{Result, SignalError};
use crate::report::RecordingReport;
use crate::rppg::RppgMethod;
use crate::selector::Selector;
use crate::trace::{RegionId, RegionTrace, RegionTraceSet};

/// Evaluation of one (region, method) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub region: RegionId,
    pub method: RppgMethod,
    /// `None` when the heart band holds no usable peak
    pub heart_rate: Option<RateEstimate>,
    pub respiration_rate: Option<RateEstimate>,
    pub quality: QualityScores,
}

/// Heart- and respiration-band filters designed for one sample rate.
#[derive(Debug, Clone)]
struct Conditioner {
    heart: BandPassFilter,
    respiration: BandPassFilter,
}

impl Conditioner {
    fn new(config: &PipelineConfig, fs: f32) -> Result<Self> {
        Ok(Self {
            heart: BandPassFilter::new(config.heart.band, fs, config.heart.filter_order)?,
            respiration: BandPassFilter::new(
                config.respiration.band,
                fs,
                config.respiration.filter_order,
            )?,
        })
    }

    fn fs(&self) -> f32 {
        self.heart.sample_rate()
    }
}

/// Per-recording evaluation pipeline
pub struct Pipeline {
    config: PipelineConfig,
    conditioner: Conditioner,
    heart_rate: RateEstimator,
    respiration_rate: RateEstimator,
    scorer: QualityScorer,
    selector: Selector,
}

impl Pipeline {
    /// Validate `config` and design the filters for `config.sample_rate`.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let conditioner = Conditioner::new(&config, config.sample_rate)?;
        Ok(Self {
            heart_rate: RateEstimator::with_config(RateEstimatorConfig::from(&config.heart)),
            respiration_rate: RateEstimator::with_config(RateEstimatorConfig::from(
                &config.respiration,
            )),
            scorer: QualityScorer::with_config(QualityScorerConfig::new(
                &config.quality,
                config.heart.band,
            )),
            selector: Selector::new(config.quality.primary),
            conditioner,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Heart-band filtered waveform and its amplitude spectrum.
    pub fn condition(&self, waveform: ArrayView1<'_, f32>) -> (Array1<f32>, Spectrum) {
        condition_with(&self.conditioner.heart, waveform)
    }

    /// Evaluate one pair on a trace sampled at `config.sample_rate`.
    pub fn evaluate(&self, trace: &RegionTrace, method: RppgMethod) -> Result<CandidateResult> {
        self.evaluate_with(&self.conditioner, trace, method)
    }

    /// Evaluate every configured method on every region.
    ///
    /// SSR is skipped for regions without a patch stack. Filters are
    /// redesigned when the set's sample rate differs from the configured one.
    pub fn evaluate_all(&self, set: &RegionTraceSet) -> Result<Vec<CandidateResult>> {
        let redesigned;
        let conditioner = if set.fs() == self.conditioner.fs() {
            &self.conditioner
        } else {
            log::debug!(
                "Trace set sampled at {} Hz, configured {} Hz; redesigning filters",
                set.fs(),
                self.conditioner.fs()
            );
            redesigned = Conditioner::new(&self.config, set.fs())?;
            &redesigned
        };

        let pairs: Vec<(RppgMethod, &RegionTrace)> = self
            .config
            .methods
            .iter()
            .flat_map(|&method| {
                set.traces()
                    .iter()
                    .filter(move |trace| !method.requires_patches() || trace.patches().is_some())
                    .map(move |trace| (method, trace))
            })
            .collect();

        #[cfg(feature = "parallel")]
        let results = pairs
            .par_iter()
            .map(|&(method, trace)| self.evaluate_with(conditioner, trace, method))
            .collect::<Result<Vec<_>>>();
        #[cfg(not(feature = "parallel"))]
        let results = pairs
            .iter()
            .map(|&(method, trace)| self.evaluate_with(conditioner, trace, method))
            .collect::<Result<Vec<_>>>();

        results
    }

    /// Trim, evaluate and select for one recording.
    pub fn run(&self, recording_id: &str, set: &RegionTraceSet) -> Result<RecordingReport> {
        let offset = self.config.trim_offset(recording_id);
        let trimmed;
        let set = if offset > 0 {
            trimmed = set.trim_start(offset);
            &trimmed
        } else {
            set
        };

        let candidates = self.evaluate_all(set)?;
        let best = self.selector.select_index(&candidates);
        let with_heart_rate = candidates.iter().filter(|c| c.heart_rate.is_some()).count();

        match best.map(|i| &candidates[i]) {
            Some(c) => log::info!(
                "{recording_id}: {} candidates ({with_heart_rate} with a heart rate), best {} @ region {} = {:?} bpm",
                candidates.len(),
                c.method,
                c.region,
                c.heart_rate.map(|r| r.per_minute)
            ),
            None => log::info!("{recording_id}: no candidates"),
        }

        Ok(RecordingReport {
            recording_id: recording_id.to_string(),
            trim_offset: offset,
            frame_count: set.frame_count(),
            primary: self.selector.index(),
            candidates,
            best,
        })
    }

    fn evaluate_with(
        &self,
        conditioner: &Conditioner,
        trace: &RegionTrace,
        method: RppgMethod,
    ) -> Result<CandidateResult> {
        let fs = conditioner.fs();
        let waveform = method.extract(trace, fs, &self.config.extraction)?;

        // A flat waveform carries no pulse. It is scored unfiltered with no
        // spectral energy, so filter residue cannot score it.
        if stats::std(waveform.view()) == 0.0 {
            log::trace!("{method} @ region {}: flat waveform", trace.region());
            return Ok(CandidateResult {
                region: trace.region(),
                method,
                heart_rate: None,
                respiration_rate: None,
                quality: self.scorer.score(waveform.view(), &Spectrum::empty(), fs),
            });
        }

        let (filtered, spectrum) = condition_with(&conditioner.heart, waveform.view());
        let heart_rate = self.heart_rate.estimate(&spectrum);
        let quality = self.scorer.score(filtered.view(), &spectrum, fs);

        let (_, resp_spectrum) = condition_with(&conditioner.respiration, waveform.view());
        let respiration_rate = self.respiration_rate.estimate(&resp_spectrum);

        log::trace!(
            "{method} @ region {}: hr={:?} rr={:?} sqi={:.3}",
            trace.region(),
            heart_rate.map(|r| r.per_minute),
            respiration_rate.map(|r| r.per_minute),
            quality.spectral_peak
        );

        Ok(CandidateResult {
            region: trace.region(),
            method,
            heart_rate,
            respiration_rate,
            quality,
        })
    }
}

fn condition_with(filter: &BandPassFilter, waveform: ArrayView1<'_, f32>) -> (Array1<f32>, Spectrum) {
    let filtered = filter.apply(waveform);
    let spectrum = amplitude_spectrum(filtered.view(), filter.sample_rate());
    (filtered, spectrum)
}

impl TryFrom<PipelineConfig> for Pipeline {
    type Error = SignalError;

    fn try_from(config: PipelineConfig) -> Result<Self> {
        Self::new(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Band;
    use crate::trace::PatchStack;
    use ndarray::Array4;
    use std::f32::consts::PI;

    fn pulse_trace(region: RegionId, n: usize, freq: f32) -> RegionTrace {
        let samples: Vec<[f32; 3]> = (0..n)
            .map(|t| {
                let p = (2.0 * PI * freq * t as f32 / 30.0).sin();
                [120.0 + 0.3 * p, 90.0 + p, 70.0 + 0.2 * p]
            })
            .collect();
        RegionTrace::from_samples(region, &samples)
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = PipelineConfig::default();
        config.heart.band = Band::new(0.5, 20.0);
        assert!(matches!(Pipeline::new(config), Err(SignalError::Config(_))));
    }

    #[test]
    fn test_evaluate_green_finds_pulse() {
        let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        let result = pipeline.evaluate(&pulse_trace(151, 300, 1.2), RppgMethod::Green).unwrap();
        let hr = result.heart_rate.unwrap();
        assert!((hr.per_minute - 72.0).abs() <= 6.0, "{}", hr.per_minute);
        assert!(result.quality.spectral_peak > 0.5);
        assert_eq!(result.region, 151);
    }

    #[test]
    fn test_enumeration_order_and_ssr_filtering() {
        let mut config = PipelineConfig::default();
        config.methods = vec![RppgMethod::Ssr, RppgMethod::Green];
        let pipeline = Pipeline::new(config).unwrap();

        let with_patches = pulse_trace(151, 90, 1.2)
            .with_patches(PatchStack::new(Array4::from_elem((90, 4, 4, 3), 100.0)).unwrap())
            .unwrap();
        let set = RegionTraceSet::new(30.0, vec![pulse_trace(10, 90, 1.2), with_patches]).unwrap();

        let results = pipeline.evaluate_all(&set).unwrap();
        let order: Vec<(RppgMethod, RegionId)> = results.iter().map(|r| (r.method, r.region)).collect();
        assert_eq!(
            order,
            vec![
                (RppgMethod::Ssr, 151),
                (RppgMethod::Green, 10),
                (RppgMethod::Green, 151),
            ]
        );
    }

    #[test]
    fn test_flat_waveform_scores_match_scorer() {
        let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        let scorer = QualityScorer::new();

        for n in [300usize, 100] {
            let flat = RegionTrace::from_samples(3, &vec![[80.0, 60.0, 40.0]; n]);
            let result = pipeline.evaluate(&flat, RppgMethod::Green).unwrap();
            let green = flat.green().to_owned();
            let direct = scorer.score(green.view(), &amplitude_spectrum(green.view(), 30.0), 30.0);
            assert_eq!(result.quality.best_window, direct.best_window, "n = {n}");
            assert_eq!(result.quality.lowest_window, direct.lowest_window, "n = {n}");
            assert_eq!(result.quality.kurtosis, direct.kurtosis);
            assert_eq!(result.quality.degenerate, direct.degenerate);
            assert_eq!(result.quality.spectral_peak, 0.0);
            assert!(result.heart_rate.is_none());
        }

        // Windows fit: zero variance scores 0 rather than going missing
        let long = RegionTrace::from_samples(3, &vec![[80.0, 60.0, 40.0]; 300]);
        let quality = pipeline.evaluate(&long, RppgMethod::Green).unwrap().quality;
        assert_eq!(quality.best_window, Some(0.0));
        assert_eq!(quality.lowest_window, Some(0.0));
        assert_eq!(quality.rank_value(crate::config::QualityIndex::BestWindow), Some(0.0));

        let short = RegionTrace::from_samples(3, &vec![[80.0, 60.0, 40.0]; 100]);
        let quality = pipeline.evaluate(&short, RppgMethod::Green).unwrap().quality;
        assert_eq!(quality.best_window, None);
    }

    #[test]
    fn test_run_applies_trim() {
        let mut config = PipelineConfig::default();
        config.methods = vec![RppgMethod::Chrom];
        config.trim.insert("rec_7".to_string(), 60);
        let pipeline = Pipeline::new(config).unwrap();
        let set = RegionTraceSet::new(30.0, vec![pulse_trace(4, 300, 1.2)]).unwrap();

        let report = pipeline.run("rec_7", &set).unwrap();
        assert_eq!(report.trim_offset, 60);
        assert_eq!(report.frame_count, 240);
        assert_eq!(report.best, Some(0));

        let untrimmed = pipeline.run("other", &set).unwrap();
        assert_eq!(untrimmed.frame_count, 300);
    }

    #[test]
    fn test_trim_past_end_is_degenerate_not_error() {
        let mut config = PipelineConfig::default();
        config.trim.insert("short".to_string(), 1000);
        let pipeline = Pipeline::new(config).unwrap();
        let set = RegionTraceSet::new(30.0, vec![pulse_trace(4, 100, 1.2)]).unwrap();

        let report = pipeline.run("short", &set).unwrap();
        assert_eq!(report.frame_count, 0);
        assert!(report.candidates.iter().all(|c| c.heart_rate.is_none()));
        assert!(report.candidates.iter().all(|c| c.quality.spectral_peak == 0.0));
    }

    #[test]
    fn test_other_sample_rate_redesigns_filters() {
        let mut config = PipelineConfig::default();
        config.methods = vec![RppgMethod::Green];
        let pipeline = Pipeline::new(config).unwrap();

        let samples: Vec<[f32; 3]> = (0..500)
            .map(|t| [0.0, 90.0 + (2.0 * PI * 1.5 * t as f32 / 25.0).sin(), 0.0])
            .collect();
        let set = RegionTraceSet::new(25.0, vec![RegionTrace::from_samples(1, &samples)]).unwrap();
        let results = pipeline.evaluate_all(&set).unwrap();
        let hr = results[0].heart_rate.unwrap();
        assert!((hr.per_minute - 90.0).abs() <= 3.0, "{}", hr.per_minute);

        let too_slow = RegionTraceSet::new(5.0, vec![RegionTrace::from_samples(1, &samples)]).unwrap();
        assert!(matches!(
            pipeline.evaluate_all(&too_slow),
            Err(SignalError::InvalidBand { .. })
        ));
    }
}
