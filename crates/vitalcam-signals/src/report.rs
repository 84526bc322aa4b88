//! Output records.
//!
//! [`CandidateRecord`] is the flat row persisted per candidate. Its field
//! order and names are fixed: tabular consumers rely on the column layout.

use serde::{Deserialize, Serialize};

use crate::config::QualityIndex;
use crate::pipeline::CandidateResult;
use crate::reference::ReferenceRates;
use crate::trace::RegionId;

/// One output row. Missing values serialise as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub region_id: RegionId,
    pub method_id: String,
    pub heart_rate_bpm: Option<f32>,
    pub respiration_rpm: Option<f32>,
    pub sqi_spectral_peak: f32,
    pub sqi_best_window: Option<f32>,
    pub sqi_lowest_window: Option<f32>,
    pub sqi_kurtosis: f32,
    pub reference_bpm: Option<f32>,
    pub reference_rpm: Option<f32>,
    pub bpm_abs_error: Option<f32>,
    pub rpm_abs_error: Option<f32>,
}

impl CandidateRecord {
    pub const COLUMNS: [&'static str; 12] = [
        "region_id",
        "method_id",
        "heart_rate_bpm",
        "respiration_rpm",
        "sqi_spectral_peak",
        "sqi_best_window",
        "sqi_lowest_window",
        "sqi_kurtosis",
        "reference_bpm",
        "reference_rpm",
        "bpm_abs_error",
        "rpm_abs_error",
    ];

    pub fn new(candidate: &CandidateResult, reference: &ReferenceRates) -> Self {
        let heart_rate_bpm = candidate.heart_rate.map(|r| r.per_minute);
        let respiration_rpm = candidate.respiration_rate.map(|r| r.per_minute);
        let abs_error = |est: Option<f32>, truth: Option<f32>| Some((est? - truth?).abs());

        Self {
            region_id: candidate.region,
            method_id: candidate.method.id().to_string(),
            heart_rate_bpm,
            respiration_rpm,
            sqi_spectral_peak: candidate.quality.spectral_peak,
            sqi_best_window: candidate.quality.best_window,
            sqi_lowest_window: candidate.quality.lowest_window,
            sqi_kurtosis: candidate.quality.kurtosis,
            reference_bpm: reference.heart_bpm,
            reference_rpm: reference.respiration_rpm,
            bpm_abs_error: abs_error(heart_rate_bpm, reference.heart_bpm),
            rpm_abs_error: abs_error(respiration_rpm, reference.respiration_rpm),
        }
    }
}

/// All candidates of one recording plus the selected one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingReport {
    pub recording_id: String,
    /// Leading samples dropped before extraction
    pub trim_offset: usize,
    /// Frames evaluated per region
    pub frame_count: usize,
    /// Index the selection ranked by
    pub primary: QualityIndex,
    /// Enumeration order: method-major, region-minor
    pub candidates: Vec<CandidateResult>,
    /// Position of the selected candidate
    pub best: Option<usize>,
}

impl RecordingReport {
    pub fn best(&self) -> Option<&CandidateResult> {
        self.best.and_then(|i| self.candidates.get(i))
    }

    pub fn records(&self, reference: &ReferenceRates) -> Vec<CandidateRecord> {
        self.candidates
            .iter()
            .map(|c| CandidateRecord::new(c, reference))
            .collect()
    }

    pub fn best_record(&self, reference: &ReferenceRates) -> Option<CandidateRecord> {
        self.best().map(|c| CandidateRecord::new(c, reference))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::{QualityScores, RateEstimate, RateKind};
    use crate::rppg::RppgMethod;

    fn candidate() -> CandidateResult {
        CandidateResult {
            region: 151,
            method: RppgMethod::Pos,
            heart_rate: Some(RateEstimate {
                kind: RateKind::Heart,
                per_minute: 72.0,
                frequency_hz: 1.2,
                bin: 12,
            }),
            respiration_rate: None,
            quality: QualityScores {
                spectral_peak: 0.8,
                best_window: Some(3.5),
                lowest_window: Some(0.1),
                kurtosis: -1.4,
                degenerate: false,
            },
        }
    }

    #[test]
    fn test_record_errors() {
        let reference = ReferenceRates {
            heart_bpm: Some(75.0),
            respiration_rpm: Some(14.0),
        };
        let record = CandidateRecord::new(&candidate(), &reference);
        assert_eq!(record.method_id, "POS");
        assert_eq!(record.sqi_best_window, Some(3.5));
        assert_eq!(record.sqi_lowest_window, Some(0.1));
        assert_eq!(record.bpm_abs_error, Some(3.0));
        assert_eq!(record.rpm_abs_error, None);
    }

    #[test]
    fn test_record_column_order() {
        let record = CandidateRecord::new(&candidate(), &ReferenceRates::default());
        let json = serde_json::to_value(&record).unwrap();
        let object = json.as_object().unwrap();
        assert_eq!(object.len(), CandidateRecord::COLUMNS.len());
        assert!(CandidateRecord::COLUMNS.iter().all(|c| object.contains_key(*c)));

        let text = serde_json::to_string(&record).unwrap();
        let positions: Vec<usize> = CandidateRecord::COLUMNS
            .iter()
            .map(|c| text.find(&format!("\"{c}\"")).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(text.contains("\"reference_bpm\":null"));
    }

    #[test]
    fn test_report_best() {
        let report = RecordingReport {
            recording_id: "video_1".to_string(),
            trim_offset: 0,
            frame_count: 300,
            primary: QualityIndex::SpectralPeak,
            candidates: vec![candidate()],
            best: Some(0),
        };
        let best = report.best_record(&ReferenceRates::default()).unwrap();
        assert_eq!(best.heart_rate_bpm, Some(72.0));
        assert_eq!(report.records(&ReferenceRates::default()).len(), 1);
    }
}
