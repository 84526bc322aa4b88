use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::dsp::filters::MAX_FILTER_ORDER;
use crate::reference::ReferenceConfig;
use crate::rppg::RppgMethod;
use crate::trace::RegionId;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Frequency interval in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub low: f32,
    pub high: f32,
}

impl Band {
    pub const HEART: Band = Band { low: 0.5, high: 3.33 };
    pub const RESPIRATION: Band = Band { low: 0.1, high: 0.5 };

    pub fn new(low: f32, high: f32) -> Self {
        Self { low, high }
    }

    #[inline]
    pub fn contains(&self, freq: f32) -> bool {
        freq >= self.low && freq <= self.high
    }

    /// True when `0 < low < high < fs/2`.
    pub fn is_valid_for(&self, fs: f32) -> bool {
        self.low.is_finite()
            && self.high.is_finite()
            && self.low > 0.0
            && self.low < self.high
            && self.high < fs / 2.0
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Video frame rate (Hz)
    pub sample_rate: f32,
    /// Extraction methods, evaluated in this order
    pub methods: Vec<RppgMethod>,
    pub heart: HeartConfig,
    pub respiration: RespirationConfig,
    pub quality: QualityConfig,
    pub regions: RegionLayout,
    pub extraction: ExtractionConfig,
    /// Reference-instrument rates (reporting only)
    pub reference: ReferenceConfig,
    /// Recording id → number of leading samples to drop
    pub trim: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartConfig {
    pub band: Band,
    /// Butterworth order of each band edge
    pub filter_order: usize,
    /// Number of in-band peaks considered by the harmonic check
    pub top_peaks: usize,
    /// Search half-width (bins) around the second harmonic
    pub harmonic_tolerance_bins: usize,
    /// Weight of harmonic support in the peak score
    pub harmonic_weight: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RespirationConfig {
    pub band: Band,
    pub filter_order: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityIndex {
    /// Peak energy over band energy, higher is better
    SpectralPeak,
    /// Maximum windowed mean/std, higher is better
    BestWindow,
    /// Minimum-magnitude windowed mean/std, lower is better
    LowestWindow,
    /// Excess kurtosis, lower is better
    Kurtosis,
}

impl Default for QualityIndex {
    fn default() -> Self {
        Self::SpectralPeak
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Index the selector ranks by
    pub primary: QualityIndex,
    /// Best-window search length (seconds)
    pub window_secs: f32,
    pub num_peaks: usize,
    pub peak_halfwidth_bins: usize,
    pub check_harmonic: bool,
}

/// Which landmarks are sampled and how crops are sized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionLayout {
    pub landmarks: Vec<RegionId>,
    /// Landmark pair whose distance sets the crop size
    pub reference_pair: [RegionId; 2],
    /// Crop half-side = reference distance / divisor
    pub size_divisor: f32,
    /// Regions that also collect resized patches for SSR
    pub ssr_regions: Vec<RegionId>,
    pub ssr_patch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// POS sliding window (seconds)
    pub pos_window_secs: f32,
    /// SSR temporal stride (seconds)
    pub ssr_window_secs: f32,
    /// Zero-based ICA source handed out as the pulse
    pub ica_component: usize,
    pub ica_max_iter: usize,
    pub ica_tolerance: f64,
    /// Zero-based principal component handed out as the pulse
    pub pca_component: usize,
}

pub const DEFAULT_LANDMARKS: [RegionId; 27] = [
    151, 101, 330, 10, 104, 107, 108, 109, 135, 18, 188, 199, 266, 280, 299, 333, 336, 337, 338,
    347, 36, 364, 4, 50, 6, 69, 9,
];

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 30.0,
            methods: RppgMethod::ALL.to_vec(),
            heart: HeartConfig::default(),
            respiration: RespirationConfig::default(),
            quality: QualityConfig::default(),
            regions: RegionLayout::default(),
            extraction: ExtractionConfig::default(),
            reference: ReferenceConfig::default(),
            trim: BTreeMap::new(),
        }
    }
}

impl Default for HeartConfig {
    fn default() -> Self {
        Self {
            band: Band::HEART,
            filter_order: 4,
            top_peaks: 5,
            harmonic_tolerance_bins: 1,
            harmonic_weight: 1.0,
        }
    }
}

impl Default for RespirationConfig {
    fn default() -> Self {
        Self {
            band: Band::RESPIRATION,
            filter_order: 4,
        }
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            primary: QualityIndex::SpectralPeak,
            window_secs: 5.0,
            num_peaks: 1,
            peak_halfwidth_bins: 1,
            check_harmonic: true,
        }
    }
}

impl Default for RegionLayout {
    fn default() -> Self {
        Self {
            landmarks: DEFAULT_LANDMARKS.to_vec(),
            reference_pair: [337, 108],
            size_divisor: 5.0,
            ssr_regions: vec![151],
            ssr_patch_size: 32,
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            pos_window_secs: 1.6,
            ssr_window_secs: 1.0,
            ica_component: 1,
            ica_max_iter: 200,
            ica_tolerance: 1e-4,
            pca_component: 1,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    /// Environment variables are prefixed with VITALCAM_
    /// Example: VITALCAM_HEART_BAND_HIGH=3.0
    pub fn from_file_with_env<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup (env-style keys).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(key: &str, val: &str) -> Result<T, ConfigError> {
            val.trim()
                .parse()
                .map_err(|_| ConfigError::Validation(format!("Invalid {key}")))
        }

        if let Some(val) = lookup("VITALCAM_SAMPLE_RATE") {
            self.sample_rate = parse("VITALCAM_SAMPLE_RATE", &val)?;
        }
        if let Some(val) = lookup("VITALCAM_METHODS") {
            self.methods = val
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| {
                    s.trim()
                        .parse::<RppgMethod>()
                        .map_err(|e| ConfigError::Validation(e.to_string()))
                })
                .collect::<Result<_, _>>()?;
        }

        // Heart overrides
        if let Some(val) = lookup("VITALCAM_HEART_BAND_LOW") {
            self.heart.band.low = parse("VITALCAM_HEART_BAND_LOW", &val)?;
        }
        if let Some(val) = lookup("VITALCAM_HEART_BAND_HIGH") {
            self.heart.band.high = parse("VITALCAM_HEART_BAND_HIGH", &val)?;
        }
        if let Some(val) = lookup("VITALCAM_HEART_TOP_PEAKS") {
            self.heart.top_peaks = parse("VITALCAM_HEART_TOP_PEAKS", &val)?;
        }

        // Respiration overrides
        if let Some(val) = lookup("VITALCAM_RESPIRATION_BAND_LOW") {
            self.respiration.band.low = parse("VITALCAM_RESPIRATION_BAND_LOW", &val)?;
        }
        if let Some(val) = lookup("VITALCAM_RESPIRATION_BAND_HIGH") {
            self.respiration.band.high = parse("VITALCAM_RESPIRATION_BAND_HIGH", &val)?;
        }

        // Quality overrides
        if let Some(val) = lookup("VITALCAM_QUALITY_WINDOW_SECS") {
            self.quality.window_secs = parse("VITALCAM_QUALITY_WINDOW_SECS", &val)?;
        }
        if let Some(val) = lookup("VITALCAM_QUALITY_PRIMARY") {
            self.quality.primary = match val.trim() {
                "spectral_peak" => QualityIndex::SpectralPeak,
                "best_window" => QualityIndex::BestWindow,
                "lowest_window" => QualityIndex::LowestWindow,
                "kurtosis" => QualityIndex::Kurtosis,
                _ => {
                    return Err(ConfigError::Validation(
                        "Invalid VITALCAM_QUALITY_PRIMARY".to_string(),
                    ))
                }
            };
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fs = self.sample_rate;
        if !(fs.is_finite() && fs > 0.0) {
            return Err(ConfigError::Validation(
                "sample_rate must be positive".to_string(),
            ));
        }
        if self.methods.is_empty() {
            return Err(ConfigError::Validation(
                "methods must not be empty".to_string(),
            ));
        }

        if !self.heart.band.is_valid_for(fs) {
            return Err(ConfigError::Validation(format!(
                "heart.band must satisfy 0 < low < high < {}",
                fs / 2.0
            )));
        }
        if !self.respiration.band.is_valid_for(fs) {
            return Err(ConfigError::Validation(format!(
                "respiration.band must satisfy 0 < low < high < {}",
                fs / 2.0
            )));
        }
        for order in [self.heart.filter_order, self.respiration.filter_order] {
            if !(1..=MAX_FILTER_ORDER).contains(&order) {
                return Err(ConfigError::Validation(format!(
                    "filter_order must be in 1..={MAX_FILTER_ORDER}"
                )));
            }
        }
        if self.heart.top_peaks == 0 {
            return Err(ConfigError::Validation(
                "heart.top_peaks must be >= 1".to_string(),
            ));
        }
        if !(self.heart.harmonic_weight >= 0.0) {
            return Err(ConfigError::Validation(
                "heart.harmonic_weight must be non-negative".to_string(),
            ));
        }

        if !(self.quality.window_secs > 0.0) || (self.quality.window_secs * fs) < 1.0 {
            return Err(ConfigError::Validation(
                "quality.window_secs must span at least one sample".to_string(),
            ));
        }
        if self.quality.num_peaks == 0 {
            return Err(ConfigError::Validation(
                "quality.num_peaks must be >= 1".to_string(),
            ));
        }

        if self.regions.landmarks.is_empty() {
            return Err(ConfigError::Validation(
                "regions.landmarks must not be empty".to_string(),
            ));
        }
        if !(self.regions.size_divisor > 0.0) {
            return Err(ConfigError::Validation(
                "regions.size_divisor must be positive".to_string(),
            ));
        }
        if self.regions.ssr_patch_size == 0 {
            return Err(ConfigError::Validation(
                "regions.ssr_patch_size must be >= 1".to_string(),
            ));
        }

        if !(self.extraction.pos_window_secs > 0.0) || !(self.extraction.ssr_window_secs > 0.0) {
            return Err(ConfigError::Validation(
                "extraction window lengths must be positive".to_string(),
            ));
        }
        if self.extraction.ica_component > 2 || self.extraction.pca_component > 2 {
            return Err(ConfigError::Validation(
                "ica_component and pca_component must be in 0..=2".to_string(),
            ));
        }
        if self.extraction.ica_max_iter == 0 || !(self.extraction.ica_tolerance > 0.0) {
            return Err(ConfigError::Validation(
                "ica_max_iter and ica_tolerance must be positive".to_string(),
            ));
        }

        self.reference.validate()?;

        Ok(())
    }

    /// Leading samples to drop for a recording, 0 when not listed.
    pub fn trim_offset(&self, recording_id: &str) -> usize {
        self.trim.get(recording_id).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.methods.len(), 10);
        assert_eq!(config.regions.landmarks.len(), 27);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = PipelineConfig::from_toml_str(
            r#"
            sample_rate = 25.0
            methods = ["CHROM", "POS"]

            [heart]
            top_peaks = 3

            [trim]
            video_face_32 = 117
            "#,
        )
        .unwrap();

        assert_eq!(config.sample_rate, 25.0);
        assert_eq!(config.methods, vec![RppgMethod::Chrom, RppgMethod::Pos]);
        assert_eq!(config.heart.top_peaks, 3);
        assert_eq!(config.heart.band, Band::HEART);
        assert_eq!(config.trim_offset("video_face_32"), 117);
        assert_eq!(config.trim_offset("unknown"), 0);
    }

    #[test]
    fn test_unknown_method_rejected() {
        let result = PipelineConfig::from_toml_str(r#"methods = ["CHROM", "FOO"]"#);
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_band_above_nyquist_rejected() {
        let mut config = PipelineConfig::default();
        config.sample_rate = 6.0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.heart.band = Band::new(2.0, 1.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_filter_order_bounds() {
        let mut config = PipelineConfig::default();
        assert_eq!(config.heart.filter_order, 4);
        config.respiration.filter_order = 0;
        assert!(config.validate().is_err());
        config.respiration.filter_order = MAX_FILTER_ORDER + 1;
        assert!(config.validate().is_err());
        config.respiration.filter_order = MAX_FILTER_ORDER;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("VITALCAM_METHODS", "GREEN, ssr"),
            ("VITALCAM_HEART_BAND_HIGH", "3.0"),
            ("VITALCAM_QUALITY_PRIMARY", "kurtosis"),
        ]
        .into_iter()
        .collect();

        let mut config = PipelineConfig::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.methods, vec![RppgMethod::Green, RppgMethod::Ssr]);
        assert_eq!(config.heart.band.high, 3.0);
        assert_eq!(config.quality.primary, QualityIndex::Kurtosis);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_override_rejected() {
        let mut config = PipelineConfig::default();
        let result = config.apply_overrides(|k| {
            (k == "VITALCAM_SAMPLE_RATE").then(|| "fast".to_string())
        });
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[quality]\nprimary = \"best_window\"\nwindow_secs = 4.0").unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.quality.primary, QualityIndex::BestWindow);
        assert_eq!(config.quality.window_secs, 4.0);
    }
}
