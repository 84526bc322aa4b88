use proptest::prelude::*;

/// Property-based tests for extraction, scoring and selection invariants

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExtractionConfig, PipelineConfig, QualityIndex};
    use crate::dsp::{amplitude_spectrum, QualityScorer, RateEstimator};
    use crate::pipeline::Pipeline;
    use crate::rppg::RppgMethod;
    use crate::selector::Selector;
    use crate::trace::{PatchStack, RegionTrace, RegionTraceSet};
    use ndarray::{Array1, Array4};

    fn method() -> impl Strategy<Value = RppgMethod> {
        prop::sample::select(RppgMethod::ALL.to_vec())
    }

    fn quality_index() -> impl Strategy<Value = QualityIndex> {
        prop::sample::select(vec![
            QualityIndex::SpectralPeak,
            QualityIndex::BestWindow,
            QualityIndex::LowestWindow,
            QualityIndex::Kurtosis,
        ])
    }

    // =========================================================================
    // Test 1: Every method returns one sample per frame
    // =========================================================================
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn test_extract_preserves_length(
            method in method(),
            samples in prop::collection::vec(prop::array::uniform3(0.0f32..255.0), 0..120),
        ) {
            let n = samples.len();
            let patches = PatchStack::new(Array4::from_shape_fn((n, 4, 4, 3), |(t, y, x, c)| {
                samples[t][c] + (x + y) as f32
            }))
            .unwrap();
            let trace = RegionTrace::from_samples(151, &samples).with_patches(patches).unwrap();

            let waveform = method.extract(&trace, 30.0, &ExtractionConfig::default()).unwrap();
            prop_assert_eq!(waveform.len(), n);
            prop_assert!(waveform.iter().all(|v| v.is_finite()));
        }
    }

    // =========================================================================
    // Test 2: Constant traces score zero and give no estimate
    // =========================================================================
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn test_constant_trace_scores(
            level in prop::array::uniform3(0.0f32..255.0),
            n in 0usize..400,
        ) {
            let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
            let trace = RegionTrace::from_samples(9, &vec![level; n]);

            for method in RppgMethod::ALL.into_iter().filter(|m| !m.requires_patches()) {
                let result = pipeline.evaluate(&trace, method).unwrap();
                prop_assert!(result.heart_rate.is_none(), "{} gave a rate", method);
                prop_assert!(result.respiration_rate.is_none());
                prop_assert_eq!(result.quality.spectral_peak, 0.0);
                prop_assert!(result.quality.degenerate);
            }
        }

        #[test]
        fn test_zero_waveform_scores_zero(n in 0usize..600) {
            let zeros = Array1::<f32>::zeros(n);
            let spectrum = amplitude_spectrum(zeros.view(), 30.0);
            let scores = QualityScorer::new().score(zeros.view(), &spectrum, 30.0);
            prop_assert_eq!(scores.spectral_peak, 0.0);
            prop_assert_eq!(scores.kurtosis, 0.0);
            prop_assert!(scores.degenerate);
            prop_assert!(RateEstimator::heart().estimate(&spectrum).is_none());
        }
    }

    // =========================================================================
    // Test 3: Selection is a deterministic pure reduction
    // =========================================================================
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn test_selector_determinism(
            index in quality_index(),
            amplitudes in prop::collection::vec(0.0f32..3.0, 1..5),
            freq in 0.8f32..2.5,
        ) {
            let traces: Vec<RegionTrace> = amplitudes
                .iter()
                .enumerate()
                .map(|(region, &a)| {
                    let samples: Vec<[f32; 3]> = (0..240)
                        .map(|t| {
                            let p = (std::f32::consts::TAU * freq * t as f32 / 30.0).sin();
                            let wobble = (t as f32 * 0.37 * (region + 1) as f32).sin();
                            [100.0 + 0.3 * a * p + wobble, 80.0 + a * p, 60.0 + 0.2 * a * p - wobble]
                        })
                        .collect();
                    RegionTrace::from_samples(region as u32, &samples)
                })
                .collect();
            let set = RegionTraceSet::new(30.0, traces).unwrap();

            let mut config = PipelineConfig::default();
            config.methods = vec![RppgMethod::Chrom, RppgMethod::Green, RppgMethod::Pos];
            let pipeline = Pipeline::new(config).unwrap();
            let candidates = pipeline.evaluate_all(&set).unwrap();

            let selector = Selector::new(index);
            let first = selector.select_index(&candidates);
            let second = selector.select_index(&candidates);
            prop_assert_eq!(first, second);
            prop_assert!(first.is_some());

            let rank = selector.rank(&candidates);
            prop_assert_eq!(rank.len(), candidates.len());
            prop_assert_eq!(
                selector.compare(&candidates[rank[0]].quality, &candidates[first.unwrap()].quality),
                std::cmp::Ordering::Equal
            );
        }
    }
}
