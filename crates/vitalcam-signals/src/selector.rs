//! Quality-ranked candidate selection.
//!
//! A pure reduction over the candidates of one recording: the candidate with
//! the best value of the primary quality index wins. Candidates without a
//! rank value (missing index, degenerate waveform under a lower-is-better
//! index, non-finite score) rank last. A later candidate only replaces the
//! current best when it is strictly better, so ties keep enumeration order.

use std::cmp::Ordering;

use crate::config::QualityIndex;
use crate::dsp::QualityScores;
use crate::pipeline::CandidateResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selector {
    index: QualityIndex,
}

impl Default for Selector {
    fn default() -> Self {
        Self::new(QualityIndex::default())
    }
}

impl Selector {
    pub fn new(index: QualityIndex) -> Self {
        Self { index }
    }

    pub fn index(&self) -> QualityIndex {
        self.index
    }

    /// `Greater` when `a` ranks above `b`.
    pub fn compare(&self, a: &QualityScores, b: &QualityScores) -> Ordering {
        match (a.rank_value(self.index), b.rank_value(self.index)) {
            (Some(x), Some(y)) if self.index.higher_is_better() => x.total_cmp(&y),
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        }
    }

    /// Best candidate, `None` only for an empty slice.
    pub fn select<'a>(&self, candidates: &'a [CandidateResult]) -> Option<&'a CandidateResult> {
        self.select_index(candidates).map(|i| &candidates[i])
    }

    /// Position of the best candidate.
    pub fn select_index(&self, candidates: &[CandidateResult]) -> Option<usize> {
        candidates
            .iter()
            .enumerate()
            .fold(None, |best: Option<usize>, (i, c)| match best {
                Some(b) if self.compare(&c.quality, &candidates[b].quality) != Ordering::Greater => {
                    Some(b)
                }
                _ => Some(i),
            })
    }

    /// Candidate positions from best to worst, ties in enumeration order.
    pub fn rank(&self, candidates: &[CandidateResult]) -> Vec<usize> {
        let mut order: Vec<usize> = (0..candidates.len()).collect();
        order.sort_by(|&a, &b| self.compare(&candidates[b].quality, &candidates[a].quality));
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rppg::RppgMethod;

    fn candidate(region: u32, spectral_peak: f32, kurtosis: f32, degenerate: bool) -> CandidateResult {
        CandidateResult {
            region,
            method: RppgMethod::Chrom,
            heart_rate: None,
            respiration_rate: None,
            quality: QualityScores {
                spectral_peak,
                best_window: None,
                lowest_window: None,
                kurtosis,
                degenerate,
            },
        }
    }

    #[test]
    fn test_highest_spectral_peak_wins() {
        let candidates = vec![
            candidate(1, 0.2, 0.0, false),
            candidate(2, 0.7, 0.0, false),
            candidate(3, 0.5, 0.0, false),
        ];
        let best = Selector::default().select(&candidates).unwrap();
        assert_eq!(best.region, 2);
        assert_eq!(Selector::default().rank(&candidates), vec![1, 2, 0]);
    }

    #[test]
    fn test_ties_keep_enumeration_order() {
        let candidates = vec![candidate(5, 0.4, 0.0, false), candidate(6, 0.4, 0.0, false)];
        assert_eq!(Selector::default().select(&candidates).unwrap().region, 5);
    }

    #[test]
    fn test_lower_is_better_skips_degenerate() {
        let selector = Selector::new(QualityIndex::Kurtosis);
        let candidates = vec![
            candidate(1, 0.0, 0.0, true),
            candidate(2, 0.5, 1.5, false),
            candidate(3, 0.5, -0.8, false),
        ];
        assert_eq!(selector.select(&candidates).unwrap().region, 3);
    }

    #[test]
    fn test_unranked_candidates_last() {
        let selector = Selector::new(QualityIndex::BestWindow);
        let mut ranked = candidate(9, 0.1, 0.0, false);
        ranked.quality.best_window = Some(2.0);
        let candidates = vec![candidate(1, 0.9, 0.0, false), ranked];
        assert_eq!(selector.select(&candidates).unwrap().region, 9);

        let nan = candidate(4, f32::NAN, 0.0, false);
        let candidates = vec![nan, candidate(5, 0.0, 0.0, true)];
        assert_eq!(Selector::default().select(&candidates).unwrap().region, 5);
    }

    #[test]
    fn test_empty() {
        assert!(Selector::default().select(&[]).is_none());
        assert!(Selector::default().rank(&[]).is_empty());
    }
}
