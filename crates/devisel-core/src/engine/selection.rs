use crate::core::models::configuration::Configuration;
use crate::engine::state::{DeviationRecord, SelectedFrame, Selection};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq)]
pub enum SelectionError {
    #[error("Invalid deviation band: lo ({lo}) must not exceed hi ({hi})")]
    InvalidBand { lo: f64, hi: f64 },

    #[error("Selection capacity must be at least 1")]
    InvalidCapacity,
}

/// How an over-capacity filtered set is reduced to `max_n` frames.
///
/// Both strategies are fully deterministic; no randomness is involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CapStrategy {
    /// Sort by stream index and take an evenly spaced subsequence, preserving
    /// the temporal/phase-space diversity of the trajectory. The default.
    #[default]
    StridePreserving,
    /// Sort by deviation descending (stream index breaks ties) and take the
    /// most-uncertain frames.
    RankPreserving,
}

/// A configuration retained during streaming because its score may fall in
/// the selection band.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub configuration: Configuration,
    pub record: DeviationRecord,
}

/// Rejects band and capacity parameters that cannot describe a selection.
///
/// Called by [`select`] and again by the pipeline before any frame is pulled,
/// so parameter mistakes surface before streaming work is spent.
pub fn validate_parameters(lo: f64, hi: f64, max_n: usize) -> Result<(), SelectionError> {
    if lo > hi {
        return Err(SelectionError::InvalidBand { lo, hi });
    }
    if max_n == 0 {
        return Err(SelectionError::InvalidCapacity);
    }
    Ok(())
}

/// Filters scored candidates into the band and applies the capacity cap.
///
/// Frames with `lo <= eps_t <= hi` (inclusive on both ends) are kept: below
/// the band the committee already agrees and the frame adds nothing to
/// training; above it the frame is likely outside every member's reliable
/// extrapolation range and re-labeling it would reinforce a bad sampling
/// region. An empty result is a valid outcome, not an error.
///
/// Output ordering is stable and reproducible: stream order for
/// [`CapStrategy::StridePreserving`], rank order for
/// [`CapStrategy::RankPreserving`].
pub fn select(
    candidates: Vec<Candidate>,
    lo: f64,
    hi: f64,
    max_n: usize,
    strategy: CapStrategy,
) -> Result<Selection, SelectionError> {
    validate_parameters(lo, hi, max_n)?;

    let mut in_band: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| c.record.eps_t >= lo && c.record.eps_t <= hi)
        .collect();
    debug!(
        in_band = in_band.len(),
        max_n, ?strategy, "Applying capacity policy"
    );

    let picked = match strategy {
        CapStrategy::StridePreserving => {
            in_band.sort_by_key(|c| c.record.index);
            if in_band.len() > max_n {
                take_strided(in_band, max_n)
            } else {
                in_band
            }
        }
        CapStrategy::RankPreserving => {
            in_band.sort_by(|a, b| {
                b.record
                    .eps_t
                    .partial_cmp(&a.record.eps_t)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.record.index.cmp(&b.record.index))
            });
            in_band.truncate(max_n);
            in_band
        }
    };

    let frames = picked
        .into_iter()
        .map(|c| SelectedFrame {
            configuration: c.configuration,
            eps_t: c.record.eps_t,
        })
        .collect();
    Ok(Selection::new(frames))
}

// Picks max_n evenly spaced elements: element i of the output is input
// floor(i * len / max_n), strictly increasing whenever len >= max_n.
fn take_strided(candidates: Vec<Candidate>, max_n: usize) -> Vec<Candidate> {
    let len = candidates.len();
    let mut indexed: Vec<Option<Candidate>> = candidates.into_iter().map(Some).collect();
    (0..max_n)
        .filter_map(|i| indexed[i * len / max_n].take())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn candidate(index: usize, eps_t: f64) -> Candidate {
        let configuration = Configuration::new(
            index,
            vec!["Si".to_string()],
            vec![Point3::new(index as f64, 0.0, 0.0)],
            None,
        )
        .unwrap();
        Candidate {
            configuration,
            record: DeviationRecord {
                index,
                eps_t,
                per_atom: None,
            },
        }
    }

    #[test]
    fn band_boundaries_are_inclusive() {
        let candidates = vec![
            candidate(0, 0.04),
            candidate(1, 0.05),
            candidate(2, 0.20),
            candidate(3, 0.35),
            candidate(4, 0.36),
        ];
        let selection =
            select(candidates, 0.05, 0.35, 10, CapStrategy::StridePreserving).unwrap();
        let indices: Vec<usize> = selection.frames().iter().map(|f| f.index()).collect();
        assert_eq!(indices, vec![1, 2, 3]);
    }

    #[test]
    fn selection_never_exceeds_capacity() {
        let candidates: Vec<Candidate> =
            (0..100).map(|i| candidate(i, 0.2)).collect();
        for strategy in [CapStrategy::StridePreserving, CapStrategy::RankPreserving] {
            let selection = select(candidates.clone(), 0.0, 1.0, 7, strategy).unwrap();
            assert_eq!(selection.len(), 7);
        }
    }

    #[test]
    fn stride_keeps_stream_order_and_spreads_picks() {
        let candidates: Vec<Candidate> = (0..10).map(|i| candidate(i, 0.2)).collect();
        let selection =
            select(candidates, 0.0, 1.0, 5, CapStrategy::StridePreserving).unwrap();
        let indices: Vec<usize> = selection.frames().iter().map(|f| f.index()).collect();
        assert_eq!(indices, vec![0, 2, 4, 6, 8]);
    }

    #[test]
    fn rank_takes_most_uncertain_first() {
        let candidates = vec![
            candidate(0, 0.10),
            candidate(1, 0.30),
            candidate(2, 0.20),
            candidate(3, 0.25),
        ];
        let selection = select(candidates, 0.0, 1.0, 2, CapStrategy::RankPreserving).unwrap();
        let indices: Vec<usize> = selection.frames().iter().map(|f| f.index()).collect();
        assert_eq!(indices, vec![1, 3]);
        assert!(selection.frames()[0].eps_t >= selection.frames()[1].eps_t);
    }

    #[test]
    fn rank_breaks_ties_by_stream_index() {
        let candidates = vec![
            candidate(5, 0.2),
            candidate(1, 0.2),
            candidate(3, 0.2),
        ];
        let selection = select(candidates, 0.0, 1.0, 2, CapStrategy::RankPreserving).unwrap();
        let indices: Vec<usize> = selection.frames().iter().map(|f| f.index()).collect();
        assert_eq!(indices, vec![1, 3]);
    }

    #[test]
    fn repeated_runs_are_identical() {
        let candidates: Vec<Candidate> = (0..50)
            .map(|i| candidate(i, 0.1 + (i % 7) as f64 * 0.03))
            .collect();
        for strategy in [CapStrategy::StridePreserving, CapStrategy::RankPreserving] {
            let first = select(candidates.clone(), 0.0, 1.0, 9, strategy).unwrap();
            let second = select(candidates.clone(), 0.0, 1.0, 9, strategy).unwrap();
            let a: Vec<usize> = first.frames().iter().map(|f| f.index()).collect();
            let b: Vec<usize> = second.frames().iter().map(|f| f.index()).collect();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn empty_band_yields_empty_selection() {
        let candidates = vec![candidate(0, 0.9), candidate(1, 0.8)];
        let selection =
            select(candidates, 0.05, 0.35, 10, CapStrategy::StridePreserving).unwrap();
        assert!(selection.is_empty());
    }

    #[test]
    fn inverted_band_is_rejected() {
        let err = select(vec![], 0.5, 0.1, 10, CapStrategy::StridePreserving).unwrap_err();
        assert_eq!(err, SelectionError::InvalidBand { lo: 0.5, hi: 0.1 });
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = select(vec![], 0.0, 1.0, 0, CapStrategy::StridePreserving).unwrap_err();
        assert_eq!(err, SelectionError::InvalidCapacity);
    }
}
