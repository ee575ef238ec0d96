use crate::core::io::xyz::{self, XyzError};
use crate::core::models::configuration::Configuration;
use crate::engine::deviation::DeviationError;
use crate::engine::predictor::EvaluationError;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Phases of a sampling run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    NotStarted,
    Streaming,
    Filtering,
    Selecting,
    Done,
    Failed,
}

/// Per-frame disagreement diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviationRecord {
    /// Position of the frame within the source stream.
    pub index: usize,
    /// Maximum per-atom RMS force deviation across committee members.
    pub eps_t: f64,
    /// Per-atom deviation magnitudes, when the run was asked to keep them.
    pub per_atom: Option<Vec<f64>>,
}

/// Why a frame was dropped from the run.
#[derive(Debug, Error)]
pub enum SkipCause {
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
    #[error(transparent)]
    Deviation(#[from] DeviationError),
}

/// A frame dropped from the run, with enough context to act on.
#[derive(Debug)]
pub struct SkippedFrame {
    pub index: usize,
    pub cause: SkipCause,
}

/// Everything observed about the stream: one record per scored frame plus the
/// frames that had to be skipped. Handed to external reporting; the library
/// itself renders nothing.
#[derive(Debug, Default)]
pub struct Diagnostics {
    /// `(index, eps_t)` records for every successfully scored frame, in stream order.
    pub records: Vec<DeviationRecord>,
    /// Frames dropped by per-frame evaluation failures, in stream order.
    pub skipped: Vec<SkippedFrame>,
}

impl Diagnostics {
    /// Scored frames whose deviation fell outside `[lo, hi]`.
    pub fn out_of_band(&self, lo: f64, hi: f64) -> impl Iterator<Item = &DeviationRecord> {
        self.records
            .iter()
            .filter(move |r| r.eps_t < lo || r.eps_t > hi)
    }
}

/// One selected configuration with its provenance.
#[derive(Debug, Clone)]
pub struct SelectedFrame {
    pub configuration: Configuration,
    pub eps_t: f64,
}

impl SelectedFrame {
    /// Original stream index of the selected configuration.
    pub fn index(&self) -> usize {
        self.configuration.index()
    }
}

/// The final ordered subset of configurations chosen for re-labeling.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    frames: Vec<SelectedFrame>,
}

impl Selection {
    pub fn new(frames: Vec<SelectedFrame>) -> Self {
        Self { frames }
    }

    pub fn frames(&self) -> &[SelectedFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Serializes the selection in extended-XYZ form, annotating each frame
    /// with its stream index and deviation score.
    pub fn write_xyz(&self, writer: &mut impl Write) -> Result<(), XyzError> {
        xyz::write_frames(
            self.frames.iter().map(|f| (&f.configuration, Some(f.eps_t))),
            writer,
        )
    }

    /// Serializes the selection to a file path.
    pub fn write_xyz_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), XyzError> {
        xyz::write_frames_to_path(
            self.frames.iter().map(|f| (&f.configuration, Some(f.eps_t))),
            path,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(index: usize, eps_t: f64) -> DeviationRecord {
        DeviationRecord {
            index,
            eps_t,
            per_atom: None,
        }
    }

    #[test]
    fn out_of_band_excludes_inclusive_boundaries() {
        let diagnostics = Diagnostics {
            records: vec![
                record(0, 0.01),
                record(1, 0.05),
                record(2, 0.20),
                record(3, 0.35),
                record(4, 0.50),
            ],
            skipped: Vec::new(),
        };
        let out: Vec<usize> = diagnostics.out_of_band(0.05, 0.35).map(|r| r.index).collect();
        assert_eq!(out, vec![0, 4]);
    }

    #[test]
    fn selection_round_trips_through_xyz() {
        use nalgebra::Point3;

        let configuration = Configuration::new(
            5,
            vec!["Si".to_string()],
            vec![Point3::new(0.5, 0.5, 0.5)],
            None,
        )
        .unwrap();
        let selection = Selection::new(vec![SelectedFrame {
            configuration,
            eps_t: 0.21,
        }]);

        let mut buffer = Vec::new();
        selection.write_xyz(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("frame_index=5"));
        assert!(text.contains("eps_t=0.210000"));
    }
}
