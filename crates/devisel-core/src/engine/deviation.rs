use crate::core::models::prediction::Prediction;
use nalgebra::Vector3;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeviationError {
    #[error("Disagreement is undefined for a committee of {size} model(s), need at least 2")]
    InsufficientEnsembleSize { size: usize },

    #[error("Committee members disagree on atom count: member {member} returned {got}, expected {expected}")]
    AtomCountMismatch {
        member: usize,
        got: usize,
        expected: usize,
    },
}

/// Per-configuration disagreement summary.
#[derive(Debug, Clone, PartialEq)]
pub struct Deviation {
    /// Maximum per-atom RMS force deviation, the configuration's uncertainty score.
    pub eps_t: f64,
    /// RMS force deviation of each atom, in atom order.
    pub per_atom: Vec<f64>,
}

/// Reduces a committee's force predictions to one uncertainty value.
///
/// For atom `i` with force vectors `f_{i,1..N}` from the `N` members, the
/// per-atom deviation is the RMS distance of the member forces from their
/// mean: `sqrt((1/N) * sum_k |f_{i,k} - mean_i|^2)`. The configuration score
/// `eps_t` is the maximum over atoms; one badly predicted atom is enough to
/// make the whole frame untrustworthy for simulation.
///
/// The reduction is purely statistical: it is invariant under permutation of
/// member order and exactly zero when all members agree on every atom. An
/// empty configuration scores zero.
///
/// # Errors
///
/// Returns [`DeviationError::InsufficientEnsembleSize`] for fewer than two
/// predictions and [`DeviationError::AtomCountMismatch`] if members disagree
/// on the number of atoms.
pub fn max_force_deviation(predictions: &[Prediction]) -> Result<Deviation, DeviationError> {
    let n = predictions.len();
    if n < 2 {
        return Err(DeviationError::InsufficientEnsembleSize { size: n });
    }
    let atoms = predictions[0].atom_count();
    for (member, prediction) in predictions.iter().enumerate().skip(1) {
        if prediction.atom_count() != atoms {
            return Err(DeviationError::AtomCountMismatch {
                member,
                got: prediction.atom_count(),
                expected: atoms,
            });
        }
    }

    let inv_n = 1.0 / n as f64;
    let mut per_atom = Vec::with_capacity(atoms);
    for i in 0..atoms {
        let mean = predictions
            .iter()
            .fold(Vector3::zeros(), |acc: Vector3<f64>, p| acc + p.forces[i])
            * inv_n;
        let variance = predictions
            .iter()
            .map(|p| (p.forces[i] - mean).norm_squared())
            .sum::<f64>()
            * inv_n;
        per_atom.push(variance.sqrt());
    }

    let eps_t = per_atom.iter().copied().fold(0.0, f64::max);
    Ok(Deviation { eps_t, per_atom })
}
