use nalgebra::{Matrix3, Point3};
use thiserror::Error;

/// Represents one atomic-structure snapshot from a simulation trajectory.
///
/// A configuration is an immutable value: it is decoded from the stream once,
/// scored, and either retained as a selection candidate or discarded. The
/// `index` records its position within the source stream and is the primary
/// provenance key carried through diagnostics and selection output.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    index: usize,
    species: Vec<String>,
    positions: Vec<Point3<f64>>,
    cell: Option<Matrix3<f64>>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Species count ({species}) does not match position count ({positions})")]
    LengthMismatch { species: usize, positions: usize },
}

impl Configuration {
    /// Creates a new configuration snapshot.
    ///
    /// # Arguments
    ///
    /// * `index` - Position of this frame within the source stream.
    /// * `species` - Chemical symbol of each atom, in atom order.
    /// * `positions` - Cartesian coordinates of each atom in Angstroms.
    /// * `cell` - Periodic cell with lattice vectors as rows, if the system is periodic.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::LengthMismatch`] if `species` and
    /// `positions` do not describe the same number of atoms.
    pub fn new(
        index: usize,
        species: Vec<String>,
        positions: Vec<Point3<f64>>,
        cell: Option<Matrix3<f64>>,
    ) -> Result<Self, ConfigurationError> {
        if species.len() != positions.len() {
            return Err(ConfigurationError::LengthMismatch {
                species: species.len(),
                positions: positions.len(),
            });
        }
        Ok(Self {
            index,
            species,
            positions,
            cell,
        })
    }

    /// Position of this frame within the source stream.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Chemical symbols in atom order.
    pub fn species(&self) -> &[String] {
        &self.species
    }

    /// Atomic coordinates in Angstroms, in atom order.
    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    /// Periodic cell with lattice vectors as rows, if any.
    pub fn cell(&self) -> Option<&Matrix3<f64>> {
        self.cell.as_ref()
    }

    pub fn atom_count(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
