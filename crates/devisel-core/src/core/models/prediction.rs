use nalgebra::Vector3;

/// Output of one committee member for one configuration.
///
/// Forces are in configuration atom order, one vector per atom. Energies are
/// carried through for reporting; the disagreement scorer operates on forces
/// only.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Total potential energy predicted for the configuration.
    pub energy: f64,
    /// Per-atom force vectors, in configuration atom order.
    pub forces: Vec<Vector3<f64>>,
}

impl Prediction {
    pub fn new(energy: f64, forces: Vec<Vector3<f64>>) -> Self {
        Self { energy, forces }
    }

    pub fn atom_count(&self) -> usize {
        self.forces.len()
    }
}
