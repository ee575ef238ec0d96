use crate::core::models::configuration::Configuration;
use crate::core::models::ensemble::{Ensemble, ModelHandle};
use crate::core::models::prediction::Prediction;
use crate::core::models::typemap::TypeMap;
use thiserror::Error;
use tracing::instrument;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("Species '{species}' in frame {frame} is not covered by the committee type map")]
    UnknownSpecies { frame: usize, species: String },

    #[error("Model '{model}' returned {got} force vectors for {expected} atoms in frame {frame}")]
    ForceCountMismatch {
        frame: usize,
        model: String,
        got: usize,
        expected: usize,
    },

    #[error("Model '{model}' failed on frame {frame}: {message}")]
    Backend {
        frame: usize,
        model: String,
        message: String,
    },
}

#[derive(Debug, Error)]
#[error("Failed to load model '{model}': {message}")]
pub struct ModelLoadError {
    pub model: String,
    pub message: String,
}

/// The inference capability a committee member must provide.
///
/// Any backend able to predict an energy and per-atom forces for a
/// configuration can be a committee member; the library never depends on a
/// concrete model implementation. Implementations must be pure for a fixed
/// artifact and configuration, and must not reorder atoms.
pub trait ForceModel: Send + Sync {
    /// Identifier used in logs and skip reports, typically the artifact path.
    fn id(&self) -> &str;

    /// Species mapping this model was trained with.
    fn type_map(&self) -> &TypeMap;

    /// Predicts total energy and one force vector per atom, in atom order.
    fn evaluate(&self, configuration: &Configuration) -> Result<Prediction, EvaluationError>;
}

/// Turns a stored model artifact into a live inference backend.
///
/// Loading is the caller's seam for choosing a backend; a failure here is a
/// setup error that aborts the run before any frame is pulled.
pub trait ModelLoader {
    fn load(&self, handle: &ModelHandle) -> Result<Box<dyn ForceModel>, ModelLoadError>;
}

/// A live, ordered committee of inference backends.
pub struct Committee {
    label: String,
    members: Vec<Box<dyn ForceModel>>,
}

impl Committee {
    pub fn new(label: impl Into<String>, members: Vec<Box<dyn ForceModel>>) -> Self {
        Self {
            label: label.into(),
            members,
        }
    }

    /// Loads every member of a stored ensemble, preserving committee order.
    pub fn from_ensemble(
        ensemble: &Ensemble,
        loader: &dyn ModelLoader,
    ) -> Result<Self, ModelLoadError> {
        let members = ensemble
            .members()
            .iter()
            .map(|handle| loader.load(handle))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(ensemble.label(), members))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// The committee's shared type map, from its first member.
    pub fn type_map(&self) -> Option<&TypeMap> {
        self.members.first().map(|m| m.type_map())
    }

    /// Evaluates every member against one configuration, in member order.
    ///
    /// Evaluation is read-only with respect to the configuration and
    /// deterministic for fixed artifacts, so members may run concurrently;
    /// results are returned in member order regardless. The first failure is
    /// returned, scoped to the offending (configuration, model) pair.
    #[instrument(skip_all, fields(frame = configuration.index()))]
    pub fn evaluate(
        &self,
        configuration: &Configuration,
    ) -> Result<Vec<Prediction>, EvaluationError> {
        if let Some(type_map) = self.type_map() {
            for species in configuration.species() {
                if !type_map.contains(species) {
                    return Err(EvaluationError::UnknownSpecies {
                        frame: configuration.index(),
                        species: species.clone(),
                    });
                }
            }
        }

        #[cfg(feature = "parallel")]
        let iterator = self.members.par_iter();

        #[cfg(not(feature = "parallel"))]
        let iterator = self.members.iter();

        iterator
            .map(|member| evaluate_member(member.as_ref(), configuration))
            .collect()
    }
}

fn evaluate_member(
    member: &dyn ForceModel,
    configuration: &Configuration,
) -> Result<Prediction, EvaluationError> {
    let prediction = member.evaluate(configuration)?;
    if prediction.atom_count() != configuration.atom_count() {
        return Err(EvaluationError::ForceCountMismatch {
            frame: configuration.index(),
            model: member.id().to_string(),
            got: prediction.atom_count(),
            expected: configuration.atom_count(),
        });
    }
    Ok(prediction)
}
