use super::typemap::TypeMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Label used when an environment or ensemble is stored without an explicit name.
pub const DEFAULT_LABEL: &str = "default";

/// Reference to one frozen model artifact plus the type map it declares.
///
/// The handle does not load the artifact; it is the unit the registry persists
/// and the input a [`crate::engine::predictor::ModelLoader`] turns into a live
/// inference backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelHandle {
    /// Path to the frozen model artifact on disk.
    pub path: PathBuf,
    /// Species mapping the model was trained with.
    pub type_map: TypeMap,
}

impl ModelHandle {
    pub fn new(path: impl Into<PathBuf>, type_map: TypeMap) -> Self {
        Self {
            path: path.into(),
            type_map,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnsembleError {
    #[error("Ensemble '{label}' must contain at least one model")]
    Empty { label: String },

    #[error("Model '{path}' declares a different type map than the first member '{first}'")]
    TypeMapMismatch { path: String, first: String },
}

/// An ordered, labeled committee of model handles sharing one type map.
///
/// The shared-type-map invariant is validated at construction, so every
/// `Ensemble` value in the system is known-consistent: member forces can be
/// compared atom by atom without re-checking species mappings downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ensemble {
    label: String,
    members: Vec<ModelHandle>,
}

impl Ensemble {
    /// Creates a validated ensemble.
    ///
    /// # Errors
    ///
    /// Returns [`EnsembleError::Empty`] for zero members and
    /// [`EnsembleError::TypeMapMismatch`] (naming the offending artifact) if
    /// any member declares a type map different from the first.
    pub fn new(label: impl Into<String>, members: Vec<ModelHandle>) -> Result<Self, EnsembleError> {
        let label = label.into();
        let Some(first) = members.first() else {
            return Err(EnsembleError::Empty { label });
        };
        for member in &members[1..] {
            if member.type_map != first.type_map {
                return Err(EnsembleError::TypeMapMismatch {
                    path: member.path.display().to_string(),
                    first: first.path.display().to_string(),
                });
            }
        }
        Ok(Self { label, members })
    }

    /// Creates a validated ensemble under [`DEFAULT_LABEL`].
    pub fn with_default_label(members: Vec<ModelHandle>) -> Result<Self, EnsembleError> {
        Self::new(DEFAULT_LABEL, members)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Members in committee order.
    pub fn members(&self) -> &[ModelHandle] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// The type map shared by every member.
    pub fn type_map(&self) -> &TypeMap {
        // Invariant: members is non-empty and all maps are identical.
        &self.members[0].type_map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn silica_map() -> TypeMap {
        TypeMap::from_pairs([("Si", 0), ("O", 1)])
    }

    #[test]
    fn new_accepts_consistent_members() {
        let ensemble = Ensemble::new(
            "silica",
            vec![
                ModelHandle::new("models/a.pb", silica_map()),
                ModelHandle::new("models/b.pb", silica_map()),
            ],
        )
        .unwrap();
        assert_eq!(ensemble.label(), "silica");
        assert_eq!(ensemble.len(), 2);
        assert_eq!(ensemble.type_map(), &silica_map());
    }

    #[test]
    fn new_rejects_empty_member_list() {
        let err = Ensemble::new("empty", vec![]).unwrap_err();
        assert!(matches!(err, EnsembleError::Empty { .. }));
    }

    #[test]
    fn new_rejects_mismatched_type_maps() {
        let err = Ensemble::new(
            "mixed",
            vec![
                ModelHandle::new("models/a.pb", silica_map()),
                ModelHandle::new("models/b.pb", TypeMap::from_pairs([("Si", 0)])),
            ],
        )
        .unwrap_err();
        match err {
            EnsembleError::TypeMapMismatch { path, first } => {
                assert_eq!(path, "models/b.pb");
                assert_eq!(first, "models/a.pb");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn single_member_ensemble_is_constructible() {
        // Scoring rejects single-member committees, but the registry may
        // legitimately store one model for plain inference.
        let ensemble =
            Ensemble::with_default_label(vec![ModelHandle::new("models/a.pb", silica_map())])
                .unwrap();
        assert_eq!(ensemble.label(), DEFAULT_LABEL);
        assert_eq!(ensemble.len(), 1);
    }
}
