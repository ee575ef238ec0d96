use thiserror::Error;

use crate::core::models::ensemble::EnsembleError;
use crate::core::registry::RegistryError;
use crate::engine::config::ConfigError;
use crate::engine::predictor::ModelLoadError;
use crate::engine::selection::SelectionError;

/// Errors that abort a sampling run before streaming begins.
///
/// Per-frame failures during streaming are not represented here; they are
/// recovered locally and recorded in the run's skipped-list.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Registry error: {source}")]
    Registry {
        #[from]
        source: RegistryError,
    },

    #[error("Invalid ensemble: {source}")]
    Ensemble {
        #[from]
        source: EnsembleError,
    },

    #[error("Failed to load committee member: {source}")]
    Load {
        #[from]
        source: ModelLoadError,
    },

    #[error("A committee of {size} model(s) cannot measure disagreement, need at least 2")]
    InsufficientEnsembleSize { size: usize },

    #[error("Invalid selection parameters: {source}")]
    Selection {
        #[from]
        source: SelectionError,
    },

    #[error("Configuration error: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },
}
