//! Defines the data structures shared across the sampling engine.
//!
//! This module contains the immutable value types the rest of the library is
//! built on: atomic configurations streamed from a trajectory, the species
//! type map a model was trained with, handles to frozen model artifacts,
//! type-map validated ensembles of those handles, and per-model predictions.

pub mod configuration;
pub mod ensemble;
pub mod prediction;
pub mod typemap;
