//! # devisel Core Library
//!
//! A high-performance library for committee-based active learning on machine-learned
//! interatomic potentials: quantify per-configuration epistemic uncertainty from the
//! force disagreement of an ensemble of independently trained models, and select a
//! bounded, diverse subset of molecular-dynamics frames for ground-truth re-labeling.
//!
//! ## Architectural Philosophy
//!
//! The library is designed with a strict three-layer architecture to ensure a clear
//! separation of concerns, making it modular, testable, and extensible.
//!
//! - **[`core`]: The Foundation.** Contains stateless data models (`Configuration`,
//!   `Ensemble`, `TypeMap`), the persistent model registry, and trajectory I/O
//!   utilities for streaming frames in and writing selected frames out.
//!
//! - **[`engine`]: The Logic Core.** This layer implements committee force
//!   evaluation, the disagreement scorer, and the deterministic selection policy,
//!   together with run state, progress reporting, and cooperative cancellation.
//!
//! - **[`workflows`]: The Public API.** This is the highest-level, user-facing layer.
//!   It ties the `engine` and `core` together to execute the complete sampling
//!   procedure over a lazy trajectory stream, producing the selected subset and
//!   per-frame diagnostics.

pub mod core;
pub mod engine;
pub mod workflows;
