//! # Engine Module
//!
//! This module implements the committee evaluation and selection machinery
//! behind the sampling workflow.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Sampling parameters and their builder
//! - **Committee Evaluation** ([`predictor`]) - The inference capability seam and
//!   ordered multi-model evaluation
//! - **Disagreement Scoring** ([`deviation`]) - Reduction of per-model forces to
//!   one uncertainty scalar per configuration
//! - **Selection Policy** ([`selection`]) - Band filtering and deterministic
//!   capacity reduction
//! - **Run State** ([`state`]) - Phases, diagnostics, and selection output
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress reporting
//! - **Cancellation** ([`cancel`]) - Cooperative cancellation token
//! - **Error Handling** ([`error`]) - Engine-level error type and conversions

pub mod cancel;
pub mod config;
pub mod deviation;
pub mod error;
pub mod predictor;
pub mod progress;
pub mod selection;
pub mod state;
