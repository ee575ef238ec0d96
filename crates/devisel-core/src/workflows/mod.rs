//! # Workflows Module
//!
//! The highest-level, user-facing layer of the library. It ties the `engine`
//! and `core` together to execute complete procedures; currently the single
//! procedure is [`sample`], which streams a trajectory through committee
//! evaluation, disagreement scoring, band filtering, and capacity-limited
//! selection.

pub mod sample;
