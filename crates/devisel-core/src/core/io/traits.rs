use crate::core::models::configuration::Configuration;
use std::error::Error;

/// Streaming access to an ordered sequence of trajectory frames.
///
/// Implementors decode one frame per call. The sequence is finite, ordered,
/// single-pass, and non-restartable; callers must never require the full
/// trajectory in memory, since MD streams may contain millions of frames.
pub trait FrameSource {
    /// The error type for decoding failures.
    type Error: Error;

    /// Decodes the next frame, or returns `None` at end of stream.
    fn next_frame(&mut self) -> Option<Result<Configuration, Self::Error>>;
}
