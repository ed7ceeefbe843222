//! Error taxonomy for the reflection pass.
//!
//! None of these cross the host's frame-submission boundary; they are
//! logged and the frame completes with the effect visually absent.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PassError {
    /// The reflection shader program is missing from the host registry.
    /// Construction reports this once and the pass stays disabled for
    /// its lifetime.
    #[error("shader program `{name}` not found in the host registry")]
    ShaderMissing { name: String },

    /// The pipeline state was unavailable at draw time; the frame's work
    /// is skipped and the check reruns next frame.
    #[error("reflection pipeline state unavailable, skipping pass")]
    PipelineStateUnavailable,
}
