//! Error types for fracnet_models.

use std::path::PathBuf;

use thiserror::Error;

use crate::checkpoint::CheckpointError;

/// Result type alias using [`ModelError`].
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors raised while configuring, building, or running the classifier.
#[derive(Error, Debug)]
pub enum ModelError {
    /// The topology configuration is inconsistent.
    #[error("Invalid model configuration: {0}")]
    InvalidConfig(String),

    /// A weights artifact could not be read.
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    /// A weights artifact was read but doesn't match the configured topology.
    #[error("Weights at {path} are incompatible with the configured topology: {detail}")]
    IncompatibleWeights {
        /// Artifact path.
        path: PathBuf,
        /// First mismatch found.
        detail: String,
    },

    /// Core error.
    #[error(transparent)]
    Core(#[from] fracnet_core::CoreError),
}
