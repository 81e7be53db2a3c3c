//! Error types for the fracnet facade.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using [`FracnetError`].
pub type Result<T> = std::result::Result<T, FracnetError>;

/// Errors surfaced by the predict pipeline and its configuration.
#[derive(Error, Debug)]
pub enum FracnetError {
    /// Shape or tensor error.
    #[error("Core error: {0}")]
    Core(#[from] fracnet_core::CoreError),

    /// Classifier construction or weights loading failed.
    #[error("Model error: {0}")]
    Model(#[from] fracnet_models::ModelError),

    /// Saliency computation failed.
    #[error("Explain error: {0}")]
    Explain(#[from] fracnet_explain::ExplainError),

    /// Image decoding, preprocessing, or rendering failed.
    #[error("Image error: {0}")]
    Vision(#[from] fracnet_vision::VisionError),

    /// A configuration file couldn't be read or parsed.
    #[error("Invalid configuration file {path}: {reason}")]
    Config {
        /// The file.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
