//! Error types for fracnet_explain.

use thiserror::Error;

/// Result type alias using [`ExplainError`].
pub type Result<T> = std::result::Result<T, ExplainError>;

/// Errors raised while computing a saliency map.
#[derive(Error, Debug)]
pub enum ExplainError {
    /// The clipped attribution map is zero everywhere, so it can't be
    /// normalized by its maximum.
    #[error("Attribution map for layer '{layer}' is zero everywhere")]
    DegenerateAttribution {
        /// Tapped layer.
        layer: String,
    },

    /// The classifier produced something other than one scalar score.
    #[error("Expected a (1, 1) score, got {0:?}")]
    UnexpectedScore(Vec<usize>),

    /// Activation and gradient shapes disagree.
    #[error("Gradient shape {gradient:?} doesn't match activation shape {activation:?}")]
    GradientShape {
        /// Activation dims.
        activation: [usize; 4],
        /// Gradient dims.
        gradient: [usize; 4],
    },

    /// Reading tensor data back from the backend failed.
    #[error("Tensor data error: {0}")]
    TensorData(String),

    /// Core error.
    #[error(transparent)]
    Core(#[from] fracnet_core::CoreError),
}
