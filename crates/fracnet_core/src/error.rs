//! Error types for fracnet_core.

use thiserror::Error;

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur in fracnet_core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid tensor shape provided.
    #[error("Invalid shape: expected {expected}, got {got}")]
    InvalidShape {
        /// Expected shape description.
        expected: String,
        /// Actual shape description.
        got: String,
    },

    /// Dimension error.
    #[error("Dimension error: expected {expected} dimensions, got {got}")]
    DimensionError {
        /// Expected number of dimensions.
        expected: usize,
        /// Actual number of dimensions.
        got: usize,
    },

    /// The requested layer does not exist in the classifier.
    #[error("Unknown layer '{name}', available layers: {available}")]
    UnknownLayer {
        /// Requested layer name.
        name: String,
        /// Comma-separated list of valid layer names.
        available: String,
    },

    /// Reading tensor data back from the backend failed.
    #[error("Tensor data error: {0}")]
    TensorData(String),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl CoreError {
    /// Build an [`CoreError::UnknownLayer`] from the requested name and the valid names.
    pub fn unknown_layer<S: AsRef<str>>(name: &str, available: &[S]) -> Self {
        let available = available
            .iter()
            .map(|s| s.as_ref())
            .collect::<Vec<_>>()
            .join(", ");
        Self::UnknownLayer {
            name: name.to_string(),
            available,
        }
    }
}
