//! Error types for fracnet_vision.

use thiserror::Error;

/// Result type alias using [`VisionError`].
pub type Result<T> = std::result::Result<T, VisionError>;

/// Errors raised while ingesting or rendering images.
#[derive(Error, Debug)]
pub enum VisionError {
    /// The image couldn't be decoded.
    #[error("Failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    /// The image has no pixels.
    #[error("Image has zero area ({width}x{height})")]
    EmptyImage {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
    },

    /// Two images that must line up don't.
    #[error("Image size mismatch: {0}")]
    SizeMismatch(String),

    /// Writing an image failed.
    #[error("Failed to encode image: {0}")]
    Encode(#[source] image::ImageError),

    /// Invalid preprocessing or rendering settings.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
