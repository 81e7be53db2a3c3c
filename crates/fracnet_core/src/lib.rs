//! # fracnet_core
//!
//! Core types and traits for fracnet X-ray fracture scoring.
//!
//! This crate provides:
//! - [`ImageShape`] for image tensor shape metadata
//! - [`InputTensor`] wrapper for Burn tensors with shape validation
//! - [`TappedClassifier`], the seam between a classifier and the saliency engine
//! - Error types and backend aliases
//!
//! ## Shape Convention
//!
//! Image tensors follow Burn's convention `(N, C, H, W)`:
//! - `N`: Batch size (always 1 for a single request)
//! - `C`: Channels (3 for RGB input)
//! - `H`, `W`: Spatial height and width
//!
//! ## Example
//!
//! ```rust
//! use fracnet_core::{ImageShape, INPUT_SIZE};
//!
//! let shape = ImageShape::input();
//! assert_eq!(shape.as_array(), [1, 3, INPUT_SIZE, INPUT_SIZE]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod model_trait;
mod shape;
mod tensor;

pub use error::{CoreError, Result};
pub use model_trait::TappedClassifier;
pub use shape::{ImageShape, INPUT_CHANNELS, INPUT_SIZE};
pub use tensor::InputTensor;

/// Backend type aliases for convenience
pub mod backend {
    #[cfg(feature = "backend-ndarray")]
    pub use burn_autodiff::Autodiff;
    #[cfg(feature = "backend-ndarray")]
    pub use burn_ndarray::NdArray;

    /// CPU backend with autodiff enabled for the saliency pass.
    #[cfg(feature = "backend-ndarray")]
    pub type DefaultBackend = Autodiff<NdArray>;
}
