//! Activation and gradient capture for a tapped layer.

use burn::prelude::*;
use fracnet_core::ImageShape;

use crate::error::{ExplainError, Result};

/// The activation of one tapped layer and the gradient of the classifier
/// score with respect to it, for a single request.
///
/// Both tensors live on the inner (non-autodiff) backend: the autodiff graph
/// that produced the gradient has already been consumed.
#[derive(Debug, Clone)]
pub struct TapCapture<B: Backend> {
    layer: String,
    activation: Tensor<B, 4>,
    gradient: Tensor<B, 4>,
}

impl<B: Backend> TapCapture<B> {
    /// Pair an activation with its gradient.
    ///
    /// # Errors
    ///
    /// Returns an error if the shapes differ.
    pub fn new(layer: impl Into<String>, activation: Tensor<B, 4>, gradient: Tensor<B, 4>) -> Result<Self> {
        if activation.dims() != gradient.dims() {
            return Err(ExplainError::GradientShape {
                activation: activation.dims(),
                gradient: gradient.dims(),
            });
        }
        Ok(Self {
            layer: layer.into(),
            activation,
            gradient,
        })
    }

    /// Name of the tapped layer.
    pub fn layer(&self) -> &str {
        &self.layer
    }

    /// Shape of the tapped feature map.
    pub fn shape(&self) -> ImageShape {
        ImageShape::from(self.activation.dims())
    }

    /// The captured activation.
    pub fn activation(&self) -> &Tensor<B, 4> {
        &self.activation
    }

    /// The captured gradient.
    pub fn gradient(&self) -> &Tensor<B, 4> {
        &self.gradient
    }

    /// Split into `(activation, gradient)`.
    pub fn into_parts(self) -> (Tensor<B, 4>, Tensor<B, 4>) {
        (self.activation, self.gradient)
    }
}
