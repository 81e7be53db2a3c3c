//! The classifier seam used by the saliency engine.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

use crate::error::Result;
use crate::tensor::InputTensor;

/// A binary image classifier with a named tap into its convolutional layers.
///
/// The forward pass is split at the tapped layer: the prefix runs on the
/// inner (non-autodiff) backend, the suffix on the autodiff backend. Only the
/// suffix is ever differentiated, so gradient tracking starts at the tapped
/// activation instead of the input.
pub trait TappedClassifier<B: AutodiffBackend> {
    /// Names of the layers that can be tapped, in forward order.
    fn layer_names(&self) -> Vec<String>;

    /// The layer tapped when the caller doesn't name one.
    ///
    /// Defaults to the last layer in [`TappedClassifier::layer_names`].
    fn default_layer(&self) -> String {
        self.layer_names().pop().unwrap_or_default()
    }

    /// Run the forward pass up to and including `layer`.
    ///
    /// # Returns
    ///
    /// Feature map of shape (1, channels, height, width).
    fn feature_map(
        &self,
        input: InputTensor<B::InnerBackend>,
        layer: &str,
    ) -> Result<Tensor<B::InnerBackend, 4>>;

    /// Run the rest of the forward pass from the output of `layer`.
    ///
    /// # Returns
    ///
    /// Probability tensor of shape (1, 1).
    fn score_from(&self, feature_map: Tensor<B, 4>, layer: &str) -> Result<Tensor<B, 2>>;

    /// Score an input without tracking gradients.
    fn predict(&self, input: InputTensor<B::InnerBackend>) -> Result<f32>;

    /// Forward pass that also returns the tapped activation.
    ///
    /// The returned feature map is a fresh autodiff leaf that requires grad,
    /// so `score.backward()` yields its gradient directly.
    fn forward_with_feature_map(
        &self,
        input: InputTensor<B::InnerBackend>,
        layer: &str,
    ) -> Result<(Tensor<B, 4>, Tensor<B, 2>)> {
        let feature_map = self.feature_map(input, layer)?;
        let feature_map = Tensor::<B, 4>::from_inner(feature_map).require_grad();
        let score = self.score_from(feature_map.clone(), layer)?;
        Ok((feature_map, score))
    }
}
