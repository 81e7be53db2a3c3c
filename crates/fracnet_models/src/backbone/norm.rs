//! Frozen batch normalization.

use burn::module::Param;
use burn::prelude::*;

use crate::shapes::{join, ParamShapes, ShapeSignature};

/// Batch normalization with fixed statistics.
///
/// Burn's `BatchNorm` switches to batch statistics whenever the backend has
/// autodiff enabled, and updates its running averages as it goes. The
/// saliency pass runs the classifier on an autodiff backend, so the backbone
/// uses this layer instead: the stored statistics are always used and never
/// written, giving identical outputs with and without autodiff.
#[derive(Module, Debug)]
pub struct FrozenBatchNorm2d<B: Backend> {
    /// Per-channel scale.
    pub gamma: Param<Tensor<B, 1>>,
    /// Per-channel shift.
    pub beta: Param<Tensor<B, 1>>,
    /// Per-channel mean.
    pub running_mean: Param<Tensor<B, 1>>,
    /// Per-channel variance.
    pub running_var: Param<Tensor<B, 1>>,
    epsilon: f64,
}

impl<B: Backend> FrozenBatchNorm2d<B> {
    /// Identity-initialized normalization over `channels` channels.
    pub fn new(channels: usize, device: &B::Device) -> Self {
        Self {
            gamma: Param::from_tensor(Tensor::ones([channels], device)),
            beta: Param::from_tensor(Tensor::zeros([channels], device)),
            running_mean: Param::from_tensor(Tensor::zeros([channels], device)),
            running_var: Param::from_tensor(Tensor::ones([channels], device)),
            epsilon: 1e-5,
        }
    }

    /// Forward pass over a (batch, channels, height, width) tensor.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [channels] = self.gamma.val().dims();
        let scale = self.gamma.val() / (self.running_var.val() + self.epsilon).sqrt();
        let shift = self.beta.val() - self.running_mean.val() * scale.clone();

        x * scale.reshape([1, channels, 1, 1]) + shift.reshape([1, channels, 1, 1])
    }
}

impl<B: Backend> ShapeSignature for FrozenBatchNorm2d<B> {
    fn collect_shapes(&self, prefix: &str, out: &mut ParamShapes) {
        out.push((join(prefix, "gamma"), self.gamma.val().dims().to_vec()));
        out.push((join(prefix, "beta"), self.beta.val().dims().to_vec()));
        out.push((join(prefix, "running_mean"), self.running_mean.val().dims().to_vec()));
        out.push((join(prefix, "running_var"), self.running_var.val().dims().to_vec()));
    }
}
