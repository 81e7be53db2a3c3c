//! Residual block for the backbone.

use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::PaddingConfig2d;
use burn::prelude::*;
use burn::tensor::activation::relu;

use super::norm::FrozenBatchNorm2d;
use crate::shapes::{join, ParamShapes, ShapeSignature};

/// Basic residual block: two 3x3 convolutions and a skip connection.
#[derive(Module, Debug)]
pub struct ResidualBlock<B: Backend> {
    conv1: Conv2d<B>,
    bn1: FrozenBatchNorm2d<B>,
    conv2: Conv2d<B>,
    bn2: FrozenBatchNorm2d<B>,
    shortcut: Option<Conv2d<B>>,
    shortcut_bn: Option<FrozenBatchNorm2d<B>>,
}

impl<B: Backend> ResidualBlock<B> {
    /// Create a new residual block.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        stride: usize,
        device: &B::Device,
    ) -> Self {
        let conv1 = Conv2dConfig::new([in_channels, out_channels], [3, 3])
            .with_stride([stride, stride])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_bias(false)
            .init(device);
        let bn1 = FrozenBatchNorm2d::new(out_channels, device);

        let conv2 = Conv2dConfig::new([out_channels, out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_bias(false)
            .init(device);
        let bn2 = FrozenBatchNorm2d::new(out_channels, device);

        // Projection shortcut if dimensions differ
        let (shortcut, shortcut_bn) = if in_channels != out_channels || stride != 1 {
            let sc = Conv2dConfig::new([in_channels, out_channels], [1, 1])
                .with_stride([stride, stride])
                .with_bias(false)
                .init(device);
            let sc_bn = FrozenBatchNorm2d::new(out_channels, device);
            (Some(sc), Some(sc_bn))
        } else {
            (None, None)
        };

        Self {
            conv1,
            bn1,
            conv2,
            bn2,
            shortcut,
            shortcut_bn,
        }
    }

    /// Forward pass.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = self.conv1.forward(x.clone());
        let out = relu(self.bn1.forward(out));

        let out = self.conv2.forward(out);
        let out = self.bn2.forward(out);

        let shortcut = match (&self.shortcut, &self.shortcut_bn) {
            (Some(sc), Some(sc_bn)) => sc_bn.forward(sc.forward(x)),
            _ => x,
        };

        relu(out + shortcut)
    }
}

impl<B: Backend> ShapeSignature for ResidualBlock<B> {
    fn collect_shapes(&self, prefix: &str, out: &mut ParamShapes) {
        self.conv1.collect_shapes(&join(prefix, "conv1"), out);
        self.bn1.collect_shapes(&join(prefix, "bn1"), out);
        self.conv2.collect_shapes(&join(prefix, "conv2"), out);
        self.bn2.collect_shapes(&join(prefix, "bn2"), out);
        if let Some(sc) = &self.shortcut {
            sc.collect_shapes(&join(prefix, "shortcut"), out);
        }
        if let Some(sc_bn) = &self.shortcut_bn {
            sc_bn.collect_shapes(&join(prefix, "shortcut_bn"), out);
        }
    }
}
