//! ResNet-style convolutional backbone.
//!
//! The backbone is a stem (7x7 stride-2 convolution and 3x3 stride-2 max
//! pooling) followed by residual stages. Every stage after the first halves
//! the spatial resolution, so the default four-stage layout maps a 224x224
//! input to a 7x7 feature map.
//!
//! Layers are addressed by name for tapping: `stem`, `stage1`, ..., `stageN`.

mod block;
mod norm;

use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::PaddingConfig2d;
use burn::prelude::*;
use burn::tensor::activation::relu;
use fracnet_core::{CoreError, ImageShape, INPUT_CHANNELS, INPUT_SIZE};
use serde::{Deserialize, Serialize};

pub use block::ResidualBlock;
pub use norm::FrozenBatchNorm2d;

use crate::error::{ModelError, Result};
use crate::shapes::{join, ParamShapes, ShapeSignature};

/// Name of the stem layer.
pub const STEM_LAYER: &str = "stem";

/// Configuration for the backbone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackboneConfig {
    /// Output channels of the stem convolution.
    pub stem_channels: usize,
    /// Output channels of each residual stage.
    pub stage_channels: Vec<usize>,
    /// Number of residual blocks in each stage.
    pub blocks_per_stage: Vec<usize>,
}

impl Default for BackboneConfig {
    fn default() -> Self {
        Self {
            stem_channels: 64,
            stage_channels: vec![64, 128, 256, 512],
            blocks_per_stage: vec![2, 2, 2, 2],
        }
    }
}

impl BackboneConfig {
    /// Create a config with one block per stage.
    pub fn new(stem_channels: usize, stage_channels: Vec<usize>) -> Self {
        let blocks_per_stage = vec![1; stage_channels.len()];
        Self {
            stem_channels,
            stage_channels,
            blocks_per_stage,
        }
    }

    /// Set the number of blocks per stage.
    #[must_use]
    pub fn with_blocks_per_stage(mut self, blocks: Vec<usize>) -> Self {
        self.blocks_per_stage = blocks;
        self
    }

    /// Check that the stage lists agree and no width is zero.
    pub fn validate(&self) -> Result<()> {
        if self.stage_channels.is_empty() {
            return Err(ModelError::InvalidConfig(
                "backbone needs at least one stage".to_string(),
            ));
        }
        if self.stage_channels.len() != self.blocks_per_stage.len() {
            return Err(ModelError::InvalidConfig(format!(
                "{} stage widths but {} block counts",
                self.stage_channels.len(),
                self.blocks_per_stage.len()
            )));
        }
        if self.stem_channels == 0
            || self.stage_channels.contains(&0)
            || self.blocks_per_stage.contains(&0)
        {
            return Err(ModelError::InvalidConfig(
                "channel widths and block counts must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Output channels of the last stage.
    pub fn out_channels(&self) -> usize {
        self.stage_channels
            .last()
            .copied()
            .unwrap_or(self.stem_channels)
    }

    /// Layer names in forward order.
    pub fn layer_names(&self) -> Vec<String> {
        std::iter::once(STEM_LAYER.to_string())
            .chain((1..=self.stage_channels.len()).map(|i| format!("stage{i}")))
            .collect()
    }

    /// Feature-map shape produced by each layer for a 224x224 input.
    pub fn feature_shapes(&self) -> Vec<(String, ImageShape)> {
        // conv 7x7/2 pad 3, then max-pool 3x3/2 pad 1
        let mut size = conv_out(conv_out(INPUT_SIZE, 7, 2, 3), 3, 2, 1);
        let mut shapes = vec![(
            STEM_LAYER.to_string(),
            ImageShape::new(1, self.stem_channels, size, size),
        )];
        for (i, &channels) in self.stage_channels.iter().enumerate() {
            size = conv_out(size, 3, stage_stride(i), 1);
            shapes.push((
                format!("stage{}", i + 1),
                ImageShape::new(1, channels, size, size),
            ));
        }
        shapes
    }

    /// Initialize the backbone.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Backbone<B> {
        Backbone::new(self, device)
    }
}

fn conv_out(size: usize, kernel: usize, stride: usize, padding: usize) -> usize {
    (size + 2 * padding - kernel) / stride + 1
}

fn stage_stride(index: usize) -> usize {
    if index == 0 {
        1
    } else {
        2
    }
}

/// Stem: strided convolution, normalization, ReLU, max pooling.
#[derive(Module, Debug)]
pub struct Stem<B: Backend> {
    conv: Conv2d<B>,
    bn: FrozenBatchNorm2d<B>,
    pool: MaxPool2d,
}

impl<B: Backend> Stem<B> {
    fn new(out_channels: usize, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([INPUT_CHANNELS, out_channels], [7, 7])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(3, 3))
            .with_bias(false)
            .init(device);
        let bn = FrozenBatchNorm2d::new(out_channels, device);
        let pool = MaxPool2dConfig::new([3, 3])
            .with_strides([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init();
        Self { conv, bn, pool }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = relu(self.bn.forward(self.conv.forward(x)));
        self.pool.forward(out)
    }
}

impl<B: Backend> ShapeSignature for Stem<B> {
    fn collect_shapes(&self, prefix: &str, out: &mut ParamShapes) {
        self.conv.collect_shapes(&join(prefix, "conv"), out);
        self.bn.collect_shapes(&join(prefix, "bn"), out);
    }
}

/// A sequence of residual blocks at one resolution.
#[derive(Module, Debug)]
pub struct Stage<B: Backend> {
    blocks: Vec<ResidualBlock<B>>,
}

impl<B: Backend> Stage<B> {
    fn new(
        in_channels: usize,
        out_channels: usize,
        n_blocks: usize,
        stride: usize,
        device: &B::Device,
    ) -> Self {
        let blocks = (0..n_blocks)
            .map(|i| {
                if i == 0 {
                    ResidualBlock::new(in_channels, out_channels, stride, device)
                } else {
                    ResidualBlock::new(out_channels, out_channels, 1, device)
                }
            })
            .collect();
        Self { blocks }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.blocks.iter().fold(x, |out, block| block.forward(out))
    }
}

impl<B: Backend> ShapeSignature for Stage<B> {
    fn collect_shapes(&self, prefix: &str, out: &mut ParamShapes) {
        for (i, block) in self.blocks.iter().enumerate() {
            block.collect_shapes(&join(prefix, &format!("blocks.{i}")), out);
        }
    }
}

/// The convolutional backbone.
#[derive(Module, Debug)]
pub struct Backbone<B: Backend> {
    stem: Stem<B>,
    stages: Vec<Stage<B>>,
}

impl<B: Backend> Backbone<B> {
    /// Create a new backbone.
    pub fn new(config: &BackboneConfig, device: &B::Device) -> Self {
        let stem = Stem::new(config.stem_channels, device);

        let mut stages = Vec::with_capacity(config.stage_channels.len());
        let mut in_channels = config.stem_channels;
        for (i, (&out_channels, &n_blocks)) in config
            .stage_channels
            .iter()
            .zip(config.blocks_per_stage.iter())
            .enumerate()
        {
            stages.push(Stage::new(
                in_channels,
                out_channels,
                n_blocks,
                stage_stride(i),
                device,
            ));
            in_channels = out_channels;
        }

        Self { stem, stages }
    }

    /// Number of tappable layers (stem plus stages).
    pub fn n_layers(&self) -> usize {
        self.stages.len() + 1
    }

    /// Layer names in forward order.
    pub fn layer_names(&self) -> Vec<String> {
        std::iter::once(STEM_LAYER.to_string())
            .chain((1..=self.stages.len()).map(|i| format!("stage{i}")))
            .collect()
    }

    /// Resolve a layer name to its index in forward order.
    pub fn layer_index(&self, name: &str) -> Result<usize> {
        self.layer_names()
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| CoreError::unknown_layer(name, &self.layer_names()).into())
    }

    /// Full forward pass.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.forward_until(x, self.n_layers() - 1)
    }

    /// Run the stem and the stages up to and including layer `index`.
    pub fn forward_until(&self, x: Tensor<B, 4>, index: usize) -> Tensor<B, 4> {
        let out = self.stem.forward(x);
        self.stages
            .iter()
            .take(index)
            .fold(out, |out, stage| stage.forward(out))
    }

    /// Run the stages after layer `index`, starting from its output.
    pub fn forward_from(&self, x: Tensor<B, 4>, index: usize) -> Tensor<B, 4> {
        self.stages
            .iter()
            .skip(index)
            .fold(x, |out, stage| stage.forward(out))
    }
}

impl<B: Backend> ShapeSignature for Backbone<B> {
    fn collect_shapes(&self, prefix: &str, out: &mut ParamShapes) {
        self.stem.collect_shapes(&join(prefix, "stem"), out);
        for (i, stage) in self.stages.iter().enumerate() {
            stage.collect_shapes(&join(prefix, &format!("stages.{i}")), out);
        }
    }
}
