//! The full fracture classification network.

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::backbone::{Backbone, BackboneConfig};
use crate::error::{ModelError, Result};
use crate::head::ClassifierHead;
use crate::shapes::{join, ParamShapes, ShapeSignature};

/// Architecture name recorded in checkpoint metadata.
pub const ARCH_NAME: &str = "FractureNet";

/// Configuration for [`FractureNet`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Backbone layout.
    pub backbone: BackboneConfig,
    /// Width of the hidden dense layer in the head.
    pub head_hidden: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            backbone: BackboneConfig::default(),
            head_hidden: 128,
        }
    }
}

impl ClassifierConfig {
    /// Create a config with the given backbone and the default head.
    pub fn new(backbone: BackboneConfig) -> Self {
        Self {
            backbone,
            ..Default::default()
        }
    }

    /// Set the hidden width of the head.
    #[must_use]
    pub fn with_head_hidden(mut self, hidden: usize) -> Self {
        self.head_hidden = hidden;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        self.backbone.validate()?;
        if self.head_hidden == 0 {
            return Err(ModelError::InvalidConfig(
                "head hidden width must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Initialize the model with random weights.
    pub fn init<B: Backend>(&self, device: &B::Device) -> FractureNet<B> {
        FractureNet::new(self, device)
    }
}

/// Backbone plus head, mapping a (1, 3, 224, 224) image to a fracture
/// probability.
#[derive(Module, Debug)]
pub struct FractureNet<B: Backend> {
    /// Convolutional feature extractor.
    pub backbone: Backbone<B>,
    /// Pooling and dense layers.
    pub head: ClassifierHead<B>,
}

impl<B: Backend> FractureNet<B> {
    /// Create a new model.
    pub fn new(config: &ClassifierConfig, device: &B::Device) -> Self {
        let backbone = config.backbone.init(device);
        let head = ClassifierHead::new(config.backbone.out_channels(), config.head_hidden, device);
        Self { backbone, head }
    }

    /// Forward pass returning probabilities of shape (batch, 1).
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        self.head.forward(self.backbone.forward(x))
    }

    /// Feature map produced by backbone layer `index`.
    pub fn features(&self, x: Tensor<B, 4>, index: usize) -> Tensor<B, 4> {
        self.backbone.forward_until(x, index)
    }

    /// Probabilities computed from the output of backbone layer `index`.
    pub fn score_from(&self, feature_map: Tensor<B, 4>, index: usize) -> Tensor<B, 2> {
        self.head.forward(self.backbone.forward_from(feature_map, index))
    }
}

impl<B: Backend> ShapeSignature for FractureNet<B> {
    fn collect_shapes(&self, prefix: &str, out: &mut ParamShapes) {
        self.backbone.collect_shapes(&join(prefix, "backbone"), out);
        self.head.collect_shapes(&join(prefix, "head"), out);
    }
}
