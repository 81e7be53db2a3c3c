//! A built, read-only classifier with its weights loaded.

use std::path::{Path, PathBuf};

use burn::module::AutodiffModule;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use fracnet_core::{InputTensor, TappedClassifier};
use serde::{Deserialize, Serialize};

use crate::backbone::Backbone;
use crate::checkpoint::{checkpoint_file, load_record};
use crate::error::{ModelError, Result};
use crate::network::{ClassifierConfig, FractureNet};
use crate::shapes::{first_mismatch, ShapeSignature};

/// Where the classifier's weights come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightsConfig {
    /// Fine-tuned weights for the whole network. Optional at runtime: when
    /// the file is absent the classifier runs with whatever the backbone
    /// provides and an untrained head.
    pub finetuned: PathBuf,
    /// Pretrained weights for the backbone alone.
    pub backbone: Option<PathBuf>,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            finetuned: PathBuf::from("weights/fracnet.mpk"),
            backbone: None,
        }
    }
}

impl WeightsConfig {
    /// Use the fine-tuned weights at `path`.
    pub fn new(finetuned: impl Into<PathBuf>) -> Self {
        Self {
            finetuned: finetuned.into(),
            backbone: None,
        }
    }

    /// Set pretrained backbone weights.
    #[must_use]
    pub fn with_backbone(mut self, path: impl Into<PathBuf>) -> Self {
        self.backbone = Some(path.into());
        self
    }
}

/// Which weights the built classifier is running with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeightSource {
    /// Fine-tuned weights for the whole network.
    FineTuned(PathBuf),
    /// Pretrained backbone with an untrained head.
    PretrainedBackbone(PathBuf),
    /// Random initialization throughout.
    Untrained,
}

impl WeightSource {
    /// Whether the head has been trained.
    pub fn is_fine_tuned(&self) -> bool {
        matches!(self, Self::FineTuned(_))
    }
}

/// A classifier ready to serve requests.
///
/// Holds the network twice: once on the autodiff backend for the saliency
/// pass, and once on its inner backend for plain inference and for the part
/// of the forward pass before the tapped layer. Parameters never require
/// gradients, so backward passes only reach activations.
#[derive(Debug)]
pub struct Classifier<B: AutodiffBackend> {
    model: FractureNet<B>,
    inner: FractureNet<B::InnerBackend>,
    config: ClassifierConfig,
    source: WeightSource,
}

impl<B: AutodiffBackend> Classifier<B> {
    /// Build the classifier and load its weights.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid, or if a weights file exists but
    /// cannot be read or doesn't match the configured topology. A missing
    /// weights file is not an error.
    pub fn build(
        config: &ClassifierConfig,
        weights: &WeightsConfig,
        device: &B::Device,
    ) -> Result<Self> {
        config.validate()?;
        tracing::info!(
            stem = config.backbone.stem_channels,
            stages = ?config.backbone.stage_channels,
            blocks = ?config.backbone.blocks_per_stage,
            head_hidden = config.head_hidden,
            "Building fracture classifier"
        );

        let mut model = config.init::<B>(device);
        let mut source = WeightSource::Untrained;

        if let Some(path) = &weights.backbone {
            if checkpoint_file(path).exists() {
                model.backbone = load_backbone(config, path, device)?;
                tracing::info!(path = %path.display(), "Loaded pretrained backbone weights");
                source = WeightSource::PretrainedBackbone(path.clone());
            } else {
                tracing::warn!(
                    path = %path.display(),
                    "Pretrained backbone weights not found, backbone is randomly initialized"
                );
            }
        }

        if checkpoint_file(&weights.finetuned).exists() {
            model = load_network(config, &weights.finetuned, device)?;
            tracing::info!(path = %weights.finetuned.display(), "Loaded fine-tuned weights");
            source = WeightSource::FineTuned(weights.finetuned.clone());
        } else {
            tracing::warn!(
                path = %weights.finetuned.display(),
                "Fine-tuned weights not found, classifier head is untrained and predictions are unreliable"
            );
        }

        Ok(Self::from_model(model, config.clone(), source))
    }

    /// Wrap an already initialized network.
    pub fn from_model(model: FractureNet<B>, config: ClassifierConfig, source: WeightSource) -> Self {
        let model = model.no_grad();
        let inner = model.valid();
        Self {
            model,
            inner,
            config,
            source,
        }
    }

    /// The topology this classifier was built with.
    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Which weights are loaded.
    pub fn weight_source(&self) -> &WeightSource {
        &self.source
    }

    /// The network on the inference backend.
    pub fn network(&self) -> &FractureNet<B::InnerBackend> {
        &self.inner
    }

    fn layer_index(&self, layer: &str) -> Result<usize> {
        self.model.backbone.layer_index(layer)
    }
}

fn load_network<B: AutodiffBackend>(
    config: &ClassifierConfig,
    path: &Path,
    device: &B::Device,
) -> Result<FractureNet<B>> {
    let reference = config.init::<B>(device);
    let record = load_record::<B, FractureNet<B>>(path, device)?;
    let loaded = config.init::<B>(device).load_record(record);
    check_compatible(&reference, &loaded, path)?;
    Ok(loaded)
}

fn load_backbone<B: AutodiffBackend>(
    config: &ClassifierConfig,
    path: &Path,
    device: &B::Device,
) -> Result<Backbone<B>> {
    let reference = config.backbone.init::<B>(device);
    let record = load_record::<B, Backbone<B>>(path, device)?;
    let loaded = config.backbone.init::<B>(device).load_record(record);
    check_compatible(&reference, &loaded, path)?;
    Ok(loaded)
}

fn check_compatible<M: ShapeSignature>(reference: &M, loaded: &M, path: &Path) -> Result<()> {
    match first_mismatch(&reference.param_shapes(), &loaded.param_shapes()) {
        Some(detail) => Err(ModelError::IncompatibleWeights {
            path: path.to_path_buf(),
            detail,
        }),
        None => Ok(()),
    }
}

impl<B: AutodiffBackend> TappedClassifier<B> for Classifier<B> {
    fn layer_names(&self) -> Vec<String> {
        self.model.backbone.layer_names()
    }

    fn feature_map(
        &self,
        input: InputTensor<B::InnerBackend>,
        layer: &str,
    ) -> fracnet_core::Result<Tensor<B::InnerBackend, 4>> {
        let index = self.layer_index(layer).map_err(into_core)?;
        Ok(self.inner.features(input.into_inner(), index))
    }

    fn score_from(
        &self,
        feature_map: Tensor<B, 4>,
        layer: &str,
    ) -> fracnet_core::Result<Tensor<B, 2>> {
        let index = self.layer_index(layer).map_err(into_core)?;
        Ok(self.model.score_from(feature_map, index))
    }

    fn predict(&self, input: InputTensor<B::InnerBackend>) -> fracnet_core::Result<f32> {
        let probability: f32 = self.inner.forward(input.into_inner()).into_scalar().elem();
        tracing::debug!(probability, "Scored input");
        Ok(probability)
    }
}

fn into_core(err: ModelError) -> fracnet_core::CoreError {
    match err {
        ModelError::Core(core) => core,
        other => fracnet_core::CoreError::Other(other.to_string()),
    }
}
