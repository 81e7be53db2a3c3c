//! Process-wide configuration.

use std::path::Path;

use fracnet_explain::GradCamConfig;
use fracnet_models::{ClassifierConfig, WeightsConfig};
use fracnet_vision::{OverlayConfig, PreprocessConfig, Preprocessor};
use serde::{Deserialize, Serialize};

use crate::error::{FracnetError, Result};

/// Everything fixed at process start.
///
/// Missing sections in a JSON file fall back to their defaults, so a file
/// containing only `{"weights": {"finetuned": "my.mpk"}}` is valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FracnetConfig {
    /// Classifier topology.
    pub model: ClassifierConfig,
    /// Weights artifacts.
    pub weights: WeightsConfig,
    /// Input normalization.
    pub preprocess: PreprocessConfig,
    /// Grad-CAM settings.
    pub explain: GradCamConfig,
    /// Overlay rendering.
    pub render: OverlayConfig,
}

impl FracnetConfig {
    /// Read a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| FracnetError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|e| FracnetError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Check every section.
    pub fn validate(&self) -> Result<()> {
        self.model.validate()?;
        Preprocessor::new(self.preprocess.clone())?;
        self.render.validate()?;
        if let Some(layer) = &self.explain.layer {
            let names = self.model.backbone.layer_names();
            if !names.contains(layer) {
                return Err(fracnet_core::CoreError::unknown_layer(layer, &names).into());
            }
        }
        Ok(())
    }

    /// Set the classifier topology.
    #[must_use]
    pub fn with_model(mut self, model: ClassifierConfig) -> Self {
        self.model = model;
        self
    }

    /// Set the weights artifacts.
    #[must_use]
    pub fn with_weights(mut self, weights: WeightsConfig) -> Self {
        self.weights = weights;
        self
    }

    /// Set the preprocessing.
    #[must_use]
    pub fn with_preprocess(mut self, preprocess: PreprocessConfig) -> Self {
        self.preprocess = preprocess;
        self
    }

    /// Set the Grad-CAM settings.
    #[must_use]
    pub fn with_explain(mut self, explain: GradCamConfig) -> Self {
        self.explain = explain;
        self
    }

    /// Set the overlay rendering.
    #[must_use]
    pub fn with_render(mut self, render: OverlayConfig) -> Self {
        self.render = render;
        self
    }
}
