//! Weights artifacts: saving and loading models with Burn's record system.
//!
//! Artifacts are Named MessagePack records (`*.mpk`) at full precision, with an
//! optional JSON metadata sidecar (`*.json`) next to them.
//!
//! # Example
//!
//! ```rust,ignore
//! use fracnet_models::checkpoint::{save_model, load_record, CheckpointMetadata};
//! use fracnet_models::{ClassifierConfig, FractureNet};
//!
//! let config = ClassifierConfig::default();
//! let model = config.init::<NdArray>(&device);
//!
//! save_model(&model, "weights/fracnet.mpk")?;
//! CheckpointMetadata::new("FractureNet")
//!     .with_config(&config)?
//!     .save(metadata_path("weights/fracnet.mpk"))?;
//!
//! let record = load_record::<NdArray, FractureNet<NdArray>>("weights/fracnet.mpk", &device)?;
//! let model = config.init::<NdArray>(&device).load_record(record);
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder};
use serde::{de::DeserializeOwned, Serialize};

/// File extension used by the record format.
pub const CHECKPOINT_EXTENSION: &str = "mpk";

/// The path the recorder actually reads or writes for `path`.
///
/// The recorder always applies its own extension, so `weights/fracnet` and
/// `weights/fracnet.mpk` name the same file.
pub fn checkpoint_file(path: impl AsRef<Path>) -> PathBuf {
    path.as_ref().with_extension(CHECKPOINT_EXTENSION)
}

/// Path of the JSON metadata sidecar for a checkpoint.
pub fn metadata_path(path: impl AsRef<Path>) -> PathBuf {
    path.as_ref().with_extension("json")
}

/// Save a model to a checkpoint file.
pub fn save_model<B, M>(model: &M, path: impl AsRef<Path>) -> Result<()>
where
    B: Backend,
    M: Module<B>,
{
    let path = checkpoint_file(path);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| CheckpointError::Save(e.to_string()))?;
    }

    let record = model.clone().into_record();
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    recorder
        .record(record, path)
        .map_err(|e| CheckpointError::Save(e.to_string()))?;

    Ok(())
}

/// Load a model record from a checkpoint file.
///
/// # Returns
///
/// The loaded record, to be applied with `Module::load_record`.
pub fn load_record<B, M>(path: impl AsRef<Path>, device: &B::Device) -> Result<M::Record>
where
    B: Backend,
    M: Module<B>,
{
    let path = checkpoint_file(path);
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    recorder
        .load(path.clone(), device)
        .map_err(|e| CheckpointError::Load(format!("{}: {e}", path.display())))
}

/// Checkpoint metadata.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CheckpointMetadata {
    /// Model architecture name.
    pub arch: String,
    /// Model configuration as JSON.
    pub config_json: String,
    /// Additional metadata.
    pub extra: HashMap<String, String>,
}

impl CheckpointMetadata {
    /// Create new metadata for a model.
    pub fn new(arch: impl Into<String>) -> Self {
        Self {
            arch: arch.into(),
            config_json: String::new(),
            extra: HashMap::new(),
        }
    }

    /// Store `config` as JSON.
    ///
    /// # Errors
    ///
    /// Fails with [`CheckpointError::Save`] if `config` cannot be represented
    /// as JSON.
    pub fn with_config<C: Serialize>(mut self, config: &C) -> Result<Self> {
        self.config_json =
            serde_json::to_string(config).map_err(|e| CheckpointError::Save(e.to_string()))?;
        Ok(self)
    }

    /// Add extra metadata.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Decode the stored configuration.
    pub fn config<C: DeserializeOwned>(&self) -> Result<C> {
        serde_json::from_str(&self.config_json).map_err(|e| CheckpointError::Load(e.to_string()))
    }

    /// Save metadata to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| CheckpointError::Save(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| CheckpointError::Save(e.to_string()))?;
        Ok(())
    }

    /// Load metadata from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json =
            std::fs::read_to_string(path).map_err(|e| CheckpointError::Load(e.to_string()))?;
        serde_json::from_str(&json).map_err(|e| CheckpointError::Load(e.to_string()))
    }
}

/// Result type for checkpoint operations.
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Checkpoint-related errors.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// Error saving checkpoint.
    #[error("Failed to save checkpoint: {0}")]
    Save(String),

    /// Error loading checkpoint.
    #[error("Failed to load checkpoint: {0}")]
    Load(String),
}
