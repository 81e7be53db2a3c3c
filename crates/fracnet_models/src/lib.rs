//! # fracnet_models
//!
//! The fracture classifier: a ResNet-style convolutional backbone followed by
//! a fixed head `GAP -> dense(128, ReLU) -> dense(1, sigmoid)`.
//!
//! - [`FractureNet`] - the Burn module
//! - [`Classifier`] - a built, read-only classifier with weights loaded,
//!   implementing [`fracnet_core::TappedClassifier`]
//! - [`checkpoint`] - saving and loading weights with Burn's record system

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backbone;
pub mod checkpoint;
mod classifier;
mod error;
mod head;
mod network;
mod shapes;

pub use backbone::{Backbone, BackboneConfig, FrozenBatchNorm2d, ResidualBlock};
pub use checkpoint::{load_record, save_model, CheckpointError, CheckpointMetadata};
pub use classifier::{Classifier, WeightSource, WeightsConfig};
pub use error::{ModelError, Result};
pub use head::ClassifierHead;
pub use network::{ClassifierConfig, FractureNet, ARCH_NAME};
pub use shapes::{ParamShapes, ShapeSignature};
