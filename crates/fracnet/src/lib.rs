//! # fracnet
//!
//! X-ray fracture scoring with visual explanations.
//!
//! An X-ray image is resized and normalized, scored by a convolutional
//! classifier for fracture likelihood, and explained with a Grad-CAM heatmap
//! computed from the same input tensor:
//!
//! - **Models**: ResNet-style backbone with a tappable layer per stage
//! - **Explain**: Grad-CAM over the tapped feature map
//! - **Vision**: decoding, preprocessing, color ramps, overlays
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fracnet::prelude::*;
//!
//! let pipeline = FracturePipeline::<DefaultBackend>::new(FracnetConfig::default(), device)?;
//! let prediction = pipeline.predict_file("wrist.png")?;
//!
//! println!("{}", prediction.summary()); // "Fracture Detected (0.73)"
//! save_png(&pipeline.render(&prediction)?, "wrist_overlay.png")?;
//! ```
//!
//! ## Feature Flags
//!
//! - `backend-ndarray` (default): CPU backend using ndarray, with autodiff

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod error;
mod pipeline;
mod report;
mod service;

// Re-export all crates
pub use fracnet_core as core;
pub use fracnet_explain as explain;
pub use fracnet_models as models;
pub use fracnet_vision as vision;

pub use config::FracnetConfig;
pub use error::{FracnetError, Result};
pub use pipeline::{predict, FracturePipeline, FracturePrediction};
pub use report::{Diagnosis, PredictionReport, FRACTURE_THRESHOLD};
pub use service::SharedClassifier;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use fracnet::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Diagnosis, FracnetConfig, FracnetError, FracturePipeline, FracturePrediction,
        PredictionReport, SharedClassifier,
    };

    #[cfg(feature = "backend-ndarray")]
    pub use fracnet_core::backend::DefaultBackend;
    pub use fracnet_core::{InputTensor, TappedClassifier};
    pub use fracnet_explain::{GradCamConfig, Heatmap, Saliency, ZeroAttribution};
    pub use fracnet_models::{BackboneConfig, Classifier, ClassifierConfig, WeightsConfig};
    pub use fracnet_vision::{
        save_png, ColorRamp, OverlayConfig, PreprocessConfig, Preprocessor, XRayImage,
    };
}
