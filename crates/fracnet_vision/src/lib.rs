//! # fracnet_vision
//!
//! Image ingestion and rendering for fracnet.
//!
//! - [`XRayImage`] and [`Preprocessor`]: decode, resize to 224x224, normalize
//!   into a classifier input tensor
//! - [`ColorRamp`] and [`overlay`]: colorize a heatmap and blend it over the
//!   resized image

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
pub mod preprocess;
pub mod render;

pub use error::{Result, VisionError};
pub use preprocess::{
    PreprocessConfig, Preprocessor, ResizeFilter, XRayImage, IMAGENET_MEAN, IMAGENET_STD,
};
pub use render::{blend, colorize, overlay, save_png, ColorRamp, OverlayConfig};
