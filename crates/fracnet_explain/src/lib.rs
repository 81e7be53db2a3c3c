//! # fracnet_explain
//!
//! Explainability for fracnet: Grad-CAM heatmaps over a tapped convolutional
//! layer.
//!
//! This crate provides:
//! - [`TapCapture`], the activation and gradient of one tapped layer
//! - [`grad_cam`] and [`AttributionMap`], the tensor-side computation
//! - [`explain`], the full forward/backward pass producing a [`Saliency`]
//! - [`Heatmap`], the normalized, resized result

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod activation;
mod attribution;
mod engine;
mod error;
mod heatmap;

pub use activation::TapCapture;
pub use attribution::{grad_cam, AttributionMap};
pub use engine::{capture, explain, GradCamConfig, Saliency, ZeroAttribution};
pub use error::{ExplainError, Result};
pub use heatmap::Heatmap;
