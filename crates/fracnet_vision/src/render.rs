//! Heatmap colorization and overlay compositing.

use std::path::Path;

use image::{ImageFormat, Rgb, RgbImage};
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VisionError};

/// Mapping from a heatmap value in [0, 1] to a color.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorRamp {
    /// Blue through cyan, yellow and red.
    #[default]
    Jet,
    /// Black to white.
    Gray,
}

impl ColorRamp {
    /// Color for `value`. Values outside [0, 1] are clamped; NaN maps to 0.
    pub fn color(self, value: f32) -> Rgb<u8> {
        let v = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        match self {
            Self::Jet => {
                let channel = |offset: f32| (1.5 - (4.0 * v - offset).abs()).clamp(0.0, 1.0);
                Rgb([to_u8(channel(3.0)), to_u8(channel(2.0)), to_u8(channel(1.0))])
            }
            Self::Gray => {
                let g = to_u8(v);
                Rgb([g, g, g])
            }
        }
    }
}

fn to_u8(v: f32) -> u8 {
    (v * 255.0).round() as u8
}

/// Overlay settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Color ramp for the heatmap.
    pub ramp: ColorRamp,
    /// Weight of the heatmap in the blend; the image gets `1 - heatmap_alpha`.
    pub heatmap_alpha: f32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            ramp: ColorRamp::Jet,
            heatmap_alpha: 0.4,
        }
    }
}

impl OverlayConfig {
    /// Set the color ramp.
    #[must_use]
    pub fn with_ramp(mut self, ramp: ColorRamp) -> Self {
        self.ramp = ramp;
        self
    }

    /// Set the heatmap weight.
    #[must_use]
    pub fn with_heatmap_alpha(mut self, alpha: f32) -> Self {
        self.heatmap_alpha = alpha;
        self
    }

    /// Check the blend weight is in [0, 1].
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.heatmap_alpha) {
            return Err(VisionError::InvalidConfig(format!(
                "heatmap_alpha must be in [0, 1], got {}",
                self.heatmap_alpha
            )));
        }
        Ok(())
    }
}

/// Colorize a heatmap. Row `y` of the array becomes pixel row `y`.
pub fn colorize(heatmap: ArrayView2<'_, f32>, ramp: ColorRamp) -> RgbImage {
    let (height, width) = heatmap.dim();
    RgbImage::from_fn(width as u32, height as u32, |x, y| {
        ramp.color(heatmap[[y as usize, x as usize]])
    })
}

/// Per-pixel `(1 - alpha) * base + alpha * overlay`.
pub fn blend(base: &RgbImage, overlay: &RgbImage, alpha: f32) -> Result<RgbImage> {
    if base.dimensions() != overlay.dimensions() {
        return Err(VisionError::SizeMismatch(format!(
            "cannot blend {:?} with {:?}",
            base.dimensions(),
            overlay.dimensions()
        )));
    }
    if !(0.0..=1.0).contains(&alpha) {
        return Err(VisionError::InvalidConfig(format!(
            "blend alpha must be in [0, 1], got {alpha}"
        )));
    }

    let mut out = base.clone();
    for (dst, src) in out.pixels_mut().zip(overlay.pixels()) {
        for c in 0..3 {
            let mixed = (1.0 - alpha) * dst[c] as f32 + alpha * src[c] as f32;
            dst[c] = mixed.round().clamp(0.0, 255.0) as u8;
        }
    }
    Ok(out)
}

/// Colorize `heatmap` and blend it over `base`.
///
/// `base` is the resized image the classifier saw, so the heatmap must have
/// the same dimensions.
pub fn overlay(
    base: &RgbImage,
    heatmap: ArrayView2<'_, f32>,
    config: &OverlayConfig,
) -> Result<RgbImage> {
    config.validate()?;
    let colored = colorize(heatmap, config.ramp);
    blend(base, &colored, config.heatmap_alpha)
}

/// Write an image as PNG.
pub fn save_png(image: &RgbImage, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| VisionError::Encode(image::ImageError::IoError(e)))?;
    }
    image
        .save_with_format(path, ImageFormat::Png)
        .map_err(VisionError::Encode)?;
    tracing::debug!(path = %path.display(), "Wrote overlay");
    Ok(())
}
