//! Decoding and preprocessing of uploaded X-ray images.
//!
//! The classifier expects a `(1, 3, 224, 224)` tensor of channel-normalized
//! values `(x / 255 - mean) / std`. The defaults are the ImageNet statistics
//! the backbone is pretrained with.

use std::path::Path;

use burn::prelude::*;
use burn::tensor::TensorData;
use fracnet_core::{InputTensor, INPUT_CHANNELS, INPUT_SIZE};
use image::imageops::FilterType;
use image::{DynamicImage, ImageError, ImageReader, RgbImage};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VisionError};

/// Per-channel mean of the pretraining corpus, on a [0, 1] scale.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Per-channel standard deviation of the pretraining corpus.
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Resampling filter used when resizing to the input grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    /// Linear interpolation (triangle filter).
    #[default]
    Bilinear,
    /// Cubic interpolation.
    CatmullRom,
    /// Lanczos with window 3.
    Lanczos3,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Bilinear => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Configuration for [`Preprocessor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Per-channel mean, on a [0, 1] scale.
    pub mean: [f32; 3],
    /// Per-channel standard deviation.
    pub std: [f32; 3],
    /// Resampling filter.
    pub filter: ResizeFilter,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
            filter: ResizeFilter::Bilinear,
        }
    }
}

/// A decoded RGB image of any resolution.
///
/// Never empty. Resizing produces a new image; the original is not modified.
#[derive(Debug, Clone)]
pub struct XRayImage {
    pixels: RgbImage,
}

impl XRayImage {
    /// Open and decode an image file (JPEG or PNG).
    ///
    /// The format is sniffed from the file contents; the extension is only a
    /// fallback when the contents are not recognized.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let image = ImageReader::open(path.as_ref())
            .and_then(ImageReader::with_guessed_format)
            .map_err(|e| VisionError::Decode(ImageError::IoError(e)))?
            .decode()
            .map_err(VisionError::Decode)?;
        Self::from_dynamic(image)
    }

    /// Decode an in-memory image file.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes).map_err(VisionError::Decode)?;
        Self::from_dynamic(image)
    }

    /// Convert a decoded image of any color type to RGB.
    pub fn from_dynamic(image: DynamicImage) -> Result<Self> {
        Self::from_rgb(image.to_rgb8())
    }

    /// Wrap an RGB buffer.
    ///
    /// # Errors
    ///
    /// Returns [`VisionError::EmptyImage`] for zero-area images.
    pub fn from_rgb(pixels: RgbImage) -> Result<Self> {
        let (width, height) = pixels.dimensions();
        if width == 0 || height == 0 {
            return Err(VisionError::EmptyImage { width, height });
        }
        Ok(Self { pixels })
    }

    /// `(width, height)` in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Borrow the pixels.
    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }
}

/// Turns images into classifier inputs.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    /// Create a preprocessor.
    ///
    /// # Errors
    ///
    /// Fails if a standard deviation is zero or not finite.
    pub fn new(config: PreprocessConfig) -> Result<Self> {
        if config.std.iter().any(|s| !s.is_finite() || *s == 0.0) {
            return Err(VisionError::InvalidConfig(format!(
                "standard deviations must be finite and non-zero, got {:?}",
                config.std
            )));
        }
        Ok(Self { config })
    }

    /// The active configuration.
    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Resize to the 224x224 input grid, ignoring aspect ratio.
    pub fn resize(&self, image: &XRayImage) -> Result<RgbImage> {
        let size = INPUT_SIZE as u32;
        let resized =
            image::imageops::resize(image.pixels(), size, size, self.config.filter.into());
        let (width, height) = resized.dimensions();
        if width == 0 || height == 0 {
            return Err(VisionError::EmptyImage { width, height });
        }
        Ok(resized)
    }

    /// Normalize a 224x224 RGB image into a `(1, 3, 224, 224)` tensor.
    pub fn to_tensor<B: Backend>(
        &self,
        resized: &RgbImage,
        device: &B::Device,
    ) -> Result<InputTensor<B>> {
        let (width, height) = resized.dimensions();
        if width as usize != INPUT_SIZE || height as usize != INPUT_SIZE {
            return Err(VisionError::SizeMismatch(format!(
                "expected {INPUT_SIZE}x{INPUT_SIZE}, got {width}x{height}"
            )));
        }

        let plane = INPUT_SIZE * INPUT_SIZE;
        let mut data = vec![0.0f32; INPUT_CHANNELS * plane];
        for (i, pixel) in resized.pixels().enumerate() {
            for c in 0..INPUT_CHANNELS {
                let value = pixel[c] as f32 / 255.0;
                data[c * plane + i] = (value - self.config.mean[c]) / self.config.std[c];
            }
        }

        let tensor = Tensor::<B, 4>::from_data(
            TensorData::new(data, [1, INPUT_CHANNELS, INPUT_SIZE, INPUT_SIZE])
                .convert::<B::FloatElem>(),
            device,
        );
        InputTensor::new(tensor).map_err(|e| VisionError::SizeMismatch(e.to_string()))
    }

    /// Resize and normalize in one step.
    ///
    /// # Returns
    ///
    /// The resized image (for rendering) and the classifier input built from it.
    pub fn prepare<B: Backend>(
        &self,
        image: &XRayImage,
        device: &B::Device,
    ) -> Result<(RgbImage, InputTensor<B>)> {
        let resized = self.resize(image)?;
        let input = self.to_tensor(&resized, device)?;
        tracing::debug!(
            original = ?image.dimensions(),
            input = %input.shape(),
            "Preprocessed image"
        );
        Ok((resized, input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fracnet_core::backend::NdArray;
    use image::Rgb;

    fn preprocessor() -> Preprocessor {
        Preprocessor::new(PreprocessConfig::default()).unwrap()
    }

    #[test]
    fn test_rejects_empty_image() {
        let err = XRayImage::from_rgb(RgbImage::new(0, 10)).unwrap_err();
        assert!(matches!(err, VisionError::EmptyImage { width: 0, height: 10 }));
    }

    #[test]
    fn test_rejects_undecodable_bytes() {
        let err = XRayImage::decode(b"definitely not a png").unwrap_err();
        assert!(matches!(err, VisionError::Decode(_)));
    }

    #[test]
    fn test_rejects_zero_std() {
        let config = PreprocessConfig {
            std: [0.2, 0.0, 0.2],
            ..Default::default()
        };
        assert!(Preprocessor::new(config).is_err());
    }

    #[test]
    fn test_decode_png_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("xray.png");
        RgbImage::from_pixel(40, 30, Rgb([10, 20, 30])).save(&path).unwrap();

        let image = XRayImage::open(&path).unwrap();
        assert_eq!(image.dimensions(), (40, 30));

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(XRayImage::decode(&bytes).unwrap().dimensions(), (40, 30));
    }

    #[test]
    fn test_open_ignores_misleading_extension() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("xray.png");
        RgbImage::from_pixel(12, 9, Rgb([90, 90, 90])).save(&source).unwrap();
        let bytes = std::fs::read(&source).unwrap();

        for name in ["scan", "scan.jpg"] {
            let path = dir.path().join(name);
            std::fs::write(&path, &bytes).unwrap();
            let image = XRayImage::open(&path).unwrap();
            assert_eq!(image.dimensions(), (12, 9), "{name}");
        }
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = XRayImage::open(dir.path().join("absent.png")).unwrap_err();
        assert!(matches!(err, VisionError::Decode(ImageError::IoError(_))));
    }

    #[test]
    fn test_grayscale_is_expanded_to_rgb() {
        let gray = image::GrayImage::from_pixel(8, 8, image::Luma([128]));
        let image = XRayImage::from_dynamic(DynamicImage::ImageLuma8(gray)).unwrap();
        assert_eq!(image.pixels().get_pixel(0, 0), &Rgb([128, 128, 128]));
    }

    #[test]
    fn test_resize_any_aspect_ratio() {
        let image = XRayImage::from_rgb(RgbImage::from_pixel(1000, 37, Rgb([200, 200, 200]))).unwrap();
        let resized = preprocessor().resize(&image).unwrap();
        assert_eq!(resized.dimensions(), (224, 224));
        // the source image is untouched
        assert_eq!(image.dimensions(), (1000, 37));
    }

    #[test]
    fn test_tensor_is_channel_normalized() {
        let device = Default::default();
        let image = XRayImage::from_rgb(RgbImage::from_pixel(300, 300, Rgb([255, 0, 255]))).unwrap();
        let (resized, input) = preprocessor().prepare::<NdArray>(&image, &device).unwrap();
        assert_eq!(resized.dimensions(), (224, 224));
        assert_eq!(input.shape().as_array(), [1, 3, 224, 224]);

        let values = input.into_inner().into_data().to_vec::<f32>().unwrap();
        let plane = 224 * 224;
        let red = (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
        let green = (0.0 - IMAGENET_MEAN[1]) / IMAGENET_STD[1];
        assert!((values[0] - red).abs() < 1e-5);
        assert!((values[plane + 123] - green).abs() < 1e-5);
    }

    #[test]
    fn test_to_tensor_requires_input_size() {
        let device = Default::default();
        let small = RgbImage::new(10, 10);
        assert!(preprocessor().to_tensor::<NdArray>(&small, &device).is_err());
    }

    #[test]
    fn test_filter_serde() {
        let json = serde_json::to_string(&ResizeFilter::Lanczos3).unwrap();
        assert_eq!(json, "\"lanczos3\"");
    }
}
