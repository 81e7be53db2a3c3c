//! The single-image predict-and-explain cycle.

use std::path::Path;
use std::time::Instant;

use burn::tensor::backend::AutodiffBackend;
use fracnet_core::TappedClassifier;
use fracnet_explain::{explain, GradCamConfig, Heatmap, Saliency};
use fracnet_models::Classifier;
use fracnet_vision::{overlay, OverlayConfig, Preprocessor, XRayImage};
use image::RgbImage;

use crate::config::FracnetConfig;
use crate::error::Result;
use crate::report::{Diagnosis, PredictionReport};
use crate::service::SharedClassifier;

/// The outcome of one request.
#[derive(Debug, Clone)]
pub struct FracturePrediction {
    /// Fracture probability in [0, 1].
    pub probability: f32,
    /// Label for `probability`.
    pub diagnosis: Diagnosis,
    /// 224x224 heatmap in [0, 1].
    pub heatmap: Heatmap,
    /// Tapped layer, channel weights and the coarse map.
    pub saliency: Saliency,
    /// The 224x224 image the classifier saw.
    pub resized: RgbImage,
}

impl FracturePrediction {
    /// `"<label> (<probability>)"`.
    pub fn summary(&self) -> String {
        self.diagnosis.summary(self.probability)
    }

    /// Blend the heatmap over the resized image.
    pub fn render_overlay(&self, config: &OverlayConfig) -> Result<RgbImage> {
        Ok(overlay(&self.resized, self.heatmap.view(), config)?)
    }

    /// Build the serializable report for `image`.
    pub fn report(&self, image: impl AsRef<Path>, overlay: Option<&Path>) -> PredictionReport {
        PredictionReport {
            image: image.as_ref().to_path_buf(),
            probability: self.probability,
            diagnosis: self.diagnosis,
            summary: self.summary(),
            layer: self.saliency.layer.clone(),
            degenerate_heatmap: self.heatmap.is_degenerate(),
            overlay: overlay.map(Path::to_path_buf),
        }
    }
}

/// Score one image and explain the score.
///
/// The image is preprocessed once; the probability and the heatmap are both
/// computed from that tensor.
pub fn predict<B, C>(
    classifier: &C,
    preprocessor: &Preprocessor,
    explain_config: &GradCamConfig,
    image: &XRayImage,
    device: &B::Device,
) -> Result<FracturePrediction>
where
    B: AutodiffBackend,
    C: TappedClassifier<B> + ?Sized,
{
    let start = Instant::now();
    let (resized, input) = preprocessor.prepare::<B::InnerBackend>(image, device)?;

    let probability = classifier.predict(input.clone())?;
    let saliency = explain::<B, C>(classifier, input, explain_config)?;
    let heatmap = saliency.heatmap.clone();

    tracing::debug!(
        probability,
        layer = %saliency.layer,
        degenerate = heatmap.is_degenerate(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Prediction complete"
    );

    Ok(FracturePrediction {
        probability,
        diagnosis: Diagnosis::from_probability(probability),
        heatmap,
        saliency,
        resized,
    })
}

/// Configuration, preprocessing and the shared classifier bundled for
/// repeated requests.
#[derive(Debug)]
pub struct FracturePipeline<B: AutodiffBackend> {
    config: FracnetConfig,
    preprocessor: Preprocessor,
    classifier: SharedClassifier<B>,
}

impl<B: AutodiffBackend> FracturePipeline<B> {
    /// Validate the configuration. The classifier is built on first use.
    pub fn new(config: FracnetConfig, device: B::Device) -> Result<Self> {
        config.validate()?;
        let preprocessor = Preprocessor::new(config.preprocess.clone())?;
        let classifier =
            SharedClassifier::new(config.model.clone(), config.weights.clone(), device);
        Ok(Self {
            config,
            preprocessor,
            classifier,
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &FracnetConfig {
        &self.config
    }

    /// The classifier, building it if needed.
    pub fn classifier(&self) -> Result<&Classifier<B>> {
        self.classifier.get()
    }

    /// Run one request on a decoded image.
    pub fn predict(&self, image: &XRayImage) -> Result<FracturePrediction> {
        let classifier = self.classifier.get()?;
        predict::<B, _>(
            classifier,
            &self.preprocessor,
            &self.config.explain,
            image,
            self.classifier.device(),
        )
    }

    /// Decode an image file and run one request on it.
    pub fn predict_file(&self, path: impl AsRef<Path>) -> Result<FracturePrediction> {
        let image = XRayImage::open(path.as_ref())?;
        self.predict(&image)
    }

    /// Blend a prediction's heatmap over its image with the configured style.
    pub fn render(&self, prediction: &FracturePrediction) -> Result<RgbImage> {
        prediction.render_overlay(&self.config.render)
    }
}
