//! Grad-CAM over a [`TappedClassifier`].

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use fracnet_core::{InputTensor, TappedClassifier, INPUT_SIZE};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::activation::TapCapture;
use crate::attribution::grad_cam;
use crate::error::{ExplainError, Result};
use crate::heatmap::Heatmap;

/// What to do when the clipped attribution map is zero everywhere.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroAttribution {
    /// Return an all-zero heatmap flagged as degenerate.
    #[default]
    Blank,
    /// Fail with [`ExplainError::DegenerateAttribution`].
    Error,
}

/// Configuration for Grad-CAM.
///
/// The heatmap is always produced on the 224x224 input grid so it lines up
/// with the resized image it is blended onto.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradCamConfig {
    /// Layer to tap. `None` taps the classifier's default layer.
    pub layer: Option<String>,
    /// Handling of zero attribution maps.
    pub zero_attribution: ZeroAttribution,
}

impl Default for GradCamConfig {
    fn default() -> Self {
        Self {
            layer: None,
            zero_attribution: ZeroAttribution::Blank,
        }
    }
}

impl GradCamConfig {
    /// Tap the named layer.
    #[must_use]
    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = Some(layer.into());
        self
    }

    /// Set the zero-attribution policy.
    #[must_use]
    pub fn with_zero_attribution(mut self, policy: ZeroAttribution) -> Self {
        self.zero_attribution = policy;
        self
    }
}

/// The explanation of one prediction.
#[derive(Debug, Clone)]
pub struct Saliency {
    /// Tapped layer.
    pub layer: String,
    /// Probability from the same forward pass that produced the gradients.
    pub probability: f32,
    /// One importance weight per feature-map channel.
    pub channel_weights: Vec<f32>,
    /// Normalized map on the feature-map grid, before resizing.
    pub coarse: Array2<f32>,
    /// Normalized map resized to the output grid.
    pub heatmap: Heatmap,
}

/// Run one forward and one backward pass, capturing the tapped activation and
/// the gradient of the score with respect to it.
///
/// # Returns
///
/// The capture and the probability from the same forward pass.
pub fn capture<B, C>(
    classifier: &C,
    input: InputTensor<B::InnerBackend>,
    layer: &str,
) -> Result<(TapCapture<B::InnerBackend>, f32)>
where
    B: AutodiffBackend,
    C: TappedClassifier<B> + ?Sized,
{
    input.shape().ensure_single()?;

    let (feature_map, score) = classifier.forward_with_feature_map(input, layer)?;
    if score.dims() != [1, 1] {
        return Err(ExplainError::UnexpectedScore(score.dims().to_vec()));
    }
    let probability: f32 = score.clone().into_scalar().elem();

    let grads = score.backward();
    let activation = feature_map.clone().inner();
    // A score that doesn't depend on the feature map leaves no gradient behind
    let gradient = feature_map
        .grad(&grads)
        .unwrap_or_else(|| activation.zeros_like());

    tracing::debug!(layer, shape = ?activation.dims(), probability, "Captured tapped layer");
    Ok((TapCapture::new(layer, activation, gradient)?, probability))
}

/// Compute the Grad-CAM heatmap for one input.
///
/// # Errors
///
/// Fails if the layer is unknown, the input isn't a single sample, or the
/// attribution map is zero everywhere and the policy is
/// [`ZeroAttribution::Error`].
pub fn explain<B, C>(
    classifier: &C,
    input: InputTensor<B::InnerBackend>,
    config: &GradCamConfig,
) -> Result<Saliency>
where
    B: AutodiffBackend,
    C: TappedClassifier<B> + ?Sized,
{
    let layer = config
        .layer
        .clone()
        .unwrap_or_else(|| classifier.default_layer());

    let (tap, probability) = capture::<B, C>(classifier, input, &layer)?;
    let (activation, gradient) = tap.into_parts();
    let map = grad_cam(activation, gradient);
    let channel_weights = map.weights_vec()?;

    if map.is_degenerate() {
        return match config.zero_attribution {
            ZeroAttribution::Error => Err(ExplainError::DegenerateAttribution { layer }),
            ZeroAttribution::Blank => {
                tracing::warn!(
                    layer = %layer,
                    "Attribution map is zero everywhere, returning a blank heatmap"
                );
                let [_, _, height, width] = map.shape();
                Ok(Saliency {
                    layer,
                    probability,
                    channel_weights,
                    coarse: Array2::zeros((height, width)),
                    heatmap: Heatmap::blank(INPUT_SIZE, INPUT_SIZE),
                })
            }
        };
    }

    let normalized = map.normalize();
    let coarse = normalized.to_array()?;
    let heatmap = normalized
        .resize([INPUT_SIZE, INPUT_SIZE])
        .clamp_unit()
        .to_array()?;

    Ok(Saliency {
        layer,
        probability,
        channel_weights,
        coarse,
        heatmap: Heatmap::new(heatmap),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::activation::sigmoid;
    use fracnet_core::backend::{Autodiff, NdArray};
    use fracnet_core::CoreError;

    type TestBackend = Autodiff<NdArray>;

    /// Uses the input itself as the feature map and scores the mean of its
    /// first channel.
    struct FirstChannel;

    impl TappedClassifier<TestBackend> for FirstChannel {
        fn layer_names(&self) -> Vec<String> {
            vec!["input".to_string()]
        }

        fn feature_map(
            &self,
            input: InputTensor<NdArray>,
            layer: &str,
        ) -> fracnet_core::Result<Tensor<NdArray, 4>> {
            if layer != "input" {
                return Err(CoreError::unknown_layer(layer, &self.layer_names()));
            }
            Ok(input.into_inner())
        }

        fn score_from(
            &self,
            feature_map: Tensor<TestBackend, 4>,
            _layer: &str,
        ) -> fracnet_core::Result<Tensor<TestBackend, 2>> {
            let mean = feature_map.slice([0..1, 0..1]).mean();
            Ok(sigmoid(mean).reshape([1, 1]))
        }

        fn predict(&self, input: InputTensor<NdArray>) -> fracnet_core::Result<f32> {
            let mean = input.into_inner().slice([0..1, 0..1]).mean();
            Ok(sigmoid(mean).into_scalar().elem())
        }
    }

    /// Always scores 0.7, whatever the input.
    struct Constant;

    impl TappedClassifier<TestBackend> for Constant {
        fn layer_names(&self) -> Vec<String> {
            vec!["features".to_string()]
        }

        fn feature_map(
            &self,
            input: InputTensor<NdArray>,
            _layer: &str,
        ) -> fracnet_core::Result<Tensor<NdArray, 4>> {
            Ok(input.into_inner())
        }

        fn score_from(
            &self,
            feature_map: Tensor<TestBackend, 4>,
            _layer: &str,
        ) -> fracnet_core::Result<Tensor<TestBackend, 2>> {
            Ok((feature_map.sum() * 0.0 + 0.7).reshape([1, 1]))
        }

        fn predict(&self, _input: InputTensor<NdArray>) -> fracnet_core::Result<f32> {
            Ok(0.7)
        }
    }

    /// Scores 0.4 from a tensor built on the spot, so the graph never reaches
    /// the feature map.
    struct Detached;

    impl TappedClassifier<TestBackend> for Detached {
        fn layer_names(&self) -> Vec<String> {
            vec!["features".to_string()]
        }

        fn feature_map(
            &self,
            input: InputTensor<NdArray>,
            _layer: &str,
        ) -> fracnet_core::Result<Tensor<NdArray, 4>> {
            Ok(input.into_inner())
        }

        fn score_from(
            &self,
            feature_map: Tensor<TestBackend, 4>,
            _layer: &str,
        ) -> fracnet_core::Result<Tensor<TestBackend, 2>> {
            Ok(Tensor::from_floats([[0.4]], &feature_map.device()))
        }

        fn predict(&self, _input: InputTensor<NdArray>) -> fracnet_core::Result<f32> {
            Ok(0.4)
        }
    }

    /// First channel ramps from 0 at the left edge to 1 at the right edge.
    fn ramp_input() -> InputTensor<NdArray> {
        let device = Default::default();
        let mut data = vec![0.5f32; 3 * INPUT_SIZE * INPUT_SIZE];
        for row in 0..INPUT_SIZE {
            for col in 0..INPUT_SIZE {
                data[row * INPUT_SIZE + col] = col as f32 / (INPUT_SIZE - 1) as f32;
            }
        }
        let tensor = Tensor::<NdArray, 4>::from_data(
            burn::tensor::TensorData::new(data, [1, 3, INPUT_SIZE, INPUT_SIZE]),
            &device,
        );
        InputTensor::new(tensor).unwrap()
    }

    #[test]
    fn test_zero_attribution_default() {
        assert_eq!(ZeroAttribution::default(), ZeroAttribution::Blank);
        let config = GradCamConfig::default();
        assert!(config.layer.is_none());
    }

    #[test]
    fn test_config_partial_json() {
        let config: GradCamConfig = serde_json::from_str(r#"{"layer":"stage3"}"#).unwrap();
        assert_eq!(config.layer.as_deref(), Some("stage3"));
        assert_eq!(config.zero_attribution, ZeroAttribution::Blank);
    }

    #[test]
    fn test_config_serde() {
        let config = GradCamConfig::default()
            .with_layer("stage3")
            .with_zero_attribution(ZeroAttribution::Error);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"error\""));
        let restored: GradCamConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, config);
    }

    #[test]
    fn test_capture_gradient_follows_score() {
        let (tap, probability) = capture::<TestBackend, _>(&FirstChannel, ramp_input(), "input").unwrap();
        assert!((0.0..=1.0).contains(&probability));

        let gradient = tap.gradient().clone();
        let first: f32 = gradient.clone().slice([0..1, 0..1]).min().into_scalar().elem();
        let rest: f32 = gradient.slice([0..1, 1..3]).abs().max().into_scalar().elem();
        assert!(first > 0.0);
        assert_eq!(rest, 0.0);
    }

    #[test]
    fn test_explain_highlights_bright_region() {
        let saliency = explain::<TestBackend, _>(&FirstChannel, ramp_input(), &GradCamConfig::default()).unwrap();

        assert_eq!(saliency.layer, "input");
        assert_eq!(saliency.channel_weights.len(), 3);
        assert!(saliency.channel_weights[0] > 0.0);
        assert_eq!(saliency.channel_weights[1], 0.0);

        let heatmap = &saliency.heatmap;
        assert!(!heatmap.is_degenerate());
        assert_eq!(heatmap.dims(), (224, 224));
        assert!(heatmap.min() >= 0.0);
        assert!((heatmap.max() - 1.0).abs() < 1e-4);
        assert!(heatmap.view()[[100, 0]] < heatmap.view()[[100, 223]]);
    }

    #[test]
    fn test_probability_matches_predict() {
        let input = ramp_input();
        let expected = FirstChannel.predict(input.clone()).unwrap();
        let saliency = explain::<TestBackend, _>(&FirstChannel, input, &GradCamConfig::default()).unwrap();
        assert!((saliency.probability - expected).abs() < 1e-6);
    }

    #[test]
    fn test_explain_is_deterministic() {
        let config = GradCamConfig::default();
        let a = explain::<TestBackend, _>(&FirstChannel, ramp_input(), &config).unwrap();
        let b = explain::<TestBackend, _>(&FirstChannel, ramp_input(), &config).unwrap();
        assert_eq!(a.probability, b.probability);
        assert_eq!(a.heatmap, b.heatmap);
    }

    #[test]
    fn test_constant_classifier_yields_blank_heatmap() {
        let saliency = explain::<TestBackend, _>(&Constant, ramp_input(), &GradCamConfig::default()).unwrap();

        assert!(saliency.channel_weights.iter().all(|w| *w == 0.0));
        assert!((saliency.probability - 0.7).abs() < 1e-6);
        assert!(saliency.heatmap.is_degenerate());
        assert_eq!(saliency.heatmap.dims(), (224, 224));
        assert!(saliency.heatmap.view().iter().all(|v| *v == 0.0));
        assert!(saliency.coarse.iter().all(|v| !v.is_nan()));
    }

    #[test]
    fn test_detached_score_has_zero_gradient() {
        let (tap, probability) = capture::<TestBackend, _>(&Detached, ramp_input(), "features").unwrap();
        assert!((probability - 0.4).abs() < 1e-6);
        assert_eq!(tap.gradient().dims(), tap.activation().dims());
        let largest: f32 = tap.gradient().clone().abs().max().into_scalar().elem();
        assert_eq!(largest, 0.0);

        let saliency = explain::<TestBackend, _>(&Detached, ramp_input(), &GradCamConfig::default()).unwrap();
        assert!(saliency.heatmap.is_degenerate());
        assert_eq!(saliency.heatmap.dims(), (INPUT_SIZE, INPUT_SIZE));
    }

    #[test]
    fn test_constant_classifier_errors_when_asked() {
        let config = GradCamConfig::default().with_zero_attribution(ZeroAttribution::Error);
        let err = explain::<TestBackend, _>(&Constant, ramp_input(), &config).unwrap_err();
        assert!(matches!(err, ExplainError::DegenerateAttribution { ref layer } if layer == "features"));
    }

    #[test]
    fn test_unknown_layer() {
        let config = GradCamConfig::default().with_layer("stage9");
        let err = explain::<TestBackend, _>(&FirstChannel, ramp_input(), &config).unwrap_err();
        assert!(matches!(err, ExplainError::Core(CoreError::UnknownLayer { .. })));
    }
}
