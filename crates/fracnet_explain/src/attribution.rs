//! Attribution map computation.

use burn::prelude::*;
use burn::tensor::module::interpolate;
use burn::tensor::ops::{InterpolateMode, InterpolateOptions};
use ndarray::Array2;

use crate::error::{ExplainError, Result};

/// Attribution map over the spatial grid of a feature map.
#[derive(Debug, Clone)]
pub struct AttributionMap<B: Backend> {
    /// The attribution values, shape (batch, 1, height, width).
    pub values: Tensor<B, 4>,
    /// Per-channel importance weights, shape (batch, channels, 1, 1).
    pub channel_weights: Tensor<B, 4>,
}

impl<B: Backend> AttributionMap<B> {
    /// Create a new attribution map.
    pub fn new(values: Tensor<B, 4>, channel_weights: Tensor<B, 4>) -> Self {
        Self {
            values,
            channel_weights,
        }
    }

    /// Get the shape of the attribution map.
    pub fn shape(&self) -> [usize; 4] {
        self.values.dims()
    }

    /// Largest attribution value.
    pub fn peak(&self) -> f32 {
        self.values.clone().max().into_scalar().elem()
    }

    /// Whether the map can't be normalized: its peak is zero, negative, or
    /// not a number.
    pub fn is_degenerate(&self) -> bool {
        let peak = self.peak();
        !(peak.is_finite() && peak > 0.0)
    }

    /// Divide the attribution values by their maximum.
    pub fn normalize(&self) -> Self {
        let peak = self.peak();

        // Avoid division by zero
        let values = if peak.is_finite() && peak > 0.0 {
            self.values.clone() / peak
        } else {
            self.values.clone()
        };

        Self {
            values,
            channel_weights: self.channel_weights.clone(),
        }
    }

    /// Bilinearly resize the map to `[height, width]`.
    pub fn resize(&self, size: [usize; 2]) -> Self {
        let values = interpolate(
            self.values.clone(),
            size,
            InterpolateOptions::new(InterpolateMode::Bilinear),
        );
        Self {
            values,
            channel_weights: self.channel_weights.clone(),
        }
    }

    /// Clamp the attribution values to [0, 1].
    pub fn clamp_unit(&self) -> Self {
        Self {
            values: self.values.clone().clamp(0.0, 1.0),
            channel_weights: self.channel_weights.clone(),
        }
    }

    /// The channel weights as a flat vector.
    pub fn weights_vec(&self) -> Result<Vec<f32>> {
        to_vec(self.channel_weights.clone())
    }

    /// Copy the first map of the batch to the host.
    pub fn to_array(&self) -> Result<Array2<f32>> {
        let [_, _, height, width] = self.values.dims();
        let first = self.values.clone().slice([0..1, 0..1]);
        let data = to_vec(first)?;
        Array2::from_shape_vec((height, width), data)
            .map_err(|e| ExplainError::TensorData(e.to_string()))
    }
}

fn to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| ExplainError::TensorData(format!("{e:?}")))
}

/// Compute GradCAM attribution for CNN models.
///
/// # Arguments
///
/// * `activations` - Activations from the tapped conv layer (batch, channels, height, width)
/// * `gradients` - Gradients w.r.t. activations (batch, channels, height, width)
///
/// # Returns
///
/// Attribution map of shape (batch, 1, height, width), clipped at zero and
/// not yet normalized.
pub fn grad_cam<B: Backend>(activations: Tensor<B, 4>, gradients: Tensor<B, 4>) -> AttributionMap<B> {
    // Global average pool the gradients: (batch, channels, h, w) -> (batch, channels, 1, 1)
    let weights = gradients.mean_dim(3).mean_dim(2);

    // Weight the activations and sum across channels: -> (batch, 1, h, w)
    let cam = (activations * weights.clone()).sum_dim(1);

    // ReLU
    let cam = cam.clamp_min(0.0);

    AttributionMap::new(cam, weights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::TensorData;
    use fracnet_core::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_grad_cam_shape() {
        let device = Default::default();
        let activations = Tensor::<TestBackend, 4>::ones([1, 16, 7, 7], &device);
        let gradients = Tensor::<TestBackend, 4>::ones([1, 16, 7, 7], &device);

        let cam = grad_cam(activations, gradients);

        assert_eq!(cam.shape(), [1, 1, 7, 7]);
        assert_eq!(cam.channel_weights.dims(), [1, 16, 1, 1]);
        // Each location sums 16 channels of weight 1 x activation 1
        assert!((cam.peak() - 16.0).abs() < 1e-5);
    }

    #[test]
    fn test_grad_cam_weights_are_spatial_means() {
        let device = Default::default();
        // Channel 0 gradient: [0, 1, 2, 3] over a 2x2 grid, channel 1 all -1
        let gradients = Tensor::<TestBackend, 4>::from_data(
            TensorData::new(vec![0.0f32, 1.0, 2.0, 3.0, -1.0, -1.0, -1.0, -1.0], [1, 2, 2, 2]),
            &device,
        );
        let activations = Tensor::<TestBackend, 4>::ones([1, 2, 2, 2], &device);

        let cam = grad_cam(activations, gradients);
        let weights = cam.weights_vec().unwrap();
        assert!((weights[0] - 1.5).abs() < 1e-6);
        assert!((weights[1] + 1.0).abs() < 1e-6);

        // 1.5 - 1.0 at every location
        let values = cam.to_array().unwrap();
        assert!(values.iter().all(|v| (v - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_grad_cam_clips_negative_evidence() {
        let device = Default::default();
        let activations = Tensor::<TestBackend, 4>::ones([1, 4, 3, 3], &device);
        let gradients = Tensor::<TestBackend, 4>::ones([1, 4, 3, 3], &device).neg();

        let cam = grad_cam(activations, gradients);
        assert_eq!(cam.peak(), 0.0);
        assert!(cam.is_degenerate());
    }

    #[test]
    fn test_normalize_divides_by_peak() {
        let device = Default::default();
        let values = Tensor::<TestBackend, 4>::from_data(
            TensorData::new(vec![0.0f32, 2.0, 4.0, 8.0], [1, 1, 2, 2]),
            &device,
        );
        let weights = Tensor::<TestBackend, 4>::ones([1, 1, 1, 1], &device);
        let map = AttributionMap::new(values, weights).normalize();

        let values = map.to_array().unwrap();
        assert_eq!(values[[0, 0]], 0.0);
        assert_eq!(values[[0, 1]], 0.25);
        assert_eq!(values[[1, 1]], 1.0);
    }

    #[test]
    fn test_normalize_leaves_zero_map_finite() {
        let device = Default::default();
        let values = Tensor::<TestBackend, 4>::zeros([1, 1, 7, 7], &device);
        let weights = Tensor::<TestBackend, 4>::zeros([1, 4, 1, 1], &device);
        let map = AttributionMap::new(values, weights).normalize();

        assert!(map.to_array().unwrap().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_resize_to_input_grid() {
        let device = Default::default();
        let values = Tensor::<TestBackend, 4>::random(
            [1, 1, 7, 7],
            burn::tensor::Distribution::Uniform(0.0, 1.0),
            &device,
        );
        let weights = Tensor::<TestBackend, 4>::ones([1, 1, 1, 1], &device);
        let map = AttributionMap::new(values, weights)
            .normalize()
            .resize([224, 224])
            .clamp_unit();

        assert_eq!(map.shape(), [1, 1, 224, 224]);
        let values = map.to_array().unwrap();
        assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
    }
}
