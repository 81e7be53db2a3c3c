//! Classification head.

use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig};
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::{relu, sigmoid};

use crate::shapes::{join, ParamShapes, ShapeSignature};

/// Global average pooling, a hidden dense layer with ReLU, and a single
/// sigmoid output unit.
#[derive(Module, Debug)]
pub struct ClassifierHead<B: Backend> {
    gap: AdaptiveAvgPool2d,
    hidden: Linear<B>,
    output: Linear<B>,
}

impl<B: Backend> ClassifierHead<B> {
    /// Create a new head over `in_channels` feature channels.
    pub fn new(in_channels: usize, hidden: usize, device: &B::Device) -> Self {
        Self {
            gap: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            hidden: LinearConfig::new(in_channels, hidden).init(device),
            output: LinearConfig::new(hidden, 1).init(device),
        }
    }

    /// Map a (batch, channels, height, width) feature map to probabilities
    /// of shape (batch, 1).
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let out = self.gap.forward(x);
        let [batch, channels, _, _] = out.dims();
        let out = out.reshape([batch, channels]);

        let out = relu(self.hidden.forward(out));
        sigmoid(self.output.forward(out))
    }
}

impl<B: Backend> ShapeSignature for ClassifierHead<B> {
    fn collect_shapes(&self, prefix: &str, out: &mut ParamShapes) {
        self.hidden.collect_shapes(&join(prefix, "hidden"), out);
        self.output.collect_shapes(&join(prefix, "output"), out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fracnet_core::backend::NdArray;

    #[test]
    fn test_head_output_is_probability() {
        let device = Default::default();
        let head = ClassifierHead::<NdArray>::new(8, 16, &device);
        let x = Tensor::<NdArray, 4>::random(
            [1, 8, 7, 7],
            burn::tensor::Distribution::Normal(0.0, 5.0),
            &device,
        );

        let p = head.forward(x);
        assert_eq!(p.dims(), [1, 1]);
        let p: f32 = p.into_scalar().elem();
        assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn test_head_param_shapes() {
        let device = Default::default();
        let head = ClassifierHead::<NdArray>::new(8, 128, &device);
        let shapes = head.param_shapes();
        assert_eq!(shapes[0], ("hidden.weight".to_string(), vec![8, 128]));
        assert_eq!(shapes[2], ("output.weight".to_string(), vec![128, 1]));
    }
}
