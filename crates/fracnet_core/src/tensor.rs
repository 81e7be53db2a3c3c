//! Classifier input tensor type.

use burn::prelude::*;

use crate::error::{CoreError, Result};
use crate::shape::ImageShape;

/// A preprocessed classifier input with shape metadata.
///
/// Wraps a Burn tensor and guarantees the `(1, 3, 224, 224)` input shape.
/// Each request builds its own value; cloning shares the underlying buffer,
/// which is never mutated in place.
///
/// # Example
///
/// ```rust,ignore
/// use fracnet_core::InputTensor;
///
/// let tensor = Tensor::<NdArray, 4>::zeros([1, 3, 224, 224], &device);
/// let input = InputTensor::new(tensor)?;
/// ```
#[derive(Debug, Clone)]
pub struct InputTensor<B: Backend> {
    inner: Tensor<B, 4>,
    shape: ImageShape,
}

impl<B: Backend> InputTensor<B> {
    /// Create a new input tensor from a Burn tensor.
    ///
    /// # Errors
    ///
    /// Returns an error if the tensor is not shaped `(1, 3, 224, 224)`.
    pub fn new(tensor: Tensor<B, 4>) -> Result<Self> {
        let shape = ImageShape::from(tensor.dims());
        let expected = ImageShape::input();
        if shape != expected {
            return Err(CoreError::InvalidShape {
                expected: expected.to_string(),
                got: shape.to_string(),
            });
        }
        Ok(Self {
            inner: tensor,
            shape,
        })
    }

    /// Create an input filled with zeros.
    pub fn zeros(device: &B::Device) -> Self {
        let shape = ImageShape::input();
        Self {
            inner: Tensor::zeros(shape.as_array(), device),
            shape,
        }
    }

    /// Get the shape metadata.
    #[must_use]
    pub const fn shape(&self) -> ImageShape {
        self.shape
    }

    /// Get a reference to the underlying Burn tensor.
    #[must_use]
    pub const fn inner(&self) -> &Tensor<B, 4> {
        &self.inner
    }

    /// Consume self and return the underlying Burn tensor.
    #[must_use]
    pub fn into_inner(self) -> Tensor<B, 4> {
        self.inner
    }

    /// Get the device the tensor is on.
    pub fn device(&self) -> B::Device {
        self.inner.device()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_input_tensor_accepts_input_shape() {
        let device = Default::default();
        let tensor = Tensor::<TestBackend, 4>::ones([1, 3, 224, 224], &device);
        let input = InputTensor::new(tensor).unwrap();
        assert_eq!(input.shape(), ImageShape::input());
    }

    #[test]
    fn test_input_tensor_rejects_other_shapes() {
        let device = Default::default();
        let batch = Tensor::<TestBackend, 4>::ones([2, 3, 224, 224], &device);
        assert!(InputTensor::new(batch).is_err());

        let gray = Tensor::<TestBackend, 4>::ones([1, 1, 224, 224], &device);
        assert!(InputTensor::new(gray).is_err());
    }

    #[test]
    fn test_input_tensor_zeros() {
        let device = Default::default();
        let input = InputTensor::<TestBackend>::zeros(&device);
        let sum: f32 = input.into_inner().sum().into_scalar().elem();
        assert_eq!(sum, 0.0);
    }
}
