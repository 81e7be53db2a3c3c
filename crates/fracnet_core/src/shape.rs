//! Image tensor shape metadata.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Side length of the square classifier input.
pub const INPUT_SIZE: usize = 224;

/// Number of color channels of the classifier input.
pub const INPUT_CHANNELS: usize = 3;

/// Shape metadata for image tensors.
///
/// Follows the convention `(N, C, H, W)`.
///
/// # Example
///
/// ```rust
/// use fracnet_core::ImageShape;
///
/// let shape = ImageShape::new(1, 512, 7, 7);
/// assert_eq!(shape.channels(), 512);
/// assert_eq!(shape.spatial(), [7, 7]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageShape {
    batch: usize,
    channels: usize,
    height: usize,
    width: usize,
}

impl ImageShape {
    /// Create a new shape with the specified dimensions.
    #[must_use]
    pub const fn new(batch: usize, channels: usize, height: usize, width: usize) -> Self {
        Self {
            batch,
            channels,
            height,
            width,
        }
    }

    /// The shape of a single preprocessed classifier input: `(1, 3, 224, 224)`.
    #[must_use]
    pub const fn input() -> Self {
        Self::new(1, INPUT_CHANNELS, INPUT_SIZE, INPUT_SIZE)
    }

    /// Create a shape from a slice of dimensions.
    ///
    /// # Errors
    ///
    /// Returns an error if the slice doesn't contain exactly 4 elements.
    pub fn from_dims(dims: &[usize]) -> Result<Self> {
        if dims.len() != 4 {
            return Err(CoreError::DimensionError {
                expected: 4,
                got: dims.len(),
            });
        }
        Ok(Self::new(dims[0], dims[1], dims[2], dims[3]))
    }

    /// Get the batch size.
    #[must_use]
    pub const fn batch(&self) -> usize {
        self.batch
    }

    /// Get the number of channels.
    #[must_use]
    pub const fn channels(&self) -> usize {
        self.channels
    }

    /// Get the height.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Get the width.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Spatial dimensions as `[height, width]`.
    #[must_use]
    pub const fn spatial(&self) -> [usize; 2] {
        [self.height, self.width]
    }

    /// Check if any dimension is zero.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.batch == 0 || self.channels == 0 || self.height == 0 || self.width == 0
    }

    /// Get the total number of elements.
    #[must_use]
    pub const fn numel(&self) -> usize {
        self.batch * self.channels * self.height * self.width
    }

    /// Convert to an array.
    #[must_use]
    pub const fn as_array(&self) -> [usize; 4] {
        [self.batch, self.channels, self.height, self.width]
    }

    /// Create a new shape with a different number of channels.
    #[must_use]
    pub const fn with_channels(&self, channels: usize) -> Self {
        Self {
            batch: self.batch,
            channels,
            height: self.height,
            width: self.width,
        }
    }

    /// Ensure this shape describes exactly one non-empty sample.
    pub fn ensure_single(&self) -> Result<()> {
        if self.batch != 1 || self.is_empty() {
            return Err(CoreError::InvalidShape {
                expected: "(N=1, C>0, H>0, W>0)".to_string(),
                got: self.to_string(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for ImageShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "(N={}, C={}, H={}, W={})",
            self.batch, self.channels, self.height, self.width
        )
    }
}

impl From<[usize; 4]> for ImageShape {
    fn from([batch, channels, height, width]: [usize; 4]) -> Self {
        Self::new(batch, channels, height, width)
    }
}
