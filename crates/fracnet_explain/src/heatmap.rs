//! Host-side heatmap values.

use ndarray::{Array2, ArrayView2};

/// A 2D attribution heatmap with values in [0, 1].
///
/// Row-major, indexed `[[row, column]]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Heatmap {
    values: Array2<f32>,
    degenerate: bool,
}

impl Heatmap {
    /// Wrap normalized values.
    pub fn new(values: Array2<f32>) -> Self {
        Self {
            values,
            degenerate: false,
        }
    }

    /// An all-zero heatmap standing in for an attribution map that couldn't
    /// be normalized.
    pub fn blank(height: usize, width: usize) -> Self {
        Self {
            values: Array2::zeros((height, width)),
            degenerate: true,
        }
    }

    /// Whether this heatmap stands in for a zero attribution map.
    pub fn is_degenerate(&self) -> bool {
        self.degenerate
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.values.nrows()
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.values.ncols()
    }

    /// `(height, width)`.
    pub fn dims(&self) -> (usize, usize) {
        self.values.dim()
    }

    /// Largest value.
    pub fn max(&self) -> f32 {
        self.values.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    /// Smallest value.
    pub fn min(&self) -> f32 {
        self.values.iter().copied().fold(f32::INFINITY, f32::min)
    }

    /// Borrow the values.
    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.values.view()
    }

    /// Consume and return the values.
    pub fn into_array(self) -> Array2<f32> {
        self.values
    }
}
