//! Binary raster masks and their conversion to and from outlines.
//!
//! - **Tracing**: connected-component boundary following along pixel edges
//! - **Rasterization**: scanline fill of outlines at pixel centres
//!
//! Coordinates are pixel indices with an identity transform: pixel `(x, y)`
//! covers the unit square `[x, x + 1] × [y, y + 1]`.

pub mod rasterize;
pub mod trace;

pub use rasterize::polygons_to_mask;
pub use trace::{mask_to_polygons, Connectivity};

use ndarray::{Array2, ArrayView2};

use crate::error::{OutlineError, Result};

/// Value written for foreground pixels.
pub const FOREGROUND: u8 = 255;

/// A `(height, width)` grid of `u8`; any value above zero is foreground.
#[derive(Clone, Debug, PartialEq)]
pub struct RasterMask {
    data: Array2<u8>,
}

impl RasterMask {
    pub fn new(data: Array2<u8>) -> Self {
        Self { data }
    }

    pub fn zeros(height: usize, width: usize) -> Self {
        Self {
            data: Array2::zeros((height, width)),
        }
    }

    /// Wrap a row-major buffer of `height * width` bytes.
    pub fn from_shape_vec(height: usize, width: usize, data: Vec<u8>) -> Result<Self> {
        let len = data.len();
        Array2::from_shape_vec((height, width), data)
            .map(Self::new)
            .map_err(|_| OutlineError::InvalidShape {
                details: format!("buffer of {len} bytes does not fit {height}x{width}"),
            })
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn view(&self) -> ArrayView2<'_, u8> {
        self.data.view()
    }

    pub fn into_array(self) -> Array2<u8> {
        self.data
    }

    /// Check if a pixel is foreground (treating out-of-bounds as background).
    #[inline]
    pub fn is_foreground(&self, x: i64, y: i64) -> bool {
        if x >= 0 && y >= 0 && (x as usize) < self.width() && (y as usize) < self.height() {
            self.data[[y as usize, x as usize]] > 0
        } else {
            false
        }
    }

    pub fn foreground_count(&self) -> usize {
        self.data.iter().filter(|&&v| v > 0).count()
    }
}

impl From<Array2<u8>> for RasterMask {
    fn from(data: Array2<u8>) -> Self {
        Self::new(data)
    }
}
