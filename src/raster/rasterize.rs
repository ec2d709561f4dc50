//! Polygon to mask conversion.
//!
//! Scanline fill at pixel centres: pixel `(x, y)` is set when the point
//! `(x + 0.5, y + 0.5)` lies inside an outline under the even-odd rule, which
//! gives exterior-minus-holes semantics without treating holes specially.
//! Outlines are combined by union. Rows are filled in parallel.

use rayon::prelude::*;

use super::{RasterMask, FOREGROUND};
use crate::error::Result;
use crate::geometry::Outline;

/// Ring segments of one outline plus its vertical extent.
struct Segments {
    edges: Vec<([f64; 2], [f64; 2])>,
    min_y: f64,
    max_y: f64,
}

impl Segments {
    fn from_outline(outline: &Outline) -> Self {
        let mut edges = Vec::new();
        let mut min_y = f64::INFINITY;
        let mut max_y = f64::NEG_INFINITY;

        let rings = std::iter::once(outline.coordinates()).chain(outline.holes());
        for ring in rings {
            for pair in ring.windows(2) {
                edges.push((pair[0], pair[1]));
                min_y = min_y.min(pair[0][1]);
                max_y = max_y.max(pair[0][1]);
            }
        }

        Self { edges, min_y, max_y }
    }

    /// X positions where the horizontal line at `y` crosses a ring, sorted.
    fn crossings(&self, y: f64) -> Vec<f64> {
        let mut xs: Vec<f64> = self
            .edges
            .iter()
            .filter(|([_, y0], [_, y1])| (*y0 <= y) != (*y1 <= y))
            .map(|([x0, y0], [x1, y1])| x0 + (y - y0) * (x1 - x0) / (y1 - y0))
            .collect();
        xs.sort_by(f64::total_cmp);
        xs
    }
}

/// Rasterize outlines into a `(height, width)` mask of 0 / 255.
pub fn polygons_to_mask(outlines: &[Outline], height: usize, width: usize) -> Result<RasterMask> {
    let mut data = vec![0u8; height * width];

    if width > 0 {
        let shapes: Vec<Segments> = outlines.iter().map(Segments::from_outline).collect();

        data.par_chunks_mut(width).enumerate().for_each(|(y, row)| {
            let yc = y as f64 + 0.5;
            for shape in &shapes {
                if yc < shape.min_y || yc > shape.max_y {
                    continue;
                }
                for span in shape.crossings(yc).chunks_exact(2) {
                    let start = (span[0] - 0.5).ceil().clamp(0.0, width as f64) as usize;
                    let end = (span[1] - 0.5).ceil().clamp(0.0, width as f64) as usize;
                    for pixel in &mut row[start..end.max(start)] {
                        *pixel = FOREGROUND;
                    }
                }
            }
        });
    }

    RasterMask::from_shape_vec(height, width, data)
}
