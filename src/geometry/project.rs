//! Mapping from crop-local coordinates into the shared image frame.

/// Translate crop-local points into the shared frame.
///
/// The crop was extended upward by `pad` rows before masking, so the Y axis
/// subtracts it back out: `(x, y) -> (x + origin_x, y + origin_y - pad)`.
/// No clamping is applied.
pub fn project(points: &[[f64; 2]], origin_x: f64, origin_y: f64, pad: f64) -> Vec<[f64; 2]> {
    let dy = origin_y - pad;
    points.iter().map(|&[x, y]| [x + origin_x, y + dy]).collect()
}

/// Crop window cut from the full image for one detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropWindow {
    pub x_min: usize,
    pub y_start: usize,
    pub x_max: usize,
    pub y_max: usize,
    /// Rows actually added above the box; smaller than the requested pad
    /// when the box sits near the top edge.
    pub pad: usize,
}

impl CropWindow {
    /// Window for a `(x_min, y_min, x_max, y_max)` box extended upward by `pad`.
    pub fn from_bbox(bbox: (usize, usize, usize, usize), pad: usize) -> Self {
        let (x_min, y_min, x_max, y_max) = bbox;
        let y_start = y_min.saturating_sub(pad);
        Self {
            x_min,
            y_start,
            x_max,
            y_max,
            pad: y_min - y_start,
        }
    }

    pub fn width(&self) -> usize {
        self.x_max.saturating_sub(self.x_min)
    }

    pub fn height(&self) -> usize {
        self.y_max.saturating_sub(self.y_start)
    }

    /// Origin to pass to [`project`] together with `self.pad`.
    pub fn origin(&self) -> (f64, f64) {
        (self.x_min as f64, (self.y_start + self.pad) as f64)
    }
}
