//! Noise removal for traced outlines.
//!
//! Drops satellite blobs, sub-threshold regions and insignificant holes, then
//! encodes the survivors in the form the caller asked for:
//!
//! | Return type | Output | Holes |
//! |-------------|--------|-------|
//! | `polygon` | [`Outline`] values | kept |
//! | `coordinates` | `(N, 2)` `i64` exterior rings | dropped |
//! | `mask` | 0 / 255 raster | kept |

use std::fmt;
use std::str::FromStr;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{OutlineError, Result};
use crate::geometry::Outline;
use crate::raster::{mask_to_polygons, polygons_to_mask, Connectivity, RasterMask};

/// Default fraction of the largest area a region must exceed to survive.
pub const RELATIVE_AREA_CUTOFF: f64 = 0.005;

/// Default absolute floor below which a region is always noise.
pub const MIN_AREA: f64 = 1000.0;

/// How to choose among the regions found in one mask.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionMode {
    /// Keep only the region with the largest area.
    #[default]
    SingleLargest,
    /// Keep every region above a fraction of the largest area.
    RelativeThreshold,
}

/// Output encoding for filtered outlines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnType {
    #[default]
    Polygon,
    Mask,
    Coordinates,
}

impl FromStr for ReturnType {
    type Err = OutlineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "polygon" => Ok(ReturnType::Polygon),
            "mask" => Ok(ReturnType::Mask),
            "coordinates" => Ok(ReturnType::Coordinates),
            other => Err(OutlineError::InvalidReturnType(other.to_string())),
        }
    }
}

impl fmt::Display for ReturnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReturnType::Polygon => "polygon",
            ReturnType::Mask => "mask",
            ReturnType::Coordinates => "coordinates",
        };
        f.write_str(name)
    }
}

/// Filtered outlines in the requested encoding.
#[derive(Clone, Debug, PartialEq)]
pub enum FilteredOutput {
    Polygons(Vec<Outline>),
    Coordinates(Vec<Array2<i64>>),
    Mask(RasterMask),
}

impl FilteredOutput {
    /// Encode outlines; `height` and `width` size the mask encoding.
    pub fn encode(
        outlines: Vec<Outline>,
        return_type: ReturnType,
        height: usize,
        width: usize,
    ) -> Result<Self> {
        match return_type {
            ReturnType::Polygon => Ok(FilteredOutput::Polygons(outlines)),
            ReturnType::Coordinates => {
                let dropped: usize = outlines.iter().map(Outline::hole_count).sum();
                if dropped > 0 {
                    warn!(holes = dropped, "coordinate encoding drops interior rings");
                }
                Ok(FilteredOutput::Coordinates(
                    outlines.iter().map(Outline::exterior_array).collect(),
                ))
            }
            ReturnType::Mask => {
                polygons_to_mask(&outlines, height, width).map(FilteredOutput::Mask)
            }
        }
    }
}

/// Area-based noise filter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeFilter {
    pub mode: SelectionMode,
    /// Regions with `area / max_area` at or below this are dropped
    /// ([`SelectionMode::RelativeThreshold`] only).
    pub relative_area_cutoff: f64,
    /// Regions with area below this are dropped.
    pub min_area: f64,
    /// Holes are kept only when their area exceeds this; `None` fills all holes.
    pub hole_area_threshold: Option<f64>,
}

impl Default for ShapeFilter {
    fn default() -> Self {
        Self {
            mode: SelectionMode::SingleLargest,
            relative_area_cutoff: RELATIVE_AREA_CUTOFF,
            min_area: MIN_AREA,
            hole_area_threshold: None,
        }
    }
}

impl ShapeFilter {
    pub fn with_mode(mut self, mode: SelectionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_hole_area_threshold(mut self, threshold: Option<f64>) -> Self {
        self.hole_area_threshold = threshold;
        self
    }

    pub fn with_min_area(mut self, min_area: f64) -> Self {
        self.min_area = min_area;
        self
    }

    /// Select, floor and de-hole the candidate outlines.
    pub fn apply(&self, candidates: Vec<Outline>) -> Vec<Outline> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let areas: Vec<f64> = candidates.iter().map(Outline::area).collect();
        let max_area = areas.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let selected: Vec<Outline> = match self.mode {
            SelectionMode::SingleLargest => {
                let largest = areas.iter().position(|&a| a == max_area).unwrap_or(0);
                candidates.into_iter().nth(largest).into_iter().collect()
            }
            SelectionMode::RelativeThreshold => candidates
                .into_iter()
                .zip(&areas)
                .filter(|&(_, &area)| area / max_area > self.relative_area_cutoff)
                .map(|(outline, _)| outline)
                .collect(),
        };

        let selected_count = selected.len();
        let kept: Vec<Outline> = selected
            .into_iter()
            .filter(|outline| outline.area() >= self.min_area)
            .map(|outline| match self.hole_area_threshold {
                Some(threshold) => outline.retain_holes(|area| area > threshold),
                None => outline.retain_holes(|_| false),
            })
            .collect();

        debug!(
            candidates = areas.len(),
            selected = selected_count,
            kept = kept.len(),
            "shape filter"
        );
        kept
    }
}

/// Trace a mask, filter the regions and encode the result.
///
/// Returns `Ok(None)` when the mask has no foreground: nothing was detected.
/// The mask encoding uses the input mask's dimensions.
pub fn extract(
    mask: &RasterMask,
    filter: &ShapeFilter,
    connectivity: Connectivity,
    return_type: ReturnType,
) -> Result<Option<FilteredOutput>> {
    let traced = mask_to_polygons(mask, connectivity);
    if traced.is_empty() {
        return Ok(None);
    }

    let kept = filter.apply(traced);
    FilteredOutput::encode(kept, return_type, mask.height(), mask.width()).map(Some)
}
