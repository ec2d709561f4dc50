//! Pipeline configuration.
//!
//! All knobs live in one serde-deserializable struct so a run can be
//! described by a JSON file:
//!
//! ```json
//! {
//!   "return_type": "polygon",
//!   "store_single": true,
//!   "hole_area_threshold": 100.0,
//!   "refiner": "simplify",
//!   "refine_deadline_ms": 500
//! }
//! ```
//!
//! Missing fields take their defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::filter::{ReturnType, SelectionMode, ShapeFilter, MIN_AREA, RELATIVE_AREA_CUTOFF};
use crate::geometry::AREA_EPSILON;
use crate::overlap::OverlapResolver;
use crate::raster::Connectivity;

/// Default rows added above each detection box before masking.
pub const DEFAULT_PAD: usize = 50;

/// Default Douglas-Peucker tolerance of the `simplify` refiner, in pixels.
pub const DEFAULT_SIMPLIFY_TOLERANCE: f64 = 1.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Encoding used by [`super::PipelineReport::render`].
    pub return_type: ReturnType,
    /// Keep only the largest region per object instead of every region
    /// above `relative_area_cutoff`.
    pub store_single: bool,
    pub relative_area_cutoff: f64,
    pub min_area: f64,
    /// `None` fills every hole.
    pub hole_area_threshold: Option<f64>,
    pub pad: usize,
    pub connectivity: Connectivity,
    pub overlap_tolerance: f64,
    /// Name of the boundary refiner looked up in the registry.
    pub refiner: String,
    pub simplify_tolerance: f64,
    /// Refinement calls taking longer than this are discarded.
    ///
    /// Checked once the call returns: it limits which results are accepted,
    /// not how long a single call may block the run.
    pub refine_deadline_ms: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            return_type: ReturnType::Polygon,
            store_single: true,
            relative_area_cutoff: RELATIVE_AREA_CUTOFF,
            min_area: MIN_AREA,
            hole_area_threshold: None,
            pad: DEFAULT_PAD,
            connectivity: Connectivity::Four,
            overlap_tolerance: AREA_EPSILON,
            refiner: "identity".to_string(),
            simplify_tolerance: DEFAULT_SIMPLIFY_TOLERANCE,
            refine_deadline_ms: None,
        }
    }
}

impl PipelineConfig {
    pub fn shape_filter(&self) -> ShapeFilter {
        ShapeFilter {
            mode: if self.store_single {
                SelectionMode::SingleLargest
            } else {
                SelectionMode::RelativeThreshold
            },
            relative_area_cutoff: self.relative_area_cutoff,
            min_area: self.min_area,
            hole_area_threshold: self.hole_area_threshold,
        }
    }

    pub fn resolver(&self) -> OverlapResolver {
        OverlapResolver::new(self.overlap_tolerance)
    }

    pub fn refine_deadline(&self) -> Option<Duration> {
        self.refine_deadline_ms.map(Duration::from_millis)
    }
}

/// Read a [`PipelineConfig`] from a JSON file.
pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    let contents = fs::read_to_string(path)?;
    let config = serde_json::from_str(&contents)?;
    Ok(config)
}
