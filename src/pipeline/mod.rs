//! End-to-end refinement pipeline.
//!
//! Per detected object: trace its crop mask, filter noise, and project the
//! surviving outlines into the shared frame. Then, across all objects:
//!
//! 1. resolve overlaps between the projected outlines,
//! 2. refine each resolved outline with the configured [`BoundaryRefiner`],
//! 3. flatten all fragments and resolve overlaps again.
//!
//! Per-object extraction has no cross-object dependency and runs on the rayon
//! pool; both resolution passes wait for every object of their phase.

pub mod config;
pub mod refine;

pub use config::{load_config, PipelineConfig, DEFAULT_PAD};
pub use refine::{BoundaryRefiner, IdentityRefiner, RefinerRegistry, SimplifyRefiner};

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use ndarray::ArrayView2;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::{OutlineError, Result};
use crate::filter::{FilteredOutput, ReturnType};
use crate::geometry::{CropWindow, Outline};
use crate::overlap::ResolvedSet;
use crate::raster::{mask_to_polygons, RasterMask};

/// Mask of one detected object and where its crop sits in the full image.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectCrop {
    pub mask: RasterMask,
    pub origin_x: f64,
    pub origin_y: f64,
    /// Rows the crop was extended upward by before masking.
    pub pad: f64,
}

impl ObjectCrop {
    pub fn new(mask: RasterMask, origin_x: f64, origin_y: f64, pad: f64) -> Self {
        Self {
            mask,
            origin_x,
            origin_y,
            pad,
        }
    }

    /// Crop whose origin and pad come from a [`CropWindow`].
    pub fn from_window(mask: RasterMask, window: &CropWindow) -> Self {
        let (origin_x, origin_y) = window.origin();
        Self::new(mask, origin_x, origin_y, window.pad as f64)
    }
}

/// Points at which the inspector callback is invoked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Projected outlines of all objects, before any resolution.
    Extracted,
    /// After the first overlap resolution pass.
    FirstPass,
    /// All refined fragments, flattened.
    Refined,
    /// After the second overlap resolution pass.
    Final,
}

/// A resolved outline whose refinement failed and was dropped.
#[derive(Debug)]
pub struct RefinementFailure {
    /// Position of the outline in the first-pass result.
    pub index: usize,
    pub error: OutlineError,
}

/// Outcome of [`RefinementPipeline::run`].
#[derive(Debug)]
pub struct PipelineReport {
    pub resolved: ResolvedSet,
    /// Encoding used by [`PipelineReport::render`], taken from the config.
    pub return_type: ReturnType,
    /// Objects whose mask produced no outline after filtering.
    pub empty_objects: Vec<usize>,
    pub failures: Vec<RefinementFailure>,
}

impl PipelineReport {
    /// Encode the final set in the configured encoding; `height` and `width`
    /// size the mask encoding.
    pub fn render(&self, height: usize, width: usize) -> Result<FilteredOutput> {
        self.resolved.render(self.return_type, height, width)
    }

    /// Encode the final set in an explicit encoding.
    pub fn render_as(
        &self,
        return_type: ReturnType,
        height: usize,
        width: usize,
    ) -> Result<FilteredOutput> {
        self.resolved.render(return_type, height, width)
    }
}

type Inspector = Box<dyn Fn(Stage, &[Outline]) + Send + Sync>;

/// Extraction, projection, resolution and refinement for a batch of objects.
pub struct RefinementPipeline {
    config: PipelineConfig,
    refiner: Arc<dyn BoundaryRefiner>,
    inspector: Option<Inspector>,
}

impl fmt::Debug for RefinementPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefinementPipeline")
            .field("config", &self.config)
            .field("refiner", &self.refiner.name())
            .field("inspector", &self.inspector.is_some())
            .finish()
    }
}

impl RefinementPipeline {
    /// Build with the built-in refiners, selecting `config.refiner`.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let registry = RefinerRegistry::with_builtins(config.simplify_tolerance);
        Self::from_registry(config, &registry)
    }

    /// Build selecting `config.refiner` from `registry`.
    pub fn from_registry(config: PipelineConfig, registry: &RefinerRegistry) -> Result<Self> {
        let refiner = registry.get(&config.refiner)?;
        Ok(Self::with_refiner(config, refiner))
    }

    /// Build with an explicit refiner; `config.refiner` is ignored.
    pub fn with_refiner(config: PipelineConfig, refiner: Arc<dyn BoundaryRefiner>) -> Self {
        Self {
            config,
            refiner,
            inspector: None,
        }
    }

    /// Install a callback that sees the outline set after every [`Stage`].
    pub fn with_inspector<F>(mut self, inspector: F) -> Self
    where
        F: Fn(Stage, &[Outline]) + Send + Sync + 'static,
    {
        self.inspector = Some(Box::new(inspector));
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn refiner_name(&self) -> &str {
        self.refiner.name()
    }

    /// Crop window for a `(x_min, y_min, x_max, y_max)` detection box.
    pub fn crop_window(&self, bbox: (usize, usize, usize, usize)) -> CropWindow {
        CropWindow::from_bbox(bbox, self.config.pad)
    }

    /// Trace, filter and project one object's mask.
    pub fn extract_object(&self, object: &ObjectCrop) -> Vec<Outline> {
        let traced = mask_to_polygons(&object.mask, self.config.connectivity);
        self.config
            .shape_filter()
            .apply(traced)
            .iter()
            .map(|outline| outline.project(object.origin_x, object.origin_y, object.pad))
            .collect()
    }

    /// Run the full pipeline over `objects`; `image` is handed to the refiner.
    pub fn run(&self, image: ArrayView2<'_, f32>, objects: &[ObjectCrop]) -> PipelineReport {
        let started = Instant::now();
        let resolver = self.config.resolver();

        let extracted: Vec<Vec<Outline>> = objects
            .par_iter()
            .map(|object| self.extract_object(object))
            .collect();

        let empty_objects: Vec<usize> = extracted
            .iter()
            .enumerate()
            .filter(|(_, outlines)| outlines.is_empty())
            .map(|(index, _)| index)
            .collect();
        if !empty_objects.is_empty() {
            debug!(?empty_objects, "objects without outlines");
        }

        let initial: Vec<Outline> = extracted.into_iter().flatten().collect();
        self.inspect(Stage::Extracted, &initial);

        let first_pass = resolver.resolve(&initial);
        self.inspect(Stage::FirstPass, first_pass.outlines());

        let mut fragments = Vec::new();
        let mut failures = Vec::new();
        for (index, outline) in first_pass.iter().enumerate() {
            if outline.area() < self.config.min_area {
                debug!(index, area = outline.area(), "skipping refinement of small outline");
                continue;
            }
            match self.refine_one(image, outline) {
                Ok(refined) => fragments.extend(refined.into_iter().filter(|f| !f.is_empty())),
                Err(error) => {
                    warn!(index, %error, "dropping outline after refinement failure");
                    failures.push(RefinementFailure { index, error });
                }
            }
        }
        self.inspect(Stage::Refined, &fragments);

        let resolved = resolver.resolve(&fragments);
        self.inspect(Stage::Final, resolved.outlines());

        info!(
            objects = objects.len(),
            outlines = resolved.len(),
            failures = failures.len(),
            refiner = self.refiner.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "pipeline finished"
        );

        PipelineReport {
            resolved,
            return_type: self.config.return_type,
            empty_objects,
            failures,
        }
    }

    /// Refine one outline, enforcing the configured deadline.
    ///
    /// The call itself cannot be interrupted; a call that overruns has its
    /// result discarded.
    fn refine_one(&self, image: ArrayView2<'_, f32>, outline: &Outline) -> Result<Vec<Outline>> {
        let started = Instant::now();
        let refined = self.refiner.refine(image, outline);
        let elapsed = started.elapsed();

        if let Some(deadline) = self.config.refine_deadline() {
            if elapsed > deadline {
                return Err(OutlineError::RefinementTimeout {
                    refiner: self.refiner.name().to_string(),
                    elapsed_ms: elapsed.as_millis(),
                });
            }
        }
        refined
    }

    fn inspect(&self, stage: Stage, outlines: &[Outline]) {
        if let Some(inspector) = &self.inspector {
            inspector(stage, outlines);
        }
    }
}
