//! Pairwise overlap resolution.
//!
//! Outlines computed independently per crop can overlap once they are placed
//! in the shared frame. [`OverlapResolver`] rewrites the set so that no two
//! members share area, using only area comparisons:
//!
//! ```text
//! for i in 0..N:
//!   for j in 0..i:
//!     if outline[i] and outline[j] overlap:
//!       the larger of the two has the smaller one carved out of it
//! ```
//!
//! The smaller outline keeps the contested region. Areas are re-read at every
//! comparison, so the result depends on input order. A subtraction that splits
//! an outline keeps the first piece in place and appends the rest; appended
//! pieces are compared against every earlier entry when the scan reaches them.
//!
//! # Example
//!
//! ```
//! use polymask::geometry::Outline;
//! use polymask::overlap::OverlapResolver;
//!
//! let big = Outline::rect(0.0, 0.0, 100.0, 100.0);
//! let small = Outline::rect(75.0, 75.0, 125.0, 125.0);
//! let resolved = OverlapResolver::default().resolve(&[big, small]);
//!
//! assert_eq!(resolved.len(), 2);
//! assert!((resolved.outlines()[0].area() - 9375.0).abs() < 1e-3);
//! assert!((resolved.outlines()[1].area() - 2500.0).abs() < 1e-3);
//! ```

use ndarray::Array2;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::filter::{FilteredOutput, ReturnType};
use crate::geometry::{Outline, AREA_EPSILON};
use crate::raster::{polygons_to_mask, RasterMask};

/// Area-precedence overlap resolver.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlapResolver {
    /// Intersections with area at or below this count as no overlap.
    pub tolerance: f64,
}

impl Default for OverlapResolver {
    fn default() -> Self {
        Self {
            tolerance: AREA_EPSILON,
        }
    }
}

impl OverlapResolver {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// Produce a pairwise-disjoint set from `outlines`.
    ///
    /// The input is not modified. Outlines consumed entirely by a smaller
    /// neighbour are dropped. Pairs whose boolean operation degenerates are
    /// left untouched and counted in [`ResolvedSet::skipped_pairs`].
    pub fn resolve(&self, outlines: &[Outline]) -> ResolvedSet {
        let mut work: Vec<Option<Outline>> = outlines
            .iter()
            .filter(|outline| !outline.is_empty())
            .cloned()
            .map(Some)
            .collect();
        let input_count = work.len();
        let input_area: f64 = work.iter().flatten().map(Outline::area).sum();
        let mut skipped_pairs = 0usize;
        let mut carves = 0usize;

        let mut i = 0;
        while i < work.len() {
            for j in 0..i {
                let (target, carved) = {
                    let (Some(a), Some(b)) = (work[i].as_ref(), work[j].as_ref()) else {
                        continue;
                    };

                    let overlap = match a.overlap_area(b) {
                        Ok(area) => area,
                        Err(err) => {
                            warn!(i, j, %err, "skipping pair: intersection failed");
                            skipped_pairs += 1;
                            continue;
                        }
                    };
                    if overlap <= self.tolerance {
                        continue;
                    }

                    let (area_a, area_b) = (a.area(), b.area());
                    let (target, minuend, subtrahend) = if area_a > area_b {
                        (i, a, b)
                    } else {
                        (j, b, a)
                    };
                    debug!(i, j, area_a, area_b, overlap, target, "carving overlap");
                    (target, minuend.difference(subtrahend))
                };

                match carved {
                    Ok(carved) => {
                        let mut pieces = carved.into_outlines().into_iter();
                        work[target] = pieces.next();
                        work.extend(pieces.map(Some));
                        carves += 1;
                    }
                    Err(err) => {
                        warn!(i, j, %err, "skipping pair: difference failed");
                        skipped_pairs += 1;
                    }
                }

                if work[i].is_none() {
                    break;
                }
            }
            i += 1;
        }

        let outlines: Vec<Outline> = work.into_iter().flatten().collect();
        let output_area: f64 = outlines.iter().map(Outline::area).sum();
        info!(
            input = input_count,
            output = outlines.len(),
            carves,
            skipped_pairs,
            input_area,
            output_area,
            "resolved overlaps"
        );

        ResolvedSet {
            outlines,
            skipped_pairs,
        }
    }
}

/// Outlines with no pairwise overlap above the resolver tolerance.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolvedSet {
    outlines: Vec<Outline>,
    skipped_pairs: usize,
}

impl ResolvedSet {
    pub fn outlines(&self) -> &[Outline] {
        &self.outlines
    }

    pub fn into_outlines(self) -> Vec<Outline> {
        self.outlines
    }

    pub fn len(&self) -> usize {
        self.outlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outlines.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Outline> {
        self.outlines.iter()
    }

    pub fn total_area(&self) -> f64 {
        self.outlines.iter().map(Outline::area).sum()
    }

    /// Pairs left unresolved because their boolean operation degenerated.
    pub fn skipped_pairs(&self) -> usize {
        self.skipped_pairs
    }

    /// Re-check every pair and report `(i, j, area)` for overlaps above `tolerance`.
    ///
    /// Empty unless a pair was skipped during resolution.
    pub fn residual_overlaps(&self, tolerance: f64) -> Vec<(usize, usize, f64)> {
        let mut residual = Vec::new();
        for i in 0..self.outlines.len() {
            for j in 0..i {
                if let Ok(area) = self.outlines[i].overlap_area(&self.outlines[j]) {
                    if area > tolerance {
                        residual.push((i, j, area));
                    }
                }
            }
        }
        residual
    }

    /// Exterior rings as `(N, 2)` integer arrays; holes are not included.
    pub fn coordinates(&self) -> Vec<Array2<i64>> {
        self.outlines.iter().map(Outline::exterior_array).collect()
    }

    /// Rasterize the set at the given resolution.
    pub fn to_mask(&self, height: usize, width: usize) -> Result<RasterMask> {
        polygons_to_mask(&self.outlines, height, width)
    }

    /// Encode the set; `height` and `width` size the mask encoding.
    pub fn render(
        &self,
        return_type: ReturnType,
        height: usize,
        width: usize,
    ) -> Result<FilteredOutput> {
        FilteredOutput::encode(self.outlines.clone(), return_type, height, width)
    }
}

impl<'a> IntoIterator for &'a ResolvedSet {
    type Item = &'a Outline;
    type IntoIter = std::slice::Iter<'a, Outline>;

    fn into_iter(self) -> Self::IntoIter {
        self.outlines.iter()
    }
}
