//! Polygon value type used throughout the pipeline.
//!
//! [`Outline`] wraps a `geo::Polygon<f64>` and exposes only what extraction and
//! overlap resolution need. Every operation returns a new value; nothing is
//! mutated in place, so outlines can be compared pairwise while the working
//! set is being rewritten.

use std::panic::{self, AssertUnwindSafe};

use geo::{
    Area, BooleanOps, BoundingRect, Coord, CoordsIter, Intersects, LineString, MultiPolygon,
    Polygon,
};
use ndarray::Array2;

use super::project::project;
use crate::error::{OutlineError, Result};

/// Areas at or below this value are treated as zero.
pub const AREA_EPSILON: f64 = 1e-6;

/// A closed exterior ring with zero or more holes.
#[derive(Clone, Debug, PartialEq)]
pub struct Outline {
    polygon: Polygon<f64>,
}

/// Result of subtracting one outline from another.
#[derive(Clone, Debug, PartialEq)]
pub enum Carved {
    /// Nothing is left.
    Empty,
    /// One connected piece is left.
    Single(Outline),
    /// The subtraction split the outline into disjoint pieces.
    Multi(Vec<Outline>),
}

impl Carved {
    fn from_multi(result: MultiPolygon<f64>) -> Self {
        let mut pieces: Vec<Outline> = result
            .into_iter()
            .map(Outline::from_polygon)
            .filter(|piece| piece.area() > AREA_EPSILON)
            .collect();

        match pieces.len() {
            0 => Carved::Empty,
            1 => Carved::Single(pieces.remove(0)),
            _ => Carved::Multi(pieces),
        }
    }

    /// Total area of what is left.
    pub fn area(&self) -> f64 {
        match self {
            Carved::Empty => 0.0,
            Carved::Single(outline) => outline.area(),
            Carved::Multi(pieces) => pieces.iter().map(Outline::area).sum(),
        }
    }

    /// Flatten into a list of pieces (empty for [`Carved::Empty`]).
    pub fn into_outlines(self) -> Vec<Outline> {
        match self {
            Carved::Empty => Vec::new(),
            Carved::Single(outline) => vec![outline],
            Carved::Multi(pieces) => pieces,
        }
    }
}

fn ring_from_points(points: &[[f64; 2]]) -> LineString<f64> {
    LineString::new(points.iter().map(|&[x, y]| Coord { x, y }).collect())
}

fn ring_to_points(ring: &LineString<f64>) -> Vec<[f64; 2]> {
    ring.coords().map(|c| [c.x, c.y]).collect()
}

fn ring_area(ring: &LineString<f64>) -> f64 {
    Polygon::new(ring.clone(), Vec::new()).unsigned_area()
}

fn all_finite(geometry: &MultiPolygon<f64>) -> bool {
    geometry
        .coords_iter()
        .all(|c| c.x.is_finite() && c.y.is_finite())
}

fn check_finite(a: &Outline, b: &Outline) -> Result<()> {
    if a.is_finite() && b.is_finite() {
        Ok(())
    } else {
        Err(OutlineError::DegenerateGeometry {
            details: "operand has non-finite coordinates".to_string(),
        })
    }
}

impl Outline {
    /// Build an outline from an exterior ring and hole rings.
    ///
    /// Rings are closed automatically if the last point differs from the first.
    pub fn new(exterior: &[[f64; 2]], holes: &[Vec<[f64; 2]>]) -> Self {
        let interiors = holes.iter().map(|hole| ring_from_points(hole)).collect();
        Self {
            polygon: Polygon::new(ring_from_points(exterior), interiors),
        }
    }

    /// Axis-aligned rectangle spanning `[min_x, max_x] × [min_y, max_y]`.
    pub fn rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self::new(
            &[
                [min_x, min_y],
                [max_x, min_y],
                [max_x, max_y],
                [min_x, max_y],
            ],
            &[],
        )
    }

    pub fn from_polygon(polygon: Polygon<f64>) -> Self {
        Self { polygon }
    }

    pub fn as_polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }

    pub fn into_polygon(self) -> Polygon<f64> {
        self.polygon
    }

    /// Filled area: exterior minus holes.
    pub fn area(&self) -> f64 {
        self.polygon.unsigned_area()
    }

    /// True if the outline encloses no area.
    pub fn is_empty(&self) -> bool {
        self.polygon.exterior().0.len() < 4 || self.area() <= AREA_EPSILON
    }

    /// Exterior ring points, closing point included.
    pub fn coordinates(&self) -> Vec<[f64; 2]> {
        ring_to_points(self.polygon.exterior())
    }

    /// Hole rings, closing points included.
    pub fn holes(&self) -> Vec<Vec<[f64; 2]>> {
        self.polygon.interiors().iter().map(ring_to_points).collect()
    }

    pub fn hole_count(&self) -> usize {
        self.polygon.interiors().len()
    }

    /// Enclosed area of each hole ring, in ring order.
    pub fn hole_areas(&self) -> Vec<f64> {
        self.polygon.interiors().iter().map(ring_area).collect()
    }

    /// Rebuild the outline keeping only holes whose enclosed area passes `keep`.
    pub fn retain_holes<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(f64) -> bool,
    {
        let interiors = self
            .polygon
            .interiors()
            .iter()
            .filter(|ring| keep(ring_area(ring)))
            .cloned()
            .collect();
        Self {
            polygon: Polygon::new(self.polygon.exterior().clone(), interiors),
        }
    }

    /// Exterior ring as an `(N, 2)` integer array, truncated toward zero.
    ///
    /// Holes are not part of this encoding.
    pub fn exterior_array(&self) -> Array2<i64> {
        let points = self.coordinates();
        let mut array = Array2::<i64>::zeros((points.len(), 2));
        for (row, [x, y]) in points.into_iter().enumerate() {
            array[[row, 0]] = x as i64;
            array[[row, 1]] = y as i64;
        }
        array
    }

    /// Translate from a crop frame into the shared frame.
    ///
    /// Applies [`project`] to the exterior and every hole.
    pub fn project(&self, origin_x: f64, origin_y: f64, pad: f64) -> Self {
        let holes: Vec<Vec<[f64; 2]>> = self
            .holes()
            .iter()
            .map(|hole| project(hole, origin_x, origin_y, pad))
            .collect();
        Self::new(&project(&self.coordinates(), origin_x, origin_y, pad), &holes)
    }

    /// True if every vertex of every ring is finite.
    pub fn is_finite(&self) -> bool {
        self.polygon
            .coords_iter()
            .all(|c| c.x.is_finite() && c.y.is_finite())
    }

    /// Whether the bounding boxes of the two outlines touch.
    pub fn bounds_touch(&self, other: &Outline) -> bool {
        match (self.polygon.bounding_rect(), other.polygon.bounding_rect()) {
            (Some(a), Some(b)) => a.intersects(&b),
            _ => false,
        }
    }

    /// Area of the intersection of the two outlines.
    ///
    /// Fails with [`OutlineError::DegenerateGeometry`] when either operand has
    /// a non-finite vertex or the clipping backend fails.
    pub fn overlap_area(&self, other: &Outline) -> Result<f64> {
        check_finite(self, other)?;
        if !self.bounds_touch(other) {
            return Ok(0.0);
        }

        let shared = panic::catch_unwind(AssertUnwindSafe(|| {
            self.polygon.intersection(&other.polygon)
        }))
        .map_err(|_| OutlineError::DegenerateGeometry {
            details: "intersection panicked in the clipping backend".to_string(),
        })?;

        if !all_finite(&shared) {
            return Err(OutlineError::DegenerateGeometry {
                details: "intersection produced non-finite coordinates".to_string(),
            });
        }

        Ok(shared.unsigned_area())
    }

    /// Whether the outlines share more than [`AREA_EPSILON`] of area.
    ///
    /// Touching boundaries and degenerate intersections count as no overlap.
    pub fn intersects(&self, other: &Outline) -> bool {
        matches!(self.overlap_area(other), Ok(area) if area > AREA_EPSILON)
    }

    /// Subtract `other` from `self`.
    ///
    /// Fails with [`OutlineError::DegenerateGeometry`] when an operand is not
    /// finite, the clipping backend panics or emits non-finite coordinates, or
    /// the result has more area than `self`.
    pub fn difference(&self, other: &Outline) -> Result<Carved> {
        check_finite(self, other)?;
        let rest = panic::catch_unwind(AssertUnwindSafe(|| {
            self.polygon.difference(&other.polygon)
        }))
        .map_err(|_| OutlineError::DegenerateGeometry {
            details: "difference panicked in the clipping backend".to_string(),
        })?;

        if !all_finite(&rest) {
            return Err(OutlineError::DegenerateGeometry {
                details: "difference produced non-finite coordinates".to_string(),
            });
        }

        let before = self.area();
        let after = rest.unsigned_area();
        if after > before + AREA_EPSILON * before.max(1.0) {
            return Err(OutlineError::DegenerateGeometry {
                details: format!("difference grew area from {before:.3} to {after:.3}"),
            });
        }

        Ok(Carved::from_multi(rest))
    }
}
