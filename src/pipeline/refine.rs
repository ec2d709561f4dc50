//! Boundary refinement strategies.
//!
//! A refiner receives the full intensity image and one outline in the shared
//! frame and returns zero, one or many refined fragments. Strategies are
//! registered by name and picked when the pipeline is built.
//!
//! Built-ins:
//! - **identity**: returns the outline unchanged
//! - **simplify**: Douglas-Peucker simplification of every ring

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use ndarray::ArrayView2;

use crate::error::{OutlineError, Result};
use crate::geometry::Outline;

use super::config::DEFAULT_SIMPLIFY_TOLERANCE;

/// Edge refinement applied to each resolved outline.
///
/// Implementations report failures as [`OutlineError::Refinement`]; the
/// pipeline drops that outline's contribution and carries on.
pub trait BoundaryRefiner: Send + Sync {
    fn name(&self) -> &str;

    fn refine(&self, image: ArrayView2<'_, f32>, outline: &Outline) -> Result<Vec<Outline>>;
}

/// Passes outlines through untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityRefiner;

impl BoundaryRefiner for IdentityRefiner {
    fn name(&self) -> &str {
        "identity"
    }

    fn refine(&self, _image: ArrayView2<'_, f32>, outline: &Outline) -> Result<Vec<Outline>> {
        Ok(vec![outline.clone()])
    }
}

/// Straightens pixel staircases with Douglas-Peucker.
#[derive(Clone, Copy, Debug)]
pub struct SimplifyRefiner {
    pub tolerance: f64,
}

impl Default for SimplifyRefiner {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_SIMPLIFY_TOLERANCE,
        }
    }
}

impl BoundaryRefiner for SimplifyRefiner {
    fn name(&self) -> &str {
        "simplify"
    }

    fn refine(&self, _image: ArrayView2<'_, f32>, outline: &Outline) -> Result<Vec<Outline>> {
        let exterior = simplify_closed(&outline.coordinates(), self.tolerance);
        if exterior.len() < 4 {
            return Ok(Vec::new());
        }

        let holes: Vec<Vec<[f64; 2]>> = outline
            .holes()
            .iter()
            .map(|hole| simplify_closed(hole, self.tolerance))
            .filter(|hole| hole.len() >= 4)
            .collect();

        let simplified = Outline::new(&exterior, &holes);
        if simplified.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![simplified])
    }
}

fn distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
}

/// Perpendicular distance from `p` to the segment `start..end`.
fn distance_to_segment(p: [f64; 2], start: [f64; 2], end: [f64; 2]) -> f64 {
    let dx = end[0] - start[0];
    let dy = end[1] - start[1];
    let length_sq = dx * dx + dy * dy;

    if length_sq < 1e-12 {
        return distance(p, start);
    }

    let t = (((p[0] - start[0]) * dx + (p[1] - start[1]) * dy) / length_sq).clamp(0.0, 1.0);
    distance(p, [start[0] + t * dx, start[1] + t * dy])
}

fn douglas_peucker(points: &[[f64; 2]], epsilon: f64) -> Vec<[f64; 2]> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let first = points[0];
    let last = points[points.len() - 1];

    let (max_idx, max_dist) = points
        .iter()
        .enumerate()
        .skip(1)
        .take(points.len() - 2)
        .map(|(i, &p)| (i, distance_to_segment(p, first, last)))
        .fold((0, 0.0), |best, cur| if cur.1 > best.1 { cur } else { best });

    if max_dist > epsilon {
        let mut left = douglas_peucker(&points[..=max_idx], epsilon);
        let right = douglas_peucker(&points[max_idx..], epsilon);
        left.pop();
        left.extend(right);
        left
    } else {
        vec![first, last]
    }
}

/// Simplify a closed ring; the result is closed (first == last).
///
/// The ring is split at the vertex farthest from its start so that the
/// fixed endpoints of the recursion sit on two distinct corners.
fn simplify_closed(ring: &[[f64; 2]], epsilon: f64) -> Vec<[f64; 2]> {
    let mut open: Vec<[f64; 2]> = ring.to_vec();
    if open.len() > 1 && open.first() == open.last() {
        open.pop();
    }
    if open.len() < 4 {
        let mut closed = open;
        if let Some(&first) = closed.first() {
            closed.push(first);
        }
        return closed;
    }

    let far = (1..open.len())
        .max_by(|&a, &b| distance(open[0], open[a]).total_cmp(&distance(open[0], open[b])))
        .unwrap_or(1);

    let mut first_half = douglas_peucker(&open[..=far], epsilon);
    let mut second_half: Vec<[f64; 2]> = open[far..].to_vec();
    second_half.push(open[0]);
    let second_half = douglas_peucker(&second_half, epsilon);

    first_half.pop();
    first_half.extend(second_half);
    first_half
}

/// Named set of refiners.
#[derive(Clone, Default)]
pub struct RefinerRegistry {
    refiners: BTreeMap<String, Arc<dyn BoundaryRefiner>>,
}

impl fmt::Debug for RefinerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefinerRegistry")
            .field("refiners", &self.names())
            .finish()
    }
}

impl RefinerRegistry {
    /// Registry holding `identity` and `simplify`.
    pub fn with_builtins(simplify_tolerance: f64) -> Self {
        let mut registry = Self::default();
        registry.register(Arc::new(IdentityRefiner));
        registry.register(Arc::new(SimplifyRefiner {
            tolerance: simplify_tolerance,
        }));
        registry
    }

    /// Add a refiner under its own name, replacing any previous entry.
    pub fn register(&mut self, refiner: Arc<dyn BoundaryRefiner>) {
        self.refiners.insert(refiner.name().to_string(), refiner);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn BoundaryRefiner>> {
        self.refiners
            .get(name)
            .cloned()
            .ok_or_else(|| OutlineError::UnknownRefiner(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.refiners.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array2;

    fn staircase() -> Outline {
        // 20x20 square whose top edge has a one-pixel notch run.
        Outline::new(
            &[
                [0.0, 0.0],
                [5.0, 0.0],
                [5.0, 0.5],
                [6.0, 0.5],
                [6.0, 0.0],
                [20.0, 0.0],
                [20.0, 20.0],
                [0.0, 20.0],
            ],
            &[],
        )
    }

    #[test]
    fn test_identity() {
        let image = Array2::<f32>::zeros((4, 4));
        let outline = Outline::rect(0.0, 0.0, 2.0, 2.0);
        let out = IdentityRefiner.refine(image.view(), &outline).unwrap();
        assert_eq!(out, vec![outline]);
    }

    #[test]
    fn test_simplify_removes_small_notch() {
        let image = Array2::<f32>::zeros((4, 4));
        let out = SimplifyRefiner { tolerance: 1.0 }
            .refine(image.view(), &staircase())
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].coordinates().len(), 5);
        assert_relative_eq!(out[0].area(), 400.0);
    }

    #[test]
    fn test_simplify_keeps_corners() {
        let ring = Outline::rect(0.0, 0.0, 10.0, 10.0).coordinates();
        let simplified = simplify_closed(&ring, 0.5);
        assert_eq!(simplified.len(), 5);
        assert_eq!(simplified.first(), simplified.last());
    }

    #[test]
    fn test_simplify_collapses_sliver() {
        let image = Array2::<f32>::zeros((4, 4));
        let sliver = Outline::rect(0.0, 0.0, 50.0, 0.2);
        let out = SimplifyRefiner { tolerance: 1.0 }
            .refine(image.view(), &sliver)
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_point_to_segment_distance() {
        assert_relative_eq!(distance_to_segment([1.0, 1.0], [0.0, 0.0], [2.0, 0.0]), 1.0);
        assert_relative_eq!(distance_to_segment([3.0, 0.0], [0.0, 0.0], [2.0, 0.0]), 1.0);
    }

    #[test]
    fn test_registry_lookup() {
        let registry = RefinerRegistry::with_builtins(2.0);
        assert_eq!(registry.names(), vec!["identity", "simplify"]);
        assert_eq!(registry.get("simplify").unwrap().name(), "simplify");
        let err = registry.get("anomaly-v3").err().unwrap();
        assert!(matches!(err, OutlineError::UnknownRefiner(ref name) if name == "anomaly-v3"));
    }
}
