//! Mask to polygon conversion.
//!
//! Foreground regions are labelled with a breadth-first flood fill, then the
//! pixel sides facing background are chained into closed rings. Exteriors come
//! out with positive signed area in image coordinates (y down), holes with
//! negative signed area, so each ring can be classified without a separate
//! containment test.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::RasterMask;
use crate::geometry::Outline;

/// Pixel connectivity used to group foreground pixels into regions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    /// Side neighbours only.
    #[default]
    Four,
    /// Side and corner neighbours.
    Eight,
}

impl Connectivity {
    /// Parse a neighbour count (`4` or `8`).
    pub fn from_count(count: u8) -> Option<Self> {
        match count {
            4 => Some(Connectivity::Four),
            8 => Some(Connectivity::Eight),
            _ => None,
        }
    }

    fn neighbours(self) -> &'static [(i64, i64)] {
        const FOUR: [(i64, i64); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
        const EIGHT: [(i64, i64); 8] = [
            (-1, 0),
            (1, 0),
            (0, -1),
            (0, 1),
            (-1, -1),
            (1, -1),
            (-1, 1),
            (1, 1),
        ];
        match self {
            Connectivity::Four => &FOUR,
            Connectivity::Eight => &EIGHT,
        }
    }
}

type Vertex = (i64, i64);

/// A unit-length pixel side, directed so the region lies on its right (y down).
#[derive(Clone, Copy, Debug)]
struct Edge {
    from: Vertex,
    to: Vertex,
}

impl Edge {
    fn new(from: Vertex, to: Vertex) -> Self {
        Self { from, to }
    }

    fn direction(&self) -> Vertex {
        (self.to.0 - self.from.0, self.to.1 - self.from.1)
    }
}

/// Extract one outline per connected foreground region.
///
/// Holes are emitted as interior rings. An all-background mask yields an
/// empty vector: nothing was detected.
pub fn mask_to_polygons(mask: &RasterMask, connectivity: Connectivity) -> Vec<Outline> {
    let (labels, count) = label_components(mask, connectivity);
    if count == 0 {
        return Vec::new();
    }

    let edges = collect_edges(mask, &labels, count);
    let mut outlines = Vec::with_capacity(count);

    for component_edges in &edges {
        let rings = chain_rings(component_edges, connectivity);
        outlines.extend(assemble(rings));
    }

    debug!(
        regions = count,
        outlines = outlines.len(),
        "traced mask {}x{}",
        mask.width(),
        mask.height()
    );
    outlines
}

/// Label foreground regions; label 0 is background, regions are `1..=count`
/// in scan order of their first pixel.
fn label_components(mask: &RasterMask, connectivity: Connectivity) -> (Vec<u32>, usize) {
    let (width, height) = (mask.width(), mask.height());
    let mut labels = vec![0u32; width * height];
    let mut count = 0u32;
    let mut queue = VecDeque::new();

    for y in 0..height {
        for x in 0..width {
            if labels[y * width + x] != 0 || !mask.is_foreground(x as i64, y as i64) {
                continue;
            }

            count += 1;
            labels[y * width + x] = count;
            queue.push_back((x as i64, y as i64));

            while let Some((cx, cy)) = queue.pop_front() {
                for &(dx, dy) in connectivity.neighbours() {
                    let (nx, ny) = (cx + dx, cy + dy);
                    if !mask.is_foreground(nx, ny) {
                        continue;
                    }
                    let idx = ny as usize * width + nx as usize;
                    if labels[idx] == 0 {
                        labels[idx] = count;
                        queue.push_back((nx, ny));
                    }
                }
            }
        }
    }

    (labels, count as usize)
}

/// Boundary edges grouped by region (index `label - 1`).
fn collect_edges(mask: &RasterMask, labels: &[u32], count: usize) -> Vec<Vec<Edge>> {
    let width = mask.width();
    let mut edges = vec![Vec::new(); count];

    for (idx, &label) in labels.iter().enumerate() {
        if label == 0 {
            continue;
        }
        let x = (idx % width) as i64;
        let y = (idx / width) as i64;
        let region = &mut edges[label as usize - 1];

        if !mask.is_foreground(x, y - 1) {
            region.push(Edge::new((x, y), (x + 1, y)));
        }
        if !mask.is_foreground(x + 1, y) {
            region.push(Edge::new((x + 1, y), (x + 1, y + 1)));
        }
        if !mask.is_foreground(x, y + 1) {
            region.push(Edge::new((x + 1, y + 1), (x, y + 1)));
        }
        if !mask.is_foreground(x - 1, y) {
            region.push(Edge::new((x, y + 1), (x, y)));
        }
    }

    edges
}

/// Follow edges into closed rings of corner vertices.
///
/// At a vertex where two diagonal pixels of the region meet there are two
/// outgoing edges. Four-connectivity turns right there, keeping the diagonal
/// pixels apart; eight-connectivity turns left, joining them. Each incoming
/// edge then has exactly one successor, so the edges split into disjoint
/// cycles.
fn chain_rings(edges: &[Edge], connectivity: Connectivity) -> Vec<Vec<Vertex>> {
    let mut outgoing: HashMap<Vertex, Vec<usize>> = HashMap::with_capacity(edges.len());
    for (i, edge) in edges.iter().enumerate() {
        outgoing.entry(edge.from).or_default().push(i);
    }

    let mut used = vec![false; edges.len()];
    let mut rings = Vec::new();

    for start in 0..edges.len() {
        if used[start] {
            continue;
        }
        used[start] = true;

        let mut ring = vec![edges[start].from];
        let mut current = start;

        loop {
            let next = match successor(edges, &outgoing, current, connectivity) {
                Some(next) => next,
                None => break,
            };
            if next == start {
                break;
            }
            used[next] = true;
            ring.push(edges[next].from);
            current = next;
        }

        rings.push(drop_collinear(ring));
    }

    rings
}

fn successor(
    edges: &[Edge],
    outgoing: &HashMap<Vertex, Vec<usize>>,
    current: usize,
    connectivity: Connectivity,
) -> Option<usize> {
    let candidates = outgoing.get(&edges[current].to)?;
    if candidates.len() == 1 {
        return Some(candidates[0]);
    }

    let (dx, dy) = edges[current].direction();
    let right = (-dy, dx);
    let left = (dy, -dx);
    let preference = match connectivity {
        Connectivity::Four => [right, (dx, dy), left],
        Connectivity::Eight => [left, (dx, dy), right],
    };

    preference.iter().find_map(|&turn| {
        candidates
            .iter()
            .copied()
            .find(|&i| edges[i].direction() == turn)
    })
}

/// Remove vertices in the middle of straight runs.
fn drop_collinear(ring: Vec<Vertex>) -> Vec<Vertex> {
    let n = ring.len();
    if n < 3 {
        return ring;
    }

    let step = |a: Vertex, b: Vertex| ((b.0 - a.0).signum(), (b.1 - a.1).signum());

    (0..n)
        .filter(|&i| {
            let prev = ring[(i + n - 1) % n];
            let next = ring[(i + 1) % n];
            step(prev, ring[i]) != step(ring[i], next)
        })
        .map(|i| ring[i])
        .collect()
}

fn signed_area(ring: &[Vertex]) -> i64 {
    let n = ring.len();
    let twice: i64 = (0..n)
        .map(|i| {
            let (x0, y0) = ring[i];
            let (x1, y1) = ring[(i + 1) % n];
            x0 * y1 - x1 * y0
        })
        .sum();
    twice / 2
}

fn to_points(ring: &[Vertex]) -> Vec<[f64; 2]> {
    ring.iter().map(|&(x, y)| [x as f64, y as f64]).collect()
}

/// Turn one region's rings into outlines: the largest positive ring is the
/// exterior, negative rings are its holes.
fn assemble(rings: Vec<Vec<Vertex>>) -> Vec<Outline> {
    let mut exteriors = Vec::new();
    let mut holes = Vec::new();

    for ring in rings {
        let area = signed_area(&ring);
        if area > 0 {
            exteriors.push((area, ring));
        } else if area < 0 {
            holes.push(to_points(&ring));
        }
    }

    exteriors.sort_by(|a, b| b.0.cmp(&a.0));
    let mut exteriors = exteriors.into_iter();

    let mut outlines = Vec::new();
    if let Some((_, ring)) = exteriors.next() {
        outlines.push(Outline::new(&to_points(&ring), &holes));
    }
    outlines.extend(exteriors.map(|(_, ring)| Outline::new(&to_points(&ring), &[])));
    outlines
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array2;

    fn mask_with(
        height: usize,
        width: usize,
        rects: &[(usize, usize, usize, usize)],
    ) -> RasterMask {
        let mut data = Array2::<u8>::zeros((height, width));
        for &(x0, y0, x1, y1) in rects {
            for y in y0..y1 {
                for x in x0..x1 {
                    data[[y, x]] = 255;
                }
            }
        }
        RasterMask::new(data)
    }

    #[test]
    fn test_connectivity_from_count() {
        assert_eq!(Connectivity::from_count(4), Some(Connectivity::Four));
        assert_eq!(Connectivity::from_count(8), Some(Connectivity::Eight));
        assert_eq!(Connectivity::from_count(6), None);
    }

    #[test]
    fn test_empty_mask() {
        let mask = RasterMask::zeros(10, 10);
        assert!(mask_to_polygons(&mask, Connectivity::Four).is_empty());
    }

    #[test]
    fn test_single_pixel() {
        let mask = mask_with(5, 5, &[(2, 2, 3, 3)]);
        let outlines = mask_to_polygons(&mask, Connectivity::Four);
        assert_eq!(outlines.len(), 1);
        assert_relative_eq!(outlines[0].area(), 1.0);
        assert_eq!(outlines[0].coordinates()[0], [2.0, 2.0]);
    }

    #[test]
    fn test_rectangle_corners_only() {
        let mask = mask_with(10, 10, &[(3, 2, 7, 5)]);
        let outlines = mask_to_polygons(&mask, Connectivity::Four);
        assert_eq!(outlines.len(), 1);
        assert_relative_eq!(outlines[0].area(), 12.0);
        // Four corners plus the closing point.
        assert_eq!(outlines[0].coordinates().len(), 5);
        assert_eq!(outlines[0].hole_count(), 0);
    }

    #[test]
    fn test_full_mask_touches_border() {
        let mask = RasterMask::new(Array2::from_elem((6, 8), 1u8));
        let outlines = mask_to_polygons(&mask, Connectivity::Four);
        assert_eq!(outlines.len(), 1);
        assert_relative_eq!(outlines[0].area(), 48.0);
    }

    #[test]
    fn test_hole_becomes_interior_ring() {
        let mut data = Array2::<u8>::from_elem((10, 10), 255);
        for y in 3..6 {
            for x in 4..6 {
                data[[y, x]] = 0;
            }
        }
        let outlines = mask_to_polygons(&RasterMask::new(data), Connectivity::Four);
        assert_eq!(outlines.len(), 1);
        assert_eq!(outlines[0].hole_count(), 1);
        assert_relative_eq!(outlines[0].hole_areas()[0], 6.0);
        assert_relative_eq!(outlines[0].area(), 94.0);
    }

    #[test]
    fn test_separate_regions() {
        let mask = mask_with(20, 20, &[(0, 0, 5, 5), (10, 10, 12, 13)]);
        let outlines = mask_to_polygons(&mask, Connectivity::Four);
        assert_eq!(outlines.len(), 2);
        assert_relative_eq!(outlines[0].area(), 25.0);
        assert_relative_eq!(outlines[1].area(), 6.0);
    }

    #[test]
    fn test_diagonal_pixels_depend_on_connectivity() {
        let mask = mask_with(4, 4, &[(0, 0, 1, 1), (1, 1, 2, 2)]);

        let four = mask_to_polygons(&mask, Connectivity::Four);
        assert_eq!(four.len(), 2);

        let eight = mask_to_polygons(&mask, Connectivity::Eight);
        assert_eq!(eight.len(), 1);
        assert_relative_eq!(eight[0].area(), 2.0);
    }

    #[test]
    fn test_pinched_region_keeps_area() {
        // Two blocks joined by a bar, with a diagonal pinch between
        // (2, 1) and (3, 2).
        let mask = mask_with(6, 6, &[(0, 0, 3, 2), (3, 2, 6, 4), (0, 2, 1, 4), (0, 4, 6, 5)]);
        let expected = mask.foreground_count() as f64;
        for connectivity in [Connectivity::Four, Connectivity::Eight] {
            let outlines = mask_to_polygons(&mask, connectivity);
            let total: f64 = outlines.iter().map(|o| o.area()).sum();
            assert_eq!(outlines.len(), 1);
            assert_relative_eq!(total, expected);
        }
    }

    #[test]
    fn test_island_inside_hole() {
        let mut data = Array2::<u8>::from_elem((12, 12), 255);
        for y in 2..10 {
            for x in 2..10 {
                data[[y, x]] = 0;
            }
        }
        for y in 5..7 {
            for x in 5..7 {
                data[[y, x]] = 255;
            }
        }
        let outlines = mask_to_polygons(&RasterMask::new(data), Connectivity::Four);
        assert_eq!(outlines.len(), 2);
        assert_eq!(outlines[0].hole_count(), 1);
        assert_relative_eq!(outlines[0].area(), 144.0 - 64.0);
        assert_relative_eq!(outlines[1].area(), 4.0);
    }
}
