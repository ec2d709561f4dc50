//! WebAssembly exports for Polymask.
//!
//! These functions are exposed to JavaScript via wasm-bindgen.
//!
//! ## Data Layout
//!
//! - **Masks**: flat row-major `u8` arrays (length = width * height)
//! - **Polygons**: one flat `f64` array holding every exterior ring, each
//!   prefixed by its point count: `[n, x0, y0, ..., x(n-1), y(n-1), n', ...]`
//!
//! Holes are not carried across the flat-array boundary.

use wasm_bindgen::prelude::*;

use crate::error::OutlineError;
use crate::filter::{extract, FilteredOutput, ReturnType, SelectionMode, ShapeFilter};
use crate::geometry::Outline;
use crate::overlap::OverlapResolver;
use crate::raster::{mask_to_polygons, Connectivity, RasterMask};

fn js_error(err: OutlineError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn connectivity(count: u8) -> Result<Connectivity, JsValue> {
    Connectivity::from_count(count)
        .ok_or_else(|| JsValue::from_str(&format!("connectivity must be 4 or 8, got {count}")))
}

fn pack_rings<'a>(outlines: impl IntoIterator<Item = &'a Outline>) -> Vec<f64> {
    let mut packed = Vec::new();
    for outline in outlines {
        let ring = outline.coordinates();
        packed.push(ring.len() as f64);
        packed.extend(ring.into_iter().flatten());
    }
    packed
}

fn unpack_rings(packed: &[f64]) -> Result<Vec<Vec<[f64; 2]>>, &'static str> {
    let mut rings = Vec::new();
    let mut cursor = 0;
    while cursor < packed.len() {
        let count = packed[cursor] as usize;
        let start = cursor + 1;
        let end = count
            .checked_mul(2)
            .and_then(|n| n.checked_add(start))
            .filter(|&end| end <= packed.len())
            .ok_or("ring point count exceeds buffer length")?;
        rings.push(
            packed[start..end]
                .chunks_exact(2)
                .map(|xy| [xy[0], xy[1]])
                .collect(),
        );
        cursor = end;
    }
    Ok(rings)
}

// ============================================================================
// Tracing
// ============================================================================

/// Trace every connected region of a mask.
///
/// # Arguments
/// * `data` - Flat mask bytes (length = width * height)
/// * `width` - Mask width in pixels
/// * `height` - Mask height in pixels
/// * `connectivity` - 4 or 8
///
/// # Returns
/// Packed exterior rings, one per region
#[wasm_bindgen]
pub fn trace_mask_wasm(
    data: &[u8],
    width: usize,
    height: usize,
    connectivity: u8,
) -> Result<Vec<f64>, JsValue> {
    let mask = RasterMask::from_shape_vec(height, width, data.to_vec()).map_err(js_error)?;
    let outlines = mask_to_polygons(&mask, self::connectivity(connectivity)?);
    Ok(pack_rings(&outlines))
}

// ============================================================================
// Cleaning
// ============================================================================

/// Clean a mask: keep the dominant region(s), drop specks and small holes.
///
/// # Arguments
/// * `data` - Flat mask bytes (length = width * height)
/// * `width` - Mask width in pixels
/// * `height` - Mask height in pixels
/// * `store_single` - Keep only the largest region
/// * `hole_area_threshold` - Holes at or below this area are filled; negative fills all holes
/// * `min_area` - Regions below this area are dropped
///
/// # Returns
/// Flat cleaned mask (0 / 255); all zeros when nothing survives
#[wasm_bindgen]
pub fn clean_mask_wasm(
    data: &[u8],
    width: usize,
    height: usize,
    store_single: bool,
    hole_area_threshold: f64,
    min_area: f64,
) -> Result<Vec<u8>, JsValue> {
    let mask = RasterMask::from_shape_vec(height, width, data.to_vec()).map_err(js_error)?;
    let mode = if store_single {
        SelectionMode::SingleLargest
    } else {
        SelectionMode::RelativeThreshold
    };
    let threshold = (hole_area_threshold >= 0.0).then_some(hole_area_threshold);
    let filter = ShapeFilter::default()
        .with_mode(mode)
        .with_hole_area_threshold(threshold)
        .with_min_area(min_area);

    match extract(&mask, &filter, Connectivity::Four, ReturnType::Mask).map_err(js_error)? {
        Some(FilteredOutput::Mask(cleaned)) => Ok(cleaned.into_array().into_raw_vec_and_offset().0),
        _ => Ok(vec![0; width * height]),
    }
}

// ============================================================================
// Overlap Resolution
// ============================================================================

/// Make exterior rings pairwise disjoint.
///
/// # Arguments
/// * `rings` - Packed exterior rings
///
/// # Returns
/// Packed resolved rings; a split polygon yields several rings
#[wasm_bindgen]
pub fn resolve_overlaps_wasm(rings: &[f64]) -> Result<Vec<f64>, JsValue> {
    let outlines: Vec<Outline> = unpack_rings(rings)
        .map_err(JsValue::from_str)?
        .iter()
        .map(|ring| Outline::new(ring, &[]))
        .collect();
    Ok(pack_rings(&OverlapResolver::default().resolve(&outlines)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpack_rings() {
        let packed = [3.0, 0.0, 0.0, 4.0, 0.0, 4.0, 3.0, 1.0, 9.0, 9.0];
        let rings = unpack_rings(&packed).unwrap();
        assert_eq!(rings.len(), 2);
        assert_eq!(rings[0], vec![[0.0, 0.0], [4.0, 0.0], [4.0, 3.0]]);
        assert_eq!(rings[1], vec![[9.0, 9.0]]);
    }

    #[test]
    fn test_unpack_rings_rejects_bad_counts() {
        assert!(unpack_rings(&[5.0, 1.0, 2.0]).is_err());
        assert!(unpack_rings(&[f64::MAX, 1.0, 2.0]).is_err());
        assert!(unpack_rings(&[1e300, 0.0]).is_err());
    }

    #[test]
    fn test_pack_rings_prefixes_counts() {
        let packed = pack_rings(&[Outline::rect(0.0, 0.0, 2.0, 1.0)]);
        assert_eq!(packed[0], 5.0);
        assert_eq!(packed.len(), 11);
        assert_eq!(unpack_rings(&packed).unwrap()[0].len(), 5);
    }
}
