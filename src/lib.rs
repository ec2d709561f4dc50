//! Polymask
//!
//! Turns per-object segmentation masks into clean polygon outlines and makes
//! outlines from independently processed crops mutually exclusive.
//!
//! ## Pipeline
//! - **raster**: mask ↔ outline conversion (boundary tracing, scanline fill)
//! - **filter**: satellite blob, minimum area and hole cleanup
//! - **geometry**: outline type and crop-to-image projection
//! - **overlap**: area-precedence overlap resolution
//! - **pipeline**: per-object extraction, refinement and two resolution passes
//!
//! ## Coordinates
//! Pixel `(x, y)` covers the unit square `[x, x + 1] × [y, y + 1]`, with Y
//! growing downward. Masks are `(height, width)` arrays of `u8`; any value
//! above zero is foreground and produced masks use 0 / 255.
//!
//! Python bindings (PyO3) and WASM bindings are available behind the
//! `python` and `wasm` features.

pub mod error;
pub mod filter;
pub mod geometry;
pub mod overlap;
pub mod pipeline;
pub mod raster;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use error::{OutlineError, Result};
pub use filter::{extract, FilteredOutput, ReturnType, SelectionMode, ShapeFilter};
pub use geometry::{CropWindow, Outline};
pub use overlap::{OverlapResolver, ResolvedSet};
pub use pipeline::{ObjectCrop, PipelineConfig, PipelineReport, RefinementPipeline};
pub use raster::{mask_to_polygons, polygons_to_mask, Connectivity, RasterMask};

// Python bindings (only when python feature is enabled)
#[cfg(feature = "python")]
mod python {
    use numpy::{IntoPyArray, PyArray2, PyReadonlyArray2};
    use pyo3::exceptions::PyValueError;
    use pyo3::prelude::*;

    use crate::error::OutlineError;
    use crate::filter::{
        self, FilteredOutput, ReturnType, SelectionMode, ShapeFilter, MIN_AREA,
        RELATIVE_AREA_CUTOFF,
    };
    use crate::geometry::{Outline, AREA_EPSILON};
    use crate::overlap::OverlapResolver;
    use crate::raster::{self, Connectivity, RasterMask};

    /// `(exterior, holes)` with every ring a list of `[x, y]` points.
    type PyPolygon = (Vec<[f64; 2]>, Vec<Vec<[f64; 2]>>);

    fn value_error(err: OutlineError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }

    fn connectivity(count: u8) -> PyResult<Connectivity> {
        Connectivity::from_count(count).ok_or_else(|| {
            PyValueError::new_err(format!("connectivity must be 4 or 8, got {count}"))
        })
    }

    fn to_py_polygon(outline: &Outline) -> PyPolygon {
        (outline.coordinates(), outline.holes())
    }

    fn shape_filter(
        store_single: bool,
        hole_area_threshold: Option<f64>,
        min_area: f64,
        relative_area_cutoff: f64,
    ) -> ShapeFilter {
        ShapeFilter {
            mode: if store_single {
                SelectionMode::SingleLargest
            } else {
                SelectionMode::RelativeThreshold
            },
            relative_area_cutoff,
            min_area,
            hole_area_threshold,
        }
    }

    fn output_to_py(py: Python<'_>, output: FilteredOutput) -> PyResult<PyObject> {
        Ok(match output {
            FilteredOutput::Polygons(outlines) => outlines
                .iter()
                .map(to_py_polygon)
                .collect::<Vec<_>>()
                .into_pyobject(py)?
                .into_any()
                .unbind(),
            FilteredOutput::Coordinates(rings) => rings
                .into_iter()
                .map(|ring| ring.into_pyarray(py))
                .collect::<Vec<_>>()
                .into_pyobject(py)?
                .into_any()
                .unbind(),
            FilteredOutput::Mask(mask) => mask.into_array().into_pyarray(py).into_any().unbind(),
        })
    }

    // ========================================================================
    // Tracing
    // ========================================================================

    /// Trace every connected region of a mask.
    ///
    /// Returns a list of `(exterior, holes)` tuples in pixel-edge coordinates.
    #[pyfunction]
    #[pyo3(signature = (mask, connectivity=4))]
    pub fn mask_to_polygons(
        mask: PyReadonlyArray2<'_, u8>,
        connectivity: u8,
    ) -> PyResult<Vec<PyPolygon>> {
        let mask = RasterMask::new(mask.as_array().to_owned());
        let outlines = raster::mask_to_polygons(&mask, self::connectivity(connectivity)?);
        Ok(outlines.iter().map(to_py_polygon).collect())
    }

    // ========================================================================
    // Cleaning
    // ========================================================================

    /// Clean a mask: keep the dominant region(s), drop specks and small holes.
    ///
    /// Returns `None` when the mask has no foreground.
    #[pyfunction]
    #[pyo3(signature = (
        mask,
        store_single=true,
        hole_area_threshold=None,
        min_area=MIN_AREA,
        relative_area_cutoff=RELATIVE_AREA_CUTOFF,
        connectivity=4
    ))]
    pub fn clean_mask<'py>(
        py: Python<'py>,
        mask: PyReadonlyArray2<'py, u8>,
        store_single: bool,
        hole_area_threshold: Option<f64>,
        min_area: f64,
        relative_area_cutoff: f64,
        connectivity: u8,
    ) -> PyResult<Option<Bound<'py, PyArray2<u8>>>> {
        let mask = RasterMask::new(mask.as_array().to_owned());
        let filter =
            shape_filter(store_single, hole_area_threshold, min_area, relative_area_cutoff);
        let connectivity = self::connectivity(connectivity)?;
        let output = filter::extract(&mask, &filter, connectivity, ReturnType::Mask)
            .map_err(value_error)?;
        Ok(match output {
            Some(FilteredOutput::Mask(cleaned)) => Some(cleaned.into_array().into_pyarray(py)),
            _ => None,
        })
    }

    /// Clean a mask and return its outlines.
    ///
    /// `return_type` selects the encoding: `"polygon"` gives `(exterior, holes)`
    /// tuples, `"coordinates"` gives `(N, 2)` int64 exterior arrays and
    /// `"mask"` gives a cleaned uint8 mask.
    #[pyfunction]
    #[pyo3(signature = (
        mask,
        return_type="polygon",
        store_single=true,
        hole_area_threshold=None,
        min_area=MIN_AREA,
        relative_area_cutoff=RELATIVE_AREA_CUTOFF,
        connectivity=4
    ))]
    pub fn clean_outlines(
        py: Python<'_>,
        mask: PyReadonlyArray2<'_, u8>,
        return_type: &str,
        store_single: bool,
        hole_area_threshold: Option<f64>,
        min_area: f64,
        relative_area_cutoff: f64,
        connectivity: u8,
    ) -> PyResult<Option<PyObject>> {
        let return_type: ReturnType = return_type.parse().map_err(value_error)?;
        let mask = RasterMask::new(mask.as_array().to_owned());
        let filter =
            shape_filter(store_single, hole_area_threshold, min_area, relative_area_cutoff);
        let connectivity = self::connectivity(connectivity)?;
        let output =
            filter::extract(&mask, &filter, connectivity, return_type).map_err(value_error)?;
        output.map(|output| output_to_py(py, output)).transpose()
    }

    // ========================================================================
    // Overlap Resolution
    // ========================================================================

    /// Make a list of `(exterior, holes)` polygons pairwise disjoint.
    ///
    /// The smaller polygon of every overlapping pair keeps the shared area.
    #[pyfunction]
    #[pyo3(signature = (polygons, tolerance=AREA_EPSILON))]
    pub fn resolve_overlaps(polygons: Vec<PyPolygon>, tolerance: f64) -> Vec<PyPolygon> {
        let outlines: Vec<Outline> = polygons
            .iter()
            .map(|(exterior, holes)| Outline::new(exterior, holes))
            .collect();
        OverlapResolver::new(tolerance)
            .resolve(&outlines)
            .iter()
            .map(to_py_polygon)
            .collect()
    }

    /// Polymask Python module
    #[pymodule]
    pub fn polymask(m: &Bound<'_, PyModule>) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(mask_to_polygons, m)?)?;
        m.add_function(wrap_pyfunction!(clean_mask, m)?)?;
        m.add_function(wrap_pyfunction!(clean_outlines, m)?)?;
        m.add_function(wrap_pyfunction!(resolve_overlaps, m)?)?;
        Ok(())
    }
}

#[cfg(feature = "python")]
pub use python::polymask;
