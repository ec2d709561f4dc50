//! Polygon geometry: the outline value type and frame projection.
//!
//! - **Outline**: exterior ring plus holes with side-effect-free boolean ops
//! - **Projection**: crop-local to shared-frame translation

pub mod outline;
pub mod project;

pub use outline::{Carved, Outline, AREA_EPSILON};
pub use project::{project, CropWindow};
