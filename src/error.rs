//! Error types for outline extraction and overlap resolution.

use thiserror::Error;

/// Errors that can occur while extracting, resolving or refining outlines.
///
/// An empty mask is not an error: tracing returns an empty vector and
/// [`crate::filter::extract`] returns `None`, so batch callers can skip the
/// object.
#[derive(Debug, Error)]
pub enum OutlineError {
    /// Requested output encoding is not one of `polygon`, `mask`, `coordinates`.
    #[error("invalid return type '{0}', expected one of: polygon, mask, coordinates")]
    InvalidReturnType(String),

    /// A boolean operation produced an unusable geometry.
    #[error("degenerate geometry: {details}")]
    DegenerateGeometry {
        /// Description of what went wrong.
        details: String,
    },

    /// Raster buffer does not match the stated dimensions.
    #[error("invalid shape: {details}")]
    InvalidShape {
        /// Description of the mismatch.
        details: String,
    },

    /// No refiner is registered under the requested name.
    #[error("unknown refiner '{0}'")]
    UnknownRefiner(String),

    /// The boundary refiner failed for one object.
    #[error("refiner '{refiner}' failed: {details}")]
    Refinement {
        /// Name of the refiner.
        refiner: String,
        /// Failure description reported by the refiner.
        details: String,
    },

    /// The boundary refiner overran its deadline.
    #[error("refiner '{refiner}' exceeded its deadline ({elapsed_ms} ms)")]
    RefinementTimeout {
        /// Name of the refiner.
        refiner: String,
        /// Time spent in the call.
        elapsed_ms: u128,
    },

    /// Configuration file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed.
    #[error("failed to parse config: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result type for outline operations.
pub type Result<T> = std::result::Result<T, OutlineError>;
