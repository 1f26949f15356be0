//! Error types for mdgrid-core.

use thiserror::Error;

/// Result type alias for mdgrid operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for mdgrid operations.
///
/// Consistency errors (`ImageGeometryMismatch`, `NoReader`) signal that the
/// program fell out of sync with itself and the operation cannot proceed.
/// The remaining variants are caller-contract violations raised at the point
/// of misuse. Soft conditions (a selection index past the bin count, a buffer
/// request past the dataset size) clamp silently and never surface here.
#[derive(Error, Debug)]
pub enum Error {
    /// Cell array length disagrees with the geometry extent.
    ///
    /// Internal-consistency failure: the image and its geometry description
    /// fell out of sync. Never recoverable.
    #[error("image holds {cells} cells but geometry extent is {extent}")]
    ImageGeometryMismatch {
        /// Number of cells in the flat array.
        cells: usize,
        /// Product of the geometry's bin counts.
        extent: usize,
    },

    /// Cell storage accessed before `initialize` ran.
    #[error("image data has not been allocated")]
    NotAllocated,

    /// Selection carries more entries than the geometry has dimensions.
    #[error("selection has {selection} entries but geometry has {dims} dimensions")]
    SelectionTooLong {
        /// Number of selection entries supplied.
        selection: usize,
        /// Number of geometry dimensions.
        dims: usize,
    },

    /// Geometry description exceeds the supported dimension count.
    #[error("geometry has {requested} dimensions, maximum is {max}")]
    TooManyDimensions {
        /// Dimensions requested.
        requested: usize,
        /// Supported maximum.
        max: usize,
    },

    /// Geometry description carries no dimensions.
    #[error("geometry description is empty")]
    EmptyGeometry,

    /// Two dimensions in one geometry share an id.
    #[error("duplicate dimension id: {0}")]
    DuplicateDimension(String),

    /// Dimension with zero bins.
    #[error("dimension {0} has zero bins")]
    ZeroBins(String),

    /// A geometry dimension id is missing from the declared point columns.
    #[error("geometry dimension {0} has no matching point column")]
    MissingColumn(String),

    /// Pixel read requested with no reader configured.
    #[error("no pixel reader configured")]
    NoReader,

    /// Role dimension id absent from the geometry.
    #[error("no mapping found for dimension id: {0}")]
    UnknownDimension(String),

    /// Role assignment does not reduce to a slot permutation.
    #[error("cannot bind axis roles: {0}")]
    CannotBind(String),

    /// Geometry referenced by a proxy was dropped.
    #[error("geometry was dropped before proxy resolution")]
    GeometryDropped,

    /// Failure reported by a pixel reader.
    #[error("pixel read failed: {0}")]
    ReadError(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}
