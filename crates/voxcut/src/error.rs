//! Structured error types for shape construction, grid operations and the
//! kernel registry.

use thiserror::Error;

/// Errors that can occur while constructing or validating a [`crate::shape::Shape`].
#[derive(Debug, Error)]
pub enum ShapeError {
    #[error("cylinder radius must be positive, got {radius}")]
    NonPositiveCylinderRadius { radius: f32 },

    #[error("cylinder height must be positive, got {height}")]
    NonPositiveCylinderHeight { height: f32 },

    #[error("ELH radius must be positive, got {radius}")]
    NonPositiveElhRadius { radius: f32 },

    #[error("box half-extents must all be positive, got {half_extents:?}")]
    NonPositiveBoxHalfExtents { half_extents: [f32; 3] },

    /// The box's three half-axes (derived from its rotation) are not
    /// mutually orthogonal. Unreachable through [`crate::shape::OrientedBox::new`],
    /// whose half-axes are always orthogonal by construction (they come
    /// from a [`nalgebra::UnitQuaternion`] rotation matrix), but kept as a
    /// distinct error for any future constructor that takes half-axes
    /// directly.
    #[error("box half-axes must be mutually orthogonal")]
    NonOrthogonalBoxHalfAxes,

    #[error("shape axis direction must be nonzero")]
    ZeroAxisDirection,

    #[error("ELH axis and elongation directions must be perpendicular")]
    NonPerpendicularElhAxis,
}

/// Errors that can occur while constructing or operating on a host or device
/// grid.
#[derive(Debug, Error)]
pub enum GridError {
    #[error("grid resolution must be positive, got {res}")]
    NonPositiveResolution { res: f32 },

    #[error("grid dimensions must all be nonzero, got {num_x}x{num_y}x{num_z}")]
    ZeroDimension { num_x: u32, num_y: u32, num_z: u32 },

    #[error(
        "grid dimensions {num_x}x{num_y}x{num_z} ({n_cells} cells) don't match buffer of {n_values} values"
    )]
    DimensionMismatch {
        num_x: u32,
        num_y: u32,
        num_z: u32,
        n_cells: usize,
        n_values: usize,
    },

    #[error("cell index {index} is out of bounds ({ix},{iy},{iz}) for grid {num_x}x{num_y}x{num_z}")]
    IndexOutOfBounds {
        index: usize,
        ix: i64,
        iy: i64,
        iz: i64,
        num_x: u32,
        num_y: u32,
        num_z: u32,
    },

    #[error("source and destination grids have incompatible metadata for copy")]
    IncompatibleCopy,

    #[error("device grid was already destroyed")]
    AlreadyDestroyed,

    #[error("failed to read device grid back to the host: {source}")]
    Readback {
        #[source]
        source: anyhow::Error,
    },
}

/// Errors that can occur while registering or dispatching a compute kernel.
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("no kernel is registered under the name `{name}`")]
    NotFound { name: String },

    #[error("a kernel is already registered under the name `{name}`")]
    AlreadyRegistered { name: String },

    #[error("kernel `{name}` expects element type `{expected}` but got `{actual}`")]
    ElementTypeMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("kernel `{name}` cannot be dispatched over grids of different shape")]
    ShapeMismatch { name: String },

    #[error("kernel `{name}` was given an already-destroyed device grid")]
    DestroyedGrid { name: String },

    #[error("failed to build GPU pipeline for kernel `{name}`: {source}")]
    PipelineBuild {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to read back result of kernel `{name}`: {source}")]
    Readback {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}
