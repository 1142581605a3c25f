//! Voxel grids, SDF shapes and GPU compute kernels for planning
//! subtractive-machining tool paths.
//!
//! [`shape`] describes the solids that can be rasterized into a grid.
//! [`grid`] and [`device_grid`] are the host- and device-resident grid
//! types; [`traversal`] is the block-hierarchical rasterizer they share.
//! [`kernel`] is the programmable map/map2/reduce dispatcher that the
//! derived operations in [`distance_field`] are built on, and [`copy`]
//! moves grid data between the host and the GPU.

pub mod copy;
pub mod device_grid;
pub mod distance_field;
pub mod error;
pub mod grid;
pub mod kernel;
pub mod shape;
pub mod traversal;
pub mod types;

pub use device_grid::DeviceGrid;
pub use distance_field::{AxisInterval, Boundary};
pub use error::{GridError, KernelError, ShapeError};
pub use grid::HostGrid;
pub use kernel::KernelRegistry;
pub use shape::{Cylinder, Elh, OrientedBox, RoundMode, Shape};
pub use types::{GridCell, GridMetadata};

pub use voxcut_gpu::device::GraphicsDevice;
