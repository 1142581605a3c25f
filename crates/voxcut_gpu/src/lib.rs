//! GPU primitives shared by the voxel/SDF compute core.
//!
//! This crate knows nothing about voxels, shapes or kernels; it is a thin,
//! reusable layer over `wgpu` providing device connection, byte-addressable
//! GPU buffers, bind-group-layout caching, and WGSL template resolution.

pub mod bind_group_layout;
pub mod buffer;
pub mod device;
pub mod shader_template;

pub use wgpu;
