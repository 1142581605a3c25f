//! Device-resident (GPU-backed) voxel grids.

use crate::error::GridError;
use crate::types::{GridCell, GridMetadata};
use std::borrow::Cow;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use voxcut_gpu::buffer::{GPUBuffer, GPUBufferType};
use voxcut_gpu::device::GraphicsDevice;

/// A dense grid of cells of type `T` backed by a GPU storage buffer.
///
/// The buffer is mutated through `&self` (the mutation happens via queued
/// GPU commands, not direct memory writes), which lets the same
/// `&DeviceGrid` be bound as both the input and the output of a kernel
/// dispatch — see [`crate::kernel`] for how in-place dispatches detect and
/// handle this aliasing.
#[derive(Debug)]
pub struct DeviceGrid<T: GridCell> {
    metadata: GridMetadata,
    buffer: GPUBuffer,
    destroyed: AtomicBool,
    _cell: PhantomData<T>,
}

impl<T: GridCell> DeviceGrid<T> {
    /// Uploads a new device grid initialized from `cells`.
    ///
    /// # Errors
    /// Returns [`GridError::DimensionMismatch`] if `cells.len()` doesn't
    /// match `metadata.num_cells()`.
    pub fn new_initialized(
        graphics_device: &GraphicsDevice,
        metadata: GridMetadata,
        cells: &[T],
        label: impl Into<Cow<'static, str>>,
    ) -> Result<Self, GridError> {
        if cells.len() != metadata.num_cells() {
            return Err(GridError::DimensionMismatch {
                num_x: metadata.num_x,
                num_y: metadata.num_y,
                num_z: metadata.num_z,
                n_cells: metadata.num_cells(),
                n_values: cells.len(),
            });
        }
        let buffer = GPUBuffer::new_initialized(
            graphics_device,
            GPUBufferType::Storage,
            bytemuck::cast_slice(cells),
            label.into(),
        );
        Ok(Self {
            metadata,
            buffer,
            destroyed: AtomicBool::new(false),
            _cell: PhantomData,
        })
    }

    /// Allocates an uninitialized device grid with the given metadata.
    pub fn new_uninitialized(
        graphics_device: &GraphicsDevice,
        metadata: GridMetadata,
        label: impl Into<Cow<'static, str>>,
    ) -> Self {
        let buffer = GPUBuffer::new_uninitialized(
            graphics_device,
            GPUBufferType::Storage,
            metadata.num_cells() * std::mem::size_of::<T>(),
            label.into(),
        );
        Self {
            metadata,
            buffer,
            destroyed: AtomicBool::new(false),
            _cell: PhantomData,
        }
    }

    pub fn metadata(&self) -> &GridMetadata {
        &self.metadata
    }

    pub fn buffer(&self) -> &GPUBuffer {
        &self.buffer
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Marks this grid as destroyed. Further operations on it should be
    /// treated as an error by callers that check [`Self::is_destroyed`]
    /// first.
    ///
    /// The underlying GPU allocation is reclaimed when the grid is dropped;
    /// this method exists so long-lived registries of grids can eagerly
    /// flag grids that should no longer be used without holding onto
    /// `&mut` access to them.
    pub fn destroy(&self) -> Result<(), GridError> {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return Err(GridError::AlreadyDestroyed);
        }
        Ok(())
    }

    /// Whether `self` and `other` refer to the exact same GPU buffer
    /// allocation (used by the kernel dispatcher to detect in-place calls).
    pub fn aliases(&self, other: &Self) -> bool {
        self.buffer_identity() == other.buffer_identity()
    }

    /// An opaque, type-erased identity for this grid's underlying GPU
    /// buffer, usable to detect aliasing between grids of different cell
    /// types (e.g. a map kernel's input and output).
    pub(crate) fn buffer_identity(&self) -> usize {
        self.buffer.buffer() as *const wgpu::Buffer as usize
    }
}
