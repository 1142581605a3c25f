//! Transferring grid contents between the host and the GPU, and between
//! two grids of either kind.

use crate::device_grid::DeviceGrid;
use crate::error::GridError;
use crate::grid::HostGrid;
use crate::types::GridCell;
use std::borrow::Cow;
use voxcut_gpu::buffer::{GPUBuffer, GPUBufferType, encode_buffer_to_buffer_copy};
use voxcut_gpu::device::GraphicsDevice;

/// Queues a write of every cell of `src` into `dst`'s GPU buffer.
///
/// # Errors
/// Returns [`GridError::IncompatibleCopy`] if the grids have different
/// cell counts.
pub fn host_to_device<T: GridCell>(
    graphics_device: &GraphicsDevice,
    src: &HostGrid<T>,
    dst: &DeviceGrid<T>,
) -> Result<(), GridError> {
    if src.metadata().num_cells() != dst.metadata().num_cells() {
        return Err(GridError::IncompatibleCopy);
    }
    dst.buffer()
        .write(graphics_device, bytemuck::cast_slice(src.cells()));
    Ok(())
}

/// Reads `src`'s GPU buffer back into a new host grid, blocking until the
/// copy and mapping complete.
///
/// # Errors
/// Returns [`GridError::Readback`] if the staging copy can't be mapped.
pub fn device_to_host<T: GridCell>(
    graphics_device: &GraphicsDevice,
    src: &DeviceGrid<T>,
) -> Result<HostGrid<T>, GridError> {
    let staging = GPUBuffer::new_uninitialized(
        graphics_device,
        GPUBufferType::Staging,
        src.buffer().buffer_size(),
        Cow::from("device-to-host readback staging"),
    );

    let mut encoder =
        graphics_device
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("device-to-host readback"),
            });
    encode_buffer_to_buffer_copy(&mut encoder, src.buffer(), &staging);
    graphics_device.queue().submit(Some(encoder.finish()));

    let cells = staging
        .map_and_process_bytes(graphics_device, |bytes| {
            bytemuck::cast_slice::<u8, T>(bytes).to_vec()
        })
        .map_err(|source| GridError::Readback { source })?;

    HostGrid::from_cells(*src.metadata(), cells)
}

/// Queues a device-to-device buffer copy of the full contents of `src`
/// into `dst`.
///
/// # Errors
/// Returns [`GridError::IncompatibleCopy`] if the grids have different
/// cell counts.
pub fn device_to_device<T: GridCell>(
    graphics_device: &GraphicsDevice,
    src: &DeviceGrid<T>,
    dst: &DeviceGrid<T>,
) -> Result<(), GridError> {
    if src.metadata().num_cells() != dst.metadata().num_cells() {
        return Err(GridError::IncompatibleCopy);
    }
    let mut encoder =
        graphics_device
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("device-to-device copy"),
            });
    encode_buffer_to_buffer_copy(&mut encoder, src.buffer(), dst.buffer());
    graphics_device.queue().submit(Some(encoder.finish()));
    Ok(())
}

/// Clones `src`'s cell data into a new, independent host grid.
pub fn host_to_host<T: GridCell>(src: &HostGrid<T>) -> HostGrid<T> {
    src.clone()
}
