//! GPU buffers for compute.

use crate::device::GraphicsDevice;
use anyhow::Result;
use parking_lot::Mutex;
use std::{
    borrow::Cow,
    fmt::Display,
    sync::Arc,
    sync::atomic::{AtomicUsize, Ordering},
};
use wgpu::util::DeviceExt;

/// A byte-addressable buffer living on the GPU.
#[derive(Debug)]
pub struct GPUBuffer {
    buffer: wgpu::Buffer,
    buffer_size: usize,
    n_valid_bytes: AtomicUsize,
    label: Cow<'static, str>,
}

/// The role a [`GPUBuffer`] plays, which determines its default
/// [`wgpu::BufferUsages`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GPUBufferType {
    Storage,
    Uniform,
    Staging,
}

impl GPUBuffer {
    /// Creates a GPU buffer with the given usage, initialized from the given
    /// bytes.
    ///
    /// # Panics
    /// If `bytes` is empty.
    pub fn new_initialized(
        graphics_device: &GraphicsDevice,
        buffer_type: GPUBufferType,
        bytes: &[u8],
        label: Cow<'static, str>,
    ) -> Self {
        assert!(!bytes.is_empty(), "Tried to create empty GPU buffer");

        let buffer_label = format!("{label} {buffer_type} GPU buffer");
        let buffer =
            graphics_device
                .device()
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    contents: bytes,
                    usage: buffer_type.usage(),
                    label: Some(&buffer_label),
                });

        Self {
            buffer,
            buffer_size: bytes.len(),
            n_valid_bytes: AtomicUsize::new(bytes.len()),
            label,
        }
    }

    /// Creates an uninitialized GPU buffer of the given type with room for
    /// `buffer_size` bytes.
    ///
    /// # Panics
    /// If `buffer_size` is zero.
    pub fn new_uninitialized(
        graphics_device: &GraphicsDevice,
        buffer_type: GPUBufferType,
        buffer_size: usize,
        label: Cow<'static, str>,
    ) -> Self {
        assert_ne!(buffer_size, 0, "Tried to create empty GPU buffer");

        let buffer_label = format!("{label} {buffer_type} GPU buffer");
        let buffer = graphics_device.device().create_buffer(&wgpu::BufferDescriptor {
            size: buffer_size as u64,
            usage: buffer_type.usage(),
            mapped_at_creation: false,
            label: Some(&buffer_label),
        });

        Self {
            buffer,
            buffer_size,
            n_valid_bytes: AtomicUsize::new(0),
            label,
        }
    }

    /// Returns a reference to the buffer label.
    pub fn label(&self) -> &Cow<'static, str> {
        &self.label
    }

    /// Returns the underlying [`wgpu::Buffer`].
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// Returns the total size of the buffer in bytes.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Returns the number of bytes, starting from the beginning of the
    /// buffer, that are considered to contain valid data.
    pub fn n_valid_bytes(&self) -> usize {
        self.n_valid_bytes.load(Ordering::Acquire)
    }

    /// Creates a [`wgpu::BindGroupEntry`] with the given binding for the full
    /// buffer.
    pub fn create_bind_group_entry(&self, binding: u32) -> wgpu::BindGroupEntry<'_> {
        wgpu::BindGroupEntry {
            binding,
            resource: self.buffer.as_entire_binding(),
        }
    }

    /// Queues a write of `bytes` to the beginning of the buffer.
    ///
    /// # Panics
    /// If `bytes` does not fit in the buffer.
    pub fn write(&self, graphics_device: &GraphicsDevice, bytes: &[u8]) {
        assert!(bytes.len() <= self.buffer_size);
        graphics_device.queue().write_buffer(&self.buffer, 0, bytes);
        self.n_valid_bytes.store(bytes.len(), Ordering::Release);
    }

    /// Maps the buffer to the CPU, calls `process_bytes` with the mapped
    /// bytes, then unmaps the buffer and returns the result.
    ///
    /// The buffer must have been created with `MAP_READ` usage (i.e. of type
    /// [`GPUBufferType::Staging`]).
    ///
    /// # Errors
    /// Returns an error if the mapping operation fails.
    pub fn map_and_process_bytes<T>(
        &self,
        graphics_device: &GraphicsDevice,
        process_bytes: impl FnOnce(&[u8]) -> T,
    ) -> Result<T> {
        let slice = self.buffer.slice(..);
        let view = map_buffer_slice_to_cpu(graphics_device.device(), slice)?;
        let processed = process_bytes(&view);
        drop(view);
        self.buffer.unmap();
        Ok(processed)
    }
}

impl GPUBufferType {
    /// Returns the [`wgpu::BufferUsages`] appropriate for this buffer role.
    pub fn usage(&self) -> wgpu::BufferUsages {
        match self {
            Self::Storage => {
                wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST
            }
            Self::Uniform => wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            Self::Staging => wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        }
    }
}

impl Display for GPUBufferType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Storage => "storage",
                Self::Uniform => "uniform",
                Self::Staging => "staging",
            }
        )
    }
}

/// Encodes a copy of the full contents of `source` into `destination`.
///
/// # Panics
/// If the two buffers have different sizes.
pub fn encode_buffer_to_buffer_copy(
    command_encoder: &mut wgpu::CommandEncoder,
    source: &GPUBuffer,
    destination: &GPUBuffer,
) {
    assert_eq!(source.buffer_size(), destination.buffer_size());
    command_encoder.copy_buffer_to_buffer(
        &source.buffer,
        0,
        &destination.buffer,
        0,
        source.buffer_size() as u64,
    );
    destination
        .n_valid_bytes
        .store(source.n_valid_bytes(), Ordering::Release);
}

/// Maps the given buffer slice from the GPU to the CPU and returns the mapped
/// view. Blocks the calling thread until the mapping completes.
///
/// # Errors
/// Returns an error if the mapping operation fails.
pub fn map_buffer_slice_to_cpu<'a>(
    device: &wgpu::Device,
    buffer_slice: wgpu::BufferSlice<'a>,
) -> Result<wgpu::BufferView<'a>> {
    let map_result_sender = Arc::new(Mutex::new(None));
    let map_result_receiver = Arc::clone(&map_result_sender);

    buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
        *map_result_sender.lock() = Some(result);
    });

    device.poll(wgpu::PollType::wait_indefinitely())?;

    map_result_receiver
        .lock()
        .take()
        .expect("Buffer mapping callback was never invoked")?;

    Ok(buffer_slice.get_mapped_range())
}
