//! Registry and dispatcher for programmable GPU compute kernels.
//!
//! A kernel is registered once, by name, as a WGSL snippet operating on
//! named input/output variables (`vi`/`vo` for a map, `vi1`/`vi2`/`vo` for a
//! map2, `a`/`b`/`vo` for a reduce). The first dispatch of a given name
//! resolves its shader template, compiles a [`wgpu::ComputePipeline`], and
//! caches it; every later dispatch of the same name reuses it.
//!
//! WebGPU's automatic resource tracking treats a read-only-storage and a
//! read-write-storage binding of the same buffer within one dispatch as a
//! usage conflict, so `dispatch_map`/`dispatch_map2` can't simply bind an
//! aliased grid to both an input and the output slot. Instead, when an
//! input aliases the output, the dispatcher allocates a same-shaped
//! temporary grid, runs the kernel into it, copies the result back into the
//! caller's output buffer, and destroys the temporary. This keeps
//! `dispatch_map(dev, "negate", &grid, &grid)` well-defined from the
//! caller's side without exposing the copy.

use crate::device_grid::DeviceGrid;
use crate::error::KernelError;
use crate::types::GridCell;
use anyhow::{Context, Result};
use bytemuck::{Pod, Zeroable};
use nalgebra::{UnitVector3, Vector3};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::borrow::Cow;
use voxcut_gpu::bind_group_layout::BindGroupLayoutRegistry;
use voxcut_gpu::buffer::{GPUBuffer, GPUBufferType, encode_buffer_to_buffer_copy};
use voxcut_gpu::device::GraphicsDevice;
use voxcut_gpu::shader_template::ShaderTemplate;

/// Invocations per workgroup for every compute kernel in this crate.
const WORKGROUP_SIZE: u32 = 128;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct DimsUniform {
    num_x: u32,
    num_y: u32,
    num_z: u32,
    aux: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct GeomUniform {
    ofs: [f32; 3],
    res: f32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct DirUniform {
    v: [f32; 3],
    pad: f32,
}

#[derive(Clone, Debug)]
enum KernelSpec {
    Map {
        in_type: &'static str,
        out_type: &'static str,
        body: String,
    },
    Map2 {
        in1_type: &'static str,
        in2_type: &'static str,
        out_type: &'static str,
        body: String,
    },
    Reduce {
        val_type: &'static str,
        init_expr: String,
        body: String,
    },
    AxisProjection {
        in_type: &'static str,
    },
    JumpFloodSeed {
        seed_type: &'static str,
    },
    JumpFloodStep,
}

impl KernelSpec {
    fn layout_id(&self) -> &'static str {
        match self {
            KernelSpec::Map { .. } => "voxcut.map_layout",
            KernelSpec::Map2 { .. } => "voxcut.map2_layout",
            KernelSpec::Reduce { .. } => "voxcut.reduce_layout",
            KernelSpec::AxisProjection { .. } => "voxcut.axis_projection_layout",
            KernelSpec::JumpFloodSeed { .. } => "voxcut.jump_flood_seed_layout",
            KernelSpec::JumpFloodStep => "voxcut.jump_flood_step_layout",
        }
    }

    fn bind_group_layout_entries(&self) -> Vec<wgpu::BindGroupLayoutEntry> {
        let uniform = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let storage = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        match self {
            KernelSpec::Map { .. } => vec![
                uniform(0),
                uniform(1),
                storage(2, true),
                storage(3, false),
            ],
            KernelSpec::Map2 { .. } => vec![
                uniform(0),
                uniform(1),
                storage(2, true),
                storage(3, true),
                storage(4, false),
            ],
            KernelSpec::Reduce { .. } => vec![uniform(0), storage(1, true), storage(2, false)],
            KernelSpec::AxisProjection { .. } => vec![
                uniform(0),
                uniform(1),
                uniform(2),
                storage(3, true),
                storage(4, false),
            ],
            KernelSpec::JumpFloodSeed { .. } => vec![
                uniform(0),
                uniform(1),
                storage(2, true),
                storage(3, false),
            ],
            KernelSpec::JumpFloodStep => vec![uniform(0), uniform(1), storage(2, false)],
        }
    }

    fn template_source(&self) -> &'static str {
        match self {
            KernelSpec::Map { .. } => include_str!("../shaders/compute/map.template.wgsl"),
            KernelSpec::Map2 { .. } => include_str!("../shaders/compute/map2.template.wgsl"),
            KernelSpec::Reduce { .. } => include_str!("../shaders/compute/reduce.template.wgsl"),
            KernelSpec::AxisProjection { .. } => {
                include_str!("../shaders/compute/axis_projection.template.wgsl")
            }
            KernelSpec::JumpFloodSeed { .. } => {
                include_str!("../shaders/compute/jump_flood_seed.template.wgsl")
            }
            KernelSpec::JumpFloodStep => {
                include_str!("../shaders/compute/jump_flood_step.template.wgsl")
            }
        }
    }

    fn resolve(&self) -> Result<String> {
        let template = ShaderTemplate::new(self.template_source())?;
        let workgroup_size = WORKGROUP_SIZE.to_string();
        match self {
            KernelSpec::Map {
                in_type,
                out_type,
                body,
            } => template.resolve(&[
                ("in_type", Cow::from(*in_type)),
                ("out_type", Cow::from(*out_type)),
                ("body", Cow::from(body.as_str())),
                ("workgroup_size", Cow::from(workgroup_size)),
            ]),
            KernelSpec::Map2 {
                in1_type,
                in2_type,
                out_type,
                body,
            } => template.resolve(&[
                ("in1_type", Cow::from(*in1_type)),
                ("in2_type", Cow::from(*in2_type)),
                ("out_type", Cow::from(*out_type)),
                ("body", Cow::from(body.as_str())),
                ("workgroup_size", Cow::from(workgroup_size)),
            ]),
            KernelSpec::Reduce {
                val_type,
                init_expr,
                body,
            } => template.resolve(&[
                ("val_type", Cow::from(*val_type)),
                ("init_expr", Cow::from(init_expr.as_str())),
                ("body", Cow::from(body.as_str())),
                ("workgroup_size", Cow::from(workgroup_size)),
            ]),
            KernelSpec::AxisProjection { in_type } => template.resolve(&[
                ("in_type", Cow::from(*in_type)),
                ("workgroup_size", Cow::from(workgroup_size)),
            ]),
            KernelSpec::JumpFloodSeed { seed_type } => template.resolve(&[
                ("seed_type", Cow::from(*seed_type)),
                ("workgroup_size", Cow::from(workgroup_size)),
            ]),
            KernelSpec::JumpFloodStep => {
                template.resolve(&[("workgroup_size", Cow::from(workgroup_size))])
            }
        }
        .context("failed to resolve shader template")
    }
}

#[derive(Clone, Debug)]
struct CompiledKernel {
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

/// A registry of named compute kernels and the pipelines compiled from
/// them.
///
/// Registration and dispatch both take `&self`: the registry is built for
/// single-threaded use (the caller owns the [`GraphicsDevice`] it dispatches
/// against, typically from one thread), but is not internally `!Sync` for
/// any deeper reason than convention.
#[derive(Debug)]
pub struct KernelRegistry {
    specs: RwLock<FxHashMap<String, KernelSpec>>,
    compiled: RwLock<FxHashMap<String, CompiledKernel>>,
    bind_group_layouts: BindGroupLayoutRegistry,
}

impl KernelRegistry {
    pub fn new() -> Self {
        Self {
            specs: RwLock::new(FxHashMap::default()),
            compiled: RwLock::new(FxHashMap::default()),
            bind_group_layouts: BindGroupLayoutRegistry::new(),
        }
    }

    /// Registers a kernel that maps one grid to another of the same shape,
    /// one cell at a time. `body` is WGSL reading `vi: {In}` and the cell
    /// center `p: vec3<f32>`, and must assign `vo: {Out}`.
    ///
    /// # Errors
    /// Returns [`KernelError::AlreadyRegistered`] if `name` is already
    /// taken.
    pub fn register_map_fn<In: GridCell, Out: GridCell>(
        &self,
        name: impl Into<String>,
        body: impl Into<String>,
    ) -> Result<(), KernelError> {
        self.register(
            name.into(),
            KernelSpec::Map {
                in_type: In::WGSL_TYPE,
                out_type: Out::WGSL_TYPE,
                body: body.into(),
            },
        )
    }

    /// Registers a kernel that combines two same-shaped grids into an
    /// output grid, one cell at a time. `body` reads `vi1: {In1}`,
    /// `vi2: {In2}` and `p`, and must assign `vo: {Out}`.
    ///
    /// # Errors
    /// Returns [`KernelError::AlreadyRegistered`] if `name` is already
    /// taken.
    pub fn register_map2_fn<In1: GridCell, In2: GridCell, Out: GridCell>(
        &self,
        name: impl Into<String>,
        body: impl Into<String>,
    ) -> Result<(), KernelError> {
        self.register(
            name.into(),
            KernelSpec::Map2 {
                in1_type: In1::WGSL_TYPE,
                in2_type: In2::WGSL_TYPE,
                out_type: Out::WGSL_TYPE,
                body: body.into(),
            },
        )
    }

    /// Registers a tree-reduction kernel over a grid's values. `init_expr`
    /// assigns the fold's neutral element to `vo`; `body` combines `a` and
    /// `b` into `vo` and must be commutative and associative.
    ///
    /// # Errors
    /// Returns [`KernelError::AlreadyRegistered`] if `name` is already
    /// taken.
    pub fn register_reduce_fn<Val: GridCell>(
        &self,
        name: impl Into<String>,
        init_expr: impl Into<String>,
        body: impl Into<String>,
    ) -> Result<(), KernelError> {
        self.register(
            name.into(),
            KernelSpec::Reduce {
                val_type: Val::WGSL_TYPE,
                init_expr: init_expr.into(),
                body: body.into(),
            },
        )
    }

    fn register(&self, name: String, spec: KernelSpec) -> Result<(), KernelError> {
        let mut specs = self.specs.write();
        if specs.contains_key(&name) {
            return Err(KernelError::AlreadyRegistered { name });
        }
        specs.insert(name, spec);
        Ok(())
    }

    fn ensure_internal(&self, name: &str, build_spec: impl FnOnce() -> KernelSpec) {
        let mut specs = self.specs.write();
        specs.entry(name.to_string()).or_insert_with(build_spec);
    }

    /// Internal: idempotently registers a map kernel under a fixed internal
    /// name, used by kernels ([`crate::distance_field`]) built on top of
    /// the same map/reduce machinery user kernels use.
    pub(crate) fn ensure_map_fn<In: GridCell, Out: GridCell>(
        &self,
        name: &str,
        body: impl Into<String>,
    ) {
        let body = body.into();
        self.ensure_internal(name, move || KernelSpec::Map {
            in_type: In::WGSL_TYPE,
            out_type: Out::WGSL_TYPE,
            body,
        });
    }

    /// Internal: idempotently registers a reduce kernel under a fixed
    /// internal name.
    pub(crate) fn ensure_reduce_fn<Val: GridCell>(
        &self,
        name: &str,
        init_expr: impl Into<String>,
        body: impl Into<String>,
    ) {
        let init_expr = init_expr.into();
        let body = body.into();
        self.ensure_internal(name, move || KernelSpec::Reduce {
            val_type: Val::WGSL_TYPE,
            init_expr,
            body,
        });
    }

    fn get_or_build(
        &self,
        graphics_device: &GraphicsDevice,
        name: &str,
    ) -> Result<CompiledKernel, KernelError> {
        if let Some(compiled) = self.compiled.read().get(name) {
            return Ok(compiled.clone());
        }

        let spec = self
            .specs
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| KernelError::NotFound {
                name: name.to_string(),
            })?;

        let compiled = self
            .build(graphics_device, name, &spec)
            .map_err(|source| KernelError::PipelineBuild {
                name: name.to_string(),
                source,
            })?;

        self.compiled
            .write()
            .insert(name.to_string(), compiled.clone());
        Ok(compiled)
    }

    fn build(
        &self,
        graphics_device: &GraphicsDevice,
        name: &str,
        spec: &KernelSpec,
    ) -> Result<CompiledKernel> {
        let source = spec.resolve()?;
        let module = graphics_device
            .device()
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(name),
                source: wgpu::ShaderSource::Wgsl(Cow::from(source)),
            });

        let entries = spec.bind_group_layout_entries();
        let bind_group_layout = self
            .bind_group_layouts
            .get_or_create_layout(Cow::from(spec.layout_id()), || {
                graphics_device
                    .device()
                    .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                        label: Some(spec.layout_id()),
                        entries: &entries,
                    })
            });

        let pipeline_layout =
            graphics_device
                .device()
                .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some(name),
                    bind_group_layouts: &[&bind_group_layout],
                    push_constant_ranges: &[],
                });

        let pipeline =
            graphics_device
                .device()
                .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(name),
                    layout: Some(&pipeline_layout),
                    module: &module,
                    entry_point: Some("main"),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    cache: None,
                });

        Ok(CompiledKernel {
            pipeline,
            bind_group_layout,
        })
    }

    /// Dispatches a registered map kernel. `input` and `output` may be the
    /// same grid: the dispatcher transparently routes through a temporary
    /// device grid when it detects aliasing (see the module docs).
    ///
    /// # Errors
    /// Returns [`KernelError::NotFound`] if `name` isn't registered,
    /// [`KernelError::DestroyedGrid`] if either grid was destroyed, or
    /// [`KernelError::ShapeMismatch`] if `input` and `output` don't share
    /// metadata.
    pub fn dispatch_map<In: GridCell, Out: GridCell>(
        &self,
        graphics_device: &GraphicsDevice,
        name: &str,
        input: &DeviceGrid<In>,
        output: &DeviceGrid<Out>,
    ) -> Result<(), KernelError> {
        check_not_destroyed(name, &[input.is_destroyed(), output.is_destroyed()])?;
        if !input.metadata().compatible_with(output.metadata()) {
            return Err(KernelError::ShapeMismatch {
                name: name.to_string(),
            });
        }
        let compiled = self.get_or_build(graphics_device, name)?;
        let metadata = *input.metadata();

        if input.buffer_identity() == output.buffer_identity() {
            let temp = DeviceGrid::<Out>::new_uninitialized(
                graphics_device,
                metadata,
                "dispatch_map in-place scratch",
            );
            self.run_map(graphics_device, name, &compiled, input, &temp, metadata);
            copy_device_to_device(graphics_device, &temp, output);
            temp.destroy()
                .expect("freshly allocated scratch grid cannot already be destroyed");
            return Ok(());
        }

        self.run_map(graphics_device, name, &compiled, input, output, metadata);
        Ok(())
    }

    fn run_map<In: GridCell, Out: GridCell>(
        &self,
        graphics_device: &GraphicsDevice,
        name: &str,
        compiled: &CompiledKernel,
        input: &DeviceGrid<In>,
        output: &DeviceGrid<Out>,
        metadata: crate::types::GridMetadata,
    ) {
        let dims = DimsUniform {
            num_x: metadata.num_x,
            num_y: metadata.num_y,
            num_z: metadata.num_z,
            aux: 0,
        };
        let geom = GeomUniform {
            ofs: [metadata.ofs.x, metadata.ofs.y, metadata.ofs.z],
            res: metadata.res,
        };
        let dims_buffer = GPUBuffer::new_initialized(
            graphics_device,
            GPUBufferType::Uniform,
            bytemuck::bytes_of(&dims),
            Cow::from("map dims"),
        );
        let geom_buffer = GPUBuffer::new_initialized(
            graphics_device,
            GPUBufferType::Uniform,
            bytemuck::bytes_of(&geom),
            Cow::from("map geom"),
        );

        let bind_group = graphics_device
            .device()
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(name),
                layout: &compiled.bind_group_layout,
                entries: &[
                    dims_buffer.create_bind_group_entry(0),
                    geom_buffer.create_bind_group_entry(1),
                    input.buffer().create_bind_group_entry(2),
                    output.buffer().create_bind_group_entry(3),
                ],
            });

        dispatch_1d(
            graphics_device,
            name,
            &compiled.pipeline,
            &bind_group,
            metadata.num_cells() as u32,
        );
    }

    /// Dispatches a registered map2 kernel. `output` may alias either input:
    /// the dispatcher routes through a temporary device grid when it
    /// detects that (see the module docs).
    ///
    /// # Errors
    /// Returns [`KernelError::NotFound`] if `name` isn't registered,
    /// [`KernelError::DestroyedGrid`] if any grid was destroyed, or
    /// [`KernelError::ShapeMismatch`] if the grids don't share metadata.
    pub fn dispatch_map2<In1: GridCell, In2: GridCell, Out: GridCell>(
        &self,
        graphics_device: &GraphicsDevice,
        name: &str,
        input1: &DeviceGrid<In1>,
        input2: &DeviceGrid<In2>,
        output: &DeviceGrid<Out>,
    ) -> Result<(), KernelError> {
        check_not_destroyed(
            name,
            &[
                input1.is_destroyed(),
                input2.is_destroyed(),
                output.is_destroyed(),
            ],
        )?;
        let metadata = *input1.metadata();
        if !metadata.compatible_with(input2.metadata()) || !metadata.compatible_with(output.metadata()) {
            return Err(KernelError::ShapeMismatch {
                name: name.to_string(),
            });
        }
        let compiled = self.get_or_build(graphics_device, name)?;

        let output_aliases_input = input1.buffer_identity() == output.buffer_identity()
            || input2.buffer_identity() == output.buffer_identity();

        if output_aliases_input {
            let temp = DeviceGrid::<Out>::new_uninitialized(
                graphics_device,
                metadata,
                "dispatch_map2 in-place scratch",
            );
            self.run_map2(graphics_device, name, &compiled, input1, input2, &temp, metadata);
            copy_device_to_device(graphics_device, &temp, output);
            temp.destroy()
                .expect("freshly allocated scratch grid cannot already be destroyed");
            return Ok(());
        }

        self.run_map2(graphics_device, name, &compiled, input1, input2, output, metadata);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn run_map2<In1: GridCell, In2: GridCell, Out: GridCell>(
        &self,
        graphics_device: &GraphicsDevice,
        name: &str,
        compiled: &CompiledKernel,
        input1: &DeviceGrid<In1>,
        input2: &DeviceGrid<In2>,
        output: &DeviceGrid<Out>,
        metadata: crate::types::GridMetadata,
    ) {
        let dims = DimsUniform {
            num_x: metadata.num_x,
            num_y: metadata.num_y,
            num_z: metadata.num_z,
            aux: 0,
        };
        let geom = GeomUniform {
            ofs: [metadata.ofs.x, metadata.ofs.y, metadata.ofs.z],
            res: metadata.res,
        };
        let dims_buffer = GPUBuffer::new_initialized(
            graphics_device,
            GPUBufferType::Uniform,
            bytemuck::bytes_of(&dims),
            Cow::from("map2 dims"),
        );
        let geom_buffer = GPUBuffer::new_initialized(
            graphics_device,
            GPUBufferType::Uniform,
            bytemuck::bytes_of(&geom),
            Cow::from("map2 geom"),
        );

        let bind_group = graphics_device
            .device()
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(name),
                layout: &compiled.bind_group_layout,
                entries: &[
                    dims_buffer.create_bind_group_entry(0),
                    geom_buffer.create_bind_group_entry(1),
                    input1.buffer().create_bind_group_entry(2),
                    input2.buffer().create_bind_group_entry(3),
                    output.buffer().create_bind_group_entry(4),
                ],
            });

        dispatch_1d(
            graphics_device,
            name,
            &compiled.pipeline,
            &bind_group,
            metadata.num_cells() as u32,
        );
    }

    /// Dispatches a registered reduce kernel over the whole of `input`,
    /// running successive rounds until a single value remains, and reads
    /// that value back to the host.
    ///
    /// # Errors
    /// Returns [`KernelError::NotFound`] if `name` isn't registered, or
    /// [`KernelError::Readback`] if the final value can't be read back.
    pub fn dispatch_reduce<Val: GridCell>(
        &self,
        graphics_device: &GraphicsDevice,
        name: &str,
        input: &DeviceGrid<Val>,
    ) -> Result<Val, KernelError> {
        check_not_destroyed(name, &[input.is_destroyed()])?;
        let compiled = self.get_or_build(graphics_device, name)?;
        let elem_size = std::mem::size_of::<Val>();

        let mut current = GPUBuffer::new_uninitialized(
            graphics_device,
            GPUBufferType::Storage,
            input.buffer().buffer_size(),
            Cow::from("reduce scratch a"),
        );
        {
            let mut encoder =
                graphics_device
                    .device()
                    .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                        label: Some("reduce copy-in"),
                    });
            encode_buffer_to_buffer_copy(&mut encoder, input.buffer(), &current);
            graphics_device.queue().submit(Some(encoder.finish()));
        }

        let mut n = input.metadata().num_cells() as u32;
        loop {
            let num_workgroups = n.div_ceil(WORKGROUP_SIZE).max(1);
            let next = GPUBuffer::new_uninitialized(
                graphics_device,
                GPUBufferType::Storage,
                (num_workgroups as usize * elem_size).max(elem_size),
                Cow::from("reduce scratch b"),
            );

            let dims = DimsUniform {
                num_x: n,
                num_y: 1,
                num_z: 1,
                aux: 0,
            };
            let dims_buffer = GPUBuffer::new_initialized(
                graphics_device,
                GPUBufferType::Uniform,
                bytemuck::bytes_of(&dims),
                Cow::from("reduce dims"),
            );

            let bind_group =
                graphics_device
                    .device()
                    .create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some(name),
                        layout: &compiled.bind_group_layout,
                        entries: &[
                            dims_buffer.create_bind_group_entry(0),
                            current.create_bind_group_entry(1),
                            next.create_bind_group_entry(2),
                        ],
                    });

            dispatch_1d(
                graphics_device,
                name,
                &compiled.pipeline,
                &bind_group,
                num_workgroups * WORKGROUP_SIZE,
            );

            current = next;
            if num_workgroups == 1 {
                break;
            }
            n = num_workgroups;
        }

        graphics_device
            .wait_idle()
            .map_err(|source| KernelError::Readback {
                name: name.to_string(),
                source,
            })?;

        let staging = GPUBuffer::new_uninitialized(
            graphics_device,
            GPUBufferType::Staging,
            elem_size,
            Cow::from("reduce staging"),
        );
        let mut encoder =
            graphics_device
                .device()
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("reduce readback"),
                });
        encoder.copy_buffer_to_buffer(current.buffer(), 0, staging.buffer(), 0, elem_size as u64);
        graphics_device.queue().submit(Some(encoder.finish()));

        staging
            .map_and_process_bytes(graphics_device, |bytes| {
                bytemuck::pod_read_unaligned::<Val>(&bytes[..elem_size])
            })
            .map_err(|source| KernelError::Readback {
                name: name.to_string(),
                source,
            })
    }

    /// Internal: seeds a jump-flood distance field from an occupancy grid.
    pub(crate) fn dispatch_jump_flood_seed<Seed: GridCell>(
        &self,
        graphics_device: &GraphicsDevice,
        seed: &DeviceGrid<Seed>,
        df: &DeviceGrid<[f32; 4]>,
    ) -> Result<(), KernelError> {
        let name = format!("__jump_flood_seed_{}", Seed::NAME);
        check_not_destroyed(&name, &[seed.is_destroyed(), df.is_destroyed()])?;
        self.ensure_internal(&name, || KernelSpec::JumpFloodSeed {
            seed_type: Seed::WGSL_TYPE,
        });
        let compiled = self.get_or_build(graphics_device, &name)?;
        let metadata = *seed.metadata();

        let dims = DimsUniform {
            num_x: metadata.num_x,
            num_y: metadata.num_y,
            num_z: metadata.num_z,
            aux: 0,
        };
        let geom = GeomUniform {
            ofs: [metadata.ofs.x, metadata.ofs.y, metadata.ofs.z],
            res: metadata.res,
        };
        let dims_buffer = GPUBuffer::new_initialized(
            graphics_device,
            GPUBufferType::Uniform,
            bytemuck::bytes_of(&dims),
            Cow::from("jump flood seed dims"),
        );
        let geom_buffer = GPUBuffer::new_initialized(
            graphics_device,
            GPUBufferType::Uniform,
            bytemuck::bytes_of(&geom),
            Cow::from("jump flood seed geom"),
        );

        let bind_group = graphics_device
            .device()
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&name),
                layout: &compiled.bind_group_layout,
                entries: &[
                    dims_buffer.create_bind_group_entry(0),
                    geom_buffer.create_bind_group_entry(1),
                    seed.buffer().create_bind_group_entry(2),
                    df.buffer().create_bind_group_entry(3),
                ],
            });

        dispatch_1d(
            graphics_device,
            &name,
            &compiled.pipeline,
            &bind_group,
            metadata.num_cells() as u32,
        );
        Ok(())
    }

    /// Internal: runs one jump-flood propagation pass at the given step
    /// size, in place on `df`.
    pub(crate) fn dispatch_jump_flood_step(
        &self,
        graphics_device: &GraphicsDevice,
        df: &DeviceGrid<[f32; 4]>,
        step: u32,
    ) -> Result<(), KernelError> {
        let name = "__jump_flood_step";
        check_not_destroyed(name, &[df.is_destroyed()])?;
        self.ensure_internal(name, || KernelSpec::JumpFloodStep);
        let compiled = self.get_or_build(graphics_device, name)?;
        let metadata = *df.metadata();

        let dims = DimsUniform {
            num_x: metadata.num_x,
            num_y: metadata.num_y,
            num_z: metadata.num_z,
            aux: step,
        };
        let geom = GeomUniform {
            ofs: [metadata.ofs.x, metadata.ofs.y, metadata.ofs.z],
            res: metadata.res,
        };
        let dims_buffer = GPUBuffer::new_initialized(
            graphics_device,
            GPUBufferType::Uniform,
            bytemuck::bytes_of(&dims),
            Cow::from("jump flood step dims"),
        );
        let geom_buffer = GPUBuffer::new_initialized(
            graphics_device,
            GPUBufferType::Uniform,
            bytemuck::bytes_of(&geom),
            Cow::from("jump flood step geom"),
        );

        let bind_group = graphics_device
            .device()
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(name),
                layout: &compiled.bind_group_layout,
                entries: &[
                    dims_buffer.create_bind_group_entry(0),
                    geom_buffer.create_bind_group_entry(1),
                    df.buffer().create_bind_group_entry(2),
                ],
            });

        dispatch_1d(
            graphics_device,
            name,
            &compiled.pipeline,
            &bind_group,
            metadata.num_cells() as u32,
        );
        graphics_device
            .wait_idle()
            .map_err(|source| KernelError::Readback {
                name: name.to_string(),
                source,
            })
    }

    /// Internal: projects occupied cells of `grid` onto `direction`,
    /// writing a sentinel for unoccupied cells.
    pub(crate) fn dispatch_axis_projection<In: GridCell>(
        &self,
        graphics_device: &GraphicsDevice,
        grid: &DeviceGrid<In>,
        direction: UnitVector3<f32>,
        output: &DeviceGrid<f32>,
    ) -> Result<(), KernelError> {
        let name = format!("__axis_projection_{}", In::NAME);
        check_not_destroyed(&name, &[grid.is_destroyed(), output.is_destroyed()])?;
        self.ensure_internal(&name, || KernelSpec::AxisProjection {
            in_type: In::WGSL_TYPE,
        });
        let compiled = self.get_or_build(graphics_device, &name)?;
        let metadata = *grid.metadata();

        let dims = DimsUniform {
            num_x: metadata.num_x,
            num_y: metadata.num_y,
            num_z: metadata.num_z,
            aux: 0,
        };
        let geom = GeomUniform {
            ofs: [metadata.ofs.x, metadata.ofs.y, metadata.ofs.z],
            res: metadata.res,
        };
        let dir_vec: Vector3<f32> = direction.into_inner();
        let dir = DirUniform {
            v: [dir_vec.x, dir_vec.y, dir_vec.z],
            pad: 0.0,
        };

        let dims_buffer = GPUBuffer::new_initialized(
            graphics_device,
            GPUBufferType::Uniform,
            bytemuck::bytes_of(&dims),
            Cow::from("axis projection dims"),
        );
        let geom_buffer = GPUBuffer::new_initialized(
            graphics_device,
            GPUBufferType::Uniform,
            bytemuck::bytes_of(&geom),
            Cow::from("axis projection geom"),
        );
        let dir_buffer = GPUBuffer::new_initialized(
            graphics_device,
            GPUBufferType::Uniform,
            bytemuck::bytes_of(&dir),
            Cow::from("axis projection dir"),
        );

        let bind_group = graphics_device
            .device()
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&name),
                layout: &compiled.bind_group_layout,
                entries: &[
                    dims_buffer.create_bind_group_entry(0),
                    geom_buffer.create_bind_group_entry(1),
                    dir_buffer.create_bind_group_entry(2),
                    grid.buffer().create_bind_group_entry(3),
                    output.buffer().create_bind_group_entry(4),
                ],
            });

        dispatch_1d(
            graphics_device,
            &name,
            &compiled.pipeline,
            &bind_group,
            metadata.num_cells() as u32,
        );
        Ok(())
    }
}

impl Default for KernelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns [`KernelError::DestroyedGrid`] if any of `destroyed_flags` is
/// `true`.
fn check_not_destroyed(name: &str, destroyed_flags: &[bool]) -> Result<(), KernelError> {
    if destroyed_flags.iter().any(|&destroyed| destroyed) {
        return Err(KernelError::DestroyedGrid {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Queues a device-to-device copy used to bring a kernel's result back from
/// an in-place dispatch's temporary output grid into the caller's grid.
fn copy_device_to_device<T: GridCell>(
    graphics_device: &GraphicsDevice,
    src: &DeviceGrid<T>,
    dst: &DeviceGrid<T>,
) {
    let mut encoder =
        graphics_device
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("in-place dispatch copy-back"),
            });
    encode_buffer_to_buffer_copy(&mut encoder, src.buffer(), dst.buffer());
    graphics_device.queue().submit(Some(encoder.finish()));
}

fn dispatch_1d(
    graphics_device: &GraphicsDevice,
    label: &str,
    pipeline: &wgpu::ComputePipeline,
    bind_group: &wgpu::BindGroup,
    n: u32,
) {
    let num_workgroups = n.div_ceil(WORKGROUP_SIZE).max(1);
    let mut encoder =
        graphics_device
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(label),
            });
    {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(label),
            timestamp_writes: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.dispatch_workgroups(num_workgroups, 1, 1);
    }
    graphics_device.queue().submit(Some(encoder.finish()));
}
