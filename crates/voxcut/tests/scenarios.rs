//! End-to-end scenarios exercising the GPU kernel dispatcher against a real
//! (possibly software) adapter.

use nalgebra::{Point3, Unit, Vector3};
use voxcut::device_grid::DeviceGrid;
use voxcut::distance_field::{Boundary, bound_of_axis, dist_field};
use voxcut::kernel::KernelRegistry;
use voxcut::shape::{Cylinder, RoundMode, Shape};
use voxcut::types::GridMetadata;
use voxcut::{GraphicsDevice, HostGrid};

fn connect() -> GraphicsDevice {
    let _ = env_logger::builder().is_test(true).try_init();
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
    pollster::block_on(GraphicsDevice::connect(
        &instance,
        wgpu::Features::empty(),
        wgpu::Limits::downlevel_defaults(),
    ))
    .expect("failed to connect to a graphics device for tests")
}

fn small_metadata() -> GridMetadata {
    GridMetadata::new(1.0, 16, 16, 16, Point3::new(-8.0, -8.0, -8.0)).unwrap()
}

#[test]
fn fill_shape_cylinder_should_occupy_a_plausible_cell_count() {
    let metadata = small_metadata();
    let shape = Shape::Cylinder(Cylinder::new(Point3::origin(), Vector3::z(), 3.0, 4.0).unwrap());

    let mut grid = HostGrid::new(metadata, 0u32);
    grid.fill_shape(&shape, RoundMode::Nearest, 1);

    let expected_volume = std::f32::consts::PI * 3.0 * 3.0 * 8.0;
    let actual_volume = grid.volume(|v| v == 1);

    assert!(actual_volume > 0.0);
    assert!((actual_volume - expected_volume).abs() < expected_volume * 0.3);
}

#[test]
fn register_map_should_negate_single_nonzero_cell_in_place() {
    let device = connect();
    let registry = KernelRegistry::new();
    registry
        .register_map_fn::<f32, f32>("negate", "vo = -vi;")
        .unwrap();

    let metadata = GridMetadata::new(1.0, 4, 4, 4, Point3::origin()).unwrap();
    let mut values = vec![0.0f32; metadata.num_cells()];
    let target = metadata.cell_index(1, 1, 1).unwrap();
    values[target] = 2.0;

    let grid = DeviceGrid::new_initialized(&device, metadata, &values, "negate test grid").unwrap();
    registry
        .dispatch_map(&device, "negate", &grid, &grid)
        .unwrap();

    let result = voxcut::copy::device_to_host(&device, &grid).unwrap();
    for (i, &v) in result.cells().iter().enumerate() {
        if i == target {
            assert_eq!(v, -2.0);
        } else {
            assert_eq!(v, 0.0);
        }
    }
}

#[test]
fn dist_field_from_single_seed_should_match_euclidean_distance_to_far_corner() {
    let device = connect();
    let registry = KernelRegistry::new();
    let metadata = GridMetadata::new(1.0, 8, 8, 8, Point3::origin()).unwrap();

    let mut seed = HostGrid::new(metadata, 0u32);
    seed.set(0, 0, 0, 1).unwrap();

    let device_seed = DeviceGrid::new_initialized(&device, metadata, seed.cells(), "seed").unwrap();
    let df = dist_field(&registry, &device, &device_seed).unwrap();
    let host_df = voxcut::copy::device_to_host(&device, &df).unwrap();

    assert_eq!(host_df.get(0, 0, 0).unwrap(), 0.0);

    let expected = (7.0f32 * 7.0 * 3.0).sqrt();
    let actual = host_df.get(7, 7, 7).unwrap();
    assert!(
        (actual - expected).abs() < 1e-3,
        "expected {expected}, got {actual}"
    );
}

#[test]
fn bound_of_axis_on_single_cell_should_match_nearest_and_outside_bounds() {
    let device = connect();
    let registry = KernelRegistry::new();
    let metadata = GridMetadata::new(1.0, 10, 10, 10, Point3::origin()).unwrap();

    let mut host_grid = HostGrid::new(metadata, 0u32);
    host_grid.set(3, 5, 2, 1).unwrap();

    let device_grid =
        DeviceGrid::new_initialized(&device, metadata, host_grid.cells(), "axis grid").unwrap();
    let direction = Unit::new_normalize(Vector3::x());

    let nearest = bound_of_axis(&registry, &device, &device_grid, direction, Boundary::Nearest)
        .unwrap()
        .unwrap();
    assert!((nearest.min - 3.5).abs() < 1e-5);
    assert!((nearest.max - 3.5).abs() < 1e-5);

    let outside = bound_of_axis(&registry, &device, &device_grid, direction, Boundary::Outside)
        .unwrap()
        .unwrap();
    let half_diagonal = 0.5 * 3f32.sqrt();
    assert!((outside.min - (3.5 - half_diagonal)).abs() < 1e-5);
    assert!((outside.max - (3.5 + half_diagonal)).abs() < 1e-5);
}

#[test]
fn bound_of_axis_on_empty_grid_should_be_none() {
    let device = connect();
    let registry = KernelRegistry::new();
    let metadata = small_metadata();

    let host_grid = HostGrid::new(metadata, 0u32);
    let device_grid =
        DeviceGrid::new_initialized(&device, metadata, host_grid.cells(), "empty axis grid")
            .unwrap();
    let interval = bound_of_axis(
        &registry,
        &device,
        &device_grid,
        Unit::new_normalize(Vector3::z()),
        Boundary::Nearest,
    )
    .unwrap();

    assert!(interval.is_none());
}
