//! Distance fields and axis bounds computed over an occupancy grid on the
//! GPU.

use crate::device_grid::DeviceGrid;
use crate::error::KernelError;
use crate::kernel::KernelRegistry;
use crate::types::GridCell;
use nalgebra::UnitVector3;
use voxcut_gpu::device::GraphicsDevice;

const EXTRACT_DISTANCE_KERNEL: &str = "__jump_flood_extract_distance";
const MIN_IGNORE_SENTINEL_KERNEL: &str = "__axis_min_ignore_sentinel";
const MAX_IGNORE_SENTINEL_KERNEL: &str = "__axis_max_ignore_sentinel";

/// A closed interval along some axis direction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AxisInterval {
    pub min: f32,
    pub max: f32,
}

impl AxisInterval {
    /// Shrinks the interval inward by `margin` on both ends.
    ///
    /// Returns `None` if doing so would invert the interval (`min > max`),
    /// i.e. the margin is larger than half the interval's length.
    pub fn shrink(&self, margin: f32) -> Option<Self> {
        let min = self.min + margin;
        let max = self.max - margin;
        if min > max {
            None
        } else {
            Some(Self { min, max })
        }
    }

    pub fn length(&self) -> f32 {
        self.max - self.min
    }

    /// Expands the interval outward by `margin` on both ends.
    pub fn expand(&self, margin: f32) -> Self {
        Self {
            min: self.min - margin,
            max: self.max + margin,
        }
    }
}

/// How the raw min/max of occupied cell-center projections is adjusted to
/// describe a boundary of the occupied volume rather than of its cell
/// centers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Boundary {
    /// Shrink inward by half a cell's space diagonal: the interval is
    /// guaranteed to lie within the occupied region.
    Inside,
    /// Expand outward by half a cell's space diagonal: the interval is
    /// guaranteed to contain the occupied region.
    Outside,
    /// Use the raw cell-center extrema unchanged.
    Nearest,
}

/// Computes a Euclidean distance field over `occupancy`: the value at each
/// cell is the distance from its center to the nearest occupied cell's
/// center, via the jump-flood algorithm.
///
/// Runs `O(log2(max(num_x, num_y, num_z)))` propagation passes, each a full
/// grid-sized dispatch.
///
/// # Errors
/// Propagates any [`KernelError`] from building or dispatching the
/// underlying kernels.
pub fn dist_field<Occ: GridCell>(
    registry: &KernelRegistry,
    graphics_device: &GraphicsDevice,
    occupancy: &DeviceGrid<Occ>,
) -> Result<DeviceGrid<f32>, KernelError> {
    let metadata = *occupancy.metadata();

    let df = DeviceGrid::<[f32; 4]>::new_uninitialized(
        graphics_device,
        metadata,
        "distance field seed positions",
    );
    registry.dispatch_jump_flood_seed(graphics_device, occupancy, &df)?;

    let max_dim = metadata.num_x.max(metadata.num_y).max(metadata.num_z);
    let mut step = max_dim.next_power_of_two() / 2;
    step = step.max(1);
    loop {
        registry.dispatch_jump_flood_step(graphics_device, &df, step)?;
        if step == 1 {
            break;
        }
        step /= 2;
    }

    registry.ensure_map_fn::<[f32; 4], f32>(EXTRACT_DISTANCE_KERNEL, "vo = vi.w;");
    let out = DeviceGrid::<f32>::new_uninitialized(graphics_device, metadata, "distance field");
    registry.dispatch_map(graphics_device, EXTRACT_DISTANCE_KERNEL, &df, &out)?;

    Ok(out)
}

/// Computes the interval spanned by the projection of every occupied cell's
/// center onto `direction`.
///
/// Returns `None` if no cell is occupied.
///
/// # Errors
/// Propagates any [`KernelError`] from building or dispatching the
/// underlying kernels.
pub fn bound_of_axis<Occ: GridCell>(
    registry: &KernelRegistry,
    graphics_device: &GraphicsDevice,
    occupancy: &DeviceGrid<Occ>,
    direction: UnitVector3<f32>,
    boundary: Boundary,
) -> Result<Option<AxisInterval>, KernelError> {
    let metadata = *occupancy.metadata();
    let projected = DeviceGrid::<f32>::new_uninitialized(
        graphics_device,
        metadata,
        "axis projection",
    );
    registry.dispatch_axis_projection(graphics_device, occupancy, direction, &projected)?;

    registry.ensure_reduce_fn::<f32>(
        MIN_IGNORE_SENTINEL_KERNEL,
        "vo = 3.4028235e38;",
        "let av = select(a, 3.4028235e38, a >= 65536.0); \
         let bv = select(b, 3.4028235e38, b >= 65536.0); \
         vo = min(av, bv);",
    );
    registry.ensure_reduce_fn::<f32>(
        MAX_IGNORE_SENTINEL_KERNEL,
        "vo = -3.4028235e38;",
        "let av = select(a, -3.4028235e38, a >= 65536.0); \
         let bv = select(b, -3.4028235e38, b >= 65536.0); \
         vo = max(av, bv);",
    );

    let min = registry.dispatch_reduce::<f32>(graphics_device, MIN_IGNORE_SENTINEL_KERNEL, &projected)?;
    let max = registry.dispatch_reduce::<f32>(graphics_device, MAX_IGNORE_SENTINEL_KERNEL, &projected)?;

    if min > max {
        return Ok(None);
    }
    let raw = AxisInterval { min, max };
    let half_diagonal = 0.5 * metadata.res * 3f32.sqrt();

    Ok(match boundary {
        Boundary::Nearest => Some(raw),
        Boundary::Outside => Some(raw.expand(half_diagonal)),
        Boundary::Inside => raw.shrink(half_diagonal),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shrink_within_bounds_should_narrow_interval() {
        let interval = AxisInterval { min: 0.0, max: 10.0 };
        let shrunk = interval.shrink(2.0).unwrap();
        assert_eq!(shrunk.min, 2.0);
        assert_eq!(shrunk.max, 8.0);
    }

    #[test]
    fn shrink_past_midpoint_should_invert_to_none() {
        let interval = AxisInterval { min: 0.0, max: 1.0 };
        assert!(interval.shrink(1.0).is_none());
    }

    #[test]
    fn shrink_to_exactly_a_point_should_be_some() {
        let interval = AxisInterval { min: 0.0, max: 2.0 };
        let shrunk = interval.shrink(1.0).unwrap();
        assert_eq!(shrunk.min, shrunk.max);
    }

    #[test]
    fn expand_should_widen_interval_symmetrically() {
        let interval = AxisInterval { min: 1.0, max: 2.0 };
        let expanded = interval.expand(0.5);
        assert_eq!(expanded.min, 0.5);
        assert_eq!(expanded.max, 2.5);
    }
}
