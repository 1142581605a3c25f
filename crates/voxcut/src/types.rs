//! Grid metadata and the cell element types grids can hold.

use crate::error::GridError;
use bytemuck::Pod;
use nalgebra::{Point3, Vector3};

/// The scalar type stored in a single grid cell.
///
/// Implemented for `u32` (occupancy/label grids) and `f32` (distance/measure
/// grids). The WGSL type name is used when a kernel template is resolved
/// for a grid of this cell type.
pub trait GridCell: Pod + Copy + Send + Sync + 'static {
    /// The WGSL scalar type name used in generated shader source.
    const WGSL_TYPE: &'static str;

    /// A human-readable name for error messages.
    const NAME: &'static str;
}

impl GridCell for u32 {
    const WGSL_TYPE: &'static str = "u32";
    const NAME: &'static str = "u32";
}

impl GridCell for f32 {
    const WGSL_TYPE: &'static str = "f32";
    const NAME: &'static str = "f32";
}

/// Element type of a jump-flood distance field grid: `xyz` is the nearest
/// seed position found so far, `w` is the distance to it (negative while
/// unresolved).
impl GridCell for [f32; 4] {
    const WGSL_TYPE: &'static str = "vec4<f32>";
    const NAME: &'static str = "vec4f32";
}

/// The geometric description shared by every grid: its resolution, its
/// extent in cells along each axis, and the world-space position of its
/// minimum corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridMetadata {
    /// Edge length of a single (cubic) cell, in world units.
    pub res: f32,
    pub num_x: u32,
    pub num_y: u32,
    pub num_z: u32,
    /// World-space position of the grid's minimum corner.
    pub ofs: Point3<f32>,
}

impl GridMetadata {
    /// Creates new grid metadata, validating resolution and dimensions.
    ///
    /// # Errors
    /// Returns [`GridError::NonPositiveResolution`] if `res` is not
    /// positive, or [`GridError::ZeroDimension`] if any dimension is zero.
    pub fn new(
        res: f32,
        num_x: u32,
        num_y: u32,
        num_z: u32,
        ofs: Point3<f32>,
    ) -> Result<Self, GridError> {
        if !(res > 0.0) {
            return Err(GridError::NonPositiveResolution { res });
        }
        if num_x == 0 || num_y == 0 || num_z == 0 {
            return Err(GridError::ZeroDimension {
                num_x,
                num_y,
                num_z,
            });
        }
        Ok(Self {
            res,
            num_x,
            num_y,
            num_z,
            ofs,
        })
    }

    /// The total number of cells in the grid.
    pub fn num_cells(&self) -> usize {
        self.num_x as usize * self.num_y as usize * self.num_z as usize
    }

    /// Converts 3D cell coordinates to a linear index, in z-major order
    /// (matching the layout used by the compute kernels).
    ///
    /// # Errors
    /// Returns [`GridError::IndexOutOfBounds`] if any coordinate is out of
    /// range.
    pub fn cell_index(&self, ix: i64, iy: i64, iz: i64) -> Result<usize, GridError> {
        if ix < 0
            || iy < 0
            || iz < 0
            || ix >= self.num_x as i64
            || iy >= self.num_y as i64
            || iz >= self.num_z as i64
        {
            return Err(GridError::IndexOutOfBounds {
                index: 0,
                ix,
                iy,
                iz,
                num_x: self.num_x,
                num_y: self.num_y,
                num_z: self.num_z,
            });
        }
        let (ix, iy, iz) = (ix as usize, iy as usize, iz as usize);
        Ok(ix + self.num_x as usize * (iy + self.num_y as usize * iz))
    }

    /// Converts a linear index back to 3D cell coordinates.
    pub fn cell_coords(&self, index: usize) -> (u32, u32, u32) {
        let nxny = self.num_x as usize * self.num_y as usize;
        let iz = index / nxny;
        let rem = index % nxny;
        let iy = rem / self.num_x as usize;
        let ix = rem % self.num_x as usize;
        (ix as u32, iy as u32, iz as u32)
    }

    /// The world-space position of the center of the given cell.
    pub fn center_of(&self, ix: u32, iy: u32, iz: u32) -> Point3<f32> {
        self.ofs
            + Vector3::new(ix as f32 + 0.5, iy as f32 + 0.5, iz as f32 + 0.5) * self.res
    }

    /// The world-space position of the minimum corner of the given cell.
    pub fn corner_of(&self, ix: u32, iy: u32, iz: u32) -> Point3<f32> {
        self.ofs + Vector3::new(ix as f32, iy as f32, iz as f32) * self.res
    }

    /// The world-space size of the whole grid along each axis.
    pub fn extent(&self) -> Vector3<f32> {
        Vector3::new(self.num_x as f32, self.num_y as f32, self.num_z as f32) * self.res
    }

    /// Whether two grids can be combined in the same kernel dispatch: same
    /// cell counts along each axis, and the same resolution and minimum
    /// corner up to a small tolerance.
    pub fn compatible_with(&self, other: &Self) -> bool {
        const EPS: f32 = 1e-5;
        self.num_x == other.num_x
            && self.num_y == other.num_y
            && self.num_z == other.num_z
            && (self.res - other.res).abs() <= EPS
            && (self.ofs - other.ofs).norm() <= EPS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_metadata_should_be_compatible() {
        let a = GridMetadata::new(1.0, 4, 4, 4, Point3::origin()).unwrap();
        let b = GridMetadata::new(1.0, 4, 4, 4, Point3::origin()).unwrap();
        assert!(a.compatible_with(&b));
    }

    #[test]
    fn same_cell_count_but_different_axis_decomposition_should_be_incompatible() {
        let a = GridMetadata::new(1.0, 8, 2, 4, Point3::origin()).unwrap();
        let b = GridMetadata::new(1.0, 4, 4, 4, Point3::origin()).unwrap();
        assert_eq!(a.num_cells(), b.num_cells());
        assert!(!a.compatible_with(&b));
    }

    #[test]
    fn different_ofs_should_be_incompatible() {
        let a = GridMetadata::new(1.0, 4, 4, 4, Point3::origin()).unwrap();
        let b = GridMetadata::new(1.0, 4, 4, 4, Point3::new(1.0, 0.0, 0.0)).unwrap();
        assert!(!a.compatible_with(&b));
    }

    #[test]
    fn different_res_should_be_incompatible() {
        let a = GridMetadata::new(1.0, 4, 4, 4, Point3::origin()).unwrap();
        let b = GridMetadata::new(2.0, 4, 4, 4, Point3::origin()).unwrap();
        assert!(!a.compatible_with(&b));
    }
}
