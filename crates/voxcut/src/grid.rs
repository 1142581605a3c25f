//! Host-resident voxel grids.

use crate::error::GridError;
use crate::shape::{RoundMode, Shape};
use crate::traversal::traverse_blocks;
use crate::types::{GridCell, GridMetadata};
use nalgebra::Point3;

/// A dense, host-resident grid of cells of type `T`, stored in z-major
/// order (matching [`GridMetadata::cell_index`]).
#[derive(Clone, Debug)]
pub struct HostGrid<T: GridCell> {
    metadata: GridMetadata,
    cells: Vec<T>,
}

impl<T: GridCell> HostGrid<T> {
    /// Creates a new grid with the given metadata, with every cell set to
    /// `fill_value`.
    pub fn new(metadata: GridMetadata, fill_value: T) -> Self {
        let cells = vec![fill_value; metadata.num_cells()];
        Self { metadata, cells }
    }

    /// Creates a new grid from metadata and a pre-populated cell buffer.
    ///
    /// # Errors
    /// Returns [`GridError::DimensionMismatch`] if `cells.len()` doesn't
    /// match `metadata.num_cells()`.
    pub fn from_cells(metadata: GridMetadata, cells: Vec<T>) -> Result<Self, GridError> {
        if cells.len() != metadata.num_cells() {
            return Err(GridError::DimensionMismatch {
                num_x: metadata.num_x,
                num_y: metadata.num_y,
                num_z: metadata.num_z,
                n_cells: metadata.num_cells(),
                n_values: cells.len(),
            });
        }
        Ok(Self { metadata, cells })
    }

    pub fn metadata(&self) -> &GridMetadata {
        &self.metadata
    }

    pub fn cells(&self) -> &[T] {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut [T] {
        &mut self.cells
    }

    /// Reads the cell at the given coordinates.
    ///
    /// # Errors
    /// Returns [`GridError::IndexOutOfBounds`] if the coordinates are out
    /// of range.
    pub fn get(&self, ix: i64, iy: i64, iz: i64) -> Result<T, GridError> {
        let index = self.metadata.cell_index(ix, iy, iz)?;
        Ok(self.cells[index])
    }

    /// Writes the cell at the given coordinates.
    ///
    /// # Errors
    /// Returns [`GridError::IndexOutOfBounds`] if the coordinates are out
    /// of range.
    pub fn set(&mut self, ix: i64, iy: i64, iz: i64, value: T) -> Result<(), GridError> {
        let index = self.metadata.cell_index(ix, iy, iz)?;
        self.cells[index] = value;
        Ok(())
    }

    /// Sets every cell in the grid to `value`.
    pub fn fill(&mut self, value: T) {
        self.cells.fill(value);
    }

    /// The world-space center of the given cell.
    pub fn center_of(&self, ix: u32, iy: u32, iz: u32) -> Point3<f32> {
        self.metadata.center_of(ix, iy, iz)
    }

    /// Counts the cells for which `predicate` holds.
    pub fn count(&self, mut predicate: impl FnMut(T) -> bool) -> usize {
        self.cells.iter().filter(|&&v| predicate(v)).count()
    }

    /// The fraction of the grid's volume (not cell count) occupied by cells
    /// for which `predicate` holds.
    pub fn volume(&self, predicate: impl FnMut(T) -> bool) -> f32 {
        let res = self.metadata.res;
        self.count(predicate) as f32 * res * res * res
    }
}

impl HostGrid<f32> {
    /// Counts the cells whose value equals `value`.
    pub fn count_eq(&self, value: f32) -> usize {
        self.count(|v| v == value)
    }

    /// Counts the cells whose value is less than `threshold`.
    pub fn count_less_than(&self, threshold: f32) -> usize {
        self.count(|v| v < threshold)
    }

    /// The maximum cell value in the grid.
    ///
    /// Returns `f32::NEG_INFINITY` if the grid has no cells (which cannot
    /// happen for a grid constructed through [`GridMetadata::new`]).
    pub fn max(&self) -> f32 {
        self.cells.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }
}

impl HostGrid<u32> {
    /// Counts the cells whose value equals `value`.
    pub fn count_eq(&self, value: u32) -> usize {
        self.count(|v| v == value)
    }

    /// The maximum cell value in the grid.
    pub fn max(&self) -> u32 {
        self.cells.iter().copied().max().unwrap_or(0)
    }

    /// Rasterizes `shape` into the grid, setting every occupied cell (per
    /// `round_mode`) to `occupied_value` and leaving the rest untouched.
    ///
    /// Uses block-hierarchical traversal to skip whole blocks of cells that
    /// the shape's signed distance bound proves cannot be occupied.
    pub fn fill_shape(&mut self, shape: &Shape, round_mode: RoundMode, occupied_value: u32) {
        let metadata = self.metadata;
        let half_diagonal = 0.5 * metadata.res * 3f32.sqrt();

        traverse_blocks(&metadata, shape, round_mode, half_diagonal, |ix, iy, iz| {
            let p = metadata.center_of(ix, iy, iz);
            let d = shape.signed_distance(p);
            if round_mode.classify(d, half_diagonal) {
                let index = metadata
                    .cell_index(ix as i64, iy as i64, iz as i64)
                    .expect("traversal always yields in-bounds coordinates");
                self.cells[index] = occupied_value;
            }
        });
    }

    /// Whether every cell for which `predicate` holds also satisfies
    /// `shape.signed_distance(center) <= 0`, i.e. the occupied cells (by
    /// center membership) are a subset of the shape's interior.
    pub fn every_point_inside_is(&self, shape: &Shape, mut predicate: impl FnMut(u32) -> bool) -> bool {
        for index in 0..self.cells.len() {
            if predicate(self.cells[index]) {
                let (ix, iy, iz) = self.metadata.cell_coords(index);
                if shape.signed_distance(self.metadata.center_of(ix, iy, iz)) > 0.0 {
                    return false;
                }
            }
        }
        true
    }

    /// Whether any cell for which `predicate` holds also satisfies
    /// `shape.signed_distance(center) <= 0`.
    pub fn any_point_inside_is(&self, shape: &Shape, mut predicate: impl FnMut(u32) -> bool) -> bool {
        for index in 0..self.cells.len() {
            if predicate(self.cells[index]) {
                let (ix, iy, iz) = self.metadata.cell_coords(index);
                if shape.signed_distance(self.metadata.center_of(ix, iy, iz)) <= 0.0 {
                    return true;
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Cylinder;
    use nalgebra::Vector3;

    fn small_metadata() -> GridMetadata {
        GridMetadata::new(1.0, 8, 8, 8, Point3::new(-4.0, -4.0, -4.0)).unwrap()
    }

    #[test]
    fn new_grid_should_be_filled_with_given_value() {
        let grid = HostGrid::new(small_metadata(), 7u32);
        assert!(grid.cells().iter().all(|&v| v == 7));
    }

    #[test]
    fn set_then_get_should_round_trip() {
        let mut grid = HostGrid::new(small_metadata(), 0u32);
        grid.set(1, 2, 3, 42).unwrap();
        assert_eq!(grid.get(1, 2, 3).unwrap(), 42);
    }

    #[test]
    fn get_out_of_bounds_should_fail() {
        let grid = HostGrid::new(small_metadata(), 0u32);
        assert!(grid.get(100, 0, 0).is_err());
    }

    #[test]
    fn clone_should_be_independent_of_original() {
        let mut grid = HostGrid::new(small_metadata(), 0u32);
        let clone = grid.clone();
        grid.set(0, 0, 0, 9).unwrap();
        assert_eq!(clone.get(0, 0, 0).unwrap(), 0);
    }

    #[test]
    fn fill_shape_with_nearest_round_should_set_center_inside_cells() {
        let mut grid = HostGrid::new(small_metadata(), 0u32);
        let shape = Shape::Cylinder(Cylinder::new(Point3::origin(), Vector3::z(), 2.0, 2.0).unwrap());
        grid.fill_shape(&shape, RoundMode::Nearest, 1);

        assert_eq!(grid.get(4, 4, 4).unwrap(), 1);
        assert!(grid.count_eq(1) > 0);
    }

    #[test]
    fn inside_round_should_set_fewer_or_equal_cells_than_outside_round() {
        let shape = Shape::Cylinder(Cylinder::new(Point3::origin(), Vector3::z(), 2.0, 2.0).unwrap());

        let mut inside_grid = HostGrid::new(small_metadata(), 0u32);
        inside_grid.fill_shape(&shape, RoundMode::Inside, 1);

        let mut outside_grid = HostGrid::new(small_metadata(), 0u32);
        outside_grid.fill_shape(&shape, RoundMode::Outside, 1);

        assert!(inside_grid.count_eq(1) <= outside_grid.count_eq(1));
    }

    #[test]
    fn fill_shape_box_on_10_cubed_grid_should_select_64_cells() {
        use crate::shape::OrientedBox;
        use nalgebra::UnitQuaternion;

        let metadata = GridMetadata::new(1.0, 10, 10, 10, Point3::new(0.0, 0.0, 0.0)).unwrap();
        let mut grid = HostGrid::new(metadata, 0u32);
        let shape = Shape::Box(
            OrientedBox::new(
                Point3::new(5.0, 5.0, 5.0),
                Vector3::new(2.0, 2.0, 2.0),
                UnitQuaternion::identity(),
            )
            .unwrap(),
        );
        grid.fill_shape(&shape, RoundMode::Nearest, 1);
        assert_eq!(grid.count_eq(1), 64);
    }

    #[test]
    fn every_point_inside_is_should_hold_for_inside_rounded_fill() {
        let shape = Shape::Cylinder(Cylinder::new(Point3::origin(), Vector3::z(), 2.0, 2.0).unwrap());
        let mut grid = HostGrid::new(small_metadata(), 0u32);
        grid.fill_shape(&shape, RoundMode::Inside, 1);
        assert!(grid.every_point_inside_is(&shape, |v| v == 1));
    }
}
