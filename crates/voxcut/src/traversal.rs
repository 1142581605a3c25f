//! Block-hierarchical traversal of a grid for shape rasterization.
//!
//! Cells are grouped into `B x B x B` blocks. Before visiting the cells of
//! a block, the shape's signed distance is sampled once at the block's
//! center; because the distance function is 1-Lipschitz, if that sample
//! exceeds the block's circumscribed-sphere radius plus a single cell's,
//! no cell in the block can possibly be occupied under any [`RoundMode`],
//! and the whole block is skipped without visiting its cells individually.

use crate::shape::{RoundMode, Shape};
use crate::types::GridMetadata;

/// Cells are grouped into blocks of this size along each axis.
const BLOCK_SIZE: u32 = 8;

/// Visits every cell of `metadata` that cannot be pruned by block-level
/// culling, in z-major, then y, then x order within each block, with
/// blocks themselves visited in z-major order.
///
/// `visit` is called with the `(ix, iy, iz)` coordinates of each visited
/// cell; it is the caller's responsibility to re-evaluate `shape` at that
/// cell if finer classification is needed (block-level culling only proves
/// that a block has *no* occupied cells; it does not pre-classify individual
/// cells).
pub fn traverse_blocks(
    metadata: &GridMetadata,
    shape: &Shape,
    _round_mode: RoundMode,
    cell_half_diagonal: f32,
    mut visit: impl FnMut(u32, u32, u32),
) {
    let num_blocks_x = metadata.num_x.div_ceil(BLOCK_SIZE);
    let num_blocks_y = metadata.num_y.div_ceil(BLOCK_SIZE);
    let num_blocks_z = metadata.num_z.div_ceil(BLOCK_SIZE);

    for bz in 0..num_blocks_z {
        for by in 0..num_blocks_y {
            for bx in 0..num_blocks_x {
                let x0 = bx * BLOCK_SIZE;
                let y0 = by * BLOCK_SIZE;
                let z0 = bz * BLOCK_SIZE;
                let x1 = (x0 + BLOCK_SIZE).min(metadata.num_x);
                let y1 = (y0 + BLOCK_SIZE).min(metadata.num_y);
                let z1 = (z0 + BLOCK_SIZE).min(metadata.num_z);

                if block_is_prunable(metadata, shape, cell_half_diagonal, x0, y0, z0, x1, y1, z1) {
                    continue;
                }

                for iz in z0..z1 {
                    for iy in y0..y1 {
                        for ix in x0..x1 {
                            visit(ix, iy, iz);
                        }
                    }
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn block_is_prunable(
    metadata: &GridMetadata,
    shape: &Shape,
    cell_half_diagonal: f32,
    x0: u32,
    y0: u32,
    z0: u32,
    x1: u32,
    y1: u32,
    z1: u32,
) -> bool {
    let min_corner = metadata.corner_of(x0, y0, z0);
    let max_corner = metadata.corner_of(x1, y1, z1);
    let diagonal = max_corner - min_corner;
    let center = min_corner + diagonal * 0.5;
    let block_half_diagonal = 0.5 * diagonal.norm();

    let d = shape.signed_distance(center);
    d > block_half_diagonal + cell_half_diagonal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Cylinder;
    use nalgebra::{Point3, Vector3};

    #[test]
    fn traversal_should_visit_every_cell_exactly_once_when_no_pruning_is_possible() {
        let metadata = GridMetadata::new(1.0, 10, 10, 10, Point3::new(-5.0, -5.0, -5.0)).unwrap();
        let shape = Shape::Cylinder(Cylinder::new(Point3::origin(), Vector3::z(), 100.0, 100.0).unwrap());

        let mut visited = vec![false; metadata.num_cells()];
        traverse_blocks(&metadata, &shape, RoundMode::Outside, 0.1, |ix, iy, iz| {
            let index = metadata.cell_index(ix as i64, iy as i64, iz as i64).unwrap();
            assert!(!visited[index], "cell visited twice");
            visited[index] = true;
        });

        assert!(visited.iter().all(|&v| v));
    }

    #[test]
    fn traversal_should_skip_blocks_far_from_a_small_shape() {
        let metadata = GridMetadata::new(1.0, 32, 32, 32, Point3::new(-16.0, -16.0, -16.0)).unwrap();
        let shape = Shape::Cylinder(Cylinder::new(Point3::origin(), Vector3::z(), 0.5, 0.5).unwrap());

        let mut visited_count = 0usize;
        traverse_blocks(&metadata, &shape, RoundMode::Outside, 0.9, |_, _, _| {
            visited_count += 1;
        });

        assert!(visited_count < metadata.num_cells());
    }
}
