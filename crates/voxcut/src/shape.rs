//! Signed distance functions for the primitive shapes used to carve
//! occupancy into a grid.
//!
//! Every shape's `signed_distance` is 1-Lipschitz: `|d(p) - d(q)| <=
//! |p - q|`. [`crate::traversal`] and [`crate::grid::HostGrid::fill_shape`]
//! rely on this to conservatively cull whole blocks of cells from a single
//! distance sample at the block center.

use crate::error::ShapeError;
use nalgebra::{Point3, Unit, UnitQuaternion, Vector3};

/// How a shape's zero level set is rounded onto a grid of finite cells.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RoundMode {
    /// A cell is occupied only if it is entirely inside the shape.
    ///
    /// Under-approximates the shape's volume.
    Inside,
    /// A cell is occupied if any part of it could be inside the shape.
    ///
    /// Over-approximates the shape's volume.
    Outside,
    /// A cell is occupied if its center is inside the shape.
    Nearest,
}

impl RoundMode {
    /// Decides whether a cell with the given signed distance at its center
    /// and the given circumscribed-sphere radius should be considered
    /// occupied under this rounding mode.
    ///
    /// `half_diagonal` is half the cell's space diagonal, i.e. the radius
    /// of the sphere centered on the cell that contains it; the 1-Lipschitz
    /// property of the distance function turns this into a sound bound for
    /// [`RoundMode::Inside`] and [`RoundMode::Outside`].
    pub fn classify(&self, center_distance: f32, half_diagonal: f32) -> bool {
        match self {
            RoundMode::Inside => center_distance <= -half_diagonal,
            RoundMode::Outside => center_distance <= half_diagonal,
            RoundMode::Nearest => center_distance <= 0.0,
        }
    }
}

/// A primitive solid shape, described in world space, that can be
/// rasterized into a grid or queried for its signed distance at a point.
#[derive(Clone, Debug)]
pub enum Shape {
    Cylinder(Cylinder),
    Elh(Elh),
    Box(OrientedBox),
}

/// A capped right circular cylinder.
#[derive(Clone, Debug)]
pub struct Cylinder {
    center: Point3<f32>,
    axis: Unit<Vector3<f32>>,
    radius: f32,
    half_height: f32,
}

impl Cylinder {
    /// Creates a new cylinder centered at `center`, extruded along `axis`
    /// for a total height of `2 * half_height`.
    ///
    /// # Errors
    /// Returns [`ShapeError::ZeroAxisDirection`] if `axis` has zero length,
    /// [`ShapeError::NonPositiveCylinderRadius`] if `radius` is not
    /// positive, or [`ShapeError::NonPositiveCylinderHeight`] if
    /// `half_height` is not positive.
    pub fn new(
        center: Point3<f32>,
        axis: Vector3<f32>,
        radius: f32,
        half_height: f32,
    ) -> Result<Self, ShapeError> {
        let axis = Unit::try_new(axis, 1e-8).ok_or(ShapeError::ZeroAxisDirection)?;
        if !(radius > 0.0) {
            return Err(ShapeError::NonPositiveCylinderRadius { radius });
        }
        if !(half_height > 0.0) {
            return Err(ShapeError::NonPositiveCylinderHeight {
                height: half_height,
            });
        }
        Ok(Self {
            center,
            axis,
            radius,
            half_height,
        })
    }

    pub fn signed_distance(&self, p: Point3<f32>) -> f32 {
        let rel = p - self.center;
        let t = rel.dot(&self.axis);
        let radial = (rel - self.axis.into_inner() * t).norm();

        let dx = radial - self.radius;
        let dy = t.abs() - self.half_height;

        dx.max(dy).min(0.0) + dx.max(0.0).hypot(dy.max(0.0))
    }
}

/// An "extruded long hole": a stadium (capsule cross-section) extruded
/// along an axis perpendicular to its elongation.
#[derive(Clone, Debug)]
pub struct Elh {
    center: Point3<f32>,
    axis: Unit<Vector3<f32>>,
    elongation: Unit<Vector3<f32>>,
    radius: f32,
    half_length: f32,
    half_height: f32,
}

impl Elh {
    /// Creates a new ELH centered at `center`, extruded along `axis` for a
    /// total height of `2 * half_height`, with a stadium cross-section
    /// whose straight segment runs along `elongation` for a total length of
    /// `2 * half_length` and whose rounded ends have the given `radius`.
    ///
    /// `axis` and `elongation` must be perpendicular.
    ///
    /// # Errors
    /// Returns [`ShapeError::ZeroAxisDirection`] if either direction is
    /// zero, [`ShapeError::NonPerpendicularElhAxis`] if they are not
    /// perpendicular, or [`ShapeError::NonPositiveElhRadius`] if `radius`
    /// is not positive.
    pub fn new(
        center: Point3<f32>,
        axis: Vector3<f32>,
        elongation: Vector3<f32>,
        radius: f32,
        half_length: f32,
        half_height: f32,
    ) -> Result<Self, ShapeError> {
        let axis = Unit::try_new(axis, 1e-8).ok_or(ShapeError::ZeroAxisDirection)?;
        let elongation = Unit::try_new(elongation, 1e-8).ok_or(ShapeError::ZeroAxisDirection)?;
        if axis.dot(&elongation).abs() > 1e-4 {
            return Err(ShapeError::NonPerpendicularElhAxis);
        }
        if !(radius > 0.0) {
            return Err(ShapeError::NonPositiveElhRadius { radius });
        }
        Ok(Self {
            center,
            axis,
            elongation,
            radius,
            half_length: half_length.max(0.0),
            half_height,
        })
    }

    pub fn signed_distance(&self, p: Point3<f32>) -> f32 {
        let rel = p - self.center;
        let t = rel.dot(&self.axis);
        let u = rel.dot(&self.elongation);
        let width_dir = self.axis.into_inner().cross(&self.elongation.into_inner());
        let v = rel.dot(&width_dir);

        let uc = u.clamp(-self.half_length, self.half_length);
        let cross_section = (u - uc).hypot(v) - self.radius;

        let dy = t.abs() - self.half_height;

        cross_section.max(dy).min(0.0) + cross_section.max(0.0).hypot(dy.max(0.0))
    }
}

/// An arbitrarily oriented box.
#[derive(Clone, Debug)]
pub struct OrientedBox {
    center: Point3<f32>,
    half_extents: Vector3<f32>,
    rotation: UnitQuaternion<f32>,
}

impl OrientedBox {
    /// Creates a new box centered at `center` with the given `half_extents`
    /// along its own local axes, rotated into world space by `rotation`.
    ///
    /// # Errors
    /// Returns [`ShapeError::NonPositiveBoxHalfExtents`] if any half-extent
    /// is not positive.
    pub fn new(
        center: Point3<f32>,
        half_extents: Vector3<f32>,
        rotation: UnitQuaternion<f32>,
    ) -> Result<Self, ShapeError> {
        if half_extents.iter().any(|e| !(*e > 0.0)) {
            return Err(ShapeError::NonPositiveBoxHalfExtents {
                half_extents: [half_extents.x, half_extents.y, half_extents.z],
            });
        }
        Ok(Self {
            center,
            half_extents,
            rotation,
        })
    }

    pub fn signed_distance(&self, p: Point3<f32>) -> f32 {
        let local = self.rotation.inverse_transform_vector(&(p - self.center));
        let q = local.abs() - self.half_extents;
        q.sup(&Vector3::zeros()).norm() + q.x.max(q.y.max(q.z)).min(0.0)
    }
}

impl Shape {
    /// The signed distance from `p` to this shape's surface: negative
    /// inside, positive outside.
    pub fn signed_distance(&self, p: Point3<f32>) -> f32 {
        match self {
            Shape::Cylinder(c) => c.signed_distance(p),
            Shape::Elh(e) => e.signed_distance(p),
            Shape::Box(b) => b.signed_distance(p),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn cylinder_signed_distance_should_match_reference_samples() {
        // Cylinder of height 2 and radius 1, centered so its base sits at
        // z=0 and its cap at z=2 (axis = (0,0,1)).
        let c = Cylinder::new(Point3::new(0.0, 0.0, 1.0), Vector3::z(), 1.0, 1.0).unwrap();
        assert_relative_eq!(c.signed_distance(Point3::new(0.0, 0.0, 1.0)), -1.0, epsilon = 1e-5);
        assert_relative_eq!(c.signed_distance(Point3::new(1.0, 0.0, 1.0)), 0.0, epsilon = 1e-5);
        assert_relative_eq!(c.signed_distance(Point3::new(2.0, 0.0, 1.0)), 1.0, epsilon = 1e-5);
        assert_relative_eq!(c.signed_distance(Point3::new(0.0, 0.0, -0.5)), 0.5, epsilon = 1e-5);
        assert_relative_eq!(c.signed_distance(Point3::new(0.0, 0.0, 3.0)), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn box_signed_distance_should_match_reference_samples() {
        let b = OrientedBox::new(
            Point3::origin(),
            Vector3::new(1.0, 2.0, 3.0),
            UnitQuaternion::identity(),
        )
        .unwrap();
        assert_relative_eq!(b.signed_distance(Point3::new(0.0, 0.0, 0.0)), -1.0, epsilon = 1e-5);
        assert_relative_eq!(b.signed_distance(Point3::new(1.0, 0.0, 0.0)), 0.0, epsilon = 1e-5);
        assert_relative_eq!(b.signed_distance(Point3::new(2.0, 0.0, 0.0)), 1.0, epsilon = 1e-5);
        assert_relative_eq!(
            b.signed_distance(Point3::new(2.0, 3.0, 4.0)),
            3f32.sqrt(),
            epsilon = 1e-5
        );
    }

    #[test]
    fn cylinder_center_should_be_negative() {
        let c = Cylinder::new(Point3::origin(), Vector3::z(), 1.0, 1.0).unwrap();
        assert!(c.signed_distance(Point3::origin()) < 0.0);
    }

    #[test]
    fn cylinder_surface_point_should_be_near_zero() {
        let c = Cylinder::new(Point3::origin(), Vector3::z(), 2.0, 3.0).unwrap();
        let p = Point3::new(2.0, 0.0, 0.0);
        assert_relative_eq!(c.signed_distance(p), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn cylinder_far_point_should_match_euclidean_distance_along_axis() {
        let c = Cylinder::new(Point3::origin(), Vector3::z(), 1.0, 1.0).unwrap();
        let p = Point3::new(0.0, 0.0, 11.0);
        assert_relative_eq!(c.signed_distance(p), 10.0, epsilon = 1e-5);
    }

    #[test]
    fn box_center_should_be_negative_half_extent() {
        let b = OrientedBox::new(
            Point3::origin(),
            Vector3::new(1.0, 2.0, 3.0),
            UnitQuaternion::identity(),
        )
        .unwrap();
        assert_relative_eq!(b.signed_distance(Point3::origin()), -1.0, epsilon = 1e-5);
    }

    #[test]
    fn elh_should_be_negative_along_whole_elongated_segment() {
        let e = Elh::new(
            Point3::origin(),
            Vector3::z(),
            Vector3::x(),
            1.0,
            5.0,
            1.0,
        )
        .unwrap();
        assert!(e.signed_distance(Point3::new(4.0, 0.0, 0.0)) < 0.0);
        assert!(e.signed_distance(Point3::new(0.0, 0.0, 0.0)) < 0.0);
    }

    #[test]
    fn elh_with_non_perpendicular_axes_should_be_rejected() {
        let result = Elh::new(
            Point3::origin(),
            Vector3::z(),
            Vector3::new(1.0, 0.0, 1.0),
            1.0,
            5.0,
            1.0,
        );
        assert!(matches!(result, Err(ShapeError::NonPerpendicularElhAxis)));
    }

    #[test]
    fn signed_distance_should_be_1_lipschitz_under_bounded_sampling() {
        let c = Cylinder::new(Point3::new(0.3, -0.2, 0.1), Vector3::new(1.0, 1.0, 0.5), 1.5, 2.0)
            .unwrap();
        let shape = Shape::Cylinder(c);

        let mut rng_state: u32 = 0x1234_5678;
        let mut next = || {
            rng_state ^= rng_state << 13;
            rng_state ^= rng_state >> 17;
            rng_state ^= rng_state << 5;
            (rng_state as f32 / u32::MAX as f32) * 10.0 - 5.0
        };

        for _ in 0..500 {
            let p = Point3::new(next(), next(), next());
            let q = Point3::new(next(), next(), next());
            let dp = shape.signed_distance(p);
            let dq = shape.signed_distance(q);
            let dist = (p - q).norm();
            assert!(
                (dp - dq).abs() <= dist + 1e-4,
                "Lipschitz bound violated: |{dp} - {dq}| > {dist}"
            );
        }
    }
}
