//! Compilation flags dependent aliases for mathematical types.

use na::{Point2, Vector2};

/// The scalar type used throughout the solver.
pub type Real = f32;

/// The 2D vector type.
pub type Vector = Vector2<Real>;

/// The 2D point type.
pub type Point = Point2<Real>;

/// A 2D rigid transform stored as a position and the two rotated basis vectors.
///
/// The basis-vector representation (rather than an angle) is what the solver
/// tables consume directly, so bodies carry it pre-expanded.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Coords {
    /// The translation part.
    pub pos: Point,
    /// The first column of the rotation matrix.
    pub x_vector: Vector,
    /// The second column of the rotation matrix.
    pub y_vector: Vector,
}

impl Coords {
    /// Builds a transform from a position and a rotation angle (radians).
    pub fn new(pos: Point, angle: Real) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self {
            pos,
            x_vector: Vector::new(cos, sin),
            y_vector: Vector::new(-sin, cos),
        }
    }

    /// The identity transform.
    pub fn identity() -> Self {
        Self::new(Point::origin(), 0.0)
    }

    /// Transforms a point expressed in local coordinates to world coordinates.
    pub fn transform_point(&self, local: Point) -> Point {
        self.pos + self.x_vector * local.x + self.y_vector * local.y
    }
}

impl Default for Coords {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn coords_transform_point_rotates_and_translates() {
        let coords = Coords::new(Point::new(1.0, 2.0), std::f32::consts::FRAC_PI_2);
        let p = coords.transform_point(Point::new(1.0, 0.0));
        assert_relative_eq!(p.x, 1.0, epsilon = 1.0e-6);
        assert_relative_eq!(p.y, 3.0, epsilon = 1.0e-6);
    }
}
