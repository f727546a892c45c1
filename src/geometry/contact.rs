//! Contact points produced by an external narrow-phase.

use crate::math::Vector;

/// A single contact point between two bodies.
///
/// Contact points are produced by the collision-detection pipeline and are
/// read-only for the solver; the joints referencing them carry the persistent
/// solver state.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct ContactPoint {
    /// Offset from the first body's center of mass to the contact point.
    pub delta1: Vector,
    /// Offset from the second body's center of mass to the contact point.
    pub delta2: Vector,
    /// Contact normal in world space, pointing from the second body into the
    /// first. Must be unit-length.
    pub normal: Vector,
    /// Whether this point was created by the last narrow-phase update rather
    /// than tracked from a previous frame.
    pub is_newly_created: bool,
}

impl ContactPoint {
    /// Creates a contact point from the two center-of-mass offsets and the
    /// world-space normal.
    pub fn new(delta1: Vector, delta2: Vector, normal: Vector) -> Self {
        Self {
            delta1,
            delta2,
            normal,
            is_newly_created: true,
        }
    }
}
