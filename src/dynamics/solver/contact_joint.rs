use crate::math::Real;

/// A contact constraint between two bodies, persistent across solves.
///
/// The joint stores indices rather than references: the solver gathers and
/// scatters body and contact-point data by index, which is what makes the
/// SIMD-wide tables possible.
///
/// The three accumulated impulses are the warm-start state. The normal and
/// friction accumulators survive from one solve to the next (and must: stacks
/// rely on it); the displacing accumulator is reset every solve.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct ContactJoint {
    /// Index of the first body in the body slice passed to the solver.
    pub body1_index: u32,
    /// Index of the second body.
    pub body2_index: u32,
    /// Index of this joint's contact point in the contact-point slice.
    pub contact_point_index: u32,
    /// Accumulated normal impulse. Never negative.
    pub normal_impulse: Real,
    /// Accumulated displacing (position-correction) impulse. Never negative.
    pub normal_displacing_impulse: Real,
    /// Accumulated friction impulse. Bounded by the friction cone:
    /// `|friction| <= friction_coefficient * normal` after every solve.
    pub friction_impulse: Real,
}

impl ContactJoint {
    /// Creates a joint with zeroed accumulated impulses.
    pub fn new(body1_index: u32, body2_index: u32, contact_point_index: u32) -> Self {
        Self {
            body1_index,
            body2_index,
            contact_point_index,
            normal_impulse: 0.0,
            normal_displacing_impulse: 0.0,
            friction_impulse: 0.0,
        }
    }
}
