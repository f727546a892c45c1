//! The rigid body seen by the solver.

use crate::math::{Coords, Real, Vector};

/// A rigid body, as consumed and produced by the contact solver.
///
/// Integration and collision detection own these between solves; the solver
/// reads every field during its prepare phase and writes the velocities (and
/// displacing velocities) back when it finishes.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct RigidBody {
    /// The world-space transform of this body.
    pub coords: Coords,
    /// The linear velocity.
    pub velocity: Vector,
    /// The angular velocity.
    pub angular_velocity: Real,
    /// The pseudo-velocity accumulated by the displacement pass; the
    /// integrator applies it to the position once and clears it.
    pub displacing_velocity: Vector,
    /// The angular counterpart of [`Self::displacing_velocity`].
    pub displacing_angular_velocity: Real,
    /// Inverse mass; zero makes the body immovable.
    pub inv_mass: Real,
    /// Inverse angular inertia; zero prevents rotation.
    pub inv_inertia: Real,
}

impl RigidBody {
    /// Creates a dynamic body at the given transform.
    pub fn new(coords: Coords, inv_mass: Real, inv_inertia: Real) -> Self {
        Self {
            coords,
            velocity: Vector::zeros(),
            angular_velocity: 0.0,
            displacing_velocity: Vector::zeros(),
            displacing_angular_velocity: 0.0,
            inv_mass,
            inv_inertia,
        }
    }

    /// Creates an immovable body (infinite mass and inertia).
    pub fn fixed(coords: Coords) -> Self {
        Self::new(coords, 0.0, 0.0)
    }

    /// Whether impulses can move this body at all.
    pub fn is_dynamic(&self) -> bool {
        self.inv_mass != 0.0 || self.inv_inertia != 0.0
    }
}
