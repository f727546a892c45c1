//! Parameters controlling the behavior of the contact solver.

use crate::math::Real;

/// Tuning constants of the contact solver.
///
/// The defaults reproduce the behavior of the reference playground this solver
/// grew out of; scenes with different units will want to scale the velocity
/// and depth thresholds accordingly.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct SolverParameters {
    /// The Coulomb friction coefficient applied to every contact.
    pub friction_coefficient: Real,
    /// Impulses smaller than this don't count as progress; once no joint
    /// produces a larger one, the iteration loops exit early.
    pub productive_impulse_threshold: Real,
    /// Restitution factor applied to the pre-solve relative normal velocity.
    pub bounce: Real,
    /// Slop subtracted from the target normal velocity before it is clamped to
    /// be separating.
    pub delta_velocity: Real,
    /// Approach velocity still allowed while the contact is shallower than
    /// [`Self::delta_depth`].
    pub max_penetration_velocity: Real,
    /// Collision margin: the depth reported by contact generation at which the
    /// surfaces actually touch.
    pub delta_depth: Real,
    /// Fraction of the excess penetration converted into displacing velocity
    /// per solve.
    pub error_reduction: Real,
    /// Skip joints whose bodies saw no productive impulse in the last two
    /// iterations. Disabling this solves every joint every iteration; the
    /// fixed point reached is the same up to numerical noise.
    pub early_out: bool,
}

impl Default for SolverParameters {
    fn default() -> Self {
        Self {
            friction_coefficient: 0.3,
            productive_impulse_threshold: 1.0e-4,
            bounce: 0.0,
            delta_velocity: 1.0,
            max_penetration_velocity: 0.1,
            delta_depth: 1.0,
            error_reduction: 0.1,
            early_out: true,
        }
    }
}
