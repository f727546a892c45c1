//! # impulse2d
//!
//! impulse2d is a 2-dimensional sequential-impulses contact solver. It takes the
//! contact joints produced by an external collision-detection pipeline and
//! resolves them with an iterative Gauss–Seidel sweep: a velocity-correction
//! (impulse) pass followed by a position-correction (displacement) pass.
//!
//! The solver core is written once over a lane abstraction and instantiated for
//! three lane widths:
//! - scalar (width 1),
//! - 4 lanes (128-bit SIMD),
//! - 8 lanes (256-bit SIMD).
//!
//! Wide lanes require the joints they touch to reference pairwise-disjoint
//! bodies; [`dynamics::ContactSolver`] reorders joints into such groups before
//! solving and falls back to the scalar path for the ungroupable tail.
//!
//! Accumulated impulses persist on [`dynamics::ContactJoint`] across calls and
//! warm-start the next solve, which is what keeps tall stacks standing.

#![deny(bare_trait_objects)]
#![warn(missing_docs)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::needless_range_loop)]

pub extern crate nalgebra as na;
#[cfg(feature = "serde-serialize")]
#[macro_use]
extern crate serde;

#[cfg(feature = "parallel")]
pub use rayon;

pub mod counters;
pub mod dynamics;
pub mod geometry;
pub mod math;
pub mod simd;

/// The most common types and entry points, re-exported.
pub mod prelude {
    pub use crate::dynamics::{ContactJoint, ContactSolver, RigidBody, SolverParameters};
    pub use crate::geometry::ContactPoint;
    pub use crate::math::{Coords, Point, Real, Vector};
}
