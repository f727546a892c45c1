//! Structures related to the rigid bodies and the contact-constraint solver.

pub use self::rigid_body::RigidBody;
pub use self::solver::{ContactJoint, ContactSolver};
pub use self::solver_parameters::SolverParameters;

mod rigid_body;
pub mod solver;
mod solver_parameters;
