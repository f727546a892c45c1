//! The sequential-impulses contact solver and its transient SoA tables.

pub use self::contact_joint::ContactJoint;
pub use self::contact_solver::ContactSolver;

pub(crate) use self::interaction_groups::InteractionGroups;
pub(crate) use self::joint_packed::{ContactJointPacked, LimiterLanes};
pub(crate) use self::solver_body::{BodyParamsLanes, SolveBody, SolveBodyLanes, SolveBodyParams};

mod contact_joint;
mod contact_solver;
mod interaction_groups;
mod joint_packed;
mod solver_body;
