//! Structures related to the contact geometry consumed by the solver.

pub use self::contact::ContactPoint;

mod contact;
