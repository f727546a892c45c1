use crate::dynamics::RigidBody;
use crate::math::{Real, Vector};
use crate::simd::{MAX_LANES, SimdFloat, SimdInt};

/// An iteration counter stored as a 32-bit float bit pattern.
///
/// The transient body record is four floats wide so that one indexed load
/// fetches a whole record per lane; the counter rides in the fourth float and
/// is only ever reinterpreted, never used as a numeric float.
#[derive(Copy, Clone, Debug)]
#[repr(transparent)]
pub(crate) struct IterationBits(Real);

impl IterationBits {
    #[inline(always)]
    pub fn new(iteration: i32) -> Self {
        Self(Real::from_bits(iteration as u32))
    }

    #[inline(always)]
    pub fn value(self) -> i32 {
        self.0.to_bits() as i32
    }

    #[inline(always)]
    pub fn as_float(self) -> Real {
        self.0
    }

    #[inline(always)]
    pub fn from_float(bits: Real) -> Self {
        Self(bits)
    }
}

/// Transient per-body state mutated by one of the two iteration passes.
///
/// One table of these backs the impulse pass (plain velocities) and a second
/// one the displacement pass (displacing velocities); the record layout is the
/// same for both.
#[derive(Copy, Clone, Debug)]
pub(crate) struct SolveBody {
    pub velocity: Vector,
    pub angular_velocity: Real,
    pub last_iteration: IterationBits,
}

impl SolveBody {
    pub fn from_velocities(velocity: Vector, angular_velocity: Real) -> Self {
        Self {
            velocity,
            angular_velocity,
            last_iteration: IterationBits::new(-1),
        }
    }
}

/// Read-only per-body parameters, eight floats per record.
#[derive(Copy, Clone, Debug)]
pub(crate) struct SolveBodyParams {
    pub inv_mass: Real,
    pub inv_inertia: Real,
    pub pos_x: Real,
    pub pos_y: Real,
    // The record is padded to eight floats so a single wide gather fetches it
    // whole; the basis vectors take no part in the limiter math.
    #[allow(dead_code)]
    pub x_vector_x: Real,
    #[allow(dead_code)]
    pub x_vector_y: Real,
    #[allow(dead_code)]
    pub y_vector_x: Real,
    #[allow(dead_code)]
    pub y_vector_y: Real,
}

impl SolveBodyParams {
    pub fn from_body(body: &RigidBody) -> Self {
        Self {
            inv_mass: body.inv_mass,
            inv_inertia: body.inv_inertia,
            pos_x: body.coords.pos.x,
            pos_y: body.coords.pos.y,
            x_vector_x: body.coords.x_vector.x,
            x_vector_y: body.coords.x_vector.y,
            y_vector_x: body.coords.y_vector.x,
            y_vector_y: body.coords.y_vector.y,
        }
    }
}

/// One lane-block of gathered [`SolveBody`] records.
pub(crate) struct SolveBodyLanes<F: SimdFloat> {
    pub velocity_x: F,
    pub velocity_y: F,
    pub angular_velocity: F,
    pub last_iteration_bits: F,
}

impl<F: SimdFloat> SolveBodyLanes<F> {
    /// Gathers `F::LANES` body records through the leading entries of
    /// `indices`.
    #[inline(always)]
    pub fn gather(table: &[SolveBody], indices: &[u32]) -> Self {
        let mut vx = [0.0; MAX_LANES];
        let mut vy = [0.0; MAX_LANES];
        let mut av = [0.0; MAX_LANES];
        let mut li = [0.0; MAX_LANES];

        for ii in 0..F::LANES {
            let body = &table[indices[ii] as usize];
            vx[ii] = body.velocity.x;
            vy[ii] = body.velocity.y;
            av[ii] = body.angular_velocity;
            li[ii] = body.last_iteration.as_float();
        }

        Self {
            velocity_x: F::from_slice(&vx),
            velocity_y: F::from_slice(&vy),
            angular_velocity: F::from_slice(&av),
            last_iteration_bits: F::from_slice(&li),
        }
    }

    /// Scatters the lanes back through the leading entries of `indices`.
    ///
    /// Within a SIMD-safe group the indices are pairwise disjoint, so the
    /// sequential per-lane stores cannot clobber each other.
    #[inline(always)]
    pub fn scatter(&self, table: &mut [SolveBody], indices: &[u32]) {
        let mut vx = [0.0; MAX_LANES];
        let mut vy = [0.0; MAX_LANES];
        let mut av = [0.0; MAX_LANES];
        let mut li = [0.0; MAX_LANES];

        self.velocity_x.write_to_slice(&mut vx);
        self.velocity_y.write_to_slice(&mut vy);
        self.angular_velocity.write_to_slice(&mut av);
        self.last_iteration_bits.write_to_slice(&mut li);

        for ii in 0..F::LANES {
            let body = &mut table[indices[ii] as usize];
            body.velocity.x = vx[ii];
            body.velocity.y = vy[ii];
            body.angular_velocity = av[ii];
            body.last_iteration = IterationBits::from_float(li[ii]);
        }
    }

    /// The per-lane `last_iteration` counters.
    #[inline(always)]
    pub fn last_iteration(&self) -> F::Int {
        self.last_iteration_bits.to_bits()
    }

    /// Sets `last_iteration` to `iteration` in every lane where `productive`
    /// is set.
    #[inline(always)]
    pub fn mark_iteration(&mut self, productive: F::Mask, iteration: F::Int) {
        let updated = F::Int::select(productive, iteration, self.last_iteration());
        self.last_iteration_bits = F::from_bits(updated);
    }
}

/// One lane-block of gathered [`SolveBodyParams`] records.
///
/// Only the mass properties and the position take part in the limiter math;
/// the basis vectors stay in the table.
pub(crate) struct BodyParamsLanes<F: SimdFloat> {
    pub inv_mass: F,
    pub inv_inertia: F,
    pub pos_x: F,
    pub pos_y: F,
}

impl<F: SimdFloat> BodyParamsLanes<F> {
    #[inline(always)]
    pub fn gather(table: &[SolveBodyParams], indices: &[u32]) -> Self {
        let mut im = [0.0; MAX_LANES];
        let mut ii_ = [0.0; MAX_LANES];
        let mut px = [0.0; MAX_LANES];
        let mut py = [0.0; MAX_LANES];

        for ii in 0..F::LANES {
            let params = &table[indices[ii] as usize];
            im[ii] = params.inv_mass;
            ii_[ii] = params.inv_inertia;
            px[ii] = params.pos_x;
            py[ii] = params.pos_y;
        }

        Self {
            inv_mass: F::from_slice(&im),
            inv_inertia: F::from_slice(&ii_),
            pos_x: F::from_slice(&px),
            pos_y: F::from_slice(&py),
        }
    }
}
