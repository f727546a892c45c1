use super::joint_packed::{lane_load, lane_store};
use super::{
    BodyParamsLanes, ContactJoint, ContactJointPacked, InteractionGroups, LimiterLanes, SolveBody,
    SolveBodyLanes, SolveBodyParams,
};
use crate::counters::SolverCounters;
use crate::dynamics::{RigidBody, SolverParameters};
use crate::geometry::ContactPoint;
use crate::math::Real;
use crate::simd::{preferred_lane_width, MAX_LANES, SimdFloat, SimdInt, SimdMask};
use std::sync::Once;
use wide::{f32x4, f32x8};

static LANE_WIDTH_LOG: Once = Once::new();

/// Number of packed blocks handed to one worker when the refresh pass is
/// parallelized.
#[cfg(feature = "parallel")]
const REFRESH_CHUNK_BLOCKS: usize = 8;

/// The sequential-impulses contact solver.
///
/// One solver instance owns every transient table a solve needs; the tables
/// are resized on each call but keep their allocations, so a solver that is
/// reused across frames stops allocating once the scene size stabilizes.
///
/// The three `solve_*` entry points have identical semantics and only differ
/// in the SIMD lane width of the grouped prefix (results agree up to
/// floating-point reassociation). [`ContactSolver::solve`] picks the widest
/// variant the CPU supports.
pub struct ContactSolver {
    /// Tuning constants used by every solve.
    pub params: SolverParameters,
    /// Statistics of the last solve.
    pub counters: SolverCounters,
    bodies_impulse: Vec<SolveBody>,
    bodies_displacement: Vec<SolveBody>,
    bodies_params: Vec<SolveBodyParams>,
    joint_index: Vec<u32>,
    groups: InteractionGroups,
    joint_packed1: Vec<ContactJointPacked<1>>,
    joint_packed4: Vec<ContactJointPacked<4>>,
    joint_packed8: Vec<ContactJointPacked<8>>,
}

impl ContactSolver {
    /// Creates an empty solver with default parameters.
    pub fn new() -> Self {
        Self {
            params: SolverParameters::default(),
            counters: SolverCounters::new(),
            bodies_impulse: Vec::new(),
            bodies_displacement: Vec::new(),
            bodies_params: Vec::new(),
            joint_index: Vec::new(),
            groups: InteractionGroups::new(),
            joint_packed1: Vec::new(),
            joint_packed4: Vec::new(),
            joint_packed8: Vec::new(),
        }
    }

    /// Solves the given joints with the widest lane width this CPU supports.
    ///
    /// See [`ContactSolver::solve_scalar`] for the meaning of the arguments
    /// and the returned metric.
    pub fn solve(
        &mut self,
        bodies: &mut [RigidBody],
        contact_points: &[ContactPoint],
        joints: &mut [ContactJoint],
        contact_iterations: u32,
        position_iterations: u32,
    ) -> Real {
        let width = preferred_lane_width();
        LANE_WIDTH_LOG.call_once(|| log::debug!("contact solver lane width: {}", width));

        match width {
            8 => self.solve_simd8(
                bodies,
                contact_points,
                joints,
                contact_iterations,
                position_iterations,
            ),
            4 => self.solve_simd4(
                bodies,
                contact_points,
                joints,
                contact_iterations,
                position_iterations,
            ),
            _ => self.solve_scalar(
                bodies,
                contact_points,
                joints,
                contact_iterations,
                position_iterations,
            ),
        }
    }

    /// Solves the given joints with the scalar (width-1) kernels.
    ///
    /// Runs up to `contact_iterations` velocity-impulse sweeps followed by up
    /// to `position_iterations` displacement sweeps; each loop exits early
    /// once a whole sweep produces no impulse above the productive threshold.
    /// Body velocities and displacing velocities are written back to `bodies`,
    /// accumulated impulses to `joints`.
    ///
    /// Returns the average, over the joints, of the last productive iteration
    /// indices of their bodies (plus the constant grace offset) — a
    /// convergence diagnostic, `0.0` when `joints` is empty.
    pub fn solve_scalar(
        &mut self,
        bodies: &mut [RigidBody],
        contact_points: &[ContactPoint],
        joints: &mut [ContactJoint],
        contact_iterations: u32,
        position_iterations: u32,
    ) -> Real {
        profiling::scope!("ContactSolver::solve_scalar");
        let mut joint_packed = std::mem::take(&mut self.joint_packed1);
        let metric = self.solve_soa::<Real, 1>(
            &mut joint_packed,
            bodies,
            contact_points,
            joints,
            contact_iterations,
            position_iterations,
        );
        self.joint_packed1 = joint_packed;
        metric
    }

    /// Solves the given joints with 4-wide (128-bit SIMD) kernels.
    ///
    /// Semantics are identical to [`ContactSolver::solve_scalar`] up to
    /// floating-point reassociation.
    pub fn solve_simd4(
        &mut self,
        bodies: &mut [RigidBody],
        contact_points: &[ContactPoint],
        joints: &mut [ContactJoint],
        contact_iterations: u32,
        position_iterations: u32,
    ) -> Real {
        profiling::scope!("ContactSolver::solve_simd4");
        let mut joint_packed = std::mem::take(&mut self.joint_packed4);
        let metric = self.solve_soa::<f32x4, 4>(
            &mut joint_packed,
            bodies,
            contact_points,
            joints,
            contact_iterations,
            position_iterations,
        );
        self.joint_packed4 = joint_packed;
        metric
    }

    /// Solves the given joints with 8-wide (256-bit SIMD) kernels.
    ///
    /// Semantics are identical to [`ContactSolver::solve_scalar`] up to
    /// floating-point reassociation.
    pub fn solve_simd8(
        &mut self,
        bodies: &mut [RigidBody],
        contact_points: &[ContactPoint],
        joints: &mut [ContactJoint],
        contact_iterations: u32,
        position_iterations: u32,
    ) -> Real {
        profiling::scope!("ContactSolver::solve_simd8");
        let mut joint_packed = std::mem::take(&mut self.joint_packed8);
        let metric = self.solve_soa::<f32x8, 8>(
            &mut joint_packed,
            bodies,
            contact_points,
            joints,
            contact_iterations,
            position_iterations,
        );
        self.joint_packed8 = joint_packed;
        metric
    }

    fn solve_soa<F: SimdFloat, const N: usize>(
        &mut self,
        joint_packed: &mut Vec<ContactJointPacked<N>>,
        bodies: &mut [RigidBody],
        contact_points: &[ContactPoint],
        joints: &mut [ContactJoint],
        contact_iterations: u32,
        position_iterations: u32,
    ) -> Real {
        debug_assert_eq!(F::LANES, N);

        let joint_count = joints.len();
        let params = self.params;

        self.counters.reset();
        self.counters.njoints = joint_count;

        self.counters.prepare_time.start();
        let group_offset = {
            profiling::scope!("prepare");
            self.prepare(joint_packed, bodies, joints)
        };
        self.counters.prepare_time.pause();
        self.counters.ngrouped_joints = group_offset;

        self.counters.refresh_time.start();
        {
            profiling::scope!("refresh");
            self.refresh_joints::<F, N>(joint_packed, group_offset, joint_count, contact_points);
        }
        self.counters.refresh_time.pause();

        self.counters.impulse_time.start();
        {
            profiling::scope!("pre-step");
            pre_step_joints::<F, N>(joint_packed, 0, group_offset, &mut self.bodies_impulse);
            pre_step_joints::<Real, N>(
                joint_packed,
                group_offset,
                joint_count,
                &mut self.bodies_impulse,
            );
        }
        {
            profiling::scope!("impulse");
            for iteration_index in 0..contact_iterations {
                let mut productive = false;

                productive |= solve_joints_impulses::<F, N>(
                    joint_packed,
                    0,
                    group_offset,
                    &mut self.bodies_impulse,
                    iteration_index,
                    &params,
                );
                productive |= solve_joints_impulses::<Real, N>(
                    joint_packed,
                    group_offset,
                    joint_count,
                    &mut self.bodies_impulse,
                    iteration_index,
                    &params,
                );

                if !productive {
                    break;
                }
            }
        }
        self.counters.impulse_time.pause();

        self.counters.displacement_time.start();
        {
            profiling::scope!("displacement");
            for iteration_index in 0..position_iterations {
                let mut productive = false;

                productive |= solve_joints_displacement::<F, N>(
                    joint_packed,
                    0,
                    group_offset,
                    &mut self.bodies_displacement,
                    iteration_index,
                    &params,
                );
                productive |= solve_joints_displacement::<Real, N>(
                    joint_packed,
                    group_offset,
                    joint_count,
                    &mut self.bodies_displacement,
                    iteration_index,
                    &params,
                );

                if !productive {
                    break;
                }
            }
        }
        self.counters.displacement_time.pause();

        self.counters.finish_time.start();
        let metric = {
            profiling::scope!("finish");
            self.finish(joint_packed, bodies, joints)
        };
        self.counters.finish_time.pause();
        self.counters.iteration_metric = metric;

        metric
    }

    /// Copies bodies and joints into the transient SoA tables and reorders
    /// the joints into SIMD-safe groups. Returns the group offset.
    fn prepare<const N: usize>(
        &mut self,
        joint_packed: &mut Vec<ContactJointPacked<N>>,
        bodies: &[RigidBody],
        joints: &[ContactJoint],
    ) -> usize {
        self.bodies_params.clear();
        self.bodies_params
            .extend(bodies.iter().map(SolveBodyParams::from_body));

        self.bodies_impulse.clear();
        self.bodies_impulse.extend(
            bodies
                .iter()
                .map(|body| SolveBody::from_velocities(body.velocity, body.angular_velocity)),
        );

        self.bodies_displacement.clear();
        self.bodies_displacement.extend(bodies.iter().map(|body| {
            SolveBody::from_velocities(body.displacing_velocity, body.displacing_angular_velocity)
        }));

        let joint_count = joints.len();

        let group_offset =
            self.groups
                .group_joints(bodies.len(), joints, &mut self.joint_index, N);

        joint_packed.clear();
        joint_packed.resize_with(joint_count.div_ceil(N), ContactJointPacked::zeroed);

        for (i, &joint_i) in self.joint_index.iter().enumerate() {
            let joint = &joints[joint_i as usize];
            let jointp = &mut joint_packed[i / N];
            let ip = i % N;

            jointp.body1_index[ip] = joint.body1_index;
            jointp.body2_index[ip] = joint.body2_index;
            jointp.contact_point_index[ip] = joint.contact_point_index;

            // Only the accumulated impulses survive from the previous solve;
            // the projectors and masses are rebuilt by the refresh pass.
            jointp.normal_limiter.accumulated_impulse[ip] = joint.normal_impulse;
            jointp.normal_accumulated_displacing_impulse[ip] = joint.normal_displacing_impulse;
            jointp.friction_limiter.accumulated_impulse[ip] = joint.friction_impulse;
        }

        group_offset
    }

    /// Rebuilds both limiters of every joint from the current body transforms
    /// and contact points: grouped prefix wide, tail scalar.
    #[cfg(not(feature = "parallel"))]
    fn refresh_joints<F: SimdFloat, const N: usize>(
        &self,
        joint_packed: &mut [ContactJointPacked<N>],
        group_offset: usize,
        joint_count: usize,
        contact_points: &[ContactPoint],
    ) {
        refresh_joint_range::<F, N>(
            joint_packed,
            0,
            group_offset,
            &self.bodies_impulse,
            &self.bodies_params,
            contact_points,
            &self.params,
        );
        refresh_joint_range::<Real, N>(
            joint_packed,
            group_offset,
            joint_count,
            &self.bodies_impulse,
            &self.bodies_params,
            contact_points,
            &self.params,
        );
    }

    /// Parallel variant: full blocks of the grouped prefix fan out to the
    /// rayon pool (each block has a single writer), the scalar tail stays on
    /// the calling thread.
    #[cfg(feature = "parallel")]
    fn refresh_joints<F: SimdFloat, const N: usize>(
        &self,
        joint_packed: &mut [ContactJointPacked<N>],
        group_offset: usize,
        joint_count: usize,
        contact_points: &[ContactPoint],
    ) {
        use rayon::prelude::*;

        let bodies_impulse = &self.bodies_impulse;
        let bodies_params = &self.bodies_params;
        let params = &self.params;

        let grouped_blocks = group_offset / N;
        joint_packed[..grouped_blocks]
            .par_chunks_mut(REFRESH_CHUNK_BLOCKS)
            .for_each(|chunk| {
                for block in chunk {
                    refresh_block::<F, N>(
                        block,
                        0,
                        bodies_impulse,
                        bodies_params,
                        contact_points,
                        params,
                    );
                }
            });

        refresh_joint_range::<Real, N>(
            joint_packed,
            group_offset,
            joint_count,
            bodies_impulse,
            bodies_params,
            contact_points,
            params,
        );
    }

    /// Copies velocities and accumulated impulses back to the caller and
    /// computes the iteration metric.
    fn finish<const N: usize>(
        &mut self,
        joint_packed: &[ContactJointPacked<N>],
        bodies: &mut [RigidBody],
        joints: &mut [ContactJoint],
    ) -> Real {
        for (i, body) in bodies.iter_mut().enumerate() {
            body.velocity = self.bodies_impulse[i].velocity;
            body.angular_velocity = self.bodies_impulse[i].angular_velocity;

            body.displacing_velocity = self.bodies_displacement[i].velocity;
            body.displacing_angular_velocity = self.bodies_displacement[i].angular_velocity;
        }

        let joint_count = joints.len();

        for i in 0..joint_count {
            let jointp = &joint_packed[i / N];
            let ip = i % N;

            let joint = &mut joints[self.joint_index[i] as usize];
            joint.normal_impulse = jointp.normal_limiter.accumulated_impulse[ip];
            joint.normal_displacing_impulse = jointp.normal_accumulated_displacing_impulse[ip];
            joint.friction_impulse = jointp.friction_limiter.accumulated_impulse[ip];
        }

        if joint_count == 0 {
            return 0.0;
        }

        let mut iteration_sum = 0i64;

        for i in 0..joint_count {
            let jointp = &joint_packed[i / N];
            let ip = i % N;

            let body1 = jointp.body1_index[ip] as usize;
            let body2 = jointp.body2_index[ip] as usize;

            let impulse_last = self.bodies_impulse[body1]
                .last_iteration
                .value()
                .max(self.bodies_impulse[body2].last_iteration.value());
            let displacement_last = self.bodies_displacement[body1]
                .last_iteration
                .value()
                .max(self.bodies_displacement[body2].last_iteration.value());

            iteration_sum += (impulse_last + 2) as i64;
            iteration_sum += (displacement_last + 2) as i64;
        }

        iteration_sum as Real / joint_count as Real
    }
}

impl Default for ContactSolver {
    fn default() -> Self {
        Self::new()
    }
}

/// One lane-block of gathered contact points.
struct ContactPointLanes<F: SimdFloat> {
    delta1_x: F,
    delta1_y: F,
    delta2_x: F,
    delta2_y: F,
    normal_x: F,
    normal_y: F,
}

impl<F: SimdFloat> ContactPointLanes<F> {
    #[inline(always)]
    fn gather(contact_points: &[ContactPoint], indices: &[u32]) -> Self {
        let mut d1x = [0.0; MAX_LANES];
        let mut d1y = [0.0; MAX_LANES];
        let mut d2x = [0.0; MAX_LANES];
        let mut d2y = [0.0; MAX_LANES];
        let mut nx = [0.0; MAX_LANES];
        let mut ny = [0.0; MAX_LANES];

        for ii in 0..F::LANES {
            let point = &contact_points[indices[ii] as usize];
            d1x[ii] = point.delta1.x;
            d1y[ii] = point.delta1.y;
            d2x[ii] = point.delta2.x;
            d2y[ii] = point.delta2.y;
            nx[ii] = point.normal.x;
            ny[ii] = point.normal.y;
        }

        Self {
            delta1_x: F::from_slice(&d1x),
            delta1_y: F::from_slice(&d1y),
            delta2_x: F::from_slice(&d2x),
            delta2_y: F::from_slice(&d2y),
            normal_x: F::from_slice(&nx),
            normal_y: F::from_slice(&ny),
        }
    }
}

/// Recomputes both limiters of the `F::LANES` joints at slots `ip..` of one
/// packed block.
#[inline(always)]
fn refresh_block<F: SimdFloat, const N: usize>(
    jointp: &mut ContactJointPacked<N>,
    ip: usize,
    bodies_impulse: &[SolveBody],
    bodies_params: &[SolveBodyParams],
    contact_points: &[ContactPoint],
    params: &SolverParameters,
) {
    let body1 = SolveBodyLanes::<F>::gather(bodies_impulse, &jointp.body1_index[ip..]);
    let body2 = SolveBodyLanes::<F>::gather(bodies_impulse, &jointp.body2_index[ip..]);
    let params1 = BodyParamsLanes::<F>::gather(bodies_params, &jointp.body1_index[ip..]);
    let params2 = BodyParamsLanes::<F>::gather(bodies_params, &jointp.body2_index[ip..]);
    let contact = ContactPointLanes::<F>::gather(contact_points, &jointp.contact_point_index[ip..]);

    let point1_x = contact.delta1_x + params1.pos_x;
    let point1_y = contact.delta1_y + params1.pos_y;
    let point2_x = contact.delta2_x + params2.pos_x;
    let point2_y = contact.delta2_y + params2.pos_y;

    // Both limiters share these arms. Note that w2 is measured from body 2's
    // center to body 1's anchor: the impulse is applied at body 1's anchor
    // with the equal-and-opposite reaction on body 2.
    let w1_x = contact.delta1_x;
    let w1_y = contact.delta1_y;
    let w2_x = point1_x - params2.pos_x;
    let w2_y = point1_y - params2.pos_y;

    let normal = LimiterLanes::refresh(
        contact.normal_x,
        contact.normal_y,
        -contact.normal_x,
        -contact.normal_y,
        w1_x,
        w1_y,
        w2_x,
        w2_y,
        params1.inv_mass,
        params1.inv_inertia,
        params2.inv_mass,
        params2.inv_inertia,
    );

    let bounce = F::splat(params.bounce);
    let delta_velocity = F::splat(params.delta_velocity);
    let max_penetration_velocity = F::splat(params.max_penetration_velocity);
    let delta_depth = F::splat(params.delta_depth);
    let error_reduction = F::splat(params.error_reduction);

    let point_velocity1_x = (params1.pos_y - point1_y) * body1.angular_velocity + body1.velocity_x;
    let point_velocity1_y = (point1_x - params1.pos_x) * body1.angular_velocity + body1.velocity_y;

    let point_velocity2_x = (params2.pos_y - point2_y) * body2.angular_velocity + body2.velocity_x;
    let point_velocity2_y = (point2_x - params2.pos_x) * body2.angular_velocity + body2.velocity_y;

    let relative_velocity_x = point_velocity1_x - point_velocity2_x;
    let relative_velocity_y = point_velocity1_y - point_velocity2_y;

    let dv = -bounce
        * (relative_velocity_x * contact.normal_x + relative_velocity_y * contact.normal_y);
    let depth = (point2_x - point1_x) * contact.normal_x + (point2_y - point1_y) * contact.normal_y;

    let dst_velocity = (dv - delta_velocity).simd_max(F::zero());
    let shallow = depth.simd_lt(delta_depth);
    let dst_velocity = F::select(shallow, dst_velocity - max_penetration_velocity, dst_velocity);

    let dst_displacing_velocity =
        error_reduction * (depth - F::splat(2.0) * delta_depth).simd_max(F::zero());

    let tangent_x = -contact.normal_y;
    let tangent_y = contact.normal_x;

    let friction = LimiterLanes::refresh(
        tangent_x,
        tangent_y,
        -tangent_x,
        -tangent_y,
        w1_x,
        w1_y,
        w2_x,
        w2_y,
        params1.inv_mass,
        params1.inv_inertia,
        params2.inv_mass,
        params2.inv_inertia,
    );

    normal.store(&mut jointp.normal_limiter, ip);
    friction.store(&mut jointp.friction_limiter, ip);

    lane_store(&mut jointp.normal_dst_velocity, ip, dst_velocity);
    lane_store(
        &mut jointp.normal_dst_displacing_velocity,
        ip,
        dst_displacing_velocity,
    );
    // The displacing accumulator restarts every solve; the normal and
    // friction accumulators are the warm-start state and are kept.
    lane_store(&mut jointp.normal_accumulated_displacing_impulse, ip, F::zero());
}

fn refresh_joint_range<F: SimdFloat, const N: usize>(
    joint_packed: &mut [ContactJointPacked<N>],
    joint_begin: usize,
    joint_end: usize,
    bodies_impulse: &[SolveBody],
    bodies_params: &[SolveBodyParams],
    contact_points: &[ContactPoint],
    params: &SolverParameters,
) {
    debug_assert!(joint_begin % F::LANES == 0);

    for i in (joint_begin..joint_end).step_by(F::LANES) {
        refresh_block::<F, N>(
            &mut joint_packed[i / N],
            i % N,
            bodies_impulse,
            bodies_params,
            contact_points,
            params,
        );
    }
}

/// Applies the accumulated impulses of the previous solve back onto the body
/// velocities (warm start).
fn pre_step_joints<F: SimdFloat, const N: usize>(
    joint_packed: &[ContactJointPacked<N>],
    joint_begin: usize,
    joint_end: usize,
    bodies: &mut [SolveBody],
) {
    debug_assert!(joint_begin % F::LANES == 0);

    for i in (joint_begin..joint_end).step_by(F::LANES) {
        let jointp = &joint_packed[i / N];
        let ip = i % N;

        let mut body1 = SolveBodyLanes::<F>::gather(bodies, &jointp.body1_index[ip..]);
        let mut body2 = SolveBodyLanes::<F>::gather(bodies, &jointp.body2_index[ip..]);

        let normal = LimiterLanes::<F>::load(&jointp.normal_limiter, ip);
        let normal_accumulated = lane_load::<F, N>(&jointp.normal_limiter.accumulated_impulse, ip);
        let friction = LimiterLanes::<F>::load(&jointp.friction_limiter, ip);
        let friction_accumulated =
            lane_load::<F, N>(&jointp.friction_limiter.accumulated_impulse, ip);

        normal.apply_impulse(normal_accumulated, &mut body1, &mut body2);
        friction.apply_impulse(friction_accumulated, &mut body1, &mut body2);

        body1.scatter(bodies, &jointp.body1_index[ip..]);
        body2.scatter(bodies, &jointp.body2_index[ip..]);
    }
}

/// One velocity-impulse Gauss–Seidel sweep over `[joint_begin, joint_end)`.
///
/// Returns whether any joint produced an impulse above the productive
/// threshold.
fn solve_joints_impulses<F: SimdFloat, const N: usize>(
    joint_packed: &mut [ContactJointPacked<N>],
    joint_begin: usize,
    joint_end: usize,
    bodies: &mut [SolveBody],
    iteration_index: u32,
    params: &SolverParameters,
) -> bool {
    debug_assert!(joint_begin % F::LANES == 0);

    let iteration_lanes = F::Int::splat(iteration_index as i32);
    // Bodies keep their joints hot for two iterations after their last
    // productive impulse, so corrections can still propagate one hop.
    let grace_lanes = F::Int::splat(iteration_index as i32 - 2);

    let friction_coefficient = F::splat(params.friction_coefficient);
    let productive_threshold = F::splat(params.productive_impulse_threshold);

    let mut productive_any = F::Mask::empty();

    for i in (joint_begin..joint_end).step_by(F::LANES) {
        let jointp = &mut joint_packed[i / N];
        let ip = i % N;

        let mut body1 = SolveBodyLanes::<F>::gather(bodies, &jointp.body1_index[ip..]);
        let mut body2 = SolveBodyLanes::<F>::gather(bodies, &jointp.body2_index[ip..]);

        if params.early_out {
            let active = body1.last_iteration().simd_gt(grace_lanes)
                | body2.last_iteration().simd_gt(grace_lanes);

            if active.none() {
                continue;
            }
        }

        let normal = LimiterLanes::<F>::load(&jointp.normal_limiter, ip);
        let mut normal_accumulated =
            lane_load::<F, N>(&jointp.normal_limiter.accumulated_impulse, ip);
        let dst_velocity = lane_load::<F, N>(&jointp.normal_dst_velocity, ip);

        let normal_dv = dst_velocity - normal.projected_velocity(&body1, &body2);
        let mut normal_delta = normal_dv * normal.comp_inv_mass;

        // No tensile impulse: the total accumulated normal impulse stays
        // non-negative.
        normal_delta = normal_delta.simd_max(-normal_accumulated);

        normal.apply_impulse(normal_delta, &mut body1, &mut body2);
        normal_accumulated += normal_delta;

        let friction = LimiterLanes::<F>::load(&jointp.friction_limiter, ip);
        let mut friction_accumulated =
            lane_load::<F, N>(&jointp.friction_limiter.accumulated_impulse, ip);

        // The friction target velocity is zero; it reads the velocities the
        // normal impulse just updated.
        let friction_dv = -friction.projected_velocity(&body1, &body2);
        let mut friction_delta = friction_dv * friction.comp_inv_mass;

        let friction_force = friction_accumulated + friction_delta;
        let friction_bound = normal_accumulated * friction_coefficient;

        let clamped_delta = friction_force.copy_sign_to(friction_bound) - friction_accumulated;
        let outside_cone = friction_force.abs().simd_gt(friction_bound);
        friction_delta = F::select(outside_cone, clamped_delta, friction_delta);

        friction_accumulated += friction_delta;
        friction.apply_impulse(friction_delta, &mut body1, &mut body2);

        lane_store(
            &mut jointp.normal_limiter.accumulated_impulse,
            ip,
            normal_accumulated,
        );
        lane_store(
            &mut jointp.friction_limiter.accumulated_impulse,
            ip,
            friction_accumulated,
        );

        let cumulative_impulse = normal_delta.abs().simd_max(friction_delta.abs());
        let productive = cumulative_impulse.simd_gt(productive_threshold);

        productive_any = productive_any | productive;

        body1.mark_iteration(productive, iteration_lanes);
        body2.mark_iteration(productive, iteration_lanes);

        body1.scatter(bodies, &jointp.body1_index[ip..]);
        body2.scatter(bodies, &jointp.body2_index[ip..]);
    }

    productive_any.any()
}

/// One displacement (position-correction) sweep over `[joint_begin,
/// joint_end)`: the normal limiter only, driven by the penetration-derived
/// target, on the displacing velocities.
fn solve_joints_displacement<F: SimdFloat, const N: usize>(
    joint_packed: &mut [ContactJointPacked<N>],
    joint_begin: usize,
    joint_end: usize,
    bodies: &mut [SolveBody],
    iteration_index: u32,
    params: &SolverParameters,
) -> bool {
    debug_assert!(joint_begin % F::LANES == 0);

    let iteration_lanes = F::Int::splat(iteration_index as i32);
    let grace_lanes = F::Int::splat(iteration_index as i32 - 2);

    let productive_threshold = F::splat(params.productive_impulse_threshold);

    let mut productive_any = F::Mask::empty();

    for i in (joint_begin..joint_end).step_by(F::LANES) {
        let jointp = &mut joint_packed[i / N];
        let ip = i % N;

        let mut body1 = SolveBodyLanes::<F>::gather(bodies, &jointp.body1_index[ip..]);
        let mut body2 = SolveBodyLanes::<F>::gather(bodies, &jointp.body2_index[ip..]);

        if params.early_out {
            let active = body1.last_iteration().simd_gt(grace_lanes)
                | body2.last_iteration().simd_gt(grace_lanes);

            if active.none() {
                continue;
            }
        }

        let normal = LimiterLanes::<F>::load(&jointp.normal_limiter, ip);
        let dst_displacing_velocity =
            lane_load::<F, N>(&jointp.normal_dst_displacing_velocity, ip);
        let mut accumulated =
            lane_load::<F, N>(&jointp.normal_accumulated_displacing_impulse, ip);

        let dv = dst_displacing_velocity - normal.projected_velocity(&body1, &body2);
        let mut delta = dv * normal.comp_inv_mass;

        delta = delta.simd_max(-accumulated);

        normal.apply_impulse(delta, &mut body1, &mut body2);
        accumulated += delta;

        lane_store(
            &mut jointp.normal_accumulated_displacing_impulse,
            ip,
            accumulated,
        );

        let productive = delta.abs().simd_gt(productive_threshold);

        productive_any = productive_any | productive;

        body1.mark_iteration(productive, iteration_lanes);
        body2.mark_iteration(productive, iteration_lanes);

        body1.scatter(bodies, &jointp.body1_index[ip..]);
        body2.scatter(bodies, &jointp.body2_index[ip..]);
    }

    productive_any.any()
}
