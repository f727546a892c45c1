//! End-to-end properties of the contact solver.

use approx::assert_relative_eq;
use impulse2d::na;
use impulse2d::prelude::*;

/// Deterministic PCG-XSH-RR generator so scene construction is reproducible.
struct Pcg32 {
    state: u64,
    inc: u64,
}

impl Pcg32 {
    const MULTIPLIER: u64 = 6364136223846793005;

    fn new(seed: u64) -> Self {
        let mut rng = Self {
            state: 0,
            inc: (seed << 1) | 1,
        };
        rng.next_u32();
        rng.state = rng.state.wrapping_add(seed);
        rng.next_u32();
        rng
    }

    fn next_u32(&mut self) -> u32 {
        let old = self.state;
        self.state = old.wrapping_mul(Self::MULTIPLIER).wrapping_add(self.inc);
        let xorshifted = (((old >> 18) ^ old) >> 27) as u32;
        let rot = (old >> 59) as u32;
        xorshifted.rotate_right(rot)
    }

    fn gen_range(&mut self, min: f32, max: f32) -> f32 {
        min + (max - min) * (self.next_u32() as f32 / u32::MAX as f32)
    }

    fn gen_index(&mut self, len: usize) -> usize {
        (self.next_u32() as usize) % len
    }
}

/// A pile of dynamic bodies with randomly paired contacts: valid input for
/// every lane width, dense enough that grouping leaves a scalar tail.
fn random_scene(
    seed: u64,
    body_count: usize,
    joint_count: usize,
) -> (Vec<RigidBody>, Vec<ContactPoint>, Vec<ContactJoint>) {
    let mut rng = Pcg32::new(seed);

    let bodies: Vec<RigidBody> = (0..body_count)
        .map(|_| {
            let pos = Point::new(rng.gen_range(-10.0, 10.0), rng.gen_range(-10.0, 10.0));
            let mut body = RigidBody::new(Coords::new(pos, rng.gen_range(-1.0, 1.0)), 1.0, 0.5);
            body.velocity = Vector::new(rng.gen_range(-1.0, 1.0), rng.gen_range(-1.0, 1.0));
            body.angular_velocity = rng.gen_range(-0.5, 0.5);
            body
        })
        .collect();

    let mut contact_points = Vec::new();
    let mut joints = Vec::new();

    for _ in 0..joint_count {
        let body1 = rng.gen_index(body_count);
        let mut body2 = rng.gen_index(body_count);
        if body2 == body1 {
            body2 = (body2 + 1) % body_count;
        }

        let pos1 = bodies[body1].coords.pos;
        let pos2 = bodies[body2].coords.pos;

        let mut normal = pos1 - pos2;
        if normal.norm() < 1.0e-6 {
            normal = Vector::new(0.0, 1.0);
        } else {
            normal = normal.normalize();
        }

        let anchor = na::center(&pos1, &pos2);
        let depth = rng.gen_range(0.0, 0.5);

        let delta1 = anchor - pos1;
        let delta2 = anchor + normal * depth - pos2;

        joints.push(ContactJoint::new(
            body1 as u32,
            body2 as u32,
            contact_points.len() as u32,
        ));
        contact_points.push(ContactPoint::new(delta1, delta2, normal));
    }

    (bodies, contact_points, joints)
}

fn assert_friction_cone(joints: &[ContactJoint], friction_coefficient: f32) {
    for joint in joints {
        assert!(joint.normal_impulse >= 0.0, "tensile normal impulse");
        assert!(
            joint.normal_displacing_impulse >= 0.0,
            "tensile displacing impulse"
        );
        assert!(
            joint.friction_impulse.abs() <= friction_coefficient * joint.normal_impulse + 1.0e-5,
            "friction impulse {} outside the cone (normal {})",
            joint.friction_impulse,
            joint.normal_impulse
        );
    }
}

#[test]
fn accumulated_impulses_respect_the_friction_cone() {
    let (mut bodies, contact_points, mut joints) = random_scene(7, 40, 120);
    let mut solver = ContactSolver::new();

    // Several warm-started solves in a row; the invariants hold after each.
    for _ in 0..3 {
        solver.solve_scalar(&mut bodies, &contact_points, &mut joints, 15, 15);
        assert_friction_cone(&joints, solver.params.friction_coefficient);

        solver.solve_simd4(&mut bodies, &contact_points, &mut joints, 15, 15);
        assert_friction_cone(&joints, solver.params.friction_coefficient);
    }
}

#[test]
fn lane_widths_agree_on_small_scenes() {
    let (bodies, contact_points, joints) = random_scene(11, 24, 48);

    let mut runs = Vec::new();

    for width in 0..3 {
        let mut bodies = bodies.clone();
        let mut joints = joints.clone();
        let mut solver = ContactSolver::new();

        let _metric = match width {
            0 => solver.solve_scalar(&mut bodies, &contact_points, &mut joints, 10, 10),
            1 => solver.solve_simd4(&mut bodies, &contact_points, &mut joints, 10, 10),
            _ => solver.solve_simd8(&mut bodies, &contact_points, &mut joints, 10, 10),
        };

        runs.push(bodies);
    }

    for other in &runs[1..] {
        for (a, b) in runs[0].iter().zip(other.iter()) {
            assert!(
                (a.velocity - b.velocity).norm() < 1.0e-3,
                "linear velocities diverge across lane widths: {:?} vs {:?}",
                a.velocity,
                b.velocity
            );
            assert!((a.angular_velocity - b.angular_velocity).abs() < 1.0e-3);
        }
    }
}

#[test]
fn early_out_converges_to_the_same_fixed_point() {
    let (bodies, contact_points, joints) = random_scene(23, 32, 64);

    let mut bodies_fast = bodies.clone();
    let mut joints_fast = joints.clone();
    let mut solver = ContactSolver::new();
    solver.solve_simd4(&mut bodies_fast, &contact_points, &mut joints_fast, 30, 30);

    let mut bodies_full = bodies;
    let mut joints_full = joints;
    let mut exhaustive = ContactSolver::new();
    exhaustive.params.early_out = false;
    exhaustive.solve_simd4(&mut bodies_full, &contact_points, &mut joints_full, 30, 30);

    for (a, b) in bodies_fast.iter().zip(bodies_full.iter()) {
        assert!((a.velocity - b.velocity).norm() < 1.0e-3);
        assert!((a.angular_velocity - b.angular_velocity).abs() < 1.0e-3);
    }
}

// --- Box-stack harness -----------------------------------------------------
//
// The solver has no narrow-phase of its own, so the stack tests generate
// contacts for axis-aligned boxes analytically. Contact generation uses a
// collision margin equal to `delta_depth`: the reported depth is the geometric
// overlap plus the margin, so surfaces touch exactly at `depth == delta_depth`.

const HALF_EXTENT: f32 = 2.0;
const MARGIN: f32 = 1.0;
const DT: f32 = 1.0 / 60.0;
const GRAVITY: f32 = -200.0;

/// Regenerates the two contact points of the interface between stacked boxes
/// `upper` and `lower` (`lower` may be the ground, whose top is its position).
fn stack_contacts(bodies: &[RigidBody], pairs: &[(usize, usize)]) -> Vec<ContactPoint> {
    let mut contact_points = Vec::new();

    for &(upper, lower) in pairs {
        let upper_bottom = bodies[upper].coords.pos.y - HALF_EXTENT;
        let lower_top = if bodies[lower].is_dynamic() {
            bodies[lower].coords.pos.y + HALF_EXTENT
        } else {
            bodies[lower].coords.pos.y
        };

        for side in [-1.0f32, 1.0] {
            let cx = bodies[upper].coords.pos.x + side * HALF_EXTENT * 0.75;
            let point1 = Point::new(cx, upper_bottom);
            let point2 = Point::new(cx, lower_top + MARGIN);

            contact_points.push(ContactPoint::new(
                point1 - bodies[upper].coords.pos,
                point2 - bodies[lower].coords.pos,
                Vector::new(0.0, 1.0),
            ));
        }
    }

    contact_points
}

fn stack_joints(pairs: &[(usize, usize)]) -> Vec<ContactJoint> {
    let mut joints = Vec::new();

    for (pair_index, &(upper, lower)) in pairs.iter().enumerate() {
        for side in 0..2 {
            joints.push(ContactJoint::new(
                upper as u32,
                lower as u32,
                (pair_index * 2 + side) as u32,
            ));
        }
    }

    joints
}

fn penetration(bodies: &[RigidBody], upper: usize, lower: usize) -> f32 {
    let upper_bottom = bodies[upper].coords.pos.y - HALF_EXTENT;
    let lower_top = if bodies[lower].is_dynamic() {
        bodies[lower].coords.pos.y + HALF_EXTENT
    } else {
        bodies[lower].coords.pos.y
    };
    lower_top - upper_bottom
}

fn two_box_stack() -> (Vec<RigidBody>, Vec<(usize, usize)>) {
    // A slight initial overlap keeps the contacts past the allowed-approach
    // band from the first step on.
    let bodies = vec![
        RigidBody::fixed(Coords::identity()),
        RigidBody::new(
            Coords::new(Point::new(0.0, HALF_EXTENT - 0.005), 0.0),
            1.0,
            0.1,
        ),
        RigidBody::new(
            Coords::new(Point::new(0.0, 3.0 * HALF_EXTENT - 0.010), 0.0),
            1.0,
            0.1,
        ),
    ];
    let pairs = vec![(1usize, 0usize), (2, 1)];
    (bodies, pairs)
}

#[test]
fn resting_stack_comes_to_rest() {
    let (mut bodies, pairs) = two_box_stack();
    let mut joints = stack_joints(&pairs);
    let mut solver = ContactSolver::new();

    for _ in 0..60 {
        for body in bodies.iter_mut().filter(|b| b.is_dynamic()) {
            body.velocity.y += GRAVITY * DT;
        }

        let contact_points = stack_contacts(&bodies, &pairs);
        solver.solve_scalar(&mut bodies, &contact_points, &mut joints, 15, 15);

        for body in bodies.iter_mut().filter(|b| b.is_dynamic()) {
            let step = body.velocity * DT + body.displacing_velocity;
            body.coords.pos += step;
            body.displacing_velocity = Vector::zeros();
            body.displacing_angular_velocity = 0.0;
        }
    }

    for body in &bodies {
        assert!(
            body.velocity.y.abs() < 1.0e-2,
            "stacked body still moving: {}",
            body.velocity.y
        );
    }

    for &(upper, lower) in &pairs {
        assert!(
            penetration(&bodies, upper, lower) < 1.0e-2,
            "bodies interpenetrate: {}",
            penetration(&bodies, upper, lower)
        );
    }
}

#[test]
fn warm_start_does_not_regress_convergence() {
    let (mut bodies, pairs) = two_box_stack();
    let mut joints = stack_joints(&pairs);
    let contact_points = stack_contacts(&bodies, &pairs);
    let mut solver = ContactSolver::new();

    for body in bodies.iter_mut().filter(|b| b.is_dynamic()) {
        body.velocity.y += GRAVITY * DT;
    }
    let metric_cold = solver.solve_scalar(&mut bodies, &contact_points, &mut joints, 15, 15);

    for body in bodies.iter_mut().filter(|b| b.is_dynamic()) {
        body.velocity.y += GRAVITY * DT;
    }
    let metric_warm = solver.solve_scalar(&mut bodies, &contact_points, &mut joints, 15, 15);

    assert!(
        metric_warm <= metric_cold + 1.0e-6,
        "warm start made convergence worse: {} vs {}",
        metric_warm,
        metric_cold
    );
}

#[test]
fn head_on_impact_exchanges_momentum() {
    let mut bodies = vec![
        RigidBody::new(Coords::identity(), 1.0, 1.0),
        RigidBody::new(Coords::new(Point::new(1.0, 0.0), 0.0), 1.0, 1.0),
    ];
    bodies[0].velocity = Vector::new(1.0, 0.0);
    bodies[1].velocity = Vector::new(-1.0, 0.0);

    // Normal points from body 2 into body 1; the anchor sits midway.
    let contact_points = vec![ContactPoint::new(
        Vector::new(0.5, 0.0),
        Vector::new(-0.5, 0.0),
        Vector::new(-1.0, 0.0),
    )];
    let mut joints = vec![ContactJoint::new(0, 1, 0)];

    let mut solver = ContactSolver::new();
    solver.params = SolverParameters {
        bounce: 1.0,
        delta_velocity: 0.0,
        max_penetration_velocity: 0.0,
        friction_coefficient: 0.0,
        ..SolverParameters::default()
    };

    solver.solve_scalar(&mut bodies, &contact_points, &mut joints, 10, 0);

    assert_relative_eq!(bodies[0].velocity.x, -1.0, epsilon = 1.0e-3);
    assert_relative_eq!(bodies[0].velocity.y, 0.0, epsilon = 1.0e-3);
    assert_relative_eq!(bodies[1].velocity.x, 1.0, epsilon = 1.0e-3);
    assert_relative_eq!(bodies[1].velocity.y, 0.0, epsilon = 1.0e-3);
}

#[test]
fn shallow_penetration_needs_no_position_correction() {
    // depth = 0.5 is well below the 2 * delta_depth threshold: the target
    // displacing velocity is zero and the accumulator must stay zero.
    let mut bodies = vec![
        RigidBody::new(Coords::identity(), 1.0, 1.0),
        RigidBody::fixed(Coords::new(Point::new(0.0, -2.0), 0.0)),
    ];

    let contact_points = vec![ContactPoint::new(
        Vector::new(0.0, -1.0),
        Vector::new(0.0, 1.5),
        Vector::new(0.0, 1.0),
    )];
    let mut joints = vec![ContactJoint::new(0, 1, 0)];

    let mut solver = ContactSolver::new();
    solver.solve_scalar(&mut bodies, &contact_points, &mut joints, 0, 20);

    assert_eq!(joints[0].normal_displacing_impulse, 0.0);
    assert_eq!(bodies[0].displacing_velocity, Vector::zeros());
}

#[test]
fn deep_penetration_builds_displacing_velocity() {
    // depth = 3.0 exceeds 2 * delta_depth by 1; the displacement pass drives
    // the displacing velocity to error_reduction * 1.0 along the normal.
    let mut bodies = vec![
        RigidBody::new(Coords::identity(), 1.0, 1.0),
        RigidBody::fixed(Coords::new(Point::new(0.0, -2.0), 0.0)),
    ];

    let contact_points = vec![ContactPoint::new(
        Vector::new(0.0, -1.0),
        Vector::new(0.0, 4.0),
        Vector::new(0.0, 1.0),
    )];
    let mut joints = vec![ContactJoint::new(0, 1, 0)];

    let mut solver = ContactSolver::new();
    solver.solve_scalar(&mut bodies, &contact_points, &mut joints, 0, 20);

    assert_relative_eq!(bodies[0].displacing_velocity.y, 0.1, epsilon = 1.0e-4);
    assert!(joints[0].normal_displacing_impulse > 0.0);
}

#[test]
fn fully_disjoint_joints_group_completely() {
    let body_count = 20_000;
    let joint_count = 10_000;
    let mut rng = Pcg32::new(97);

    let mut bodies: Vec<RigidBody> = (0..body_count)
        .map(|i| {
            RigidBody::new(
                Coords::new(Point::new((i % 200) as f32, (i / 200) as f32), 0.0),
                1.0,
                0.5,
            )
        })
        .collect();

    let mut contact_points = Vec::new();
    let mut joints = Vec::new();

    for i in 0..joint_count {
        let body1 = 2 * i;
        let body2 = 2 * i + 1;
        let normal = Vector::new(0.0, 1.0);
        let delta = Vector::new(rng.gen_range(-0.5, 0.5), rng.gen_range(-0.5, 0.5));

        joints.push(ContactJoint::new(body1 as u32, body2 as u32, i as u32));
        contact_points.push(ContactPoint::new(delta, delta, normal));
    }

    let mut solver = ContactSolver::new();

    solver.solve_simd4(&mut bodies, &contact_points, &mut joints, 4, 4);
    assert_eq!(solver.counters.ngrouped_joints, joint_count);

    solver.solve_simd8(&mut bodies, &contact_points, &mut joints, 4, 4);
    assert_eq!(solver.counters.ngrouped_joints, joint_count);
}

#[test]
fn zero_iterations_leave_fresh_state_untouched() {
    let (bodies_before, contact_points, mut joints) = random_scene(41, 16, 24);
    let mut bodies = bodies_before.clone();

    let mut solver = ContactSolver::new();
    let metric = solver.solve_simd4(&mut bodies, &contact_points, &mut joints, 0, 0);

    // Fresh joints carry zero accumulated impulses, so even the warm-start
    // pre-step is a no-op.
    for (before, after) in bodies_before.iter().zip(bodies.iter()) {
        assert_eq!(before.velocity, after.velocity);
        assert_eq!(before.angular_velocity, after.angular_velocity);
        assert_eq!(before.displacing_velocity, after.displacing_velocity);
    }

    // No iterations ran: every per-body counter stayed at -1.
    assert_eq!(metric, 2.0);
}

#[test]
fn empty_joint_list_reports_zero_metric() {
    let mut bodies = vec![RigidBody::new(Coords::identity(), 1.0, 1.0)];
    let mut solver = ContactSolver::new();
    let metric = solver.solve(&mut bodies, &[], &mut [], 10, 10);
    assert_eq!(metric, 0.0);
}
