// src/physics.rs
//! The rapier world owned by a playground.

use nalgebra::{Isometry2, Vector2};
use rapier2d::parry::query;
use rapier2d::parry::shape::Shape;
use rapier2d::prelude::*;

use crate::components::Transform;
use crate::config::PlaygroundConfig;

// ---------------------------------------------------------------------------
// 2D Physics World
// ---------------------------------------------------------------------------

pub struct PhysicsWorld {
    gravity: Vector<Real>,
    pipeline: PhysicsPipeline,
    integration_params: IntegrationParameters,
    islands: IslandManager,
    broad_phase: BroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
}

impl PhysicsWorld {
    pub fn new(config: &PlaygroundConfig) -> Self {
        let integration_params = IntegrationParameters {
            dt: config.dt,
            ..IntegrationParameters::default()
        };

        Self {
            gravity: vector![config.gravity[0], config.gravity[1]],
            pipeline: PhysicsPipeline::new(),
            integration_params,
            islands: IslandManager::new(),
            broad_phase: BroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
        }
    }

    /// Advance one tick. `hooks` filter every candidate pair before the solver runs.
    pub fn step(&mut self, hooks: &dyn PhysicsHooks) {
        self.pipeline.step(
            &self.gravity,
            &self.integration_params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            hooks,
            &(),
        );
    }

    #[inline]
    pub fn dt(&self) -> f64 {
        self.integration_params.dt
    }

    // -------------------------------------------------------------------------
    // Bodies & colliders
    // -------------------------------------------------------------------------

    pub fn insert_body(&mut self, body: RigidBody) -> RigidBodyHandle {
        self.bodies.insert(body)
    }

    pub fn insert_collider(&mut self, collider: Collider, parent: RigidBodyHandle) -> ColliderHandle {
        self.colliders.insert_with_parent(collider, parent, &mut self.bodies)
    }

    pub fn remove_collider(&mut self, handle: ColliderHandle) {
        self.colliders.remove(handle, &mut self.islands, &mut self.bodies, true);
    }

    /// Remove a body together with its colliders and joints.
    pub fn remove_body(&mut self, handle: RigidBodyHandle) {
        self.bodies.remove(
            handle,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
    }

    #[inline]
    pub fn body(&self, handle: RigidBodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle)
    }

    #[inline]
    pub fn collider(&self, handle: ColliderHandle) -> Option<&Collider> {
        self.colliders.get(handle)
    }

    #[inline]
    pub fn colliders(&self) -> &ColliderSet {
        &self.colliders
    }

    pub fn set_collision_groups(&mut self, handle: ColliderHandle, groups: InteractionGroups) {
        if let Some(collider) = self.colliders.get_mut(handle) {
            collider.set_collision_groups(groups);
        }
    }

    #[inline]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    #[inline]
    pub fn collider_count(&self) -> usize {
        self.colliders.len()
    }

    #[inline]
    pub fn joint_count(&self) -> usize {
        self.impulse_joints.len()
    }

    // -------------------------------------------------------------------------
    // Driving
    // -------------------------------------------------------------------------

    /// Replace the body's force with `force` and set its angular velocity.
    pub fn drive(&mut self, handle: RigidBodyHandle, force: Vector2<f64>, angular_velocity: f64) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.reset_forces(false);
            body.add_force(force, true);
            body.set_angvel(angular_velocity, true);
        }
    }

    /// Target relative angular velocity of a revolute joint motor.
    pub fn set_motor(&mut self, handle: ImpulseJointHandle, target_velocity: f64, damping: f64) {
        if let Some(joint) = self.impulse_joints.get_mut(handle) {
            joint.data.set_motor_velocity(JointAxis::AngX, target_velocity, damping);
        }
    }

    // -------------------------------------------------------------------------
    // Joints
    // -------------------------------------------------------------------------

    /// Revolute joint pinning `pivot1` on `body1` to `pivot2` on `body2`.
    ///
    /// The joint angle is zero when `body2` is rotated by `rest_angle` relative to `body1`.
    /// The joint itself is free: range limits are enforced by gating the motor.
    pub fn add_revolute_joint(
        &mut self,
        body1: RigidBodyHandle,
        body2: RigidBodyHandle,
        pivot1: Vector2<f64>,
        pivot2: Vector2<f64>,
        rest_angle: f64,
        damping: f64,
    ) -> ImpulseJointHandle {
        let joint = GenericJointBuilder::new(JointAxesMask::LOCKED_REVOLUTE_AXES)
            .local_frame1(Isometry2::new(pivot1, rest_angle))
            .local_frame2(Isometry2::new(pivot2, 0.0))
            .motor_velocity(JointAxis::AngX, 0.0, damping)
            .contacts_enabled(false)
            .build();
        self.impulse_joints.insert(body1, body2, joint, true)
    }

    /// Weld `body2` to `body1` in their current relative pose.
    pub fn add_fixed_joint(&mut self, body1: RigidBodyHandle, body2: RigidBodyHandle) -> Option<ImpulseJointHandle> {
        let pose1 = *self.bodies.get(body1)?.position();
        let pose2 = *self.bodies.get(body2)?.position();
        let joint = GenericJointBuilder::new(JointAxesMask::LOCKED_FIXED_AXES)
            .local_frame1(Isometry2::identity())
            .local_frame2(pose2.inv_mul(&pose1))
            .contacts_enabled(false)
            .build();
        Some(self.impulse_joints.insert(body1, body2, joint, true))
    }

    pub fn remove_joint(&mut self, handle: ImpulseJointHandle) {
        self.impulse_joints.remove(handle, true);
    }

    // -------------------------------------------------------------------------
    // Transforms
    // -------------------------------------------------------------------------

    /// Write pose and, for dynamic bodies, velocities.
    pub fn write_transform(&mut self, handle: RigidBodyHandle, transform: &Transform) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_position(transform.isometry(), true);
            if body.is_dynamic() {
                body.set_linvel(transform.velocity, true);
                body.set_angvel(transform.angular_velocity, true);
            }
        }
    }

    pub fn read_transform(&self, handle: RigidBodyHandle) -> Option<Transform> {
        self.bodies.get(handle).map(|body| {
            let pose = body.position();
            Transform {
                position: pose.translation.vector,
                angle: pose.rotation.angle(),
                velocity: *body.linvel(),
                angular_velocity: body.angvel(),
            }
        })
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Exact overlap of two colliders placed by their parents' poses.
    ///
    /// Poses are passed in rather than read from the colliders, whose cached positions only
    /// catch up with their bodies during the next step.
    pub fn colliders_overlap(
        &self,
        first: ColliderHandle,
        first_parent: &Isometry2<f64>,
        second: ColliderHandle,
        second_parent: &Isometry2<f64>,
    ) -> bool {
        let (Some(c1), Some(c2)) = (self.colliders.get(first), self.colliders.get(second)) else {
            return false;
        };
        let pose1 = world_pose(c1, first_parent);
        let pose2 = world_pose(c2, second_parent);
        query::intersection_test(&pose1, c1.shape(), &pose2, c2.shape()).unwrap_or(false)
    }

    /// Candidate pairs between colliders of two different non-dynamic bodies whose
    /// collision groups let them interact.
    pub fn resting_pairs(&self) -> Vec<(ColliderHandle, ColliderHandle)> {
        let contacts = self.narrow_phase.contact_pairs().map(|pair| (pair.collider1, pair.collider2));
        let intersections = self.narrow_phase.intersection_pairs().map(|(c1, c2, _)| (c1, c2));
        contacts
            .chain(intersections)
            .filter(|&(c1, c2)| self.resting(c1, c2))
            .collect()
    }

    fn resting(&self, first: ColliderHandle, second: ColliderHandle) -> bool {
        let (Some(c1), Some(c2)) = (self.colliders.get(first), self.colliders.get(second)) else {
            return false;
        };
        if c1.parent() == c2.parent() || !c1.collision_groups().test(c2.collision_groups()) {
            return false;
        }
        let idle = |collider: &Collider| {
            collider
                .parent()
                .and_then(|parent| self.bodies.get(parent))
                .map_or(true, |body| !body.is_dynamic())
        };
        idle(c1) && idle(c2)
    }

    /// Exact overlap of a shape not yet in the world with a collider of the world.
    pub fn shape_overlaps(
        &self,
        shape: &dyn Shape,
        pose: &Isometry2<f64>,
        other: ColliderHandle,
        other_parent: &Isometry2<f64>,
    ) -> bool {
        let Some(collider) = self.colliders.get(other) else {
            return false;
        };
        let other_pose = world_pose(collider, other_parent);
        query::intersection_test(pose, shape, &other_pose, collider.shape()).unwrap_or(false)
    }
}

fn world_pose(collider: &Collider, parent: &Isometry2<f64>) -> Isometry2<f64> {
    collider
        .position_wrt_parent()
        .map_or(*parent, |relative| parent * relative)
}
