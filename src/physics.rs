/// Physics integration with Rapier
///
/// Provides:
/// - Fixed timestep simulation driven by a frame-time accumulator
/// - Rigid bodies created from scene poses and read back after each step
/// - Conversions between the f64 scene math and Rapier's f32 types

use nalgebra as na;
use rapier3d::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::PhysicsConfig;
use crate::math::{Pose, Quaternion, Scalar, Vector3};

/// Collision shape of a rigid body, in the body's local frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CollisionShape {
    Box { half_extents: Vector3 },
    Sphere { radius: Scalar },
    /// Capsule along the local Y axis
    Capsule { half_height: Scalar, radius: Scalar },
}

impl CollisionShape {
    fn collider(&self) -> ColliderBuilder {
        match *self {
            CollisionShape::Box { half_extents } => ColliderBuilder::cuboid(
                half_extents.x as Real,
                half_extents.y as Real,
                half_extents.z as Real,
            ),
            CollisionShape::Sphere { radius } => ColliderBuilder::ball(radius as Real),
            CollisionShape::Capsule {
                half_height,
                radius,
            } => ColliderBuilder::capsule_y(half_height as Real, radius as Real),
        }
    }
}

/// Description of a body to create; a mass of zero makes it static
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyDesc {
    pub mass: Scalar,
    pub shape: CollisionShape,
}

impl BodyDesc {
    pub fn is_static(&self) -> bool {
        self.mass <= 0.0
    }
}

/// Physics world wrapper
pub struct PhysicsWorld {
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    gravity: Vector<Real>,
    integration_params: IntegrationParameters,
    physics_pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,

    /// Frame time not yet consumed by fixed steps
    accumulator: Scalar,
    max_substeps: u32,
}

impl PhysicsWorld {
    pub fn new(config: &PhysicsConfig) -> Self {
        let mut integration_params = IntegrationParameters::default();
        integration_params.dt = config.timestep as Real;

        Self {
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            gravity: vector![config.gravity.x, config.gravity.y, config.gravity.z],
            integration_params,
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            accumulator: 0.0,
            max_substeps: config.max_substeps.max(1),
        }
    }

    pub fn timestep(&self) -> Scalar {
        self.integration_params.dt as Scalar
    }

    pub fn body_count(&self) -> usize {
        self.rigid_body_set.len()
    }

    /// Advance the simulation by `dt` seconds of frame time.
    ///
    /// Runs as many fixed steps as fit in the accumulated time, capped at
    /// `max_substeps`; time beyond the cap is dropped. Returns the number of
    /// steps taken.
    pub fn step(&mut self, dt: Scalar) -> u32 {
        if dt > 0.0 {
            self.accumulator += dt;
        }

        let timestep = self.timestep();
        let mut steps = 0;
        while self.accumulator >= timestep && steps < self.max_substeps {
            self.step_once();
            self.accumulator -= timestep;
            steps += 1;
        }

        if steps == self.max_substeps && self.accumulator >= timestep {
            log::debug!(
                "Physics fell behind, dropping {:.3}s of simulation time",
                self.accumulator
            );
            self.accumulator = 0.0;
        }
        steps
    }

    fn step_once(&mut self) {
        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_params,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            None,
            &(),
            &(),
        );
    }

    /// Create a body with one collider at the given world pose
    pub fn add_body(&mut self, pose: &Pose, desc: &BodyDesc) -> RigidBodyHandle {
        let builder = if desc.is_static() {
            RigidBodyBuilder::fixed()
        } else {
            RigidBodyBuilder::dynamic()
        };
        let rigid_body = builder.position(pose_to_isometry(pose)).build();
        let rb_handle = self.rigid_body_set.insert(rigid_body);

        let mut collider = desc.shape.collider();
        if !desc.is_static() {
            collider = collider.mass(desc.mass as Real);
        }
        self.collider_set
            .insert_with_parent(collider.build(), rb_handle, &mut self.rigid_body_set);

        rb_handle
    }

    /// Remove a body and its colliders; returns false for unknown handles
    pub fn remove_body(&mut self, handle: RigidBodyHandle) -> bool {
        self.rigid_body_set
            .remove(
                handle,
                &mut self.island_manager,
                &mut self.collider_set,
                &mut self.impulse_joint_set,
                &mut self.multibody_joint_set,
                true,
            )
            .is_some()
    }

    pub fn contains(&self, handle: RigidBodyHandle) -> bool {
        self.rigid_body_set.contains(handle)
    }

    pub fn is_dynamic(&self, handle: RigidBodyHandle) -> bool {
        self.rigid_body_set
            .get(handle)
            .map(|body| body.is_dynamic())
            .unwrap_or(false)
    }

    pub fn body_pose(&self, handle: RigidBodyHandle) -> Option<Pose> {
        self.rigid_body_set
            .get(handle)
            .map(|body| isometry_to_pose(body.position()))
    }

    /// Teleport a body, waking it so the new pose takes part in the next step
    pub fn set_body_pose(&mut self, handle: RigidBodyHandle, pose: &Pose) -> bool {
        match self.rigid_body_set.get_mut(handle) {
            Some(body) => {
                body.set_position(pose_to_isometry(pose), true);
                true
            }
            None => false,
        }
    }

    pub fn linear_velocity(&self, handle: RigidBodyHandle) -> Option<Vector3> {
        self.rigid_body_set
            .get(handle)
            .map(|body| vector_from_rapier(body.linvel()))
    }

    pub fn set_linear_velocity(&mut self, handle: RigidBodyHandle, velocity: Vector3) -> bool {
        match self.rigid_body_set.get_mut(handle) {
            Some(body) => {
                body.set_linvel(vector_to_rapier(velocity), true);
                true
            }
            None => false,
        }
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new(&PhysicsConfig::default())
    }
}

/// Convert a scene pose to a Rapier isometry
fn pose_to_isometry(pose: &Pose) -> Isometry<Real> {
    Isometry::from_parts(
        Translation::new(
            pose.position.x as Real,
            pose.position.y as Real,
            pose.position.z as Real,
        ),
        quaternion_to_rapier(pose.orientation),
    )
}

fn isometry_to_pose(iso: &Isometry<Real>) -> Pose {
    let t = iso.translation.vector;
    let q = iso.rotation.quaternion();
    Pose::new(
        Vector3::new(t.x as Scalar, t.y as Scalar, t.z as Scalar),
        Quaternion::new(q.w as Scalar, q.i as Scalar, q.j as Scalar, q.k as Scalar).normalized(),
    )
}

fn quaternion_to_rapier(q: Quaternion) -> na::UnitQuaternion<Real> {
    na::UnitQuaternion::from_quaternion(na::Quaternion::new(
        q.w as Real,
        q.x as Real,
        q.y as Real,
        q.z as Real,
    ))
}

fn vector_to_rapier(v: Vector3) -> Vector<Real> {
    Vector::new(v.x as Real, v.y as Real, v.z as Real)
}

fn vector_from_rapier(v: &Vector<Real>) -> Vector3 {
    Vector3::new(v.x as Scalar, v.y as Scalar, v.z as Scalar)
}
