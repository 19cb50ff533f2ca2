/// Components attached to scene graph nodes
///
/// Each entity holds at most one component of every [`ComponentKind`].
/// Components are owned by the scene arena; detaching or destroying the
/// entity deregisters the component first, then calls [`Component::release`]
/// so it can free what it owns outside the arena (physics bodies).

use std::fmt;

use glam::{Mat4, Vec3};
use rapier3d::prelude::RigidBodyHandle;
use serde::{Deserialize, Serialize};

use super::entity::{EntityMut, TransformSpace};
use crate::error::SceneError;
use crate::math::{Pose, Scalar, Vector3};
use crate::physics::{BodyDesc, PhysicsWorld};
use crate::renderer::MeshSource;

/// Closed set of component slots an entity can fill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Camera,
    Light,
    RenderableMesh,
    RigidBody,
    Behavior,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 5] = [
        ComponentKind::Camera,
        ComponentKind::Light,
        ComponentKind::RenderableMesh,
        ComponentKind::RigidBody,
        ComponentKind::Behavior,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ComponentKind::Camera => "camera",
            ComponentKind::Light => "light",
            ComponentKind::RenderableMesh => "renderable_mesh",
            ComponentKind::RigidBody => "rigid_body",
            ComponentKind::Behavior => "behavior",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A value that can occupy a component slot of an entity
pub trait Component: hecs::Component + Sized {
    const KIND: ComponentKind;

    /// Free resources held outside the scene arena. Called after the
    /// component has been removed from its entity.
    fn release(self, _physics: &mut PhysicsWorld) {}
}

/// Perspective camera; looks down its entity's local -Z axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Vertical field of view in radians
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            fov: 45.0_f32.to_radians(),
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Camera {
    pub fn new(fov: f32, near: f32, far: f32) -> Self {
        Self { fov, near, far }
    }

    pub fn projection_matrix(&self, aspect_ratio: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov, aspect_ratio, self.near, self.far)
    }

    /// View matrix for a camera placed at `pose`
    pub fn view_matrix(pose: &Pose) -> Mat4 {
        let rotation: glam::Quat = pose.orientation.into();
        let position: Vec3 = pose.position.into();
        let forward = rotation * Vec3::NEG_Z;
        let up = rotation * Vec3::Y;

        Mat4::look_at_rh(position, position + forward, up)
    }
}

impl Component for Camera {
    const KIND: ComponentKind = ComponentKind::Camera;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightKind {
    /// Shines along the entity's local -Z axis
    Directional,
    /// Radiates from the entity's position
    Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub kind: LightKind,
    pub color: Vec3,
    pub intensity: f32,
}

impl Light {
    pub fn directional(color: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Directional,
            color,
            intensity,
        }
    }

    pub fn point(color: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Point,
            color,
            intensity,
        }
    }
}

impl Component for Light {
    const KIND: ComponentKind = ComponentKind::Light;
}

/// Material used for one submesh of a model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialAssignment {
    pub submesh: usize,
    pub material: String,
}

/// Model source plus per-submesh material names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderableMesh {
    pub source: MeshSource,
    #[serde(default)]
    pub materials: Vec<MaterialAssignment>,
}

impl RenderableMesh {
    pub fn new(source: MeshSource) -> Self {
        Self {
            source,
            materials: Vec::new(),
        }
    }

    pub fn with_material(mut self, submesh: usize, material: impl Into<String>) -> Self {
        self.set_material(submesh, material);
        self
    }

    pub fn set_material(&mut self, submesh: usize, material: impl Into<String>) {
        let material = material.into();
        match self.materials.iter_mut().find(|m| m.submesh == submesh) {
            Some(assignment) => assignment.material = material,
            None => self.materials.push(MaterialAssignment { submesh, material }),
        }
    }

    pub fn material_for(&self, submesh: usize) -> Option<&str> {
        self.materials
            .iter()
            .find(|m| m.submesh == submesh)
            .map(|m| m.material.as_str())
    }
}

impl Component for RenderableMesh {
    const KIND: ComponentKind = ComponentKind::RenderableMesh;
}

/// Handle to a body in the scene's physics world.
///
/// Created by [`crate::kernel::Scene::add_rigid_body`]; the body is removed
/// from the physics world when the component is released.
#[derive(Debug)]
pub struct RigidBody {
    handle: RigidBodyHandle,
    desc: BodyDesc,
}

impl RigidBody {
    pub(crate) fn new(handle: RigidBodyHandle, desc: BodyDesc) -> Self {
        Self { handle, desc }
    }

    pub fn handle(&self) -> RigidBodyHandle {
        self.handle
    }

    pub fn desc(&self) -> &BodyDesc {
        &self.desc
    }
}

impl Component for RigidBody {
    const KIND: ComponentKind = ComponentKind::RigidBody;

    fn release(self, physics: &mut PhysicsWorld) {
        if !physics.remove_body(self.handle) {
            log::warn!("Rigid body {:?} was already gone from the physics world", self.handle);
        }
    }
}

/// Gameplay logic run once per frame on its entity
pub trait BehaviorLogic: Send + Sync {
    /// Name the component factory knows this behavior by
    fn kind(&self) -> &str;

    /// Parameters written to scene files, passed back to the factory on load
    fn params(&self) -> serde_json::Value;

    fn update(&mut self, entity: &mut EntityMut<'_>, dt: Scalar) -> Result<(), SceneError>;
}

pub struct Behavior(pub Box<dyn BehaviorLogic>);

impl Behavior {
    pub fn new(logic: impl BehaviorLogic + 'static) -> Self {
        Self(Box::new(logic))
    }

    pub fn kind(&self) -> &str {
        self.0.kind()
    }
}

impl fmt::Debug for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Behavior").field(&self.0.kind()).finish()
    }
}

impl Component for Behavior {
    const KIND: ComponentKind = ComponentKind::Behavior;
}

/// Rotates its entity around a local axis at a constant rate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spin {
    pub axis: Vector3,
    /// Radians per second
    pub speed: Scalar,
}

impl Spin {
    pub const KIND: &'static str = "spin";

    pub fn new(axis: Vector3, speed: Scalar) -> Self {
        Self { axis, speed }
    }
}

impl BehaviorLogic for Spin {
    fn kind(&self) -> &str {
        Self::KIND
    }

    fn params(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    fn update(&mut self, entity: &mut EntityMut<'_>, dt: Scalar) -> Result<(), SceneError> {
        entity.rotate_axis_angle(self.axis, self.speed * dt, TransformSpace::Local)?;
        Ok(())
    }
}

/// Builds behaviors by name while a scene file is loaded
pub trait ComponentFactory {
    /// `Ok(None)` means the kind is unknown to this factory
    fn create_behavior(
        &self,
        kind: &str,
        params: &serde_json::Value,
    ) -> Result<Option<Box<dyn BehaviorLogic>>, serde_json::Error>;
}

/// Factory for the behaviors that ship with the engine
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultComponentFactory;

impl ComponentFactory for DefaultComponentFactory {
    fn create_behavior(
        &self,
        kind: &str,
        params: &serde_json::Value,
    ) -> Result<Option<Box<dyn BehaviorLogic>>, serde_json::Error> {
        match kind {
            Spin::KIND => {
                let spin: Spin = serde_json::from_value(params.clone())?;
                Ok(Some(Box::new(spin)))
            }
            _ => Ok(None),
        }
    }
}
