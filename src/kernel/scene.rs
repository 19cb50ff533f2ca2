use std::collections::{HashMap, HashSet};

use hecs::World;
use rapier3d::prelude::RigidBodyHandle;

use super::component::{
    Behavior, Camera, Component, ComponentFactory, ComponentKind, Light, RenderableMesh, RigidBody,
};
use super::entity::{EntityId, EntityMut, EntityRef, Node, PhysicsSync, Transform};
use crate::error::SceneError;
use crate::math::{Pose, Scalar, Vector3};
use crate::physics::{BodyDesc, PhysicsWorld};

/// Ownership root of an entity tree.
///
/// Entities live in a `hecs` arena and link to each other by [`EntityId`].
/// Names are unique per scene; the name table is the only way to look an
/// entity up by name.
pub struct Scene {
    name: String,
    world: World,
    root: EntityId,
    names: HashMap<String, EntityId>,
    active_camera: Option<EntityId>,
    physics: PhysicsWorld,
    factory: Box<dyn ComponentFactory>,
}

impl Scene {
    pub fn new(
        name: &str,
        root_name: &str,
        physics: PhysicsWorld,
        factory: Box<dyn ComponentFactory>,
    ) -> Self {
        let mut world = World::new();
        let root = world.spawn((
            Node {
                name: root_name.to_string(),
                parent: None,
                children: Vec::new(),
            },
            Transform::from_local(None, Pose::IDENTITY),
        ));

        let mut names = HashMap::new();
        names.insert(root_name.to_string(), root);

        log::info!("Created scene '{}' with root '{}'", name, root_name);

        Self {
            name: name.to_string(),
            world,
            root,
            names,
            active_camera: None,
            physics,
            factory,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> EntityId {
        self.root
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    pub fn factory(&self) -> &dyn ComponentFactory {
        self.factory.as_ref()
    }

    /// Number of entities, root included
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.world.contains(id)
    }

    /// Exact-match lookup in the name table
    pub fn find_entity(&self, name: &str) -> Option<EntityId> {
        self.names.get(name).copied()
    }

    pub fn entity(&self, id: EntityId) -> Result<EntityRef<'_>, SceneError> {
        EntityRef::new(self, id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Result<EntityMut<'_>, SceneError> {
        EntityMut::new(self, id)
    }

    /// Every entity of the subtree rooted at `id`, parents before children
    pub fn descendants(&self, id: EntityId) -> Result<Vec<EntityId>, SceneError> {
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            order.push(current);
            let node = self.node(current)?;
            stack.extend(node.children.iter().rev().copied());
        }
        Ok(order)
    }

    /// Every entity in the scene, parents before children
    pub fn entities(&self) -> Vec<EntityId> {
        self.descendants(self.root).unwrap_or_default()
    }

    /// Destroy `id` and its subtree, releasing their components
    pub fn remove_entity(&mut self, id: EntityId) -> Result<(), SceneError> {
        if id == self.root {
            return Err(SceneError::RootEntity("removed"));
        }
        let parent = self.node(id)?.parent;
        if let Some(parent) = parent {
            self.node_mut(parent)?.children.retain(|&child| child != id);
        }
        self.destroy_subtree(id)
    }

    /// Destroys children before their parent
    fn destroy_subtree(&mut self, id: EntityId) -> Result<(), SceneError> {
        let children = self.node(id)?.children.clone();
        for child in children {
            self.destroy_subtree(child)?;
        }

        self.release_components(id);
        let name = self.node(id)?.name.clone();
        self.names.remove(&name);
        self.world
            .despawn(id)
            .map_err(|_| SceneError::NoSuchEntity(id))?;

        if self.active_camera == Some(id) {
            log::warn!("Active camera '{}' was destroyed", name);
            self.active_camera = None;
        }
        log::debug!("Destroyed entity '{}'", name);
        Ok(())
    }

    pub(crate) fn release_components(&mut self, id: EntityId) {
        self.release::<Camera>(id);
        self.release::<Light>(id);
        self.release::<RenderableMesh>(id);
        self.release::<RigidBody>(id);
        self.release::<Behavior>(id);
    }

    fn release<C: Component>(&mut self, id: EntityId) -> bool {
        match self.world.remove_one::<C>(id) {
            Ok(component) => {
                component.release(&mut self.physics);
                true
            }
            Err(_) => false,
        }
    }

    pub(crate) fn spawn(
        &mut self,
        parent: EntityId,
        name: &str,
        local: Pose,
    ) -> Result<EntityId, SceneError> {
        // the scene name addresses the scene in commands
        if self.names.contains_key(name) || name == self.name {
            return Err(SceneError::DuplicateName(name.to_string()));
        }
        let parent_pose = self.transform(parent)?.world();

        let id = self.world.spawn((
            Node {
                name: name.to_string(),
                parent: Some(parent),
                children: Vec::new(),
            },
            Transform::from_local(Some(&parent_pose), local),
        ));
        self.node_mut(parent)?.children.push(id);
        self.names.insert(name.to_string(), id);

        log::debug!("Spawned entity '{}'", name);
        Ok(id)
    }

    pub(crate) fn reparent(
        &mut self,
        id: EntityId,
        new_parent: EntityId,
    ) -> Result<crate::math::PoseChange, SceneError> {
        if id == self.root {
            return Err(SceneError::RootEntity("reparented"));
        }

        let mut cursor = Some(new_parent);
        while let Some(current) = cursor {
            if current == id {
                return Err(SceneError::CyclicParent {
                    entity: self.node(id)?.name.clone(),
                    parent: self.node(new_parent)?.name.clone(),
                });
            }
            cursor = self.node(current)?.parent;
        }

        let world = self.transform(id)?.world();
        let old_parent = self.node(id)?.parent;
        if let Some(old_parent) = old_parent {
            self.node_mut(old_parent)?.children.retain(|&child| child != id);
        }
        self.node_mut(id)?.parent = Some(new_parent);
        self.node_mut(new_parent)?.children.push(id);

        self.set_world_pose(id, world, PhysicsSync::Push)
    }

    pub(crate) fn rename_root(&mut self, name: &str) {
        let Ok(mut node) = self.world.get::<&mut Node>(self.root) else {
            return;
        };
        let old = std::mem::replace(&mut node.name, name.to_string());
        drop(node);
        self.names.remove(&old);
        self.names.insert(name.to_string(), self.root);
    }

    pub(crate) fn set_active_camera_unchecked(&mut self, id: Option<EntityId>) {
        self.active_camera = id;
    }

    pub fn active_camera(&self) -> Option<EntityId> {
        self.active_camera
    }

    pub fn set_active_camera(&mut self, id: EntityId) -> Result<(), SceneError> {
        if !self.has_component(id, ComponentKind::Camera) {
            return Err(SceneError::MissingComponent {
                entity: self.node(id)?.name.clone(),
                kind: ComponentKind::Camera,
            });
        }
        self.active_camera = Some(id);
        Ok(())
    }

    /// Attach a component; the slot for its kind must be free.
    ///
    /// The first camera attached to a scene without an active camera
    /// becomes the active one.
    pub fn attach<C: Component>(&mut self, id: EntityId, component: C) -> Result<(), SceneError> {
        if self.world.get::<&C>(id).is_ok() {
            return Err(SceneError::ComponentOccupied {
                entity: self.node(id)?.name.clone(),
                kind: C::KIND,
            });
        }
        self.world
            .insert_one(id, component)
            .map_err(|_| SceneError::NoSuchEntity(id))?;

        if C::KIND == ComponentKind::Camera && self.active_camera.is_none() {
            self.active_camera = Some(id);
        }
        log::debug!("Attached {} to '{}'", C::KIND, self.node(id)?.name);
        Ok(())
    }

    /// Deregister then release the component of kind `C`; false when the
    /// slot was empty
    pub fn detach<C: Component>(&mut self, id: EntityId) -> Result<bool, SceneError> {
        if !self.contains(id) {
            return Err(SceneError::NoSuchEntity(id));
        }
        if !self.release::<C>(id) {
            return Ok(false);
        }
        if C::KIND == ComponentKind::Camera && self.active_camera == Some(id) {
            self.active_camera = None;
        }
        log::debug!("Detached {} from '{}'", C::KIND, self.node(id)?.name);
        Ok(true)
    }

    pub fn component<C: Component>(&self, id: EntityId) -> Option<hecs::Ref<'_, C>> {
        self.world.get::<&C>(id).ok()
    }

    pub fn component_mut<C: Component>(&mut self, id: EntityId) -> Option<hecs::RefMut<'_, C>> {
        self.world.get::<&mut C>(id).ok()
    }

    pub fn has_component(&self, id: EntityId, kind: ComponentKind) -> bool {
        let Ok(entity) = self.world.entity(id) else {
            return false;
        };
        match kind {
            ComponentKind::Camera => entity.has::<Camera>(),
            ComponentKind::Light => entity.has::<Light>(),
            ComponentKind::RenderableMesh => entity.has::<RenderableMesh>(),
            ComponentKind::RigidBody => entity.has::<RigidBody>(),
            ComponentKind::Behavior => entity.has::<Behavior>(),
        }
    }

    pub fn component_kinds(&self, id: EntityId) -> Vec<ComponentKind> {
        ComponentKind::ALL
            .into_iter()
            .filter(|&kind| self.has_component(id, kind))
            .collect()
    }

    /// Entities carrying a component of type `C`, in tree order
    pub fn with_component<C: Component>(&self) -> Vec<EntityId> {
        self.entities()
            .into_iter()
            .filter(|&id| self.has_component(id, C::KIND))
            .collect()
    }

    /// Create a physics body at the entity's world pose and attach it
    pub fn add_rigid_body(
        &mut self,
        id: EntityId,
        desc: BodyDesc,
    ) -> Result<RigidBodyHandle, SceneError> {
        if self.has_component(id, ComponentKind::RigidBody) {
            return Err(SceneError::ComponentOccupied {
                entity: self.node(id)?.name.clone(),
                kind: ComponentKind::RigidBody,
            });
        }
        let pose = self.transform(id)?.world();
        let handle = self.physics.add_body(&pose, &desc);
        if let Err(err) = self.attach(id, RigidBody::new(handle, desc)) {
            self.physics.remove_body(handle);
            return Err(err);
        }
        Ok(handle)
    }

    fn body_handle(&self, id: EntityId) -> Result<RigidBodyHandle, SceneError> {
        match self.world.get::<&RigidBody>(id) {
            Ok(body) => Ok(body.handle()),
            Err(_) => Err(SceneError::MissingComponent {
                entity: self.node(id)?.name.clone(),
                kind: ComponentKind::RigidBody,
            }),
        }
    }

    pub fn set_linear_velocity(&mut self, id: EntityId, velocity: Vector3) -> Result<(), SceneError> {
        let handle = self.body_handle(id)?;
        self.physics.set_linear_velocity(handle, velocity);
        Ok(())
    }

    pub fn linear_velocity(&self, id: EntityId) -> Result<Vector3, SceneError> {
        let handle = self.body_handle(id)?;
        Ok(self.physics.linear_velocity(handle).unwrap_or(Vector3::ZERO))
    }

    pub(crate) fn push_body_pose(&mut self, id: EntityId, pose: &Pose) {
        let handle = match self.world.get::<&RigidBody>(id) {
            Ok(body) => body.handle(),
            Err(_) => return,
        };
        if !self.physics.set_body_pose(handle, pose) {
            log::warn!("Entity {:?} refers to a missing rigid body", id);
        }
    }

    /// Advance the physics world and write every dynamic body's pose back
    /// into its entity, cascading to descendants. Returns the number of
    /// fixed steps taken.
    pub fn step_physics(&mut self, dt: Scalar) -> Result<u32, SceneError> {
        let steps = self.physics.step(dt);
        if steps == 0 {
            return Ok(0);
        }

        // read every pose before writing any, since cascades re-pose the
        // bodies below a moved entity
        let mut updates = Vec::new();
        for id in self.entities() {
            let handle = match self.world.get::<&RigidBody>(id) {
                Ok(body) => body.handle(),
                Err(_) => continue,
            };
            if !self.physics.is_dynamic(handle) {
                continue;
            }
            if let Some(pose) = self.physics.body_pose(handle) {
                updates.push((id, pose));
            }
        }

        let mut moved = HashSet::new();
        for (id, pose) in updates {
            let sync = if self.has_moved_ancestor(id, &moved)? {
                PhysicsSync::Push
            } else {
                PhysicsSync::Skip
            };
            self.set_world_pose(id, pose, sync)?;
            moved.insert(id);
        }
        Ok(steps)
    }

    fn has_moved_ancestor(
        &self,
        id: EntityId,
        moved: &HashSet<EntityId>,
    ) -> Result<bool, SceneError> {
        let mut current = self.node(id)?.parent;
        while let Some(parent) = current {
            if moved.contains(&parent) {
                return Ok(true);
            }
            current = self.node(parent)?.parent;
        }
        Ok(false)
    }

    /// Run every behavior once, in tree order
    pub fn update_behaviors(&mut self, dt: Scalar) -> Result<(), SceneError> {
        for id in self.with_component::<Behavior>() {
            // taken out for the duration of the update so the entity can be
            // borrowed mutably
            let Ok(mut behavior) = self.world.remove_one::<Behavior>(id) else {
                continue;
            };
            let result = match EntityMut::new(self, id) {
                Ok(mut entity) => behavior.0.update(&mut entity, dt),
                Err(err) => Err(err),
            };
            if self.world.insert_one(id, behavior).is_err() {
                log::warn!("Entity {:?} disappeared during its behavior update", id);
            }
            result?;
        }
        Ok(())
    }

    /// Indented dump of the whole tree
    pub fn scene_graph_to_string(&self) -> String {
        let mut out = format!("Scene graph of '{}':\n", self.name);
        self.write_tree(self.root, 1, &mut out);
        out
    }

    pub(crate) fn write_tree(&self, id: EntityId, indent: usize, out: &mut String) {
        let Ok(node) = self.node(id) else {
            return;
        };
        out.push_str(&"  ".repeat(indent));
        out.push_str(&node.name);
        let kinds = self.component_kinds(id);
        if !kinds.is_empty() {
            let kinds: Vec<&str> = kinds.iter().map(|k| k.name()).collect();
            out.push_str(&format!(" [{}]", kinds.join(", ")));
        }
        out.push('\n');

        let children = node.children.clone();
        drop(node);
        for child in children {
            self.write_tree(child, indent + 1, out);
        }
    }

    pub(crate) fn node(&self, id: EntityId) -> Result<hecs::Ref<'_, Node>, SceneError> {
        self.world
            .get::<&Node>(id)
            .map_err(|_| SceneError::NoSuchEntity(id))
    }

    fn node_mut(&self, id: EntityId) -> Result<hecs::RefMut<'_, Node>, SceneError> {
        self.world
            .get::<&mut Node>(id)
            .map_err(|_| SceneError::NoSuchEntity(id))
    }

    pub(crate) fn transform(&self, id: EntityId) -> Result<Transform, SceneError> {
        self.world
            .get::<&Transform>(id)
            .map(|t| *t)
            .map_err(|_| SceneError::NoSuchEntity(id))
    }

    pub(crate) fn write_transform(&mut self, id: EntityId, transform: Transform) -> Result<(), SceneError> {
        let mut slot = self
            .world
            .get::<&mut Transform>(id)
            .map_err(|_| SceneError::NoSuchEntity(id))?;
        *slot = transform;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{DefaultComponentFactory, Spin, TransformSpace};
    use crate::math::Quaternion;
    use crate::physics::CollisionShape;
    use approx::assert_abs_diff_eq;

    fn scene() -> Scene {
        Scene::new("test", "root", PhysicsWorld::default(), Box::new(DefaultComponentFactory))
    }

    fn cube_body() -> BodyDesc {
        BodyDesc {
            mass: 1.0,
            shape: CollisionShape::Box {
                half_extents: Vector3::splat(0.5),
            },
        }
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut scene = scene();
        let root = scene.root();
        scene.entity_mut(root).unwrap().add_child("cube").unwrap();
        let err = scene.entity_mut(root).unwrap().add_child("cube").unwrap_err();
        assert!(matches!(err, SceneError::DuplicateName(name) if name == "cube"));
        assert!(matches!(
            scene.entity_mut(root).unwrap().add_child("root"),
            Err(SceneError::DuplicateName(_))
        ));
        assert_eq!(scene.len(), 2);
    }

    #[test]
    fn test_scene_name_is_reserved() {
        let mut scene = scene();
        let root = scene.root();
        assert!(matches!(
            scene.entity_mut(root).unwrap().add_child("test"),
            Err(SceneError::DuplicateName(name)) if name == "test"
        ));
    }

    #[test]
    fn test_remove_subtree_unregisters_names() {
        let mut scene = scene();
        let root = scene.root();
        let arm = scene.entity_mut(root).unwrap().add_child("arm").unwrap();
        let hand = scene.entity_mut(arm).unwrap().add_child("hand").unwrap();

        scene.entity_mut(root).unwrap().remove_child(arm).unwrap();
        assert!(scene.find_entity("arm").is_none());
        assert!(scene.find_entity("hand").is_none());
        assert!(!scene.contains(hand));
        assert!(scene.entity(root).unwrap().children().is_empty());

        // the name is free again
        scene.entity_mut(root).unwrap().add_child("arm").unwrap();
    }

    #[test]
    fn test_remove_child_requires_direct_child() {
        let mut scene = scene();
        let root = scene.root();
        let a = scene.entity_mut(root).unwrap().add_child("a").unwrap();
        let b = scene.entity_mut(a).unwrap().add_child("b").unwrap();
        assert!(matches!(
            scene.entity_mut(root).unwrap().remove_child(b),
            Err(SceneError::NotAChild { .. })
        ));
        assert!(matches!(scene.remove_entity(root), Err(SceneError::RootEntity(_))));
    }

    #[test]
    fn test_component_slot_rejects_second_attach() {
        let mut scene = scene();
        let root = scene.root();
        let id = scene.entity_mut(root).unwrap().add_child("lamp").unwrap();
        scene.attach(id, Light::point(glam::Vec3::ONE, 1.0)).unwrap();

        let err = scene.attach(id, Light::point(glam::Vec3::X, 2.0)).unwrap_err();
        assert!(matches!(err, SceneError::ComponentOccupied { kind: ComponentKind::Light, .. }));
        assert_eq!(scene.component::<Light>(id).unwrap().intensity, 1.0);

        assert!(scene.detach::<Light>(id).unwrap());
        assert!(!scene.detach::<Light>(id).unwrap());
        assert!(scene.component::<Light>(id).is_none());
    }

    #[test]
    fn test_first_camera_becomes_active() {
        let mut scene = scene();
        let root = scene.root();
        let a = scene.entity_mut(root).unwrap().add_child("cam_a").unwrap();
        let b = scene.entity_mut(root).unwrap().add_child("cam_b").unwrap();
        scene.attach(a, Camera::default()).unwrap();
        scene.attach(b, Camera::default()).unwrap();
        assert_eq!(scene.active_camera(), Some(a));

        scene.set_active_camera(b).unwrap();
        assert_eq!(scene.active_camera(), Some(b));
        scene.remove_entity(b).unwrap();
        assert_eq!(scene.active_camera(), None);

        assert!(matches!(
            scene.set_active_camera(root),
            Err(SceneError::MissingComponent { .. })
        ));
    }

    #[test]
    fn test_rigid_body_released_with_entity() {
        let mut scene = scene();
        let root = scene.root();
        let id = scene.entity_mut(root).unwrap().add_child("crate").unwrap();
        scene.add_rigid_body(id, cube_body()).unwrap();
        assert_eq!(scene.physics().body_count(), 1);
        assert!(matches!(
            scene.add_rigid_body(id, cube_body()),
            Err(SceneError::ComponentOccupied { .. })
        ));
        assert_eq!(scene.physics().body_count(), 1);

        scene.remove_entity(id).unwrap();
        assert_eq!(scene.physics().body_count(), 0);
    }

    #[test]
    fn test_manual_moves_reach_the_body() {
        let mut scene = scene();
        let root = scene.root();
        let id = scene.entity_mut(root).unwrap().add_child("crate").unwrap();
        let handle = scene.add_rigid_body(id, cube_body()).unwrap();

        scene.entity_mut(root).unwrap().set_position_abs(Vector3::new(0.0, 4.0, 0.0)).unwrap();
        let pose = scene.physics().body_pose(handle).unwrap();
        assert_abs_diff_eq!(pose.position, Vector3::new(0.0, 4.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn test_physics_push_cascades() {
        let mut scene = scene();
        let root = scene.root();
        let body = scene.entity_mut(root).unwrap().add_child("falling").unwrap();
        let rider = scene.entity_mut(body).unwrap().add_child("rider").unwrap();
        scene
            .entity_mut(rider)
            .unwrap()
            .set_position_rel(Vector3::new(0.0, 1.0, 0.0))
            .unwrap();
        scene.entity_mut(body).unwrap().set_position_abs(Vector3::new(0.0, 10.0, 0.0)).unwrap();
        scene.add_rigid_body(body, cube_body()).unwrap();

        let steps = scene.step_physics(0.25).unwrap();
        assert!(steps > 0);

        let falling = scene.entity(body).unwrap().position_abs();
        assert!(falling.y < 10.0);
        let rider = scene.entity(rider).unwrap();
        assert_abs_diff_eq!(rider.position_rel(), Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-9);
        assert_abs_diff_eq!(rider.position_abs().y, falling.y + 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_physics_push_moves_child_bodies() {
        let mut scene = scene();
        let root = scene.root();
        let cart = scene.entity_mut(root).unwrap().add_child("cart").unwrap();
        let sensor = scene.entity_mut(cart).unwrap().add_child("sensor").unwrap();
        scene.entity_mut(cart).unwrap().set_position_abs(Vector3::new(0.0, 10.0, 0.0)).unwrap();
        scene
            .entity_mut(sensor)
            .unwrap()
            .set_position_rel(Vector3::new(0.0, 1.0, 0.0))
            .unwrap();
        scene.add_rigid_body(cart, cube_body()).unwrap();
        let sensor_body = scene
            .add_rigid_body(
                sensor,
                BodyDesc {
                    mass: 0.0,
                    shape: CollisionShape::Sphere { radius: 0.1 },
                },
            )
            .unwrap();

        scene.step_physics(0.5).unwrap();

        let entity_y = scene.entity(sensor).unwrap().position_abs().y;
        assert!(entity_y < 11.0);
        let body = scene.physics().body_pose(sensor_body).unwrap();
        assert_abs_diff_eq!(body.position.y, entity_y, epsilon = 1e-4);
    }

    #[test]
    fn test_nested_dynamic_bodies_keep_their_own_step() {
        let mut scene = scene();
        let root = scene.root();
        let outer = scene.entity_mut(root).unwrap().add_child("outer").unwrap();
        let inner = scene.entity_mut(outer).unwrap().add_child("inner").unwrap();
        scene.entity_mut(outer).unwrap().set_position_abs(Vector3::new(0.0, 10.0, 0.0)).unwrap();
        scene
            .entity_mut(inner)
            .unwrap()
            .set_position_rel(Vector3::new(5.0, 0.0, 0.0))
            .unwrap();
        scene.add_rigid_body(outer, cube_body()).unwrap();
        let inner_body = scene.add_rigid_body(inner, cube_body()).unwrap();

        scene.step_physics(0.25).unwrap();

        let body = scene.physics().body_pose(inner_body).unwrap();
        let entity = scene.entity(inner).unwrap().position_abs();
        assert!(body.position.y < 10.0);
        assert_abs_diff_eq!(entity, body.position, epsilon = 1e-4);
    }

    #[test]
    fn test_update_behaviors_spins() {
        let mut scene = scene();
        let root = scene.root();
        let id = scene.entity_mut(root).unwrap().add_child("top").unwrap();
        scene
            .attach(id, Behavior::new(Spin::new(Vector3::UNIT_Y, std::f64::consts::PI)))
            .unwrap();

        scene.update_behaviors(0.5).unwrap();
        let expected = Quaternion::from_axis_angle(Vector3::UNIT_Y, std::f64::consts::FRAC_PI_2);
        assert_abs_diff_eq!(scene.entity(id).unwrap().orientation_rel(), expected, epsilon = 1e-12);
        assert!(scene.has_component(id, ComponentKind::Behavior));
    }

    #[test]
    fn test_scene_graph_to_string_lists_components() {
        let mut scene = scene();
        let root = scene.root();
        let cam = scene.entity_mut(root).unwrap().add_child("camera1").unwrap();
        scene.attach(cam, Camera::default()).unwrap();
        scene.entity_mut(cam).unwrap().yaw(0.1, TransformSpace::Local).unwrap();

        let dump = scene.scene_graph_to_string();
        assert_eq!(dump, "Scene graph of 'test':\n  root\n    camera1 [camera]\n");
    }

    #[test]
    fn test_descendants_preorder() {
        let mut scene = scene();
        let root = scene.root();
        let a = scene.entity_mut(root).unwrap().add_child("a").unwrap();
        let a1 = scene.entity_mut(a).unwrap().add_child("a1").unwrap();
        let b = scene.entity_mut(root).unwrap().add_child("b").unwrap();
        assert_eq!(scene.entities(), vec![root, a, a1, b]);
    }
}
