/// Scene graph nodes and the transform cascade
///
/// Every entity stores its pose twice: absolute (world frame) and relative
/// (parent frame). For an entity E with parent P:
/// - `E.position_abs = P.position_abs + P.orientation_abs.rotate(E.position_rel)`
/// - `E.orientation_abs = normalize(P.orientation_abs * E.orientation_rel)`
///
/// The root has no parent; its absolute pose is its relative pose. Setting
/// either form recomputes the other, syncs an attached rigid body and
/// re-derives the absolute pose of every descendant from its unchanged
/// relative pose.

use std::fmt;

use super::component::{Component, ComponentKind};
use super::scene::Scene;
use crate::error::SceneError;
use crate::math::{Matrix3, Pose, PoseChange, Quaternion, Scalar, Vector3};

/// Generational handle of an entity in its scene's arena
pub type EntityId = hecs::Entity;

/// Sine of the smallest angle between `up` and the view direction in look_at
const COLLINEAR_EPSILON: Scalar = 1e-6;

/// Reference frame for [`EntityMut::translate`] and [`EntityMut::rotate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransformSpace {
    /// The entity's own axes
    #[default]
    Local,
    /// The parent's axes
    Parent,
    /// World axes
    Global,
}

/// Tree links of an entity
#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) name: String,
    pub(crate) parent: Option<EntityId>,
    /// Insertion order
    pub(crate) children: Vec<EntityId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub(crate) struct Transform {
    pub(crate) position_abs: Vector3,
    pub(crate) position_rel: Vector3,
    pub(crate) orientation_abs: Quaternion,
    pub(crate) orientation_rel: Quaternion,
}

impl Transform {
    pub(crate) fn world(&self) -> Pose {
        Pose::new(self.position_abs, self.orientation_abs)
    }

    pub(crate) fn local(&self) -> Pose {
        Pose::new(self.position_rel, self.orientation_rel)
    }

    pub(crate) fn from_local(parent: Option<&Pose>, local: Pose) -> Self {
        let local = Pose::new(local.position, local.orientation.normalized());
        let world = match parent {
            Some(parent) => parent.compose(&local),
            None => local,
        };
        Self::from_parts(world, local)
    }

    pub(crate) fn from_world(parent: Option<&Pose>, world: Pose) -> Self {
        let world = Pose::new(world.position, world.orientation.normalized());
        let local = match parent {
            Some(parent) => parent.relative(&world),
            None => world,
        };
        Self::from_parts(world, local)
    }

    fn from_parts(world: Pose, local: Pose) -> Self {
        Self {
            position_abs: world.position,
            position_rel: local.position,
            orientation_abs: world.orientation,
            orientation_rel: local.orientation,
        }
    }
}

/// Whether a pose write is mirrored into the entity's rigid body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PhysicsSync {
    Push,
    /// The pose came from the entity's own body; descendants are still pushed
    Skip,
}

/// Read-only snapshot of one entity
pub struct EntityRef<'a> {
    scene: &'a Scene,
    id: EntityId,
    name: String,
    parent: Option<(EntityId, String)>,
    children: Vec<EntityId>,
    transform: Transform,
    components: Vec<ComponentKind>,
}

impl<'a> EntityRef<'a> {
    pub(crate) fn new(scene: &'a Scene, id: EntityId) -> Result<Self, SceneError> {
        let node: Node = (*scene.node(id)?).clone();
        let transform = scene.transform(id)?;
        let parent = match node.parent {
            Some(parent) => Some((parent, scene.node(parent)?.name.clone())),
            None => None,
        };
        Ok(Self {
            scene,
            id,
            name: node.name,
            parent,
            children: node.children,
            transform,
            components: scene.component_kinds(id),
        })
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<EntityId> {
        self.parent.as_ref().map(|(id, _)| *id)
    }

    pub fn parent_name(&self) -> Option<&str> {
        self.parent.as_ref().map(|(_, name)| name.as_str())
    }

    pub fn children(&self) -> &[EntityId] {
        &self.children
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn position_abs(&self) -> Vector3 {
        self.transform.position_abs
    }

    pub fn position_rel(&self) -> Vector3 {
        self.transform.position_rel
    }

    pub fn orientation_abs(&self) -> Quaternion {
        self.transform.orientation_abs
    }

    pub fn orientation_rel(&self) -> Quaternion {
        self.transform.orientation_rel
    }

    pub fn world_pose(&self) -> Pose {
        self.transform.world()
    }

    pub fn local_pose(&self) -> Pose {
        self.transform.local()
    }

    pub fn components(&self) -> &[ComponentKind] {
        &self.components
    }

    pub fn has_component(&self, kind: ComponentKind) -> bool {
        self.components.contains(&kind)
    }

    /// Indented dump of this subtree, two spaces per level
    pub fn tree_to_string(&self, indent: usize) -> String {
        let mut out = String::new();
        self.scene.write_tree(self.id, indent, &mut out);
        out
    }
}

impl fmt::Display for EntityRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Entity: {}", self.name)?;
        writeln!(f, "  parent: {}", self.parent_name().unwrap_or("-"))?;
        writeln!(f, "  children: {}", self.children.len())?;
        writeln!(f, "  position abs: {}", self.transform.position_abs)?;
        writeln!(f, "  position rel: {}", self.transform.position_rel)?;
        writeln!(f, "  orientation abs: {}", self.transform.orientation_abs)?;
        writeln!(f, "  orientation rel: {}", self.transform.orientation_rel)?;
        let kinds: Vec<&str> = self.components.iter().map(|k| k.name()).collect();
        write!(f, "  components: [{}]", kinds.join(", "))
    }
}

/// Mutable view of one entity; every pose setter goes through here
pub struct EntityMut<'a> {
    scene: &'a mut Scene,
    id: EntityId,
}

impl<'a> EntityMut<'a> {
    pub(crate) fn new(scene: &'a mut Scene, id: EntityId) -> Result<Self, SceneError> {
        if !scene.contains(id) {
            return Err(SceneError::NoSuchEntity(id));
        }
        Ok(Self { scene, id })
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn scene(&self) -> &Scene {
        self.scene
    }

    pub fn get(&self) -> Result<EntityRef<'_>, SceneError> {
        self.scene.entity(self.id)
    }

    pub fn set_position_abs(&mut self, position: Vector3) -> Result<PoseChange, SceneError> {
        let mut pose = self.scene.transform(self.id)?.world();
        pose.position = position;
        self.scene.set_world_pose(self.id, pose, PhysicsSync::Push)
    }

    pub fn set_position_rel(&mut self, position: Vector3) -> Result<PoseChange, SceneError> {
        let mut pose = self.scene.transform(self.id)?.local();
        pose.position = position;
        self.scene.set_local_pose(self.id, pose, PhysicsSync::Push)
    }

    pub fn set_orientation_abs(&mut self, orientation: Quaternion) -> Result<PoseChange, SceneError> {
        let mut pose = self.scene.transform(self.id)?.world();
        pose.orientation = orientation;
        self.scene.set_world_pose(self.id, pose, PhysicsSync::Push)
    }

    pub fn set_orientation_rel(&mut self, orientation: Quaternion) -> Result<PoseChange, SceneError> {
        let mut pose = self.scene.transform(self.id)?.local();
        pose.orientation = orientation;
        self.scene.set_local_pose(self.id, pose, PhysicsSync::Push)
    }

    /// Angles in radians, see [`Quaternion::from_euler`]
    pub fn set_orientation_abs_ypr(
        &mut self,
        yaw: Scalar,
        pitch: Scalar,
        roll: Scalar,
    ) -> Result<PoseChange, SceneError> {
        self.set_orientation_abs(Quaternion::from_euler(yaw, pitch, roll))
    }

    pub fn set_orientation_rel_ypr(
        &mut self,
        yaw: Scalar,
        pitch: Scalar,
        roll: Scalar,
    ) -> Result<PoseChange, SceneError> {
        self.set_orientation_rel(Quaternion::from_euler(yaw, pitch, roll))
    }

    pub fn set_world_pose(&mut self, pose: Pose) -> Result<PoseChange, SceneError> {
        self.scene.set_world_pose(self.id, pose, PhysicsSync::Push)
    }

    pub fn set_local_pose(&mut self, pose: Pose) -> Result<PoseChange, SceneError> {
        self.scene.set_local_pose(self.id, pose, PhysicsSync::Push)
    }

    pub fn translate(
        &mut self,
        displacement: Vector3,
        space: TransformSpace,
    ) -> Result<PoseChange, SceneError> {
        let transform = self.scene.transform(self.id)?;
        let offset = match space {
            TransformSpace::Local => transform.orientation_abs.rotate_vector(displacement),
            TransformSpace::Parent => match self.scene.parent_world_pose(self.id)? {
                Some(parent) => parent.orientation.rotate_vector(displacement),
                None => displacement,
            },
            TransformSpace::Global => displacement,
        };
        self.set_position_abs(transform.position_abs + offset)
    }

    pub fn translate_x(&mut self, distance: Scalar, space: TransformSpace) -> Result<PoseChange, SceneError> {
        self.translate(Vector3::new(distance, 0.0, 0.0), space)
    }

    pub fn translate_y(&mut self, distance: Scalar, space: TransformSpace) -> Result<PoseChange, SceneError> {
        self.translate(Vector3::new(0.0, distance, 0.0), space)
    }

    pub fn translate_z(&mut self, distance: Scalar, space: TransformSpace) -> Result<PoseChange, SceneError> {
        self.translate(Vector3::new(0.0, 0.0, distance), space)
    }

    pub fn rotate(&mut self, delta: Quaternion, space: TransformSpace) -> Result<PoseChange, SceneError> {
        let delta = delta.normalized();
        let transform = self.scene.transform(self.id)?;
        match space {
            TransformSpace::Local => self.set_orientation_rel(transform.orientation_rel * delta),
            TransformSpace::Parent => self.set_orientation_rel(delta * transform.orientation_rel),
            TransformSpace::Global => self.set_orientation_abs(delta * transform.orientation_abs),
        }
    }

    pub fn rotate_axis_angle(
        &mut self,
        axis: Vector3,
        angle: Scalar,
        space: TransformSpace,
    ) -> Result<PoseChange, SceneError> {
        self.rotate(Quaternion::from_axis_angle(axis, angle), space)
    }

    /// Rotate around Y
    pub fn yaw(&mut self, radians: Scalar, space: TransformSpace) -> Result<PoseChange, SceneError> {
        self.rotate_axis_angle(Vector3::UNIT_Y, radians, space)
    }

    /// Rotate around X
    pub fn pitch(&mut self, radians: Scalar, space: TransformSpace) -> Result<PoseChange, SceneError> {
        self.rotate_axis_angle(Vector3::UNIT_X, radians, space)
    }

    /// Rotate around Z
    pub fn roll(&mut self, radians: Scalar, space: TransformSpace) -> Result<PoseChange, SceneError> {
        self.rotate_axis_angle(Vector3::UNIT_Z, radians, space)
    }

    /// Point the local -Z axis at `target`, keeping local +Y as close to
    /// `up` as possible.
    ///
    /// A target at the entity's own position leaves the orientation as is.
    /// An `up` parallel to the view direction is replaced by +Z, or +X when
    /// +Z is parallel too.
    pub fn look_at(&mut self, target: Vector3, up: Vector3) -> Result<PoseChange, SceneError> {
        let transform = self.scene.transform(self.id)?;
        let Some(forward) = (target - transform.position_abs).try_normalized() else {
            log::warn!(
                "look_at target {} coincides with the position of entity {:?}",
                target,
                self.id
            );
            let pose = transform.world();
            return Ok(PoseChange {
                previous: pose,
                current: pose,
            });
        };

        let right = [up, Vector3::UNIT_Z, Vector3::UNIT_X]
            .into_iter()
            .find_map(|candidate| {
                let right = forward.cross(candidate.try_normalized()?);
                (right.length() > COLLINEAR_EPSILON).then(|| right.normalized())
            })
            .unwrap_or(Vector3::UNIT_X);
        let true_up = right.cross(forward);

        let basis = Matrix3::from_columns(right, true_up, -forward);
        self.set_orientation_abs(basis.to_quaternion())
    }

    /// Create a child with an identity relative pose
    pub fn add_child(&mut self, name: &str) -> Result<EntityId, SceneError> {
        self.scene.spawn(self.id, name, Pose::IDENTITY)
    }

    /// Destroy `child` and its subtree
    pub fn remove_child(&mut self, child: EntityId) -> Result<(), SceneError> {
        let parent = self.scene.node(child)?.parent;
        if parent != Some(self.id) {
            return Err(SceneError::NotAChild {
                parent: self.scene.node(self.id)?.name.clone(),
                child: self.scene.node(child)?.name.clone(),
            });
        }
        self.scene.remove_entity(child)
    }

    /// Destroy every child subtree; returns how many children were removed
    pub fn remove_all_children(&mut self) -> Result<usize, SceneError> {
        let children = self.scene.node(self.id)?.children.clone();
        for &child in &children {
            self.scene.remove_entity(child)?;
        }
        Ok(children.len())
    }

    /// Move under `new_parent`, keeping the current world pose
    pub fn reparent(&mut self, new_parent: EntityId) -> Result<PoseChange, SceneError> {
        self.scene.reparent(self.id, new_parent)
    }

    pub fn attach<C: Component>(&mut self, component: C) -> Result<(), SceneError> {
        self.scene.attach(self.id, component)
    }

    pub fn detach<C: Component>(&mut self) -> Result<bool, SceneError> {
        self.scene.detach::<C>(self.id)
    }
}

impl Scene {
    pub(crate) fn parent_world_pose(&self, id: EntityId) -> Result<Option<Pose>, SceneError> {
        let parent = self.node(id)?.parent;
        match parent {
            Some(parent) => Ok(Some(self.transform(parent)?.world())),
            None => Ok(None),
        }
    }

    pub(crate) fn set_world_pose(
        &mut self,
        id: EntityId,
        pose: Pose,
        sync: PhysicsSync,
    ) -> Result<PoseChange, SceneError> {
        let parent = self.parent_world_pose(id)?;
        let next = Transform::from_world(parent.as_ref(), pose);
        self.commit(id, next, sync)
    }

    pub(crate) fn set_local_pose(
        &mut self,
        id: EntityId,
        pose: Pose,
        sync: PhysicsSync,
    ) -> Result<PoseChange, SceneError> {
        let parent = self.parent_world_pose(id)?;
        let next = Transform::from_local(parent.as_ref(), pose);
        self.commit(id, next, sync)
    }

    fn commit(
        &mut self,
        id: EntityId,
        next: Transform,
        sync: PhysicsSync,
    ) -> Result<PoseChange, SceneError> {
        let previous = self.transform(id)?;
        self.write_transform(id, next)?;
        if sync == PhysicsSync::Push {
            self.push_body_pose(id, &next.world());
        }
        self.cascade(id)?;

        Ok(PoseChange {
            previous: previous.world(),
            current: next.world(),
        })
    }

    /// Re-derive the absolute pose of every descendant of `id` and move
    /// their rigid bodies along
    fn cascade(&mut self, id: EntityId) -> Result<(), SceneError> {
        let parent = self.transform(id)?.world();
        let children = self.node(id)?.children.clone();

        for child in children {
            let local = self.transform(child)?.local();
            let next = Transform::from_local(Some(&parent), local);
            self.write_transform(child, next)?;
            self.push_body_pose(child, &next.world());
            self.cascade(child)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{DefaultComponentFactory, Scene};
    use crate::physics::PhysicsWorld;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::FRAC_PI_2;

    fn scene() -> Scene {
        Scene::new("test", "root", PhysicsWorld::default(), Box::new(DefaultComponentFactory))
    }

    #[test]
    fn test_root_abs_equals_rel() {
        let mut scene = scene();
        let root = scene.root();
        scene
            .entity_mut(root)
            .unwrap()
            .set_position_rel(Vector3::new(1.0, 2.0, 3.0))
            .unwrap();
        let entity = scene.entity(root).unwrap();
        assert_eq!(entity.position_abs(), entity.position_rel());
    }

    #[test]
    fn test_child_follows_parent_translation() {
        let mut scene = scene();
        let root = scene.root();
        let parent = scene.entity_mut(root).unwrap().add_child("parent").unwrap();
        let child = scene.entity_mut(parent).unwrap().add_child("child").unwrap();
        scene
            .entity_mut(child)
            .unwrap()
            .set_position_rel(Vector3::new(0.0, 1.0, 0.0))
            .unwrap();

        scene
            .entity_mut(parent)
            .unwrap()
            .set_position_abs(Vector3::new(5.0, 0.0, 0.0))
            .unwrap();

        let child = scene.entity(child).unwrap();
        assert_abs_diff_eq!(child.position_abs(), Vector3::new(5.0, 1.0, 0.0), epsilon = 1e-12);
        assert_abs_diff_eq!(child.position_rel(), Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_set_abs_derives_rel() {
        let mut scene = scene();
        let root = scene.root();
        scene.entity_mut(root).unwrap().yaw(FRAC_PI_2, TransformSpace::Local).unwrap();
        let child = scene.entity_mut(root).unwrap().add_child("child").unwrap();

        scene
            .entity_mut(child)
            .unwrap()
            .set_position_abs(Vector3::new(1.0, 0.0, 0.0))
            .unwrap();
        let child = scene.entity(child).unwrap();
        assert_abs_diff_eq!(child.position_rel(), Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_pose_change_reports_previous() {
        let mut scene = scene();
        let root = scene.root();
        let id = scene.entity_mut(root).unwrap().add_child("spinner").unwrap();
        let change = scene
            .entity_mut(id)
            .unwrap()
            .yaw(FRAC_PI_2, TransformSpace::Local)
            .unwrap();
        assert_eq!(change.previous.orientation, Quaternion::IDENTITY);
        assert_abs_diff_eq!(change.angular_velocity(1.0).y, FRAC_PI_2, epsilon = 1e-9);
    }

    #[test]
    fn test_translate_spaces() {
        let mut scene = scene();
        let root = scene.root();
        scene.entity_mut(root).unwrap().yaw(FRAC_PI_2, TransformSpace::Local).unwrap();
        let id = scene.entity_mut(root).unwrap().add_child("mover").unwrap();
        scene.entity_mut(id).unwrap().yaw(FRAC_PI_2, TransformSpace::Local).unwrap();

        // world orientation is a half turn around Y
        let mut entity = scene.entity_mut(id).unwrap();
        let change = entity.translate_z(-1.0, TransformSpace::Local).unwrap();
        assert_abs_diff_eq!(change.translation(), Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-12);

        let change = entity.translate_z(-1.0, TransformSpace::Parent).unwrap();
        assert_abs_diff_eq!(change.translation(), Vector3::new(-1.0, 0.0, 0.0), epsilon = 1e-12);

        let change = entity.translate_z(-1.0, TransformSpace::Global).unwrap();
        assert_abs_diff_eq!(change.translation(), Vector3::new(0.0, 0.0, -1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_rotate_spaces() {
        let mut scene = scene();
        let root = scene.root();
        let id = scene.entity_mut(root).unwrap().add_child("rotor").unwrap();
        let mut entity = scene.entity_mut(id).unwrap();
        entity.pitch(FRAC_PI_2, TransformSpace::Local).unwrap();

        // local yaw turns around the pitched Y axis, global yaw around world Y
        let local = entity.yaw(FRAC_PI_2, TransformSpace::Local).unwrap();
        let expected = Quaternion::from_axis_angle(Vector3::UNIT_X, FRAC_PI_2)
            * Quaternion::from_axis_angle(Vector3::UNIT_Y, FRAC_PI_2);
        assert_abs_diff_eq!(local.current.orientation, expected, epsilon = 1e-12);

        let global = entity.yaw(FRAC_PI_2, TransformSpace::Global).unwrap();
        let expected = Quaternion::from_axis_angle(Vector3::UNIT_Y, FRAC_PI_2) * expected;
        assert_abs_diff_eq!(global.current.orientation, expected.normalized(), epsilon = 1e-12);
    }

    #[test]
    fn test_look_at() {
        let mut scene = scene();
        let root = scene.root();
        let id = scene.entity_mut(root).unwrap().add_child("eye").unwrap();
        let mut entity = scene.entity_mut(id).unwrap();

        let change = entity.look_at(Vector3::new(10.0, 0.0, 0.0), Vector3::UNIT_Y).unwrap();
        let forward = change.current.orientation.rotate_vector(Vector3::NEG_UNIT_Z);
        assert_abs_diff_eq!(forward, Vector3::UNIT_X, epsilon = 1e-12);
        let up = change.current.orientation.rotate_vector(Vector3::UNIT_Y);
        assert_abs_diff_eq!(up, Vector3::UNIT_Y, epsilon = 1e-12);
    }

    #[test]
    fn test_look_at_degenerate_inputs() {
        let mut scene = scene();
        let root = scene.root();
        let id = scene.entity_mut(root).unwrap().add_child("eye").unwrap();
        let mut entity = scene.entity_mut(id).unwrap();

        let change = entity.look_at(Vector3::ZERO, Vector3::UNIT_Y).unwrap();
        assert!(change.is_unchanged());

        // up parallel to the view direction
        let change = entity.look_at(Vector3::new(0.0, 5.0, 0.0), Vector3::UNIT_Y).unwrap();
        let q = change.current.orientation;
        assert!(q.is_finite());
        let forward = q.rotate_vector(Vector3::NEG_UNIT_Z);
        assert_abs_diff_eq!(forward, Vector3::UNIT_Y, epsilon = 1e-12);
    }

    #[test]
    fn test_tree_to_string_indents() {
        let mut scene = scene();
        let root = scene.root();
        let a = scene.entity_mut(root).unwrap().add_child("a").unwrap();
        scene.entity_mut(a).unwrap().add_child("a1").unwrap();
        scene.entity_mut(root).unwrap().add_child("b").unwrap();

        let dump = scene.entity(root).unwrap().tree_to_string(0);
        assert_eq!(dump, "root\n  a\n    a1\n  b\n");
    }

    #[test]
    fn test_reparent_keeps_world_pose() {
        let mut scene = scene();
        let root = scene.root();
        let a = scene.entity_mut(root).unwrap().add_child("a").unwrap();
        let b = scene.entity_mut(root).unwrap().add_child("b").unwrap();
        scene.entity_mut(a).unwrap().set_position_abs(Vector3::new(3.0, 0.0, 0.0)).unwrap();
        scene.entity_mut(a).unwrap().yaw(1.0, TransformSpace::Local).unwrap();
        scene.entity_mut(b).unwrap().set_position_abs(Vector3::new(0.0, 2.0, 0.0)).unwrap();

        let change = scene.entity_mut(b).unwrap().reparent(a).unwrap();
        assert_abs_diff_eq!(change.current.position, Vector3::new(0.0, 2.0, 0.0), epsilon = 1e-12);
        assert_eq!(scene.entity(b).unwrap().parent(), Some(a));

        // cycles and the root are rejected
        assert!(matches!(
            scene.entity_mut(a).unwrap().reparent(b),
            Err(SceneError::CyclicParent { .. })
        ));
        assert!(matches!(
            scene.entity_mut(root).unwrap().reparent(a),
            Err(SceneError::RootEntity(_))
        ));
    }
}
