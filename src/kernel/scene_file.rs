/// Scene persistence
///
/// A scene file is a JSON tree with one object per entity. Each node stores
/// its name, relative pose, components and children:
///
/// ```json
/// {
///   "root": {
///     "name": "root",
///     "position": { "x": 0.0, "y": 0.0, "z": 0.0 },
///     "orientation": { "w": 1.0, "x": 0.0, "y": 0.0, "z": 0.0 },
///     "children": [
///       {
///         "name": "camera1",
///         "position": { "x": 0.0, "y": 2.0, "z": 10.0 },
///         "components": [{ "type": "camera", "fov_degrees": 45.0, "near": 0.1, "far": 1000.0, "active": true }]
///       }
///     ]
///   }
/// }
/// ```
///
/// Loading validates the whole file before the scene is touched.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::component::{
    Behavior, BehaviorLogic, Camera, ComponentKind, Light, LightKind, MaterialAssignment,
    RenderableMesh, RigidBody,
};
use super::entity::{EntityId, PhysicsSync};
use super::scene::Scene;
use crate::error::LoadError;
use crate::math::{Pose, Quaternion, Scalar, Vector3};
use crate::physics::{BodyDesc, CollisionShape};
use crate::renderer::MeshSource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneFile {
    pub root: NodeData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub name: String,
    #[serde(default)]
    pub position: Vector3,
    #[serde(default)]
    pub orientation: Quaternion,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ComponentData>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeData>,
}

impl NodeData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            position: Vector3::ZERO,
            orientation: Quaternion::IDENTITY,
            components: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_position(mut self, position: Vector3) -> Self {
        self.position = position;
        self
    }

    pub fn with_component(mut self, component: ComponentData) -> Self {
        self.components.push(component);
        self
    }

    pub fn with_child(mut self, child: NodeData) -> Self {
        self.children.push(child);
        self
    }

    fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a NodeData) -> Result<(), LoadError>) -> Result<(), LoadError> {
        visit(self)?;
        for child in &self.children {
            child.walk(visit)?;
        }
        Ok(())
    }
}

/// Component block of a scene file node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ComponentData {
    Camera {
        fov_degrees: f32,
        near: f32,
        far: f32,
        #[serde(default)]
        active: bool,
    },
    Light {
        kind: LightKind,
        color: Vec3,
        intensity: f32,
    },
    RenderableMesh {
        source: MeshSource,
        #[serde(default)]
        materials: Vec<MaterialAssignment>,
    },
    RigidBody {
        mass: Scalar,
        shape: CollisionShape,
    },
    Behavior {
        kind: String,
        #[serde(default)]
        params: serde_json::Value,
    },
}

impl ComponentData {
    pub fn kind(&self) -> ComponentKind {
        match self {
            ComponentData::Camera { .. } => ComponentKind::Camera,
            ComponentData::Light { .. } => ComponentKind::Light,
            ComponentData::RenderableMesh { .. } => ComponentKind::RenderableMesh,
            ComponentData::RigidBody { .. } => ComponentKind::RigidBody,
            ComponentData::Behavior { .. } => ComponentKind::Behavior,
        }
    }

    pub fn camera(camera: &Camera, active: bool) -> Self {
        ComponentData::Camera {
            fov_degrees: camera.fov.to_degrees(),
            near: camera.near,
            far: camera.far,
            active,
        }
    }
}

impl SceneFile {
    /// Load from JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let content = fs::read_to_string(path)?;
        let file: SceneFile = serde_json::from_str(&content)?;
        Ok(file)
    }

    /// Save to JSON file with pretty formatting
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Check names, cameras and component blocks, and build every behavior.
    ///
    /// Returns the staged behaviors keyed by node name.
    fn validate(
        &self,
        scene: &Scene,
    ) -> Result<HashMap<String, Box<dyn BehaviorLogic>>, LoadError> {
        let mut names = HashSet::new();
        let mut active_cameras = Vec::new();
        let mut behaviors = HashMap::new();

        self.root.walk(&mut |node| {
            if !names.insert(node.name.as_str()) || node.name == scene.name() {
                return Err(LoadError::DuplicateName(node.name.clone()));
            }

            let mut kinds = HashSet::new();
            for component in &node.components {
                if !kinds.insert(component.kind()) {
                    return Err(LoadError::DuplicateComponent {
                        node: node.name.clone(),
                        kind: component.kind(),
                    });
                }
                match component {
                    ComponentData::Camera { active: true, .. } => {
                        active_cameras.push(node.name.clone());
                    }
                    ComponentData::Behavior { kind, params } => {
                        let logic = scene
                            .factory()
                            .create_behavior(kind, params)?
                            .ok_or_else(|| LoadError::UnknownBehavior {
                                node: node.name.clone(),
                                kind: kind.clone(),
                            })?;
                        behaviors.insert(node.name.clone(), logic);
                    }
                    _ => {}
                }
            }
            Ok(())
        })?;

        match active_cameras.len() {
            0 => Err(LoadError::MissingCamera),
            1 => Ok(behaviors),
            _ => Err(LoadError::MultipleCameras(active_cameras)),
        }
    }
}

impl Scene {
    /// Snapshot of the tree as a scene file
    pub fn to_scene_file(&self) -> SceneFile {
        SceneFile {
            root: self.node_data(self.root()),
        }
    }

    fn node_data(&self, id: EntityId) -> NodeData {
        let Ok(entity) = self.entity(id) else {
            return NodeData::new("");
        };
        let local = entity.local_pose();
        let mut data = NodeData::new(entity.name());
        data.position = local.position;
        data.orientation = local.orientation;

        if let Some(camera) = self.component::<Camera>(id) {
            data.components
                .push(ComponentData::camera(&camera, self.active_camera() == Some(id)));
        }
        if let Some(light) = self.component::<Light>(id) {
            data.components.push(ComponentData::Light {
                kind: light.kind,
                color: light.color,
                intensity: light.intensity,
            });
        }
        if let Some(mesh) = self.component::<RenderableMesh>(id) {
            data.components.push(ComponentData::RenderableMesh {
                source: mesh.source.clone(),
                materials: mesh.materials.clone(),
            });
        }
        if let Some(body) = self.component::<RigidBody>(id) {
            data.components.push(ComponentData::RigidBody {
                mass: body.desc().mass,
                shape: body.desc().shape,
            });
        }
        if let Some(behavior) = self.component::<Behavior>(id) {
            data.components.push(ComponentData::Behavior {
                kind: behavior.kind().to_string(),
                params: behavior.0.params(),
            });
        }

        data.children = entity
            .children()
            .iter()
            .map(|&child| self.node_data(child))
            .collect();
        data
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        let path = path.as_ref();
        self.to_scene_file().save(path)?;
        log::info!("Saved scene '{}' to {}", self.name(), path.display());
        Ok(())
    }

    /// Replace the whole tree with the contents of `path`.
    ///
    /// On error the scene is left untouched.
    pub fn load_from_file(&mut self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        let path = path.as_ref();
        let file = SceneFile::load(path)?;
        self.load_scene_file(&file)?;
        log::info!(
            "Loaded scene '{}' from {} ({} entities)",
            self.name(),
            path.display(),
            self.len()
        );
        Ok(())
    }

    pub fn load_scene_file(&mut self, file: &SceneFile) -> Result<(), LoadError> {
        let mut behaviors = file.validate(self)?;

        let root = self.root();
        let children = self.entity(root)?.children().to_vec();
        for child in children {
            self.remove_entity(child)?;
        }
        self.release_components(root);
        self.set_active_camera_unchecked(None);

        self.rename_root(&file.root.name);
        self.set_local_pose(
            root,
            Pose::new(file.root.position, file.root.orientation),
            PhysicsSync::Push,
        )?;
        self.apply_node(root, &file.root, &mut behaviors)
    }

    fn apply_node(
        &mut self,
        id: EntityId,
        data: &NodeData,
        behaviors: &mut HashMap<String, Box<dyn BehaviorLogic>>,
    ) -> Result<(), LoadError> {
        for component in &data.components {
            match component {
                ComponentData::Camera {
                    fov_degrees,
                    near,
                    far,
                    active,
                } => {
                    self.attach(id, Camera::new(fov_degrees.to_radians(), *near, *far))?;
                    if *active {
                        self.set_active_camera(id)?;
                    }
                }
                ComponentData::Light {
                    kind,
                    color,
                    intensity,
                } => self.attach(
                    id,
                    Light {
                        kind: *kind,
                        color: *color,
                        intensity: *intensity,
                    },
                )?,
                ComponentData::RenderableMesh { source, materials } => self.attach(
                    id,
                    RenderableMesh {
                        source: source.clone(),
                        materials: materials.clone(),
                    },
                )?,
                ComponentData::RigidBody { mass, shape } => {
                    self.add_rigid_body(
                        id,
                        BodyDesc {
                            mass: *mass,
                            shape: *shape,
                        },
                    )?;
                }
                ComponentData::Behavior { .. } => {
                    if let Some(logic) = behaviors.remove(&data.name) {
                        self.attach(id, Behavior(logic))?;
                    }
                }
            }
        }

        for child in &data.children {
            let child_id = self.spawn(id, &child.name, Pose::new(child.position, child.orientation))?;
            self.apply_node(child_id, child, behaviors)?;
        }
        Ok(())
    }
}
