/// Scene graph kernel: entities, components and scenes

mod component;
mod entity;
mod scene;
mod scene_file;

pub use component::{
    Behavior, BehaviorLogic, Camera, Component, ComponentFactory, ComponentKind,
    DefaultComponentFactory, Light, LightKind, MaterialAssignment, RenderableMesh, RigidBody, Spin,
};
pub use entity::{EntityId, EntityMut, EntityRef, TransformSpace};
pub use scene::Scene;
pub use scene_file::{ComponentData, NodeData, SceneFile};
