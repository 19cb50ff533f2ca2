/// Scene graph behavior through the public API: transform cascade, tree
/// editing and scene file round trips

use std::f64::consts::FRAC_PI_2;

use approx::assert_relative_eq;
use grove_engine::error::{LoadError, SceneError};
use grove_engine::kernel::{
    Camera, ComponentData, DefaultComponentFactory, EntityId, NodeData, RenderableMesh, Scene,
    SceneFile, TransformSpace,
};
use grove_engine::math::{Quaternion, Vector3};
use grove_engine::physics::PhysicsWorld;
use grove_engine::renderer::MeshSource;

fn new_scene() -> Scene {
    Scene::new("test", "root", PhysicsWorld::default(), Box::new(DefaultComponentFactory))
}

fn add_child(scene: &mut Scene, parent: EntityId, name: &str) -> EntityId {
    scene.entity_mut(parent).unwrap().add_child(name).unwrap()
}

/// Every non-root entity must sit at parent + parent_rotation(rel)
fn assert_tree_consistent(scene: &Scene) {
    for id in scene.entities() {
        let entity = scene.entity(id).unwrap();
        let Some(parent) = entity.parent() else {
            assert_relative_eq!(entity.position_abs(), entity.position_rel(), epsilon = 1e-9);
            continue;
        };
        let parent = scene.entity(parent).unwrap();
        let expected = parent.position_abs() + parent.orientation_abs().rotate_vector(entity.position_rel());
        assert_relative_eq!(entity.position_abs(), expected, epsilon = 1e-9);

        let expected = (parent.orientation_abs() * entity.orientation_rel()).normalized();
        assert!(
            expected.dot(entity.orientation_abs()).abs() > 1.0 - 1e-9,
            "orientation of '{}' out of sync",
            entity.name()
        );
    }
}

#[test]
fn root_yaw_swings_child() {
    let mut scene = new_scene();
    let root = scene.root();
    let child = add_child(&mut scene, root, "child");
    scene
        .entity_mut(child)
        .unwrap()
        .set_position_rel(Vector3::new(0.0, 0.0, 1.0))
        .unwrap();

    scene.entity_mut(root).unwrap().yaw(FRAC_PI_2, TransformSpace::Local).unwrap();

    let child = scene.entity(child).unwrap();
    assert_relative_eq!(child.position_abs(), Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-9);
    assert_relative_eq!(child.position_rel(), Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-9);
}

#[test]
fn hierarchy_stays_consistent_under_mutation() {
    let mut scene = new_scene();
    let root = scene.root();
    let arm = add_child(&mut scene, root, "arm");
    let forearm = add_child(&mut scene, arm, "forearm");
    let hand = add_child(&mut scene, forearm, "hand");
    let other = add_child(&mut scene, root, "other");

    scene
        .entity_mut(forearm)
        .unwrap()
        .set_position_rel(Vector3::new(0.0, 2.0, 0.0))
        .unwrap();
    scene
        .entity_mut(hand)
        .unwrap()
        .set_position_rel(Vector3::new(1.0, 0.5, 0.0))
        .unwrap();
    assert_tree_consistent(&scene);

    scene
        .entity_mut(arm)
        .unwrap()
        .rotate_axis_angle(Vector3::new(1.0, 1.0, 0.0), 0.7, TransformSpace::Local)
        .unwrap();
    assert_tree_consistent(&scene);

    scene
        .entity_mut(forearm)
        .unwrap()
        .pitch(0.3, TransformSpace::Parent)
        .unwrap();
    scene
        .entity_mut(forearm)
        .unwrap()
        .translate(Vector3::new(0.5, 0.0, -1.0), TransformSpace::Local)
        .unwrap();
    assert_tree_consistent(&scene);

    scene
        .entity_mut(hand)
        .unwrap()
        .set_orientation_abs(Quaternion::from_euler(0.2, 0.4, -0.1))
        .unwrap();
    scene
        .entity_mut(root)
        .unwrap()
        .set_position_abs(Vector3::new(-3.0, 1.0, 4.0))
        .unwrap();
    assert_tree_consistent(&scene);

    scene.entity_mut(forearm).unwrap().reparent(other).unwrap();
    scene.entity_mut(other).unwrap().roll(1.1, TransformSpace::Global).unwrap();
    assert_tree_consistent(&scene);
}

#[test]
fn set_abs_then_parent_moves() {
    let mut scene = new_scene();
    let root = scene.root();
    let parent = add_child(&mut scene, root, "parent");
    let child = add_child(&mut scene, parent, "child");

    scene
        .entity_mut(child)
        .unwrap()
        .set_position_abs(Vector3::new(5.0, 0.0, 0.0))
        .unwrap();
    scene
        .entity_mut(parent)
        .unwrap()
        .translate(Vector3::new(0.0, 3.0, 0.0), TransformSpace::Global)
        .unwrap();

    let child = scene.entity(child).unwrap();
    assert_relative_eq!(child.position_abs(), Vector3::new(5.0, 3.0, 0.0), epsilon = 1e-9);
    assert_relative_eq!(child.position_rel(), Vector3::new(5.0, 0.0, 0.0), epsilon = 1e-9);
}

#[test]
fn add_then_remove_child() {
    let mut scene = new_scene();
    let root = scene.root();
    let x = add_child(&mut scene, root, "x");
    add_child(&mut scene, x, "x-child");
    assert_eq!(scene.find_entity("x"), Some(x));

    scene.entity_mut(root).unwrap().remove_child(x).unwrap();
    assert_eq!(scene.find_entity("x"), None);
    assert_eq!(scene.find_entity("x-child"), None);
    assert!(!scene.contains(x));
    assert_eq!(scene.len(), 1);

    // names are free again
    add_child(&mut scene, root, "x");
}

#[test]
fn duplicate_names_are_rejected() {
    let mut scene = new_scene();
    let root = scene.root();
    add_child(&mut scene, root, "twin");
    let result = scene.entity_mut(root).unwrap().add_child("twin");
    assert!(matches!(result, Err(SceneError::DuplicateName(name)) if name == "twin"));
}

#[test]
fn root_cannot_be_removed() {
    let mut scene = new_scene();
    let root = scene.root();
    assert!(matches!(scene.remove_entity(root), Err(SceneError::RootEntity(_))));
}

fn camera_node(name: &str) -> NodeData {
    NodeData::new(name).with_component(ComponentData::camera(&Camera::default(), true))
}

#[test]
fn duplicate_camera_name_in_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dup.json");
    let file = SceneFile {
        root: NodeData::new("root")
            .with_child(camera_node("camera1"))
            .with_child(NodeData::new("group").with_child(NodeData::new("camera1"))),
    };
    file.save(&path).unwrap();

    let mut scene = new_scene();
    let result = scene.load_from_file(&path);
    assert!(matches!(result, Err(LoadError::DuplicateName(name)) if name == "camera1"));
    assert_eq!(scene.len(), 1);
}

#[test]
fn file_without_camera() {
    let json = r#"{ "root": { "name": "root", "children": [ { "name": "crate" } ] } }"#;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nocam.json");
    std::fs::write(&path, json).unwrap();

    let mut scene = new_scene();
    assert!(matches!(scene.load_from_file(&path), Err(LoadError::MissingCamera)));
}

#[test]
fn malformed_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ \"root\": ").unwrap();

    let mut scene = new_scene();
    assert!(matches!(scene.load_from_file(&path), Err(LoadError::Parse(_))));
    assert!(matches!(
        scene.load_from_file(dir.path().join("missing.json")),
        Err(LoadError::Io(_))
    ));
}

fn assert_same_tree(a: &NodeData, b: &NodeData) {
    assert_eq!(a.name, b.name);
    let kinds = |node: &NodeData| node.components.iter().map(|c| c.kind()).collect::<Vec<_>>();
    assert_eq!(kinds(a), kinds(b));
    assert_relative_eq!(a.position, b.position, epsilon = 1e-12);
    assert_relative_eq!(a.orientation, b.orientation, epsilon = 1e-12);
    assert_eq!(a.children.len(), b.children.len());
    for (a, b) in a.children.iter().zip(&b.children) {
        assert_same_tree(a, b);
    }
}

#[test]
fn save_load_round_trip() {
    let mut scene = new_scene();
    let root = scene.root();
    let camera = add_child(&mut scene, root, "camera");
    scene.attach(camera, Camera::default()).unwrap();
    scene
        .entity_mut(camera)
        .unwrap()
        .set_position_abs(Vector3::new(0.0, 2.0, 10.0))
        .unwrap();

    let ship = add_child(&mut scene, root, "ship");
    scene
        .entity_mut(ship)
        .unwrap()
        .set_orientation_abs(Quaternion::from_euler_degrees(45.0, 10.0, 0.0))
        .unwrap();
    scene
        .attach(
            ship,
            RenderableMesh::new(MeshSource::Box {
                size: Vector3::new(2.0, 1.0, 4.0),
            })
            .with_material(0, "Metal"),
        )
        .unwrap();
    let turret = add_child(&mut scene, ship, "turret");
    scene
        .entity_mut(turret)
        .unwrap()
        .set_position_rel(Vector3::new(0.0, 1.0, 0.5))
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scenes").join("ship.json");
    scene.save_to_file(&path).unwrap();

    let mut loaded = new_scene();
    loaded.load_from_file(&path).unwrap();
    assert_eq!(loaded.len(), scene.len());
    assert_same_tree(&loaded.to_scene_file().root, &scene.to_scene_file().root);

    let camera = loaded.find_entity("camera").unwrap();
    assert_eq!(loaded.active_camera(), Some(camera));

    let original = scene.entity(scene.find_entity("turret").unwrap()).unwrap().position_abs();
    let turret = loaded.entity(loaded.find_entity("turret").unwrap()).unwrap();
    assert_relative_eq!(turret.position_abs(), original, epsilon = 1e-9);
    assert_tree_consistent(&loaded);
}
