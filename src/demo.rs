/// Frame-stepped demo loop
///
/// Each frame runs, in order:
/// - physics step and pose write-back
/// - queued console commands, then behaviors
/// - rendering through the headless backend
/// - frame timing
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use glam::Vec3;

use crate::command::{self, format_result, Command};
use crate::config::{DemoConfig, EngineConfig};
use crate::error::{CommandError, RenderError, SceneError};
use crate::kernel::{Behavior, Camera, DefaultComponentFactory, Light, RenderableMesh, Scene, Spin};
use crate::math::{Pose, Quaternion, Scalar, Vector3};
use crate::physics::{BodyDesc, CollisionShape, PhysicsWorld};
use crate::renderer::{FrameStats, HeadlessBackend, MaterialLibrary, MeshSource, Renderer};

/// Target name of the demo's own commands
pub const DEMO_TARGET: &str = "demo";

/// Frames per second over one-second windows
pub struct FrameTimer {
    fps_timer: Instant,
    frame_count: u32,
    current_fps: f32,
    total_frames: u64,
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameTimer {
    pub fn new() -> Self {
        Self {
            fps_timer: Instant::now(),
            frame_count: 0,
            current_fps: 0.0,
            total_frames: 0,
        }
    }

    pub fn end_frame(&mut self) {
        self.frame_count += 1;
        self.total_frames += 1;
        let elapsed = self.fps_timer.elapsed().as_secs_f32();
        if elapsed >= 1.0 {
            self.current_fps = self.frame_count as f32 / elapsed;
            self.frame_count = 0;
            self.fps_timer = Instant::now();
        }
    }

    pub fn fps(&self) -> f32 {
        self.current_fps
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MissileKind {
    Cube,
    Sphere,
}

pub struct Demo {
    config: DemoConfig,
    scene: Scene,
    renderer: Renderer<HeadlessBackend>,
    queue: VecDeque<Command>,
    running: bool,
    frame_time: Scalar,
    timer: FrameTimer,
    missiles: usize,
    last_stats: FrameStats,
}

impl Demo {
    /// Build the scene from the configured file, or the built-in scene when
    /// no file is configured or it does not exist
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let physics = PhysicsWorld::new(&config.physics);
        let mut scene = Scene::new("scene", "root", physics, Box::new(DefaultComponentFactory));

        match config.demo.scene_path.as_deref() {
            Some(path) if Path::new(path).exists() => scene
                .load_from_file(path)
                .with_context(|| format!("Failed to load scene '{}'", path))?,
            Some(path) => {
                log::warn!("Scene file '{}' not found, using the built-in scene", path);
                build_default_scene(&mut scene, &config.demo)?;
            }
            None => build_default_scene(&mut scene, &config.demo)?,
        }

        let materials = MaterialLibrary::load_or_default(&config.renderer.material_library);
        let mut demo = Self::from_parts(config, scene, materials)?;
        if let Some(script) = config.demo.startup_script.clone() {
            demo.queue_script(&script)?;
        }
        Ok(demo)
    }

    pub fn from_parts(config: &EngineConfig, scene: Scene, materials: MaterialLibrary) -> Result<Self> {
        let renderer = Renderer::new(HeadlessBackend::new(), &config.renderer, materials)?;

        Ok(Self {
            config: config.demo.clone(),
            scene,
            renderer,
            queue: VecDeque::new(),
            running: true,
            frame_time: config.physics.timestep as Scalar,
            timer: FrameTimer::new(),
            missiles: 0,
            last_stats: FrameStats::default(),
        })
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn renderer(&self) -> &Renderer<HeadlessBackend> {
        &self.renderer
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn last_stats(&self) -> FrameStats {
        self.last_stats
    }

    pub fn frames(&self) -> u64 {
        self.timer.total_frames()
    }

    /// Queue a console line for the next frame
    pub fn queue_command(&mut self, line: &str) -> Result<(), CommandError> {
        if let Some(command) = Command::parse(line)? {
            self.queue.push_back(command);
        }
        Ok(())
    }

    /// Queue every command of a script file; malformed lines are skipped
    pub fn queue_script(&mut self, path: &str) -> Result<usize, CommandError> {
        let text = fs::read_to_string(path)
            .map_err(|err| CommandError::Failed(format!("cannot read script '{}': {}", path, err)))?;

        let mut queued = 0;
        for (index, command) in Command::parse_script(&text).into_iter().enumerate() {
            match command {
                Ok(command) => {
                    self.queue.push_back(command);
                    queued += 1;
                }
                Err(err) => log::warn!("{}: command {}: {}", path, index + 1, err),
            }
        }
        log::info!("Queued {} commands from '{}'", queued, path);
        Ok(queued)
    }

    /// Parse and run one line immediately
    pub fn execute_line(&mut self, line: &str) -> Result<String, CommandError> {
        match Command::parse(line)? {
            Some(command) => self.execute(&command, self.frame_time),
            None => Ok(String::new()),
        }
    }

    pub fn execute(&mut self, command: &Command, dt: Scalar) -> Result<String, CommandError> {
        if command.target == DEMO_TARGET {
            self.execute_demo(command)
        } else {
            command::execute(&mut self.scene, command, dt)
        }
    }

    fn execute_demo(&mut self, command: &Command) -> Result<String, CommandError> {
        match command.name.as_str() {
            "quit" => {
                self.running = false;
                Ok(String::new())
            }
            "run" => {
                let [path] = command::words::<1>(&command.args)?;
                let queued = self.queue_script(path)?;
                Ok(format!("queued {} commands", queued))
            }
            "print-entity" => {
                let [name] = command::words::<1>(&command.args)?;
                let id = self
                    .scene
                    .find_entity(name)
                    .ok_or_else(|| CommandError::UnknownTarget(name.to_string()))?;
                Ok(self.scene.entity(id)?.to_string())
            }
            "on-mouse-motion" => {
                let [dx, dy] = command::numbers::<2>(&command.args)?;
                let camera = self.camera_name()?;
                let sensitivity = self.config.mouse_sensitivity;
                let yaw = (dx * sensitivity).to_string();
                let pitch = (dy * sensitivity).to_string();
                self.queue
                    .push_back(Command::new(&camera, "yaw-global", &[yaw.as_str()]));
                self.queue
                    .push_back(Command::new(&camera, "pitch", &[pitch.as_str()]));
                Ok(String::new())
            }
            "fire-cube" => self.fire(MissileKind::Cube),
            "fire-sphere" => self.fire(MissileKind::Sphere),
            "lists" => Ok(self.renderer.lists_to_string(&self.scene)),
            "stats" => Ok(format!(
                "{} frames, {:.1} fps, {} draw calls, {} triangles, {} lights",
                self.timer.total_frames(),
                self.timer.fps(),
                self.last_stats.draw_calls,
                self.last_stats.triangles,
                self.last_stats.lights
            )),
            _ => Err(CommandError::UnknownCommand {
                target: command.target.clone(),
                command: command.name.clone(),
            }),
        }
    }

    fn camera_name(&self) -> Result<String, CommandError> {
        let id = self
            .scene
            .active_camera()
            .ok_or(CommandError::Render(RenderError::NoActiveCamera))?;
        Ok(self.scene.entity(id)?.name().to_string())
    }

    /// Launch a missile from the active camera along its view direction.
    /// Returns the new entity's name.
    fn fire(&mut self, kind: MissileKind) -> Result<String, CommandError> {
        let camera = self
            .scene
            .active_camera()
            .ok_or(CommandError::Render(RenderError::NoActiveCamera))?;
        let (position, orientation) = {
            let camera = self.scene.entity(camera)?;
            (camera.position_abs(), camera.orientation_abs())
        };
        let forward = orientation.rotate_vector(Vector3::NEG_UNIT_Z);

        self.missiles += 1;
        let size = self.config.missile_size;
        let (name, source, shape) = match kind {
            MissileKind::Cube => (
                format!("missile-cube-{}", self.missiles),
                MeshSource::Box {
                    size: Vector3::splat(size),
                },
                CollisionShape::Box {
                    half_extents: Vector3::splat(size / 2.0),
                },
            ),
            MissileKind::Sphere => (
                format!("missile-sphere-{}", self.missiles),
                MeshSource::sphere(size),
                CollisionShape::Sphere { radius: size },
            ),
        };

        let root = self.scene.root();
        let id = self.scene.entity_mut(root)?.add_child(&name)?;
        {
            let mut missile = self.scene.entity_mut(id)?;
            missile.set_position_abs(position + forward)?;
            missile.set_orientation_abs(orientation)?;
        }
        self.scene
            .attach(id, RenderableMesh::new(source).with_material(0, "Missile"))?;
        self.scene.add_rigid_body(id, BodyDesc { mass: 1.0, shape })?;
        self.scene
            .set_linear_velocity(id, forward * self.config.fire_speed)?;

        log::debug!("Fired {}", name);
        Ok(name)
    }

    /// Advance one frame by `dt` seconds
    pub fn step(&mut self, dt: Scalar) -> Result<FrameStats> {
        self.scene.step_physics(dt)?;

        for command in std::mem::take(&mut self.queue) {
            let result = self.execute(&command, dt);
            match &result {
                Ok(output) if output.is_empty() => {}
                Ok(output) => log::info!("{}\n{}", command, output),
                Err(_) => log::warn!("{}: {}", command, format_result(&result)),
            }
        }
        self.scene.update_behaviors(dt)?;

        match self.renderer.draw(&self.scene) {
            Ok(stats) => self.last_stats = stats,
            Err(RenderError::NoActiveCamera) => {
                log::warn!("Nothing rendered: the scene has no active camera");
                self.last_stats = FrameStats::default();
            }
            Err(err) => return Err(err.into()),
        }

        self.timer.end_frame();
        Ok(self.last_stats)
    }

    /// Run until `demo quit` or the frame limit; returns the frame count.
    ///
    /// Frames advance by the physics timestep regardless of wall time.
    pub fn run(mut self) -> Result<u64> {
        log::info!("Entering main loop");
        while self.running {
            if self.config.max_frames.is_some_and(|max| self.timer.total_frames() >= max) {
                break;
            }
            self.step(self.frame_time)?;
        }

        let frames = self.timer.total_frames();
        log::info!("Left main loop after {} frames", frames);
        let backend = self.renderer.shutdown()?;
        log::info!("{} frames submitted to the backend", backend.frames_submitted());
        Ok(frames)
    }
}

/// Camera, sun, floor, a falling crate and a spinning marker on top of it
pub fn build_default_scene(scene: &mut Scene, config: &DemoConfig) -> Result<(), SceneError> {
    let root = scene.root();

    let camera = scene.entity_mut(root)?.add_child("camera")?;
    scene.attach(camera, Camera::default())?;
    scene.entity_mut(camera)?.set_world_pose(Pose::new(
        Vector3::new(0.0, 5.0, 20.0),
        Quaternion::from_euler_degrees(0.0, -10.0, 0.0),
    ))?;

    let sun = scene.entity_mut(root)?.add_child("sun")?;
    scene.attach(sun, Light::directional(Vec3::new(1.0, 0.95, 0.9), 1.0))?;
    scene
        .entity_mut(sun)?
        .set_orientation_abs(Quaternion::from_euler_degrees(30.0, -60.0, 0.0))?;

    let floor = scene.entity_mut(root)?.add_child("floor")?;
    let floor_size = Vector3::new(40.0, 1.0, 40.0);
    scene.entity_mut(floor)?.set_position_abs(Vector3::new(0.0, -0.5, 0.0))?;
    scene.attach(
        floor,
        RenderableMesh::new(MeshSource::Box { size: floor_size }).with_material(0, "Floor"),
    )?;
    scene.add_rigid_body(
        floor,
        BodyDesc {
            mass: 0.0,
            shape: CollisionShape::Box {
                half_extents: floor_size / 2.0,
            },
        },
    )?;

    let cube = scene.entity_mut(root)?.add_child("cube")?;
    scene.entity_mut(cube)?.set_position_abs(Vector3::new(0.0, 10.0, 0.0))?;
    scene.attach(cube, RenderableMesh::new(MeshSource::Box { size: Vector3::ONE }))?;
    scene.add_rigid_body(
        cube,
        BodyDesc {
            mass: 1.0,
            shape: CollisionShape::Box {
                half_extents: Vector3::splat(0.5),
            },
        },
    )?;

    let marker = scene.entity_mut(cube)?.add_child("marker")?;
    scene.entity_mut(marker)?.set_position_rel(Vector3::new(0.0, 1.0, 0.0))?;
    scene.attach(
        marker,
        RenderableMesh::new(MeshSource::sphere(config.missile_size / 2.0)).with_material(0, "Metal"),
    )?;
    scene.attach(marker, Behavior::new(Spin::new(Vector3::UNIT_Y, 1.0)))?;

    log::info!("Built default scene with {} entities", scene.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo() -> Demo {
        let config = EngineConfig::default();
        let mut scene = Scene::new(
            "scene",
            "root",
            PhysicsWorld::new(&config.physics),
            Box::new(DefaultComponentFactory),
        );
        build_default_scene(&mut scene, &config.demo).unwrap();
        Demo::from_parts(&config, scene, MaterialLibrary::default()).unwrap()
    }

    #[test]
    fn test_default_scene_renders() {
        let mut demo = demo();
        let stats = demo.step(1.0 / 60.0).unwrap();
        assert_eq!(stats.draw_calls, 3);
        assert_eq!(stats.lights, 1);
        assert_eq!(demo.frames(), 1);
    }

    #[test]
    fn test_cube_falls_and_carries_marker() {
        let mut demo = demo();
        for _ in 0..30 {
            demo.step(1.0 / 60.0).unwrap();
        }
        let scene = demo.scene();
        let cube = scene.entity(scene.find_entity("cube").unwrap()).unwrap();
        let marker = scene.entity(scene.find_entity("marker").unwrap()).unwrap();
        assert!(cube.position_abs().y < 10.0);
        let expected = cube.position_abs() + cube.orientation_abs().rotate_vector(marker.position_rel());
        assert!((marker.position_abs() - expected).length() < 1e-9);
    }

    #[test]
    fn test_fire_cube() {
        let mut demo = demo();
        let name = demo.execute_line("demo fire-cube").unwrap();
        assert_eq!(name, "missile-cube-1");

        let id = demo.scene().find_entity(&name).unwrap();
        let velocity = demo.scene().linear_velocity(id).unwrap();
        assert!((velocity.length() - 50.0).abs() < 1e-3);
        assert_eq!(demo.execute_line("demo fire-sphere").unwrap(), "missile-sphere-2");
    }

    #[test]
    fn test_mouse_motion_queues_camera_rotation() {
        let mut demo = demo();
        let camera = demo.scene().find_entity("camera").unwrap();
        let before = demo.scene().entity(camera).unwrap().orientation_abs();

        demo.execute_line("demo on-mouse-motion 20 0").unwrap();
        demo.step(0.0).unwrap();

        let after = demo.scene().entity(camera).unwrap().orientation_abs();
        let turned = (after * before.inverse()).angle().to_degrees();
        assert!((turned - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_quit_stops_run() {
        let mut demo = demo();
        demo.queue_command("demo quit").unwrap();
        assert_eq!(demo.run().unwrap(), 1);
    }

    #[test]
    fn test_run_script() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("setup.txt");
        fs::write(&path, "# move things\ncube set position-abs 0 15 0\nbroken\ndemo print-entity cube\n").unwrap();

        let mut demo = demo();
        let output = demo
            .execute_line(&format!("demo run {}", path.display()))
            .unwrap();
        assert_eq!(output, "queued 2 commands");

        demo.step(0.0).unwrap();
        let cube = demo.scene().find_entity("cube").unwrap();
        assert_eq!(demo.scene().entity(cube).unwrap().position_abs().y, 15.0);
    }

    #[test]
    fn test_unknown_demo_command() {
        let mut demo = demo();
        let result = demo.execute_line("demo dance");
        assert_eq!(format_result(&result), "Error: 'demo' has no command 'dance'");
    }
}
