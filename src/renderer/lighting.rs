use glam::Vec3;

use crate::kernel::{Light, LightKind, Scene};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

/// Lights of one frame, in world space
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LightingData {
    pub ambient: Vec3,
    pub directional_lights: Vec<DirectionalLight>,
    pub point_lights: Vec<PointLight>,
}

impl LightingData {
    pub fn new(ambient: Vec3) -> Self {
        Self {
            ambient,
            ..Self::default()
        }
    }

    /// Collect every light component of the scene.
    ///
    /// Directional lights shine along their entity's -Z axis.
    pub fn from_scene(scene: &Scene, ambient: Vec3) -> Self {
        let mut data = Self::new(ambient);
        for id in scene.with_component::<Light>() {
            let (Some(light), Ok(entity)) = (scene.component::<Light>(id), scene.entity(id)) else {
                continue;
            };
            let pose = entity.world_pose();
            match light.kind {
                LightKind::Directional => data.directional_lights.push(DirectionalLight {
                    direction: pose.orientation.rotate_vector(crate::math::Vector3::NEG_UNIT_Z).into(),
                    color: light.color,
                    intensity: light.intensity,
                }),
                LightKind::Point => data.point_lights.push(PointLight {
                    position: pose.position.into(),
                    color: light.color,
                    intensity: light.intensity,
                }),
            }
        }
        data
    }

    pub fn light_count(&self) -> usize {
        self.directional_lights.len() + self.point_lights.len()
    }
}
