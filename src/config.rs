use anyhow::Result;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Complete engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub physics: PhysicsConfig,
    #[serde(default)]
    pub renderer: RendererConfig,
    #[serde(default)]
    pub demo: DemoConfig,
}

impl EngineConfig {
    /// Load configuration from JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to JSON file with pretty formatting
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self::load(path).unwrap_or_else(|err| {
            log::info!("Using default configuration ({}): {}", path.display(), err);
            let config = Self::default();
            if let Err(err) = config.save(path) {
                log::warn!("Could not write default configuration: {}", err);
            }
            config
        })
    }
}

/// Rigid-body simulation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicsConfig {
    #[serde(with = "vec3_serde")]
    pub gravity: Vec3,

    /// Fixed simulation step in seconds
    pub timestep: f32,
    /// Steps per frame before leftover time is dropped
    pub max_substeps: u32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            timestep: 1.0 / 60.0,
            max_substeps: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    #[serde(with = "vec3_serde")]
    pub ambient: Vec3,

    pub aspect_ratio: f32,
    /// Material for submeshes without an assignment
    pub default_material: String,
    pub material_library: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            ambient: Vec3::splat(0.1),
            aspect_ratio: 16.0 / 9.0,
            default_material: "Default".to_string(),
            material_library: "config/materials.json".to_string(),
        }
    }
}

/// Demo loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    /// Scene loaded at startup; the built-in scene is used when missing
    pub scene_path: Option<String>,
    /// Command script run once before the first frame
    pub startup_script: Option<String>,
    pub fire_speed: f64,
    pub missile_size: f64,
    /// Degrees of camera rotation per unit of mouse motion
    pub mouse_sensitivity: f64,
    /// Stop after this many frames; runs until `demo quit` when unset
    pub max_frames: Option<u64>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            scene_path: None,
            startup_script: None,
            fire_speed: 50.0,
            missile_size: 0.5,
            mouse_sensitivity: 0.05,
            max_frames: Some(600),
        }
    }
}

/// Custom serialization for Vec3
mod vec3_serde {
    use glam::Vec3;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Vec3Data {
        x: f32,
        y: f32,
        z: f32,
    }

    pub fn serialize<S>(vec: &Vec3, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        Vec3Data {
            x: vec.x,
            y: vec.y,
            z: vec.z,
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec3, D::Error>
    where
        D: Deserializer<'de>,
    {
        let data = Vec3Data::deserialize(deserializer)?;
        Ok(Vec3::new(data.x, data.y, data.z))
    }
}
