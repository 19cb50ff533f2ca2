use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::Result;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Name of the material used when a submesh has no assignment
pub const DEFAULT_MATERIAL: &str = "Default";

/// Surface parameters handed to the backend per draw call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaterialProperties {
    pub albedo: Vec3,
    /// 0.0 = dielectric, 1.0 = metal
    pub metallic: f32,
    /// 0.0 = glossy, 1.0 = matte
    pub roughness: f32,
    pub ambient_strength: f32,
}

impl Default for MaterialProperties {
    fn default() -> Self {
        Self {
            albedo: Vec3::splat(0.8),
            metallic: 0.2,
            roughness: 0.6,
            ambient_strength: 1.0,
        }
    }
}

impl MaterialProperties {
    pub fn matte(color: Vec3) -> Self {
        Self {
            albedo: color,
            metallic: 0.0,
            roughness: 0.9,
            ..Self::default()
        }
    }

    pub fn metallic(color: Vec3, roughness: f32) -> Self {
        Self {
            albedo: color,
            metallic: 1.0,
            roughness,
            ..Self::default()
        }
    }

    pub fn plastic(color: Vec3) -> Self {
        Self {
            albedo: color,
            metallic: 0.0,
            roughness: 0.3,
            ..Self::default()
        }
    }
}

/// Named materials, stored as JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialLibrary {
    pub materials: HashMap<String, MaterialProperties>,
}

impl Default for MaterialLibrary {
    fn default() -> Self {
        let grey = Vec3::splat(0.8);
        let materials = HashMap::from([
            (DEFAULT_MATERIAL.to_string(), MaterialProperties::default()),
            ("Metal".to_string(), MaterialProperties::metallic(grey, 0.3)),
            ("Plastic".to_string(), MaterialProperties::plastic(grey)),
            ("Matte".to_string(), MaterialProperties::matte(grey)),
            ("Floor".to_string(), MaterialProperties::matte(Vec3::new(0.35, 0.4, 0.3))),
            ("Missile".to_string(), MaterialProperties::plastic(Vec3::new(0.9, 0.2, 0.1))),
        ]);
        Self { materials }
    }
}

impl MaterialLibrary {
    /// Load material library from JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let library: MaterialLibrary = serde_json::from_str(&content)?;
        Ok(library)
    }

    /// Save material library to JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load the library, or write and return the default one
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self::load(path).unwrap_or_else(|err| {
            log::info!("Using default materials ({}): {}", path.display(), err);
            let library = Self::default();
            if let Err(err) = library.save(path) {
                log::warn!("Could not write default materials: {}", err);
            }
            library
        })
    }

    pub fn get(&self, name: &str) -> Option<&MaterialProperties> {
        self.materials.get(name)
    }

    /// Look up `name`, falling back to the default material
    pub fn resolve(&self, name: Option<&str>) -> MaterialProperties {
        let name = name.unwrap_or(DEFAULT_MATERIAL);
        match self.materials.get(name) {
            Some(material) => *material,
            None => {
                log::warn!("Unknown material '{}', using default", name);
                self.materials
                    .get(DEFAULT_MATERIAL)
                    .copied()
                    .unwrap_or_default()
            }
        }
    }

    pub fn set(&mut self, name: impl Into<String>, material: MaterialProperties) {
        self.materials.insert(name.into(), material);
    }

    /// The default material cannot be removed
    pub fn remove(&mut self, name: &str) -> Option<MaterialProperties> {
        if name == DEFAULT_MATERIAL {
            return None;
        }
        self.materials.remove(name)
    }

    pub fn material_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.materials.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_falls_back_to_default() {
        let library = MaterialLibrary::default();
        assert_eq!(library.resolve(Some("Metal")).metallic, 1.0);
        assert_eq!(library.resolve(Some("Chrome")), MaterialProperties::default());
        assert_eq!(library.resolve(None), MaterialProperties::default());
    }

    #[test]
    fn test_default_material_is_permanent() {
        let mut library = MaterialLibrary::default();
        assert!(library.remove(DEFAULT_MATERIAL).is_none());
        assert!(library.remove("Matte").is_some());
        assert!(!library.material_names().contains(&"Matte".to_string()));
    }

    #[test]
    fn test_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("materials.json");

        let mut library = MaterialLibrary::default();
        library.set("Glow", MaterialProperties::plastic(Vec3::new(0.0, 1.0, 0.0)));
        library.save(&path).unwrap();

        let loaded = MaterialLibrary::load(&path).unwrap();
        assert_eq!(loaded.get("Glow"), library.get("Glow"));
        assert_eq!(loaded.material_names(), library.material_names());
    }

    #[test]
    fn test_load_or_default_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("materials.json");
        let library = MaterialLibrary::load_or_default(&path);
        assert!(path.exists());
        assert!(library.get(DEFAULT_MATERIAL).is_some());
    }
}
