/// Renderer front-end
///
/// - Turns the scene into a sorted list of draw calls each frame
/// - Uploads meshes lazily, once per entity and model source
/// - Hands GPU work to a [`RenderBackend`]; [`HeadlessBackend`] runs without a GPU

mod backend;
mod lighting;
mod material;
mod mesh;

use std::collections::HashMap;

use glam::Vec3;

pub use backend::{
    BufferKind, DrawCall, FrameData, FrameUniforms, HeadlessBackend, RenderBackend, MAX_POINT_LIGHTS,
};
pub use lighting::{DirectionalLight, LightingData, PointLight};
pub use material::{MaterialLibrary, MaterialProperties, DEFAULT_MATERIAL};
pub use mesh::{Mesh, MeshSource, Vertex};

use crate::config::RendererConfig;
use crate::error::RenderError;
use crate::kernel::{Camera, EntityId, Light, RenderableMesh, Scene};

/// Vertex and index buffers of one uploaded mesh.
///
/// Not `Clone`: the buffers are freed by passing the handle back to
/// [`Renderer::release_mesh`].
#[derive(Debug)]
pub struct GpuMesh {
    vertex_buffer: u32,
    index_buffer: u32,
    index_count: u32,
}

impl GpuMesh {
    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}

#[derive(Debug)]
pub struct GpuTexture {
    id: u32,
    width: u32,
    height: u32,
}

impl GpuTexture {
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Summary of one drawn frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub draw_calls: usize,
    pub triangles: usize,
    pub lights: usize,
    pub uploads: usize,
}

struct CachedModel {
    source: MeshSource,
    submeshes: Vec<GpuMesh>,
}

pub struct Renderer<B: RenderBackend> {
    backend: B,
    materials: MaterialLibrary,
    default_material: String,
    ambient: Vec3,
    aspect_ratio: f32,
    white_texture: GpuTexture,
    models: HashMap<EntityId, CachedModel>,
}

impl<B: RenderBackend> Renderer<B> {
    pub fn new(mut backend: B, config: &RendererConfig, materials: MaterialLibrary) -> Result<Self, RenderError> {
        let id = backend.create_texture(1, 1, &[255, 255, 255, 255])?;
        log::info!("Renderer ready ({} materials)", materials.materials.len());

        Ok(Self {
            backend,
            materials,
            default_material: config.default_material.clone(),
            ambient: config.ambient,
            aspect_ratio: config.aspect_ratio,
            white_texture: GpuTexture {
                id,
                width: 1,
                height: 1,
            },
            models: HashMap::new(),
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn materials(&self) -> &MaterialLibrary {
        &self.materials
    }

    pub fn materials_mut(&mut self) -> &mut MaterialLibrary {
        &mut self.materials
    }

    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) {
        self.aspect_ratio = aspect_ratio;
    }

    /// Number of entities with uploaded geometry
    pub fn cached_models(&self) -> usize {
        self.models.len()
    }

    pub fn upload_mesh(&mut self, mesh: &Mesh) -> Result<GpuMesh, RenderError> {
        let vertex_buffer = self
            .backend
            .create_buffer(BufferKind::Vertex, bytemuck::cast_slice(&mesh.vertices))?;
        let index_buffer = match self
            .backend
            .create_buffer(BufferKind::Index, bytemuck::cast_slice(&mesh.indices))
        {
            Ok(id) => id,
            Err(err) => {
                self.backend.destroy_buffer(vertex_buffer)?;
                return Err(err);
            }
        };

        log::debug!(
            "Uploaded mesh: {} vertices, {} triangles",
            mesh.vertices.len(),
            mesh.triangle_count()
        );
        Ok(GpuMesh {
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
        })
    }

    pub fn release_mesh(&mut self, mesh: GpuMesh) -> Result<(), RenderError> {
        self.backend.destroy_buffer(mesh.vertex_buffer)?;
        self.backend.destroy_buffer(mesh.index_buffer)
    }

    pub fn upload_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> Result<GpuTexture, RenderError> {
        let id = self.backend.create_texture(width, height, rgba)?;
        Ok(GpuTexture { id, width, height })
    }

    pub fn release_texture(&mut self, texture: GpuTexture) -> Result<(), RenderError> {
        self.backend.destroy_texture(texture.id)
    }

    /// Render the scene from its active camera
    pub fn draw(&mut self, scene: &Scene) -> Result<FrameStats, RenderError> {
        let camera_id = scene.active_camera().ok_or(RenderError::NoActiveCamera)?;
        let camera = scene
            .component::<Camera>(camera_id)
            .map(|camera| *camera)
            .ok_or(RenderError::NoActiveCamera)?;
        let camera_pose = scene.entity(camera_id)?.world_pose();

        let mut stats = FrameStats::default();
        self.collect_garbage(scene)?;

        let mut draw_calls = Vec::new();
        for id in scene.with_component::<RenderableMesh>() {
            let Some(mesh) = scene.component::<RenderableMesh>(id).map(|mesh| mesh.clone()) else {
                continue;
            };
            if self.sync_model(id, &mesh.source)? {
                stats.uploads += 1;
            }

            let pose = scene.entity(id)?.world_pose();
            let model = pose.model_matrix();
            let distance = camera_pose.position.distance(pose.position) as f32;
            let Some(cached) = self.models.get(&id) else {
                continue;
            };

            for (submesh, gpu) in cached.submeshes.iter().enumerate() {
                let name = mesh.material_for(submesh).unwrap_or(&self.default_material);
                draw_calls.push(DrawCall {
                    entity: id,
                    submesh,
                    vertex_buffer: gpu.vertex_buffer,
                    index_buffer: gpu.index_buffer,
                    index_count: gpu.index_count,
                    texture: self.white_texture.id,
                    model,
                    material: self.materials.resolve(Some(name)),
                    distance,
                });
            }
        }
        draw_calls.sort_by(|a, b| a.distance.total_cmp(&b.distance));

        let frame = FrameData {
            view: Camera::view_matrix(&camera_pose),
            projection: camera.projection_matrix(self.aspect_ratio),
            camera_position: camera_pose.position.into(),
            lighting: LightingData::from_scene(scene, self.ambient),
            draw_calls,
        };
        stats.draw_calls = frame.draw_calls.len();
        stats.triangles = frame.triangle_count();
        stats.lights = frame.lighting.light_count();

        self.backend.submit(&frame)?;
        Ok(stats)
    }

    /// Upload `source` for `id` unless it is already cached. Returns whether
    /// an upload happened.
    fn sync_model(&mut self, id: EntityId, source: &MeshSource) -> Result<bool, RenderError> {
        if self.models.get(&id).is_some_and(|cached| cached.source == *source) {
            return Ok(false);
        }
        if let Some(stale) = self.models.remove(&id) {
            self.release_model(stale)?;
        }

        let meshes = source.load().unwrap_or_else(|err| {
            // cached empty so the load is not retried every frame
            log::warn!("Could not load mesh for {:?}: {}", id, err);
            Vec::new()
        });
        let submeshes = self.upload_model(&meshes)?;

        self.models.insert(
            id,
            CachedModel {
                source: source.clone(),
                submeshes,
            },
        );
        Ok(true)
    }

    /// Upload every submesh, or none of them
    fn upload_model(&mut self, meshes: &[Mesh]) -> Result<Vec<GpuMesh>, RenderError> {
        let mut submeshes = Vec::with_capacity(meshes.len());
        for mesh in meshes {
            match self.upload_mesh(mesh) {
                Ok(gpu) => submeshes.push(gpu),
                Err(err) => {
                    for gpu in submeshes {
                        self.release_mesh(gpu)?;
                    }
                    return Err(err);
                }
            }
        }
        Ok(submeshes)
    }

    fn release_model(&mut self, model: CachedModel) -> Result<(), RenderError> {
        for mesh in model.submeshes {
            self.release_mesh(mesh)?;
        }
        Ok(())
    }

    /// Free models whose entity is gone or lost its mesh component
    fn collect_garbage(&mut self, scene: &Scene) -> Result<(), RenderError> {
        let stale: Vec<EntityId> = self
            .models
            .keys()
            .copied()
            .filter(|id| scene.component::<RenderableMesh>(*id).is_none())
            .collect();

        for id in stale {
            if let Some(model) = self.models.remove(&id) {
                log::debug!("Releasing mesh of removed entity {:?}", id);
                self.release_model(model)?;
            }
        }
        Ok(())
    }

    /// Release every GPU resource and give the backend back
    pub fn shutdown(mut self) -> Result<B, RenderError> {
        let models: Vec<CachedModel> = self.models.drain().map(|(_, model)| model).collect();
        for model in models {
            self.release_model(model)?;
        }
        self.backend.destroy_texture(self.white_texture.id)?;
        log::info!("Renderer shut down");
        Ok(self.backend)
    }

    /// Cameras, meshes and lights known to the scene, the active camera
    /// marked with `*`
    pub fn lists_to_string(&self, scene: &Scene) -> String {
        let names = |ids: Vec<EntityId>| -> Vec<(EntityId, String)> {
            let mut names: Vec<(EntityId, String)> = ids
                .into_iter()
                .filter_map(|id| scene.entity(id).ok().map(|entity| (id, entity.name().to_string())))
                .collect();
            names.sort_by(|a, b| a.1.cmp(&b.1));
            names
        };

        let mut out = String::from("Cameras:\n");
        for (id, name) in names(scene.with_component::<Camera>()) {
            let marker = if scene.active_camera() == Some(id) { " *" } else { "" };
            out.push_str(&format!("  {}{}\n", name, marker));
        }
        out.push_str("Meshes:\n");
        for (id, name) in names(scene.with_component::<RenderableMesh>()) {
            let submeshes = self.models.get(&id).map_or(0, |model| model.submeshes.len());
            out.push_str(&format!("  {} ({} submeshes)\n", name, submeshes));
        }
        out.push_str("Lights:\n");
        for (_, name) in names(scene.with_component::<Light>()) {
            out.push_str(&format!("  {}\n", name));
        }
        out
    }
}
