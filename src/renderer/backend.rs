use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use super::lighting::LightingData;
use super::material::MaterialProperties;
use crate::error::RenderError;
use crate::kernel::EntityId;

/// Lights forwarded to the GPU per frame
pub const MAX_POINT_LIGHTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Vertex,
    Index,
}

/// The GPU side of the renderer.
///
/// Resources are named by opaque ids handed out by the backend. Destroying
/// an id the backend does not know is an error.
pub trait RenderBackend {
    fn create_buffer(&mut self, kind: BufferKind, data: &[u8]) -> Result<u32, RenderError>;
    fn destroy_buffer(&mut self, id: u32) -> Result<(), RenderError>;
    fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> Result<u32, RenderError>;
    fn destroy_texture(&mut self, id: u32) -> Result<(), RenderError>;
    fn submit(&mut self, frame: &FrameData) -> Result<(), RenderError>;
}

/// One submesh to draw
#[derive(Debug, Clone)]
pub struct DrawCall {
    pub entity: EntityId,
    pub submesh: usize,
    pub vertex_buffer: u32,
    pub index_buffer: u32,
    pub index_count: u32,
    pub texture: u32,
    pub model: Mat4,
    pub material: MaterialProperties,
    /// Distance from the camera, draw calls are sorted front to back
    pub distance: f32,
}

#[derive(Debug, Clone)]
pub struct FrameData {
    pub view: Mat4,
    pub projection: Mat4,
    pub camera_position: Vec3,
    pub lighting: LightingData,
    pub draw_calls: Vec<DrawCall>,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    pub view: Mat4,
    pub projection: Mat4,
    pub view_pos: Vec3,
    _padding: f32,
    pub dir_light_direction: Vec3,
    _padding2: f32,
    pub dir_light_color: Vec3,
    pub dir_light_intensity: f32,
    pub ambient: Vec3,
    pub point_light_count: u32,
}

impl FrameData {
    /// Per-frame uniform block; only the first directional light is used
    pub fn uniforms(&self) -> FrameUniforms {
        let (direction, color, intensity) = match self.lighting.directional_lights.first() {
            Some(light) => (light.direction, light.color, light.intensity),
            None => (Vec3::NEG_Y, Vec3::ZERO, 0.0),
        };

        FrameUniforms {
            view: self.view,
            projection: self.projection,
            view_pos: self.camera_position,
            _padding: 0.0,
            dir_light_direction: direction,
            _padding2: 0.0,
            dir_light_color: color,
            dir_light_intensity: intensity,
            ambient: self.lighting.ambient,
            point_light_count: self.lighting.point_lights.len().min(MAX_POINT_LIGHTS) as u32,
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.draw_calls
            .iter()
            .map(|call| call.index_count as usize / 3)
            .sum()
    }
}

/// Backend that keeps book of resources and frames without a GPU
#[derive(Debug)]
pub struct HeadlessBackend {
    next_id: u32,
    buffers: HashMap<u32, (BufferKind, usize)>,
    textures: HashMap<u32, (u32, u32)>,
    frames: u64,
    last_draw_order: Vec<EntityId>,
    last_uniforms: Option<FrameUniforms>,
    buffer_limit: Option<usize>,
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self {
            next_id: 1,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            frames: 0,
            last_draw_order: Vec::new(),
            last_uniforms: None,
            buffer_limit: None,
        }
    }
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail buffer creation once `limit` buffers are alive
    pub fn with_buffer_limit(mut self, limit: usize) -> Self {
        self.buffer_limit = Some(limit);
        self
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn buffer_size(&self, id: u32) -> Option<usize> {
        self.buffers.get(&id).map(|(_, size)| *size)
    }

    pub fn frames_submitted(&self) -> u64 {
        self.frames
    }

    /// Entities of the last submitted frame, in draw order
    pub fn last_draw_order(&self) -> &[EntityId] {
        &self.last_draw_order
    }

    pub fn last_uniforms(&self) -> Option<&FrameUniforms> {
        self.last_uniforms.as_ref()
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl RenderBackend for HeadlessBackend {
    fn create_buffer(&mut self, kind: BufferKind, data: &[u8]) -> Result<u32, RenderError> {
        if self.buffer_limit.is_some_and(|limit| self.buffers.len() >= limit) {
            return Err(RenderError::OutOfBuffers(self.buffers.len()));
        }
        let id = self.allocate_id();
        self.buffers.insert(id, (kind, data.len()));
        Ok(id)
    }

    fn destroy_buffer(&mut self, id: u32) -> Result<(), RenderError> {
        self.buffers
            .remove(&id)
            .map(|_| ())
            .ok_or(RenderError::UnknownResource { kind: "buffer", id })
    }

    fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> Result<u32, RenderError> {
        if rgba.len() != width as usize * height as usize * 4 {
            return Err(RenderError::InvalidTexture {
                width,
                height,
                len: rgba.len(),
            });
        }
        let id = self.allocate_id();
        self.textures.insert(id, (width, height));
        Ok(id)
    }

    fn destroy_texture(&mut self, id: u32) -> Result<(), RenderError> {
        self.textures
            .remove(&id)
            .map(|_| ())
            .ok_or(RenderError::UnknownResource { kind: "texture", id })
    }

    fn submit(&mut self, frame: &FrameData) -> Result<(), RenderError> {
        for call in &frame.draw_calls {
            for id in [call.vertex_buffer, call.index_buffer] {
                if !self.buffers.contains_key(&id) {
                    return Err(RenderError::UnknownResource { kind: "buffer", id });
                }
            }
            if !self.textures.contains_key(&call.texture) {
                return Err(RenderError::UnknownResource {
                    kind: "texture",
                    id: call.texture,
                });
            }
        }

        self.frames += 1;
        self.last_draw_order = frame.draw_calls.iter().map(|call| call.entity).collect();
        self.last_uniforms = Some(frame.uniforms());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_ids_are_rejected() {
        let mut backend = HeadlessBackend::new();
        let id = backend.create_buffer(BufferKind::Vertex, &[0; 32]).unwrap();
        assert_eq!(backend.buffer_size(id), Some(32));
        backend.destroy_buffer(id).unwrap();
        assert!(matches!(
            backend.destroy_buffer(id),
            Err(RenderError::UnknownResource { kind: "buffer", .. })
        ));
        assert!(backend.destroy_texture(99).is_err());
    }

    #[test]
    fn test_texture_size_is_checked() {
        let mut backend = HeadlessBackend::new();
        assert!(backend.create_texture(2, 2, &[255; 16]).is_ok());
        assert!(matches!(
            backend.create_texture(2, 2, &[255; 4]),
            Err(RenderError::InvalidTexture { .. })
        ));
        assert_eq!(backend.live_textures(), 1);
    }

    #[test]
    fn test_uniforms_without_lights() {
        let frame = FrameData {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            camera_position: Vec3::ZERO,
            lighting: LightingData::new(Vec3::splat(0.2)),
            draw_calls: Vec::new(),
        };
        let uniforms = frame.uniforms();
        assert_eq!(uniforms.dir_light_intensity, 0.0);
        assert_eq!(uniforms.ambient, Vec3::splat(0.2));
        assert_eq!(bytemuck::bytes_of(&uniforms).len(), 192);
    }
}
