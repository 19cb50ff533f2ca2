use std::f32::consts::PI;

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use crate::math::{Scalar, Vector3};

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

/// CPU-side triangle mesh
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

/// Where a renderable mesh gets its geometry from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MeshSource {
    /// Axis-aligned box centered on the origin
    Box { size: Vector3 },
    Sphere {
        radius: Scalar,
        #[serde(default = "default_segments")]
        segments: u32,
        #[serde(default = "default_rings")]
        rings: u32,
    },
    /// Wavefront OBJ file; every object in it becomes one submesh
    File { path: String },
}

fn default_segments() -> u32 {
    24
}

fn default_rings() -> u32 {
    16
}

impl MeshSource {
    pub fn sphere(radius: Scalar) -> Self {
        MeshSource::Sphere {
            radius,
            segments: default_segments(),
            rings: default_rings(),
        }
    }

    /// Build or load the submeshes of this source
    pub fn load(&self) -> Result<Vec<Mesh>, RenderError> {
        match self {
            MeshSource::Box { size } => Ok(vec![Mesh::create_box((*size).into())]),
            MeshSource::Sphere {
                radius,
                segments,
                rings,
            } => Ok(vec![Mesh::create_sphere(*radius as f32, *segments, *rings)]),
            MeshSource::File { path } => Mesh::from_obj(path),
        }
    }
}

/// (normal, u, v) per box face, with u x v = normal
const BOX_FACES: [(Vec3, Vec3, Vec3); 6] = [
    (Vec3::Z, Vec3::X, Vec3::Y),
    (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    (Vec3::Y, Vec3::X, Vec3::NEG_Z),
    (Vec3::NEG_Y, Vec3::X, Vec3::Z),
    (Vec3::X, Vec3::NEG_Z, Vec3::Y),
    (Vec3::NEG_X, Vec3::Z, Vec3::Y),
];

impl Mesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Box with the given edge lengths, counter-clockwise faces seen from outside
    pub fn create_box(size: Vec3) -> Self {
        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);

        for (normal, u, v) in BOX_FACES {
            let base = vertices.len() as u32;
            let corners = [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)];
            for (a, b) in corners {
                let position = (normal * 0.5 + u * a + v * b) * size;
                vertices.push(Vertex {
                    position,
                    normal,
                    uv: Vec2::new(a + 0.5, b + 0.5),
                });
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }

        Self { vertices, indices }
    }

    /// UV sphere with outward normals
    pub fn create_sphere(radius: f32, segments: u32, rings: u32) -> Self {
        let segments = segments.max(3);
        let rings = rings.max(2);
        let mut vertices = Vec::new();
        let mut indices = Vec::new();

        for ring in 0..=rings {
            let phi = PI * ring as f32 / rings as f32;
            let (sin_phi, cos_phi) = phi.sin_cos();

            for segment in 0..=segments {
                let theta = 2.0 * PI * segment as f32 / segments as f32;
                let (sin_theta, cos_theta) = theta.sin_cos();

                let normal = Vec3::new(sin_phi * cos_theta, cos_phi, sin_phi * sin_theta);
                vertices.push(Vertex {
                    position: normal * radius,
                    normal,
                    uv: Vec2::new(segment as f32 / segments as f32, ring as f32 / rings as f32),
                });
            }
        }

        for ring in 0..rings {
            for segment in 0..segments {
                let current = ring * (segments + 1) + segment;
                let next = current + segments + 1;

                indices.extend_from_slice(&[current, current + 1, next]);
                indices.extend_from_slice(&[next, current + 1, next + 1]);
            }
        }

        Self { vertices, indices }
    }

    /// Load every object of an OBJ file as a separate submesh
    pub fn from_obj(path: &str) -> Result<Vec<Self>, RenderError> {
        let (models, _materials) = tobj::load_obj(
            path,
            &tobj::LoadOptions {
                triangulate: true,
                single_index: true,
                ..Default::default()
            },
        )
        .map_err(|source| RenderError::MeshLoad {
            path: path.to_string(),
            source,
        })?;

        let meshes: Vec<Self> = models
            .iter()
            .map(|model| Self::from_tobj(&model.mesh))
            .filter(|mesh| !mesh.is_empty())
            .collect();
        if meshes.is_empty() {
            return Err(RenderError::EmptyMesh(path.to_string()));
        }
        log::debug!("Loaded {} submeshes from {}", meshes.len(), path);
        Ok(meshes)
    }

    fn from_tobj(mesh: &tobj::Mesh) -> Self {
        let vertices = (0..mesh.positions.len() / 3)
            .map(|i| {
                let position = Vec3::from_slice(&mesh.positions[i * 3..i * 3 + 3]);
                let normal = if mesh.normals.len() >= i * 3 + 3 {
                    Vec3::from_slice(&mesh.normals[i * 3..i * 3 + 3])
                } else {
                    Vec3::Y
                };
                let uv = if mesh.texcoords.len() >= i * 2 + 2 {
                    Vec2::new(mesh.texcoords[i * 2], 1.0 - mesh.texcoords[i * 2 + 1])
                } else {
                    Vec2::ZERO
                };
                Vertex {
                    position,
                    normal,
                    uv,
                }
            })
            .collect();

        Self {
            vertices,
            indices: mesh.indices.clone(),
        }
    }
}
