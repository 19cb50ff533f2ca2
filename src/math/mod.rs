/// Linear algebra for the scene graph
///
/// Scene math runs in double precision. Values are narrowed to `f32` only
/// at the renderer (glam) and physics (rapier) boundaries.

mod matrix3;
mod pose;
mod quaternion;
mod vector3;

pub use matrix3::Matrix3;
pub use pose::{Pose, PoseChange};
pub use quaternion::Quaternion;
pub use vector3::Vector3;

pub type Scalar = f64;

/// Tolerance for degenerate lengths (zero vectors, zero axes)
pub const EPSILON: Scalar = 1e-12;
