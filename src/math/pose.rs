use serde::{Deserialize, Serialize};

use super::{Quaternion, Scalar, Vector3};

/// Position and orientation in one frame of reference
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vector3,
    pub orientation: Quaternion,
}

impl Pose {
    pub const IDENTITY: Self = Self {
        position: Vector3::ZERO,
        orientation: Quaternion::IDENTITY,
    };

    pub fn new(position: Vector3, orientation: Quaternion) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// Express a pose given in this frame in the outer frame
    pub fn compose(&self, local: &Pose) -> Pose {
        Pose {
            position: self.position + self.orientation.rotate_vector(local.position),
            orientation: (self.orientation * local.orientation).normalized(),
        }
    }

    /// Express an outer-frame pose relative to this frame
    pub fn relative(&self, global: &Pose) -> Pose {
        let inverse = self.orientation.inverse();
        Pose {
            position: inverse.rotate_vector(global.position - self.position),
            orientation: (inverse * global.orientation).normalized(),
        }
    }

    pub fn model_matrix(&self) -> glam::Mat4 {
        glam::Mat4::from_rotation_translation(self.orientation.into(), self.position.into())
    }
}

/// World pose of an entity before and after a mutation.
///
/// Returned by every pose setter so consumers that need a delta (angular
/// velocity estimation, interpolation) get it explicitly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseChange {
    pub previous: Pose,
    pub current: Pose,
}

impl PoseChange {
    pub fn translation(&self) -> Vector3 {
        self.current.position - self.previous.position
    }

    /// Rotation that takes the previous orientation to the current one
    pub fn rotation_delta(&self) -> Quaternion {
        (self.current.orientation * self.previous.orientation.inverse()).normalized()
    }

    /// Average angular velocity (axis * rad/s) over `dt` seconds
    pub fn angular_velocity(&self, dt: Scalar) -> Vector3 {
        if dt <= 0.0 {
            return Vector3::ZERO;
        }
        let mut delta = self.rotation_delta();
        // shortest arc
        if delta.w < 0.0 {
            delta = -delta;
        }
        let angle = delta.angle();
        if angle <= super::EPSILON {
            return Vector3::ZERO;
        }
        delta.axis() * (angle / dt)
    }

    pub fn is_unchanged(&self) -> bool {
        self.previous == self.current
    }
}
