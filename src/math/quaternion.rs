use std::fmt;
use std::ops::{Add, Div, Mul, MulAssign, Neg, Sub};

use approx::{AbsDiffEq, RelativeEq};
use serde::{Deserialize, Serialize};

use super::{Scalar, Vector3, EPSILON};

/// Below this distance from |cos θ| = 1 slerp returns the start orientation
const SLERP_EPSILON: Scalar = 1e-12;

/// Rotation quaternion stored as (w, x, y, z)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: Scalar,
    pub x: Scalar,
    pub y: Scalar,
    pub z: Scalar,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quaternion {
    pub const IDENTITY: Self = Self::new(1.0, 0.0, 0.0, 0.0);

    pub const fn new(w: Scalar, x: Scalar, y: Scalar, z: Scalar) -> Self {
        Self { w, x, y, z }
    }

    /// Rotation of `angle` radians around `axis`; a zero axis yields identity
    pub fn from_axis_angle(axis: Vector3, angle: Scalar) -> Self {
        let length = axis.length();
        if length <= EPSILON {
            return Self::IDENTITY;
        }
        let half_angle = angle * 0.5;
        let s = half_angle.sin() / length;
        Self::new(half_angle.cos(), axis.x * s, axis.y * s, axis.z * s)
    }

    /// Build from yaw (around Y), pitch (around X) and roll (around Z) in radians.
    ///
    /// Composes `roll * yaw * pitch`, the exact inverse of [`Quaternion::yaw`],
    /// [`Quaternion::pitch`] and [`Quaternion::roll`] for yaw in [-π/2, π/2].
    /// Serialized orientations depend on this pairing.
    pub fn from_euler(yaw: Scalar, pitch: Scalar, roll: Scalar) -> Self {
        let (sin_yaw, cos_yaw) = (yaw * 0.5).sin_cos();
        let (sin_pitch, cos_pitch) = (pitch * 0.5).sin_cos();
        let (sin_roll, cos_roll) = (roll * 0.5).sin_cos();
        Self::new(
            cos_roll * cos_yaw * cos_pitch + sin_roll * sin_yaw * sin_pitch,
            cos_roll * cos_yaw * sin_pitch - sin_roll * sin_yaw * cos_pitch,
            cos_roll * sin_yaw * cos_pitch + sin_roll * cos_yaw * sin_pitch,
            sin_roll * cos_yaw * cos_pitch - cos_roll * sin_yaw * sin_pitch,
        )
    }

    /// Same as [`Quaternion::from_euler`] with angles in degrees
    pub fn from_euler_degrees(yaw: Scalar, pitch: Scalar, roll: Scalar) -> Self {
        Self::from_euler(yaw.to_radians(), pitch.to_radians(), roll.to_radians())
    }

    pub fn yaw(&self) -> Scalar {
        (-2.0 * (self.x * self.z - self.w * self.y)).clamp(-1.0, 1.0).asin()
    }

    pub fn pitch(&self) -> Scalar {
        (2.0 * (self.y * self.z + self.w * self.x)).atan2(
            self.w * self.w - self.x * self.x - self.y * self.y + self.z * self.z,
        )
    }

    pub fn roll(&self) -> Scalar {
        (2.0 * (self.x * self.y + self.w * self.z)).atan2(
            self.w * self.w + self.x * self.x - self.y * self.y - self.z * self.z,
        )
    }

    /// (yaw, pitch, roll) in radians
    pub fn to_euler(&self) -> (Scalar, Scalar, Scalar) {
        (self.yaw(), self.pitch(), self.roll())
    }

    /// Rotation axis, or +X when the rotation is (near) identity
    pub fn axis(&self) -> Vector3 {
        let s_squared = 1.0 - self.w * self.w;
        if s_squared < 10.0 * EPSILON {
            return Vector3::UNIT_X;
        }
        let s = 1.0 / s_squared.sqrt();
        Vector3::new(self.x * s, self.y * s, self.z * s)
    }

    /// Rotation angle in radians, in [0, 2π]
    pub fn angle(&self) -> Scalar {
        2.0 * self.w.clamp(-1.0, 1.0).acos()
    }

    pub fn length(&self) -> Scalar {
        self.length_squared().sqrt()
    }

    pub fn length_squared(&self) -> Scalar {
        self.dot(*self)
    }

    pub fn dot(&self, other: Self) -> Scalar {
        self.w * other.w + self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Angle between the two 4D vectors
    pub fn angle_between(&self, other: Self) -> Scalar {
        let s = (self.length_squared() * other.length_squared()).sqrt();
        (self.dot(other) / s).clamp(-1.0, 1.0).acos()
    }

    /// Conjugate; equal to the inverse for unit quaternions
    pub fn inverse(&self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Unit quaternion with the same direction; zero becomes identity
    pub fn normalized(&self) -> Self {
        let length = self.length();
        if length <= EPSILON || !length.is_finite() {
            return Self::IDENTITY;
        }
        *self / length
    }

    pub fn normalize(&mut self) -> &mut Self {
        *self = self.normalized();
        self
    }

    /// Spherical linear interpolation along the shortest arc.
    ///
    /// Identical and antipodal inputs return `self`, which avoids dividing by
    /// a vanishing sine.
    pub fn slerp(&self, other: Self, t: Scalar) -> Self {
        let product = self.dot(other) / (self.length_squared() * other.length_squared()).sqrt();
        if (1.0 - product.abs()) <= SLERP_EPSILON || !product.is_finite() {
            return *self;
        }

        let sign = if product < 0.0 { -1.0 } else { 1.0 };
        let theta = (sign * product).clamp(-1.0, 1.0).acos();
        let s1 = (sign * t * theta).sin();
        let d = 1.0 / theta.sin();
        let s0 = ((1.0 - t) * theta).sin();

        Self::new(
            (self.w * s0 + other.w * s1) * d,
            (self.x * s0 + other.x * s1) * d,
            (self.y * s0 + other.y * s1) * d,
            (self.z * s0 + other.z * s1) * d,
        )
    }

    /// Vector part of `self * v * self⁻¹`
    pub fn rotate_vector(&self, v: Vector3) -> Vector3 {
        let q = self.mul_pure(v) * self.inverse();
        Vector3::new(q.x, q.y, q.z)
    }

    /// Product with the pure quaternion (0, v)
    fn mul_pure(&self, v: Vector3) -> Self {
        Self::new(
            -self.x * v.x - self.y * v.y - self.z * v.z,
            self.w * v.x + self.y * v.z - self.z * v.y,
            self.w * v.y + self.z * v.x - self.x * v.z,
            self.w * v.z + self.x * v.y - self.y * v.x,
        )
    }

    pub fn is_finite(&self) -> bool {
        self.w.is_finite() && self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl fmt::Display for Quaternion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.w, self.x, self.y, self.z)
    }
}

impl From<Quaternion> for glam::Quat {
    fn from(q: Quaternion) -> Self {
        glam::Quat::from_xyzw(q.x as f32, q.y as f32, q.z as f32, q.w as f32)
    }
}

impl From<glam::Quat> for Quaternion {
    fn from(q: glam::Quat) -> Self {
        Self::new(q.w as Scalar, q.x as Scalar, q.y as Scalar, q.z as Scalar)
    }
}

impl Neg for Quaternion {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.w, -self.x, -self.y, -self.z)
    }
}

impl Add for Quaternion {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.w + rhs.w, self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Quaternion {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.w - rhs.w, self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// Hamilton product: `a * b` applies `b` first, then `a`
impl Mul for Quaternion {
    type Output = Self;

    fn mul(self, q: Self) -> Self {
        Self::new(
            self.w * q.w - self.x * q.x - self.y * q.y - self.z * q.z,
            self.w * q.x + self.x * q.w + self.y * q.z - self.z * q.y,
            self.w * q.y + self.y * q.w + self.z * q.x - self.x * q.z,
            self.w * q.z + self.z * q.w + self.x * q.y - self.y * q.x,
        )
    }
}

impl MulAssign for Quaternion {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl Mul<Scalar> for Quaternion {
    type Output = Self;

    fn mul(self, s: Scalar) -> Self {
        Self::new(self.w * s, self.x * s, self.y * s, self.z * s)
    }
}

impl Div<Scalar> for Quaternion {
    type Output = Self;

    fn div(self, s: Scalar) -> Self {
        self * (1.0 / s)
    }
}

/// Rotates the vector, same as [`Vector3::rotate`]
impl Mul<Vector3> for Quaternion {
    type Output = Vector3;

    fn mul(self, v: Vector3) -> Vector3 {
        self.rotate_vector(v)
    }
}

impl AbsDiffEq for Quaternion {
    type Epsilon = Scalar;

    fn default_epsilon() -> Scalar {
        Scalar::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Scalar) -> bool {
        self.w.abs_diff_eq(&other.w, epsilon)
            && self.x.abs_diff_eq(&other.x, epsilon)
            && self.y.abs_diff_eq(&other.y, epsilon)
            && self.z.abs_diff_eq(&other.z, epsilon)
    }
}

impl RelativeEq for Quaternion {
    fn default_max_relative() -> Scalar {
        Scalar::default_max_relative()
    }

    fn relative_eq(&self, other: &Self, epsilon: Scalar, max_relative: Scalar) -> bool {
        self.w.relative_eq(&other.w, epsilon, max_relative)
            && self.x.relative_eq(&other.x, epsilon, max_relative)
            && self.y.relative_eq(&other.y, epsilon, max_relative)
            && self.z.relative_eq(&other.z, epsilon, max_relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    fn sample_rotations() -> Vec<Quaternion> {
        vec![
            Quaternion::from_euler(0.3, -0.2, 1.1),
            Quaternion::from_axis_angle(Vector3::new(1.0, 2.0, 3.0), 2.5),
            Quaternion::from_euler(-2.0, 0.7, -3.0),
            Quaternion::IDENTITY,
        ]
    }

    #[test]
    fn test_euler_round_trip() {
        let angles = [
            (0.0, 0.0, 0.0),
            (0.5, 0.0, 0.0),
            (0.0, 0.5, 0.0),
            (0.0, 0.0, 0.5),
            (1.2, -0.4, 2.9),
            (-1.4, 3.0, -2.2),
            (0.3, -2.8, 0.1),
        ];
        for (yaw, pitch, roll) in angles {
            let q = Quaternion::from_euler(yaw, pitch, roll);
            assert_abs_diff_eq!(q.length(), 1.0, epsilon = 1e-12);
            assert_abs_diff_eq!(q.yaw(), yaw, epsilon = 1e-9);
            assert_abs_diff_eq!(q.pitch(), pitch, epsilon = 1e-9);
            assert_abs_diff_eq!(q.roll(), roll, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_single_axis_euler_components() {
        let yaw = Quaternion::from_euler(FRAC_PI_2, 0.0, 0.0);
        assert_abs_diff_eq!(
            yaw,
            Quaternion::from_axis_angle(Vector3::UNIT_Y, FRAC_PI_2),
            epsilon = 1e-12
        );
        let pitch = Quaternion::from_euler(0.0, FRAC_PI_2, 0.0);
        assert_abs_diff_eq!(
            pitch,
            Quaternion::from_axis_angle(Vector3::UNIT_X, FRAC_PI_2),
            epsilon = 1e-12
        );
        let roll = Quaternion::from_euler(0.0, 0.0, FRAC_PI_2);
        assert_abs_diff_eq!(
            roll,
            Quaternion::from_axis_angle(Vector3::UNIT_Z, FRAC_PI_2),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_inverse_cancels() {
        for q in sample_rotations() {
            assert_abs_diff_eq!(q.inverse() * q, Quaternion::IDENTITY, epsilon = 1e-12);
            assert_abs_diff_eq!(q * q.inverse(), Quaternion::IDENTITY, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_normalized_length() {
        let q = Quaternion::new(3.0, -1.0, 0.5, 7.0);
        assert_abs_diff_eq!(q.normalized().length(), 1.0, epsilon = 1e-12);
        assert_eq!(Quaternion::new(0.0, 0.0, 0.0, 0.0).normalized(), Quaternion::IDENTITY);
    }

    #[test]
    fn test_slerp_endpoints() {
        let q0 = Quaternion::from_euler(0.1, 0.2, 0.3);
        let q1 = Quaternion::from_euler(1.0, -0.5, 0.8);
        assert!(q0.dot(q1) > 0.0);
        assert_abs_diff_eq!(q0.slerp(q1, 0.0), q0, epsilon = 1e-9);
        assert_abs_diff_eq!(q0.slerp(q1, 1.0), q1, epsilon = 1e-9);
        for t in [0.0, 0.25, 0.5, 1.0] {
            assert_abs_diff_eq!(q0.slerp(q0, t), q0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_slerp_midpoint_halves_angle() {
        let q0 = Quaternion::IDENTITY;
        let q1 = Quaternion::from_axis_angle(Vector3::UNIT_Y, FRAC_PI_2);
        let mid = q0.slerp(q1, 0.5);
        assert_abs_diff_eq!(
            mid,
            Quaternion::from_axis_angle(Vector3::UNIT_Y, FRAC_PI_4),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_slerp_takes_short_path() {
        let q0 = Quaternion::from_axis_angle(Vector3::UNIT_Z, 0.2);
        let q1 = -Quaternion::from_axis_angle(Vector3::UNIT_Z, 0.6);
        assert!(q0.dot(q1) < 0.0);
        let end = q0.slerp(q1, 1.0);
        let v = Vector3::new(1.0, 2.0, 3.0);
        assert_abs_diff_eq!(end * v, q1 * v, epsilon = 1e-9);
        let mid = q0.slerp(q1, 0.5);
        assert_abs_diff_eq!(mid.angle_between(q0).min(mid.angle_between(-q0)), 0.1, epsilon = 1e-9);
    }

    #[test]
    fn test_slerp_antipodal_returns_self() {
        let q = Quaternion::from_euler(0.4, 0.1, -0.3);
        assert_eq!(q.slerp(-q, 0.5), q);
    }

    #[test]
    fn test_axis_and_angle() {
        let q = Quaternion::from_axis_angle(Vector3::UNIT_Z, PI / 3.0);
        assert_abs_diff_eq!(q.axis(), Vector3::UNIT_Z, epsilon = 1e-12);
        assert_abs_diff_eq!(q.angle(), PI / 3.0, epsilon = 1e-12);
        assert_eq!(Quaternion::IDENTITY.axis(), Vector3::UNIT_X);
    }

    #[test]
    fn test_composition_order() {
        let yaw = Quaternion::from_axis_angle(Vector3::UNIT_Y, FRAC_PI_2);
        let pitch = Quaternion::from_axis_angle(Vector3::UNIT_X, FRAC_PI_2);
        // pitch first, then yaw
        let v = (yaw * pitch) * Vector3::UNIT_Y;
        assert_abs_diff_eq!(v, Vector3::UNIT_X, epsilon = 1e-12);
    }

    #[test]
    fn test_glam_conversion() {
        let q = Quaternion::from_euler(0.3, 0.2, 0.1);
        let g: glam::Quat = q.into();
        let v = g * glam::Vec3::Z;
        let expected: glam::Vec3 = (q * Vector3::UNIT_Z).into();
        assert!((v - expected).length() < 1e-6);
    }
}
