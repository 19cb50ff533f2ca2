use std::fmt;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use approx::{AbsDiffEq, RelativeEq};
use serde::{Deserialize, Serialize};

use super::{Quaternion, Scalar};

/// Three component vector used for positions, displacements and axes
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: Scalar,
    pub y: Scalar,
    pub z: Scalar,
}

impl Vector3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    pub const ONE: Self = Self::new(1.0, 1.0, 1.0);
    pub const UNIT_X: Self = Self::new(1.0, 0.0, 0.0);
    pub const UNIT_Y: Self = Self::new(0.0, 1.0, 0.0);
    pub const UNIT_Z: Self = Self::new(0.0, 0.0, 1.0);
    pub const NEG_UNIT_X: Self = Self::new(-1.0, 0.0, 0.0);
    pub const NEG_UNIT_Y: Self = Self::new(0.0, -1.0, 0.0);
    pub const NEG_UNIT_Z: Self = Self::new(0.0, 0.0, -1.0);

    pub const fn new(x: Scalar, y: Scalar, z: Scalar) -> Self {
        Self { x, y, z }
    }

    pub const fn splat(value: Scalar) -> Self {
        Self::new(value, value, value)
    }

    pub fn length(&self) -> Scalar {
        self.length_squared().sqrt()
    }

    pub fn length_squared(&self) -> Scalar {
        self.dot(*self)
    }

    pub fn distance(&self, other: Self) -> Scalar {
        (other - *self).length()
    }

    pub fn distance_squared(&self, other: Self) -> Scalar {
        (other - *self).length_squared()
    }

    /// Angle between two vectors in radians
    pub fn angle(&self, other: Self) -> Scalar {
        let s = (self.length_squared() * other.length_squared()).sqrt();
        (self.dot(other) / s).clamp(-1.0, 1.0).acos()
    }

    pub fn dot(&self, other: Self) -> Scalar {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Unit vector with the same direction.
    ///
    /// The zero vector has no direction; the result is NaN in that case.
    /// Use [`Vector3::try_normalized`] when the input may be degenerate.
    pub fn normalized(&self) -> Self {
        *self / self.length()
    }

    pub fn normalize(&mut self) -> &mut Self {
        *self = self.normalized();
        self
    }

    /// Unit vector with the same direction, or `None` for (near) zero vectors
    pub fn try_normalized(&self) -> Option<Self> {
        let length = self.length();
        if length > super::EPSILON && length.is_finite() {
            Some(*self / length)
        } else {
            None
        }
    }

    /// Rotate around `axis` by `angle` radians (Rodrigues decomposition).
    ///
    /// The component along the axis is kept, the orthogonal remainder is
    /// turned by the cosine/sine blend. A zero axis leaves the vector as is.
    pub fn rotate_axis_angle(&self, axis: Self, angle: Scalar) -> Self {
        let Some(axis) = axis.try_normalized() else {
            return *self;
        };
        let o = axis * axis.dot(*self);
        let x = *self - o;
        let y = axis.cross(*self);
        o + x * angle.cos() + y * angle.sin()
    }

    /// Rotate by a unit quaternion: the vector part of `q * v * q⁻¹`
    pub fn rotate(&self, q: Quaternion) -> Self {
        q.rotate_vector(*self)
    }

    pub fn lerp(&self, other: Self, t: Scalar) -> Self {
        Self::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
            self.z + (other.z - self.z) * t,
        )
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn to_array(&self) -> [Scalar; 3] {
        [self.x, self.y, self.z]
    }
}

impl fmt::Display for Vector3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.x, self.y, self.z)
    }
}

impl From<[Scalar; 3]> for Vector3 {
    fn from(v: [Scalar; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl From<Vector3> for glam::Vec3 {
    fn from(v: Vector3) -> Self {
        glam::Vec3::new(v.x as f32, v.y as f32, v.z as f32)
    }
}

impl From<glam::Vec3> for Vector3 {
    fn from(v: glam::Vec3) -> Self {
        Self::new(v.x as Scalar, v.y as Scalar, v.z as Scalar)
    }
}

impl Neg for Vector3 {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl Add for Vector3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vector3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// Component-wise product
impl Mul for Vector3 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self::new(self.x * rhs.x, self.y * rhs.y, self.z * rhs.z)
    }
}

impl Mul<Scalar> for Vector3 {
    type Output = Self;

    fn mul(self, rhs: Scalar) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Mul<Vector3> for Scalar {
    type Output = Vector3;

    fn mul(self, rhs: Vector3) -> Vector3 {
        rhs * self
    }
}

/// Component-wise quotient
impl Div for Vector3 {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        Self::new(self.x / rhs.x, self.y / rhs.y, self.z / rhs.z)
    }
}

impl Div<Scalar> for Vector3 {
    type Output = Self;

    fn div(self, rhs: Scalar) -> Self {
        self * (1.0 / rhs)
    }
}

impl AddAssign for Vector3 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for Vector3 {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl MulAssign<Scalar> for Vector3 {
    fn mul_assign(&mut self, rhs: Scalar) {
        *self = *self * rhs;
    }
}

impl DivAssign<Scalar> for Vector3 {
    fn div_assign(&mut self, rhs: Scalar) {
        *self = *self / rhs;
    }
}

impl AbsDiffEq for Vector3 {
    type Epsilon = Scalar;

    fn default_epsilon() -> Scalar {
        Scalar::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Scalar) -> bool {
        self.x.abs_diff_eq(&other.x, epsilon)
            && self.y.abs_diff_eq(&other.y, epsilon)
            && self.z.abs_diff_eq(&other.z, epsilon)
    }
}

impl RelativeEq for Vector3 {
    fn default_max_relative() -> Scalar {
        Scalar::default_max_relative()
    }

    fn relative_eq(&self, other: &Self, epsilon: Scalar, max_relative: Scalar) -> bool {
        self.x.relative_eq(&other.x, epsilon, max_relative)
            && self.y.relative_eq(&other.y, epsilon, max_relative)
            && self.z.relative_eq(&other.z, epsilon, max_relative)
    }
}
