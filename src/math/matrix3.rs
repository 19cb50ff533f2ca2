use std::ops::Mul;

use super::{Quaternion, Scalar, Vector3};

/// Row-major 3x3 matrix acting on column vectors
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix3 {
    pub rows: [[Scalar; 3]; 3],
}

impl Default for Matrix3 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix3 {
    pub const IDENTITY: Self = Self {
        rows: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
    };

    pub const fn new(rows: [[Scalar; 3]; 3]) -> Self {
        Self { rows }
    }

    /// Matrix whose columns are the given basis vectors
    pub fn from_columns(x: Vector3, y: Vector3, z: Vector3) -> Self {
        Self::new([[x.x, y.x, z.x], [x.y, y.y, z.y], [x.z, y.z, z.z]])
    }

    /// Rotation matrix of a unit quaternion
    pub fn from_quaternion(q: Quaternion) -> Self {
        let (w, x, y, z) = (q.w, q.x, q.y, q.z);
        Self::new([
            [1.0 - 2.0 * (y * y + z * z), 2.0 * (x * y - w * z), 2.0 * (x * z + w * y)],
            [2.0 * (x * y + w * z), 1.0 - 2.0 * (x * x + z * z), 2.0 * (y * z - w * x)],
            [2.0 * (x * z - w * y), 2.0 * (y * z + w * x), 1.0 - 2.0 * (x * x + y * y)],
        ])
    }

    /// Quaternion of a rotation matrix.
    ///
    /// Picks the largest of w, x, y, z to divide by, so no branch divides by
    /// a value close to zero.
    pub fn to_quaternion(&self) -> Quaternion {
        let m = &self.rows;
        let trace = m[0][0] + m[1][1] + m[2][2];
        let q = if trace > 0.0 {
            let s = (trace + 1.0).sqrt() * 2.0;
            Quaternion::new(
                0.25 * s,
                (m[2][1] - m[1][2]) / s,
                (m[0][2] - m[2][0]) / s,
                (m[1][0] - m[0][1]) / s,
            )
        } else if m[0][0] > m[1][1] && m[0][0] > m[2][2] {
            let s = (1.0 + m[0][0] - m[1][1] - m[2][2]).sqrt() * 2.0;
            Quaternion::new(
                (m[2][1] - m[1][2]) / s,
                0.25 * s,
                (m[0][1] + m[1][0]) / s,
                (m[0][2] + m[2][0]) / s,
            )
        } else if m[1][1] > m[2][2] {
            let s = (1.0 + m[1][1] - m[0][0] - m[2][2]).sqrt() * 2.0;
            Quaternion::new(
                (m[0][2] - m[2][0]) / s,
                (m[0][1] + m[1][0]) / s,
                0.25 * s,
                (m[1][2] + m[2][1]) / s,
            )
        } else {
            let s = (1.0 + m[2][2] - m[0][0] - m[1][1]).sqrt() * 2.0;
            Quaternion::new(
                (m[1][0] - m[0][1]) / s,
                (m[0][2] + m[2][0]) / s,
                (m[1][2] + m[2][1]) / s,
                0.25 * s,
            )
        };
        q.normalized()
    }

    pub fn row(&self, i: usize) -> Vector3 {
        Vector3::from(self.rows[i])
    }

    pub fn column(&self, i: usize) -> Vector3 {
        Vector3::new(self.rows[0][i], self.rows[1][i], self.rows[2][i])
    }

    pub fn transpose(&self) -> Self {
        Self::from_columns(self.row(0), self.row(1), self.row(2))
    }

    pub fn determinant(&self) -> Scalar {
        self.row(0).dot(self.row(1).cross(self.row(2)))
    }
}

impl Mul<Vector3> for Matrix3 {
    type Output = Vector3;

    fn mul(self, v: Vector3) -> Vector3 {
        Vector3::new(self.row(0).dot(v), self.row(1).dot(v), self.row(2).dot(v))
    }
}

impl Mul for Matrix3 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        let mut rows = [[0.0; 3]; 3];
        for (i, row) in rows.iter_mut().enumerate() {
            for (j, value) in row.iter_mut().enumerate() {
                *value = self.row(i).dot(rhs.column(j));
            }
        }
        Self::new(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_matches_quaternion_rotation() {
        let q = Quaternion::from_euler(0.7, -1.1, 2.3);
        let m = Matrix3::from_quaternion(q);
        let v = Vector3::new(0.3, -4.0, 2.5);
        assert_abs_diff_eq!(m * v, q * v, epsilon = 1e-12);
        assert_abs_diff_eq!(m.determinant(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_quaternion_round_trip_all_branches() {
        let rotations = [
            Quaternion::from_euler(0.2, 0.1, -0.3),
            Quaternion::from_axis_angle(Vector3::UNIT_X, 3.0),
            Quaternion::from_axis_angle(Vector3::UNIT_Y, 3.0),
            Quaternion::from_axis_angle(Vector3::UNIT_Z, 3.0),
        ];
        for q in rotations {
            let back = Matrix3::from_quaternion(q).to_quaternion();
            // q and -q describe the same rotation
            let back = if back.dot(q) < 0.0 { -back } else { back };
            assert_abs_diff_eq!(back, q, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_transpose_is_inverse_for_rotations() {
        let m = Matrix3::from_quaternion(Quaternion::from_euler(1.0, 0.5, 0.25));
        let product = m * m.transpose();
        for i in 0..3 {
            assert_abs_diff_eq!(product.row(i), Matrix3::IDENTITY.row(i), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_from_columns() {
        let m = Matrix3::from_columns(Vector3::UNIT_Y, Vector3::UNIT_Z, Vector3::UNIT_X);
        assert_eq!(m * Vector3::UNIT_X, Vector3::UNIT_Y);
        assert_eq!(m.column(2), Vector3::UNIT_X);
    }
}
