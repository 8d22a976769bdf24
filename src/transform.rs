/// A 4x4 transformation matrix stored in row-major order.
///
/// Primitives carry one as their local-to-world transform, and the compositor
/// holds another to bring the compiled mesh back into its own local space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    /// Matrix data in row-major order: [row0, row1, row2, row3]
    pub data: [f32; 16],
}

impl Transform {
    /// Identity matrix (no transformation)
    pub const IDENTITY: Self = Self {
        data: [
            1.0, 0.0, 0.0, 0.0, // row 0
            0.0, 1.0, 0.0, 0.0, // row 1
            0.0, 0.0, 1.0, 0.0, // row 2
            0.0, 0.0, 0.0, 1.0, // row 3
        ],
    };

    /// Create a translation transform
    pub fn translate(x: f32, y: f32, z: f32) -> Self {
        Self {
            data: [
                1.0, 0.0, 0.0, x, // row 0
                0.0, 1.0, 0.0, y, // row 1
                0.0, 0.0, 1.0, z, // row 2
                0.0, 0.0, 0.0, 1.0, // row 3
            ],
        }
    }

    /// Create a rotation around the Z axis (the only rotation a 2D UI needs)
    pub fn rotate_z(angle_radians: f32) -> Self {
        let (sin, cos) = angle_radians.sin_cos();
        Self {
            data: [
                cos, -sin, 0.0, 0.0, // row 0
                sin, cos, 0.0, 0.0, // row 1
                0.0, 0.0, 1.0, 0.0, // row 2
                0.0, 0.0, 0.0, 1.0, // row 3
            ],
        }
    }

    /// Create a non-uniform scale transform
    pub fn scale(sx: f32, sy: f32, sz: f32) -> Self {
        Self {
            data: [
                sx, 0.0, 0.0, 0.0, // row 0
                0.0, sy, 0.0, 0.0, // row 1
                0.0, 0.0, sz, 0.0, // row 2
                0.0, 0.0, 0.0, 1.0, // row 3
            ],
        }
    }

    /// Compose this transform with another: self * other
    /// Applies `other` first, then `self`.
    pub fn then(&self, other: &Transform) -> Transform {
        let a = &self.data;
        let b = &other.data;
        let mut result = [0.0f32; 16];

        for row in 0..4 {
            for col in 0..4 {
                result[row * 4 + col] = (0..4).map(|k| a[row * 4 + k] * b[k * 4 + col]).sum();
            }
        }

        Transform { data: result }
    }

    /// Compute the inverse of this transform.
    ///
    /// Uses the cofactor expansion over 2x2 sub-determinants. A singular
    /// matrix has no inverse and yields `None`.
    pub fn inverse(&self) -> Option<Transform> {
        let m = &self.data;

        let s0 = m[0] * m[5] - m[4] * m[1];
        let s1 = m[0] * m[6] - m[4] * m[2];
        let s2 = m[0] * m[7] - m[4] * m[3];
        let s3 = m[1] * m[6] - m[5] * m[2];
        let s4 = m[1] * m[7] - m[5] * m[3];
        let s5 = m[2] * m[7] - m[6] * m[3];

        let c5 = m[10] * m[15] - m[14] * m[11];
        let c4 = m[9] * m[15] - m[13] * m[11];
        let c3 = m[9] * m[14] - m[13] * m[10];
        let c2 = m[8] * m[15] - m[12] * m[11];
        let c1 = m[8] * m[14] - m[12] * m[10];
        let c0 = m[8] * m[13] - m[12] * m[9];

        let det = s0 * c5 - s1 * c4 + s2 * c3 + s3 * c2 - s4 * c1 + s5 * c0;
        if det.abs() < 1e-12 {
            return None;
        }
        let inv = 1.0 / det;

        Some(Transform {
            data: [
                (m[5] * c5 - m[6] * c4 + m[7] * c3) * inv,
                (-m[1] * c5 + m[2] * c4 - m[3] * c3) * inv,
                (m[13] * s5 - m[14] * s4 + m[15] * s3) * inv,
                (-m[9] * s5 + m[10] * s4 - m[11] * s3) * inv,
                (-m[4] * c5 + m[6] * c2 - m[7] * c1) * inv,
                (m[0] * c5 - m[2] * c2 + m[3] * c1) * inv,
                (-m[12] * s5 + m[14] * s2 - m[15] * s1) * inv,
                (m[8] * s5 - m[10] * s2 + m[11] * s1) * inv,
                (m[4] * c4 - m[5] * c2 + m[7] * c0) * inv,
                (-m[0] * c4 + m[1] * c2 - m[3] * c0) * inv,
                (m[12] * s4 - m[13] * s2 + m[15] * s0) * inv,
                (-m[8] * s4 + m[9] * s2 - m[11] * s0) * inv,
                (-m[4] * c3 + m[5] * c1 - m[6] * c0) * inv,
                (m[0] * c3 - m[1] * c1 + m[2] * c0) * inv,
                (-m[12] * s3 + m[13] * s1 - m[14] * s0) * inv,
                (m[8] * s3 - m[9] * s1 + m[10] * s0) * inv,
            ],
        })
    }

    /// Transform a 3D point (w = 1) by this matrix.
    ///
    /// Projective matrices are divided through by the resulting w.
    pub fn transform_point3(&self, p: [f32; 3]) -> [f32; 3] {
        let m = &self.data;
        let x = m[0] * p[0] + m[1] * p[1] + m[2] * p[2] + m[3];
        let y = m[4] * p[0] + m[5] * p[1] + m[6] * p[2] + m[7];
        let z = m[8] * p[0] + m[9] * p[1] + m[10] * p[2] + m[11];
        let w = m[12] * p[0] + m[13] * p[1] + m[14] * p[2] + m[15];
        if w != 1.0 && w.abs() > f32::EPSILON {
            [x / w, y / w, z / w]
        } else {
            [x, y, z]
        }
    }

    /// Transform a 2D point on the z = 0 plane
    pub fn transform_point(&self, x: f32, y: f32) -> (f32, f32) {
        let [px, py, _] = self.transform_point3([x, y, 0.0]);
        (px, py)
    }

    /// Check if this is the identity transform
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}
