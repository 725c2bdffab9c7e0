use glam::{Quat, Vec3};
use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transform::{self, Mat4Buffer};

/// Rotation as a quaternion that is not required to be unit length.
///
/// The matrix conversion divides by the squared length, so callers may
/// accumulate rotations without renormalizing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Orientation(Quat);

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum OrientationError {
    #[error("quaternion has degenerate squared length {0}")]
    Degenerate(f64),
}

impl Orientation {
    pub const IDENTITY: Self = Self(Quat::from_xyzw(0.0, 0.0, 0.0, 1.0));

    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self(Quat::from_xyzw(x, y, z, w))
    }

    pub fn identity() -> Self {
        Self::IDENTITY
    }

    /// Rotation of `angle` radians around `axis`. A zero axis gives the identity.
    pub fn from_axis_angle(axis: Vec3, angle: f32) -> Self {
        let axis = axis.normalize_or_zero();
        if axis == Vec3::ZERO {
            return Self::IDENTITY;
        }
        Self(Quat::from_axis_angle(axis, angle))
    }

    pub fn quat(self) -> Quat {
        self.0
    }

    pub fn length_squared(self) -> f64 {
        let q = self.0;
        [q.x, q.y, q.z, q.w]
            .iter()
            .map(|c| f64::from(*c) * f64::from(*c))
            .sum()
    }

    /// Applies `delta` after the current rotation.
    pub fn rotate_by(&mut self, delta: Orientation) {
        self.0 = delta.0 * self.0;
    }

    /// Row-major 3x3 rotation for this quaternion, scaled by the inverse
    /// squared length so non-unit input still yields a pure rotation.
    pub fn try_rotation(self) -> Result<[[f64; 3]; 3], OrientationError> {
        let s = self.length_squared();
        if !(s.is_finite() && s > 0.0) {
            return Err(OrientationError::Degenerate(s));
        }
        let k = 1.0 / s;
        let (x, y, z, w) = (
            f64::from(self.0.x),
            f64::from(self.0.y),
            f64::from(self.0.z),
            f64::from(self.0.w),
        );
        let (xx, yy, zz, ww) = (x * x, y * y, z * z, w * w);

        Ok([
            [
                (xx - yy - zz + ww) * k,
                2.0 * (x * y - z * w) * k,
                2.0 * (x * z + y * w) * k,
            ],
            [
                2.0 * (x * y + z * w) * k,
                (-xx + yy - zz + ww) * k,
                2.0 * (y * z - x * w) * k,
            ],
            [
                2.0 * (x * z - y * w) * k,
                2.0 * (y * z + x * w) * k,
                (-xx - yy + zz + ww) * k,
            ],
        ])
    }
}

impl Default for Orientation {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Builds the model-view matrix for an object seen from `eye`.
///
/// A zero-length (or non-finite) quaternion falls back to the identity
/// rotation; the eye translation is applied either way.
pub fn model_view(orientation: Orientation, eye: Vec3) -> Mat4Buffer {
    let mut m = transform::IDENTITY;
    match orientation.try_rotation() {
        Ok(rotation) => {
            for (row, values) in rotation.iter().enumerate() {
                for (col, value) in values.iter().enumerate() {
                    m[col * 4 + row] = *value as f32;
                }
            }
        }
        Err(err) => warn!("{err}; substituting identity rotation"),
    }

    m[12] = -eye.x;
    m[13] = -eye.y;
    m[14] = -eye.z;
    m[15] = 1.0;
    m
}

/// Upper-left 3x3 block of a column-major matrix, as `[col][row]`.
pub fn rotation_block(m: &Mat4Buffer) -> [[f32; 3]; 3] {
    let mut block = [[0.0; 3]; 3];
    for (col, column) in block.iter_mut().enumerate() {
        for (row, value) in column.iter_mut().enumerate() {
            *value = m[col * 4 + row];
        }
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Mat3;

    const EPS: f32 = 1e-5;

    fn sample_quaternions() -> Vec<Orientation> {
        vec![
            Orientation::IDENTITY,
            Orientation::from_axis_angle(Vec3::X, 0.3),
            Orientation::from_axis_angle(Vec3::new(1.0, 2.0, -0.5), 2.1),
            Orientation::from_axis_angle(Vec3::new(-3.0, 0.1, 4.0), -1.2),
            Orientation::from_axis_angle(Vec3::Z, std::f32::consts::PI),
        ]
    }

    #[test]
    fn unit_quaternions_give_orthonormal_rotation() {
        for q in sample_quaternions() {
            let block = rotation_block(&model_view(q, Vec3::new(0.0, 0.0, 2.0)));
            let columns = block.map(Vec3::from_array);
            for (i, a) in columns.iter().enumerate() {
                assert!((a.length() - 1.0).abs() < EPS, "{q:?} column {i} not unit");
                for b in columns.iter().skip(i + 1) {
                    assert!(a.dot(*b).abs() < EPS, "{q:?} columns not orthogonal");
                }
            }
        }
    }

    #[test]
    fn matches_glam_rotation_for_unit_input() {
        for q in sample_quaternions() {
            let m = model_view(q, Vec3::ZERO);
            let expected = Mat3::from_quat(q.quat()).to_cols_array_2d();
            let actual = rotation_block(&m);
            for col in 0..3 {
                for row in 0..3 {
                    assert!((actual[col][row] - expected[col][row]).abs() < EPS);
                }
            }
        }
    }

    #[test]
    fn identity_quaternion_ignores_eye_in_rotation_block() {
        for eye in [Vec3::ZERO, Vec3::new(0.0, 0.0, 2.0), Vec3::new(-4.0, 9.5, 1e3)] {
            let m = model_view(Orientation::IDENTITY, eye);
            assert_eq!(rotation_block(&m), Mat3::IDENTITY.to_cols_array_2d());
            assert_eq!(&m[12..16], &[-eye.x, -eye.y, -eye.z, 1.0]);
            assert_eq!([m[3], m[7], m[11]], [0.0; 3]);
        }
    }

    #[test]
    fn scaling_the_quaternion_does_not_change_rotation() {
        for q in sample_quaternions() {
            let base = rotation_block(&model_view(q, Vec3::ONE));
            for c in [0.25f32, 3.0, -7.5] {
                let scaled = Orientation(q.quat() * c);
                let block = rotation_block(&model_view(scaled, Vec3::ONE));
                for col in 0..3 {
                    for row in 0..3 {
                        assert!((block[col][row] - base[col][row]).abs() < EPS);
                    }
                }
            }
        }
    }

    #[test]
    fn zero_quaternion_falls_back_to_identity() {
        let zero = Orientation::new(0.0, 0.0, 0.0, 0.0);
        assert!(matches!(
            zero.try_rotation(),
            Err(OrientationError::Degenerate(s)) if s == 0.0
        ));
        let m = model_view(zero, Vec3::new(1.0, 2.0, 3.0));
        assert!(m.iter().all(|v| v.is_finite()));
        assert_eq!(rotation_block(&m), Mat3::IDENTITY.to_cols_array_2d());
        assert_eq!(&m[12..15], &[-1.0, -2.0, -3.0]);
    }

    #[test]
    fn non_finite_quaternion_is_rejected() {
        let q = Orientation::new(f32::NAN, 0.0, 0.0, 1.0);
        assert!(q.try_rotation().is_err());
        assert!(model_view(q, Vec3::ZERO).iter().all(|v| v.is_finite()));
    }

    #[test]
    fn rotate_by_accumulates_turns() {
        let step = Orientation::from_axis_angle(Vec3::Y, std::f32::consts::FRAC_PI_2);
        let mut q = Orientation::IDENTITY;
        q.rotate_by(step);
        q.rotate_by(step);
        let rotated = Mat3::from_cols_array_2d(&rotation_block(&model_view(q, Vec3::ZERO)))
            * Vec3::X;
        assert!((rotated - Vec3::NEG_X).length() < EPS);
    }
}
