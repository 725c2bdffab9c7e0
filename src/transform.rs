//! Helpers for 4x4 matrices stored as flat column-major buffers.
//!
//! Element `(row, col)` lives at index `col * 4 + row`, which is the layout
//! the GL uniform upload path and [`glam::Mat4::to_cols_array`] both use.

use glam::Mat4;

/// Sixteen floats in column-major order.
pub type Mat4Buffer = [f32; 16];

pub const IDENTITY: Mat4Buffer = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0, //
];

/// Overwrites `m` with the identity matrix.
pub fn load_identity(m: &mut Mat4Buffer) {
    *m = IDENTITY;
}

/// Overwrites `m` with a general (possibly asymmetric) viewing frustum.
///
/// Inputs are not validated: `right == left`, `top == bottom` or
/// `far == near` produce non-finite entries.
pub fn frustum(
    m: &mut Mat4Buffer,
    left: f32,
    right: f32,
    bottom: f32,
    top: f32,
    z_near: f32,
    z_far: f32,
) {
    let delta_x = right - left;
    let delta_y = top - bottom;
    let delta_z = z_far - z_near;

    *m = [0.0; 16];
    m[0] = 2.0 * z_near / delta_x;
    m[5] = 2.0 * z_near / delta_y;
    m[8] = (right + left) / delta_x;
    m[9] = (top + bottom) / delta_y;
    m[10] = -(z_near + z_far) / delta_z;
    m[11] = -1.0;
    m[14] = -2.0 * z_near * z_far / delta_z;
}

/// Overwrites `m` with a symmetric perspective projection.
///
/// The caller guarantees `z_far > z_near > 0` and `aspect > 0`; anything else
/// yields a degenerate matrix.
pub fn perspective(m: &mut Mat4Buffer, fovy_degrees: f32, aspect: f32, z_near: f32, z_far: f32) {
    let half_height = (fovy_degrees.to_radians() * 0.5).tan() * z_near;
    let half_width = half_height * aspect;
    frustum(
        m,
        -half_width,
        half_width,
        -half_height,
        half_height,
        z_near,
        z_far,
    );
}

/// Column-major product `a * b`.
pub fn multiply(a: &Mat4Buffer, b: &Mat4Buffer) -> Mat4Buffer {
    let mut out = [0.0; 16];
    for col in 0..4 {
        for row in 0..4 {
            out[col * 4 + row] = (0..4).map(|k| a[k * 4 + row] * b[col * 4 + k]).sum();
        }
    }
    out
}

pub fn to_mat4(m: &Mat4Buffer) -> Mat4 {
    Mat4::from_cols_array(m)
}
