use std::f64::consts::{FRAC_PI_2, PI};

use crate::linalg;

/// Tolerance (5 degrees) under which yaw angles near `-pi/2` snap to `+pi/2`.
pub const YAW_SNAP_TOLERANCE: f64 = 5.0 * PI / 180.0;

/// Convert a quaternion `(q0, q1, q2, q3)` (scalar first) to a rotation matrix.
///
/// The quaternion does not need to be normalized. A quaternion with squared
/// norm below machine epsilon maps to the identity rotation.
///
/// The outer-product formula below produces the inverse-sense matrix, so the
/// transpose is returned. For `q = (cos(a/2), 0, 0, sin(a/2))` the result is
/// the usual counter-clockwise rotation by `a` about the z axis.
///
/// Example:
///
/// ```
/// use voxelrpn_3d::transforms::quaternion_to_rotation;
///
/// let rotation = quaternion_to_rotation(&[1.0, 0.0, 0.0, 0.0]);
/// assert_eq!(rotation, [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
/// ```
pub fn quaternion_to_rotation(quaternion: &[f64; 4]) -> [[f64; 3]; 3] {
    let n: f64 = quaternion.iter().map(|v| v * v).sum();
    if n < f64::EPSILON {
        return [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
    }

    let scale = (2.0 / n).sqrt();
    let q = quaternion.map(|v| v * scale);
    let outer = |i: usize, j: usize| q[i] * q[j];

    let raw = [
        [
            1.0 - outer(2, 2) - outer(3, 3),
            outer(1, 2) + outer(3, 0),
            outer(1, 3) - outer(2, 0),
        ],
        [
            outer(1, 2) - outer(3, 0),
            1.0 - outer(1, 1) - outer(3, 3),
            outer(2, 3) + outer(1, 0),
        ],
        [
            outer(1, 3) + outer(2, 0),
            outer(2, 3) - outer(1, 0),
            1.0 - outer(1, 1) - outer(2, 2),
        ],
    ];

    linalg::mat33_transpose(&raw)
}

/// Rotation matrix for a yaw angle about the z (up) axis.
pub fn yaw_to_rotation(yaw: f64) -> [[f64; 3]; 3] {
    let (s, c) = yaw.sin_cos();
    [[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]]
}

/// Recover the yaw angle (rotation about z) of a rotation matrix.
///
/// Builds the symmetric 4x4 `K` matrix of the rotation, takes the
/// eigenvector of its largest eigenvalue as the quaternion (ties keep the
/// first index) and converts it to yaw with `atan2`. The eigenvector of `K`
/// is the quaternion of the transposed rotation, ordered `(x, y, z, w)`.
///
/// Example:
///
/// ```
/// use voxelrpn_3d::transforms::{rotation_to_yaw, yaw_to_rotation};
///
/// let yaw = rotation_to_yaw(&yaw_to_rotation(0.4));
/// assert!((yaw - 0.4).abs() < 1e-9);
/// ```
pub fn rotation_to_yaw(rotation: &[[f64; 3]; 3]) -> f64 {
    let r = rotation;
    let third = 1.0 / 3.0;
    let k = [
        [
            third * (r[0][0] - r[1][1] - r[2][2]),
            third * (r[1][0] + r[0][1]),
            third * (r[2][0] + r[0][2]),
            third * (r[1][2] - r[2][1]),
        ],
        [
            third * (r[1][0] + r[0][1]),
            third * (r[1][1] - r[0][0] - r[2][2]),
            third * (r[2][1] + r[1][2]),
            third * (r[2][0] - r[0][2]),
        ],
        [
            third * (r[2][0] + r[0][2]),
            third * (r[2][1] + r[1][2]),
            third * (r[2][2] - r[0][0] - r[1][1]),
            third * (r[0][1] - r[1][0]),
        ],
        [
            third * (r[1][2] - r[2][1]),
            third * (r[2][0] - r[0][2]),
            third * (r[0][1] - r[1][0]),
            third * (r[0][0] + r[1][1] + r[2][2]),
        ],
    ];

    let eig = linalg::symmetric_eigen4(&k);
    let v = eig.eigenvector(eig.argmax());

    // conjugate back to the quaternion of `rotation`; the expression is
    // quadratic in v so the eigenvector sign does not matter
    let (x, y, z, w) = (-v[0], -v[1], -v[2], v[3]);
    (2.0 * (w * z + x * y)).atan2(1.0 - 2.0 * (y * y + z * z))
}

/// Reduce an angle into `[-pi/2, pi/2)` by repeated shifts of `pi`.
///
/// Angles that land within 5 degrees above `-pi/2` snap to exactly `+pi/2`.
/// The snap is one-sided: nothing near `+pi/2` is moved.
///
/// Example:
///
/// ```
/// use voxelrpn_3d::transforms::normalize_yaw;
///
/// assert_eq!(normalize_yaw(0.25), 0.25);
/// assert_eq!(normalize_yaw(-std::f64::consts::FRAC_PI_2), std::f64::consts::FRAC_PI_2);
/// ```
pub fn normalize_yaw(angle: f64) -> f64 {
    if !angle.is_finite() {
        return angle;
    }

    let mut angle = angle;
    if angle.abs() > 8.0 * PI {
        angle = (angle + FRAC_PI_2).rem_euclid(PI) - FRAC_PI_2;
    }
    while angle >= FRAC_PI_2 {
        angle -= PI;
    }
    while angle < -FRAC_PI_2 {
        angle += PI;
    }
    if (angle + FRAC_PI_2).abs() < YAW_SNAP_TOLERANCE {
        angle = FRAC_PI_2;
    }
    angle
}

/// Rotation matrix composed as `Rz * Ry * Rx` from angles in radians.
pub fn euler_to_rotation(rx: f64, ry: f64, rz: f64) -> [[f64; 3]; 3] {
    let (sx, cx) = rx.sin_cos();
    let (sy, cy) = ry.sin_cos();
    let rot_x = [[1.0, 0.0, 0.0], [0.0, cx, -sx], [0.0, sx, cx]];
    let rot_y = [[cy, 0.0, sy], [0.0, 1.0, 0.0], [-sy, 0.0, cy]];
    let rot_z = yaw_to_rotation(rz);
    linalg::mat33_mul(&rot_z, &linalg::mat33_mul(&rot_y, &rot_x))
}

/// Translate points and then rotate them about the origin.
///
/// Each axis turns the points by the negated angle, x first, then y, then z,
/// so `rz = π/2` carries `+x` onto `-y`. Used for rigid scene augmentation.
///
/// # Arguments
///
/// * `points` - Points to transform.
/// * `translation` - Translation applied before the rotation.
/// * `angles` - Rotation angles `(rx, ry, rz)` in radians.
pub fn point_transform(
    points: &[[f64; 3]],
    translation: &[f64; 3],
    angles: &[f64; 3],
) -> Vec<[f64; 3]> {
    // Rz(-rz) * Ry(-ry) * Rx(-rx)
    let rotation = euler_to_rotation(-angles[0], -angles[1], -angles[2]);
    // R (p + t) = R p + R t
    let rotated_t = linalg::mat33_mul_vec(&rotation, translation);
    points
        .iter()
        .map(|p| {
            let q = linalg::mat33_mul_vec(&rotation, p);
            [q[0] + rotated_t[0], q[1] + rotated_t[1], q[2] + rotated_t[2]]
        })
        .collect()
}
