use crate::{utils, GeometryError};

/// Determinant magnitude below which a 3x3 block is treated as singular.
const SINGULAR_EPS: f64 = 1e-12;

/// Maximum number of cyclic Jacobi sweeps for the symmetric eigen solver.
const JACOBI_MAX_SWEEPS: usize = 64;

/// Off-diagonal energy at which the Jacobi iteration stops.
const JACOBI_EPS: f64 = 1e-24;

/// Transform a set of points using a rotation and translation.
///
/// # Arguments
///
/// * `src_points` - A set of points to be transformed.
/// * `dst_r_src` - A rotation matrix (row-major).
/// * `dst_t_src` - A translation vector.
/// * `dst_points` - A pre-allocated buffer to store the transformed points.
///
/// # Errors
///
/// Returns [`GeometryError::MismatchedLengths`] if the buffers differ in size.
///
/// Example:
///
/// ```
/// use voxelrpn_3d::linalg::transform_points;
///
/// let src_points = vec![[2.0, 2.0, 2.0], [3.0, 4.0, 5.0]];
/// let rotation = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
/// let translation = [0.0, 0.0, 0.0];
/// let mut dst_points = vec![[0.0; 3]; src_points.len()];
/// transform_points(&src_points, &rotation, &translation, &mut dst_points).unwrap();
/// assert_eq!(dst_points, src_points);
/// ```
pub fn transform_points(
    src_points: &[[f64; 3]],
    dst_r_src: &[[f64; 3]; 3],
    dst_t_src: &[f64; 3],
    dst_points: &mut [[f64; 3]],
) -> Result<(), GeometryError> {
    if src_points.len() != dst_points.len() {
        return Err(GeometryError::MismatchedLengths {
            left_name: "src_points",
            left_len: src_points.len(),
            right_name: "dst_points",
            right_len: dst_points.len(),
        });
    }
    transform_points_into(src_points, dst_r_src, dst_t_src, dst_points);
    Ok(())
}

/// Transform a set of points into a newly allocated buffer.
pub fn transform_points_to_vec(
    src_points: &[[f64; 3]],
    dst_r_src: &[[f64; 3]; 3],
    dst_t_src: &[f64; 3],
) -> Vec<[f64; 3]> {
    let mut dst_points = vec![[0.0; 3]; src_points.len()];
    transform_points_into(src_points, dst_r_src, dst_t_src, &mut dst_points);
    dst_points
}

// both buffers must have the same length
fn transform_points_into(
    src_points: &[[f64; 3]],
    dst_r_src: &[[f64; 3]; 3],
    dst_t_src: &[f64; 3],
    dst_points: &mut [[f64; 3]],
) {
    debug_assert_eq!(src_points.len(), dst_points.len());
    let dst_r_src_mat = utils::mat33_as_faer(dst_r_src);
    let dst_t_src_col = utils::vec3_as_faer_col(dst_t_src);

    let points_in_src = utils::points_as_faer(src_points);
    let mut points_in_dst = utils::points_as_faer_mut(dst_points);

    faer::linalg::matmul::matmul(
        &mut points_in_dst,
        dst_r_src_mat,
        points_in_src,
        None,
        1.0,
        faer::Parallelism::None,
    );

    let (tx, ty, tz) = (
        dst_t_src_col.read(0),
        dst_t_src_col.read(1),
        dst_t_src_col.read(2),
    );

    for mut col in points_in_dst.col_iter_mut() {
        col.write(0, col.read(0) + tx);
        col.write(1, col.read(1) + ty);
        col.write(2, col.read(2) + tz);
    }
}

/// Apply a 3x4 rigid transform `[R | t]` to a single point.
pub fn transform_point(transform: &[[f64; 4]; 3], point: &[f64; 3]) -> [f64; 3] {
    let mut out = [0.0; 3];
    for (i, row) in transform.iter().enumerate() {
        out[i] = row[0] * point[0] + row[1] * point[1] + row[2] * point[2] + row[3];
    }
    out
}

/// Multiply two 3x3 matrices.
pub fn mat33_mul(a: &[[f64; 3]; 3], b: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, val) in row.iter_mut().enumerate() {
            *val = (0..3).map(|k| a[i][k] * b[k][j]).sum();
        }
    }
    out
}

/// Multiply a 3x3 matrix by a 3-vector.
pub fn mat33_mul_vec(a: &[[f64; 3]; 3], v: &[f64; 3]) -> [f64; 3] {
    [
        a[0][0] * v[0] + a[0][1] * v[1] + a[0][2] * v[2],
        a[1][0] * v[0] + a[1][1] * v[1] + a[1][2] * v[2],
        a[2][0] * v[0] + a[2][1] * v[1] + a[2][2] * v[2],
    ]
}

/// Transpose a 3x3 matrix.
pub fn mat33_transpose(a: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in a.iter().enumerate() {
        for (j, val) in row.iter().enumerate() {
            out[j][i] = *val;
        }
    }
    out
}

/// Determinant of a 3x3 matrix.
pub fn mat33_determinant(a: &[[f64; 3]; 3]) -> f64 {
    a[0][0] * (a[1][1] * a[2][2] - a[1][2] * a[2][1])
        - a[0][1] * (a[1][0] * a[2][2] - a[1][2] * a[2][0])
        + a[0][2] * (a[1][0] * a[2][1] - a[1][1] * a[2][0])
}

/// Invert a general 3x3 matrix through its adjugate.
///
/// # Errors
///
/// Returns [`GeometryError::SingularMatrix`] when the determinant vanishes.
pub fn mat33_inverse(a: &[[f64; 3]; 3]) -> Result<[[f64; 3]; 3], GeometryError> {
    let det = mat33_determinant(a);
    if !det.is_finite() || det.abs() < SINGULAR_EPS {
        return Err(GeometryError::SingularMatrix { determinant: det });
    }
    let inv_det = 1.0 / det;
    Ok([
        [
            (a[1][1] * a[2][2] - a[1][2] * a[2][1]) * inv_det,
            (a[0][2] * a[2][1] - a[0][1] * a[2][2]) * inv_det,
            (a[0][1] * a[1][2] - a[0][2] * a[1][1]) * inv_det,
        ],
        [
            (a[1][2] * a[2][0] - a[1][0] * a[2][2]) * inv_det,
            (a[0][0] * a[2][2] - a[0][2] * a[2][0]) * inv_det,
            (a[0][2] * a[1][0] - a[0][0] * a[1][2]) * inv_det,
        ],
        [
            (a[1][0] * a[2][1] - a[1][1] * a[2][0]) * inv_det,
            (a[0][1] * a[2][0] - a[0][0] * a[2][1]) * inv_det,
            (a[0][0] * a[1][1] - a[0][1] * a[1][0]) * inv_det,
        ],
    ])
}

/// Split a 3x4 transform into its rotation block and translation column.
pub fn split_transform(transform: &[[f64; 4]; 3]) -> ([[f64; 3]; 3], [f64; 3]) {
    let mut rotation = [[0.0; 3]; 3];
    let mut translation = [0.0; 3];
    for (i, row) in transform.iter().enumerate() {
        rotation[i].copy_from_slice(&row[..3]);
        translation[i] = row[3];
    }
    (rotation, translation)
}

/// Join a rotation block and a translation column into a 3x4 transform.
pub fn join_transform(rotation: &[[f64; 3]; 3], translation: &[f64; 3]) -> [[f64; 4]; 3] {
    let mut transform = [[0.0; 4]; 3];
    for (i, row) in transform.iter_mut().enumerate() {
        row[..3].copy_from_slice(&rotation[i]);
        row[3] = translation[i];
    }
    transform
}

/// Invert a 3x4 rotation+translation block.
///
/// The rotation block is inverted as a general matrix, so calibration
/// matrices with a slightly non-orthonormal rotation stay exact. The
/// translation becomes `-R⁻¹ t`.
///
/// # Errors
///
/// Returns [`GeometryError::SingularMatrix`] when the rotation block is not invertible.
///
/// Example:
///
/// ```
/// use voxelrpn_3d::linalg::invert_rigid_transform;
///
/// let t = [[1.0, 0.0, 0.0, 1.0], [0.0, 1.0, 0.0, 2.0], [0.0, 0.0, 1.0, 3.0]];
/// let t_inv = invert_rigid_transform(&t).unwrap();
/// assert_eq!(t_inv[0][3], -1.0);
/// ```
pub fn invert_rigid_transform(transform: &[[f64; 4]; 3]) -> Result<[[f64; 4]; 3], GeometryError> {
    let (rotation, translation) = split_transform(transform);
    let rotation_inv = mat33_inverse(&rotation)?;
    let t = mat33_mul_vec(&rotation_inv, &translation);
    Ok(join_transform(&rotation_inv, &[-t[0], -t[1], -t[2]]))
}

/// Compose two 3x4 transforms: the result applies `b` first, then `a`.
pub fn compose_transforms(a: &[[f64; 4]; 3], b: &[[f64; 4]; 3]) -> [[f64; 4]; 3] {
    let (ra, ta) = split_transform(a);
    let (rb, tb) = split_transform(b);
    let rotation = mat33_mul(&ra, &rb);
    let t = mat33_mul_vec(&ra, &tb);
    join_transform(&rotation, &[t[0] + ta[0], t[1] + ta[1], t[2] + ta[2]])
}

/// Take the affine 3x4 block of a 4x4 homogeneous matrix.
///
/// PRECONDITION: the last row of `matrix` is `[0, 0, 0, 1]`.
pub fn homogeneous_to_transform(matrix: &[[f64; 4]; 4]) -> [[f64; 4]; 3] {
    [matrix[0], matrix[1], matrix[2]]
}

/// Result of a symmetric 4x4 eigen decomposition.
#[derive(Debug, Clone)]
pub struct SymmetricEigen4 {
    /// Eigenvalues, in the order the solver leaves them on the diagonal.
    pub eigenvalues: [f64; 4],
    /// Eigenvectors stored column-wise: `eigenvectors[row][col]` is component
    /// `row` of the eigenvector for `eigenvalues[col]`.
    pub eigenvectors: [[f64; 4]; 4],
}

impl SymmetricEigen4 {
    /// Index of the largest eigenvalue; ties resolve to the first occurrence.
    pub fn argmax(&self) -> usize {
        let mut best = 0;
        for i in 1..4 {
            if self.eigenvalues[i] > self.eigenvalues[best] {
                best = i;
            }
        }
        best
    }

    /// Eigenvector for the eigenvalue at `index`.
    pub fn eigenvector(&self, index: usize) -> [f64; 4] {
        [
            self.eigenvectors[0][index],
            self.eigenvectors[1][index],
            self.eigenvectors[2][index],
            self.eigenvectors[3][index],
        ]
    }
}

/// Eigen decomposition of a symmetric 4x4 matrix with cyclic Jacobi rotations.
///
/// Only the upper triangle is trusted; the input is symmetrised first. The
/// sweep order is fixed, so the output is deterministic for a given input.
pub fn symmetric_eigen4(matrix: &[[f64; 4]; 4]) -> SymmetricEigen4 {
    let mut a = *matrix;
    for p in 0..4 {
        for q in (p + 1)..4 {
            a[q][p] = a[p][q];
        }
    }

    let mut v = [[0.0; 4]; 4];
    for (i, row) in v.iter_mut().enumerate() {
        row[i] = 1.0;
    }

    for _ in 0..JACOBI_MAX_SWEEPS {
        let off_diag: f64 = (0..4)
            .flat_map(|p| ((p + 1)..4).map(move |q| (p, q)))
            .map(|(p, q)| a[p][q] * a[p][q])
            .sum();
        if off_diag < JACOBI_EPS {
            break;
        }

        for p in 0..3 {
            for q in (p + 1)..4 {
                if a[p][q] == 0.0 {
                    continue;
                }
                let theta = (a[q][q] - a[p][p]) / (2.0 * a[p][q]);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for row in a.iter_mut() {
                    let (akp, akq) = (row[p], row[q]);
                    row[p] = c * akp - s * akq;
                    row[q] = s * akp + c * akq;
                }
                for k in 0..4 {
                    let (apk, aqk) = (a[p][k], a[q][k]);
                    a[p][k] = c * apk - s * aqk;
                    a[q][k] = s * apk + c * aqk;
                }
                for row in v.iter_mut() {
                    let (vkp, vkq) = (row[p], row[q]);
                    row[p] = c * vkp - s * vkq;
                    row[q] = s * vkp + c * vkq;
                }
            }
        }
    }

    SymmetricEigen4 {
        eigenvalues: [a[0][0], a[1][1], a[2][2], a[3][3]],
        eigenvectors: v,
    }
}
