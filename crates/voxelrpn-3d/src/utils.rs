/// Borrow a 3-vector as a faer column.
pub(crate) fn vec3_as_faer_col(vector: &[f64; 3]) -> faer::ColRef<'_, f64> {
    faer::col::from_slice(vector.as_slice())
}

/// Borrow a row-major 3x3 matrix as a faer matrix view.
pub(crate) fn mat33_as_faer(matrix: &[[f64; 3]; 3]) -> faer::MatRef<'_, f64> {
    faer::mat::from_row_major_slice(matrix.as_flattened(), 3, 3)
}

/// Borrow a slice of 3D points as a 3xN faer view, one point per column.
pub(crate) fn points_as_faer(points: &[[f64; 3]]) -> faer::MatRef<'_, f64> {
    faer::mat::from_column_major_slice(points.as_flattened(), 3, points.len())
}

/// Borrow a mutable slice of 3D points as a 3xN faer view, one point per column.
pub(crate) fn points_as_faer_mut(points: &mut [[f64; 3]]) -> faer::MatMut<'_, f64> {
    let n = points.len();
    faer::mat::from_column_major_slice_mut(points.as_flattened_mut(), 3, n)
}
