/// Errors raised by the geometry and voxelization routines.
#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    /// The rotation block of a transform cannot be inverted.
    #[error("rotation block is singular (determinant {determinant})")]
    SingularMatrix {
        /// Determinant of the rotation block.
        determinant: f64,
    },

    /// A voxel or birdview grid geometry is inconsistent or out of range.
    #[error("invalid grid configuration: {0}")]
    InvalidVoxelConfig(String),

    /// Two buffers that must have the same length do not.
    #[error("mismatched lengths: {left_name} ({left_len}) != {right_name} ({right_len})")]
    MismatchedLengths {
        /// Label for the left-hand buffer.
        left_name: &'static str,
        /// Length of the left-hand buffer.
        left_len: usize,
        /// Label for the right-hand buffer.
        right_name: &'static str,
        /// Length of the right-hand buffer.
        right_len: usize,
    },
}
