use voxelrpn_3d::GeometryError;

/// Errors raised while preparing detector targets.
#[derive(Debug, thiserror::Error)]
pub enum RpnError {
    /// The configuration is inconsistent.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A class name outside the fixed enumeration.
    #[error("unknown object class {0:?}")]
    UnknownClass(String),

    /// A geometry routine failed.
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    /// A flat buffer does not have the expected number of values.
    #[error("shape mismatch: expected {expected} values, got {actual}")]
    ShapeMismatch {
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// The JSON configuration could not be parsed.
    #[error("failed to parse configuration")]
    Json(#[from] serde_json::Error),

    /// The configuration file could not be read.
    #[error("failed to read configuration")]
    Io(#[from] std::io::Error),
}
