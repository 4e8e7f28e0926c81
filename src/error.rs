//! Error types for mesh construction and transforms.

/// Result type for mesh operations
pub type MeshResult<T> = Result<T, MeshError>;

/// Errors raised while building or applying a mesh.
///
/// All of these are detected eagerly and never recovered internally.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MeshError {
    #[error("Shape mismatch in {op}: {left:?} vs {right:?}")]
    Shape {
        op: &'static str,
        left: Vec<usize>,
        right: Vec<usize>,
    },

    #[error("Input last axis has length {actual}, mesh has {expected} units")]
    Dimension { expected: usize, actual: usize },

    #[error("Invalid permutation: {0}")]
    InvalidPermutation(String),

    #[error("Unsupported basis: {0}")]
    UnsupportedBasis(String),

    #[error("Internal (theta) {theta:?} and external (phi) phases {phi:?} differ in shape")]
    ParameterShapeMismatch { theta: Vec<usize>, phi: Vec<usize> },

    #[error("Invalid mesh configuration: {0}")]
    Config(String),
}

impl MeshError {
    pub(crate) fn shape(op: &'static str, left: &[usize], right: &[usize]) -> Self {
        MeshError::Shape {
            op,
            left: left.to_vec(),
            right: right.to_vec(),
        }
    }
}

impl From<serde_json::Error> for MeshError {
    fn from(err: serde_json::Error) -> Self {
        MeshError::Config(err.to_string())
    }
}

impl From<std::io::Error> for MeshError {
    fn from(err: std::io::Error) -> Self {
        MeshError::Config(err.to_string())
    }
}
