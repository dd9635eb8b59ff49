use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

/// Errors returned by the face-learning core.
#[derive(Debug, Error)]
pub enum FaceError {
    #[error("no identity with uuid {0}")]
    NotFound(Uuid),

    #[error("persistence failed for {}: {reason}", path.display())]
    Persistence { path: PathBuf, reason: String },

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("invalid palette: {0}")]
    InvalidPalette(String),
}

impl FaceError {
    pub(crate) fn persistence(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        FaceError::Persistence {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T, E = FaceError> = std::result::Result<T, E>;
