use thiserror::Error;

/// Outcomes a caller must be able to tell apart: bad input, no face in the
/// frame, a collaborator (detector/model) failure, and persistence trouble.
#[derive(Debug, Error)]
pub enum FaceError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("no face detected")]
    NoFaceDetected,
    #[error("processing failed: {0}")]
    ProcessingFailed(String),
    #[error("identity not found: {0}")]
    NotFound(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl FaceError {
    /// Stable machine-readable kind, used by the HTTP adapter.
    pub fn kind(&self) -> &'static str {
        match self {
            FaceError::InvalidArgument(_) => "invalid_argument",
            FaceError::NoFaceDetected => "no_face_detected",
            FaceError::ProcessingFailed(_) => "processing_failed",
            FaceError::NotFound(_) => "not_found",
            FaceError::Storage(_) => "storage",
        }
    }

    pub(crate) fn processing(context: &str, err: anyhow::Error) -> Self {
        FaceError::ProcessingFailed(format!("{}: {:#}", context, err))
    }

    pub(crate) fn storage(context: &str, err: anyhow::Error) -> Self {
        FaceError::Storage(format!("{}: {:#}", context, err))
    }
}

pub type FaceResult<T> = Result<T, FaceError>;
