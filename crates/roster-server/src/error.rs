//! Pipeline error taxonomy

use axum::http::StatusCode;
use roster_common::RosterError;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Errors raised by pipeline stages and the capability backends they call.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Malformed upload or request body. Rejected before any write.
    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Object not found: s3://{bucket}/{key}")]
    ObjectNotFound { bucket: String, key: String },

    #[error("Access denied: s3://{bucket}/{key}")]
    AccessDenied { bucket: String, key: String },

    /// A conditional write found no member with this key.
    #[error("Condition failed: no member with email '{0}'")]
    ConditionFailed(String),

    /// Store, queue, mail or object-storage failure.
    #[error("Backend error: {0:#}")]
    Backend(#[from] anyhow::Error),
}

/// Coarse class of a [`SyncError`], used to pick a batch policy or a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    NotFound,
    Backend,
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Input(_) => ErrorKind::Input,
            SyncError::ObjectNotFound { .. } | SyncError::ConditionFailed(_) => ErrorKind::NotFound,
            SyncError::AccessDenied { .. } | SyncError::Backend(_) => ErrorKind::Backend,
        }
    }

    /// Status reported to synchronous callers.
    ///
    /// Only input errors are the caller's fault; a missing member on a
    /// conditional update is reported as a server-side failure.
    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Input => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound | ErrorKind::Backend => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RosterError> for SyncError {
    fn from(err: RosterError) -> Self {
        SyncError::Input(err.to_string())
    }
}
