//! Detection error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::db::JobStatus;
use crate::error::ErrorResponse;

/// Errors returned by the detect endpoint
#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Image too large: {size} bytes (max: {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job {job_id} is already {status}")]
    Conflict { job_id: String, status: JobStatus },

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    Persistence(String),

    /// Store failure before the job was touched
    #[error("Database error: {0}")]
    Store(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DetectError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) | Self::PayloadTooLarge { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::ServiceUnavailable(_)
            | Self::Upstream(_)
            | Self::Persistence(_)
            | Self::Store(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<crate::error::AppError> for DetectError {
    fn from(err: crate::error::AppError) -> Self {
        Self::Store(err.to_string())
    }
}

impl IntoResponse for DetectError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            Self::Store(e) | Self::Internal(e) => {
                tracing::error!("Detection failed: {}", e);
                "An internal error occurred".to_string()
            }
            other => {
                if status.is_server_error() {
                    tracing::error!("Detection failed: {}", other);
                }
                other.to_string()
            }
        };

        (status, Json(ErrorResponse::new(message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            DetectError::PayloadTooLarge { size: 2, max: 1 }.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            DetectError::Conflict {
                job_id: "j".to_string(),
                status: JobStatus::Completed
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            DetectError::ServiceUnavailable("no key".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_conflict_message() {
        let err = DetectError::Conflict {
            job_id: "abc".to_string(),
            status: JobStatus::Processing,
        };
        assert_eq!(err.to_string(), "Job abc is already processing");
    }
}
