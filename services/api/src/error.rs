//! services/api/src/error.rs
//!
//! Defines the primary error type for the API service and the mapping of
//! engine errors onto HTTP responses.

use crate::config::ConfigError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use timetable_core::{ConflictKind, EngineError};
use tracing::error;
use utoipa::ToSchema;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

//=========================================================================================
// HTTP Error Responses
//=========================================================================================

/// The JSON body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub message: String,
    /// Structured detail for conflicts the client renders itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

/// An engine error on its way out of a handler.
#[derive(Debug)]
pub struct HttpError(pub EngineError);

impl From<EngineError> for HttpError {
    fn from(err: EngineError) -> Self {
        HttpError(err)
    }
}

fn conflict_detail(kind: &ConflictKind) -> Option<serde_json::Value> {
    match kind {
        ConflictKind::ClassHourClash { course_code, slot } => Some(serde_json::json!({
            "kind": "class_hour_clash",
            "course": course_code,
            "slot": slot.to_string(),
        })),
        ConflictKind::ExamHourClash { course_code, exam } => Some(serde_json::json!({
            "kind": "exam_hour_clash",
            "course": course_code,
            "exam": exam.as_str(),
        })),
        ConflictKind::DuplicateSectionType {
            course_code,
            section_type,
        } => Some(serde_json::json!({
            "kind": "duplicate_section_type",
            "course": course_code,
            "type": section_type.code().to_string(),
        })),
        _ => None,
    }
}

impl HttpError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::Forbidden => StatusCode::FORBIDDEN,
            EngineError::Conflict(_) => StatusCode::CONFLICT,
            EngineError::Invalid(_) => StatusCode::BAD_REQUEST,
            EngineError::Upstream(_) => StatusCode::BAD_GATEWAY,
            EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self.0 {
            EngineError::Internal(msg) => {
                error!("Internal error while handling request: {}", msg);
                ErrorBody {
                    message: "Internal Server Error".to_string(),
                    detail: None,
                }
            }
            EngineError::Upstream(msg) => {
                error!("Search service error while handling request: {}", msg);
                ErrorBody {
                    message: "Search service unavailable".to_string(),
                    detail: None,
                }
            }
            EngineError::Conflict(kind) => ErrorBody {
                message: kind.to_string(),
                detail: conflict_detail(kind),
            },
            other => ErrorBody {
                message: other.to_string(),
                detail: None,
            },
        };
        (status, Json(body)).into_response()
    }
}
