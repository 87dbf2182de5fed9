use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use recond_core::ReconError;
use serde_json::json;
use std::fmt;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // The dashboard surfaces this string verbatim in a toast.
        let body = Json(json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

impl From<ReconError> for AppError {
    fn from(err: ReconError) -> Self {
        let message = err.to_string();
        match err {
            ReconError::InvalidProjectName(_)
            | ReconError::UnknownScopeKind(_)
            | ReconError::EmptyTarget
            | ReconError::EmptySelection
            | ReconError::UnknownModule(_) => Self::bad_request(message),
            ReconError::ProjectExists(_)
            | ReconError::DuplicateTarget(_)
            | ReconError::AlreadyRunning(_)
            | ReconError::NotRunning(_)
            | ReconError::NotPaused(_)
            | ReconError::NotActive(_) => Self::conflict(message),
            ReconError::ProjectNotFound(_) | ReconError::TargetNotFound(_) => {
                Self::not_found(message)
            }
            ReconError::Io(_) => Self::internal(message),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err.to_string())
    }
}
