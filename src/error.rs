use std::{error::Error, fmt, io};

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;

use crate::learners::LearnerError;

/// The controller's result type.
pub type Result<T> = std::result::Result<T, ControllerError>;

/// Every way a request can fail once it reached the controller.
#[derive(Debug)]
pub enum ControllerError {
    /// A query parameter or the body is missing or malformed.
    BadRequest(String),
    /// No handler is wired for this task type and mode.
    UnsupportedTaskMode { task_type: String, mode: String },
    /// Pruning or persisting the record log failed.
    StorageFailure {
        what: String,
        source: io::Error,
    },
    /// A learner failed while training or testing.
    DelegateFailure(String),
}

impl ControllerError {
    pub(crate) fn storage(what: impl Into<String>, source: io::Error) -> Self {
        Self::StorageFailure {
            what: what.into(),
            source,
        }
    }

    /// Short machine readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::UnsupportedTaskMode { .. } => "unsupported_task_mode",
            Self::StorageFailure { .. } => "storage_failure",
            Self::DelegateFailure(_) => "delegate_failure",
        }
    }
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadRequest(msg) => write!(f, "bad request: {msg}"),
            Self::UnsupportedTaskMode { task_type, mode } => {
                write!(f, "unsupported task type '{task_type}' for mode '{mode}'")
            }
            Self::StorageFailure { what, source } => {
                write!(f, "storage failure while {what}: {source}")
            }
            Self::DelegateFailure(msg) => write!(f, "learner failed: {msg}"),
        }
    }
}

impl Error for ControllerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StorageFailure { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ControllerError {
    fn from(e: serde_json::Error) -> Self {
        Self::BadRequest(format!("invalid body: {e}"))
    }
}

impl From<LearnerError> for ControllerError {
    fn from(e: LearnerError) -> Self {
        Self::DelegateFailure(e.to_string())
    }
}

/// Boundary conversion into the JSON error payload.
impl ResponseError for ControllerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::UnsupportedTaskMode { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::StorageFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::DelegateFailure(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "message": "invalid request",
            "error": self.kind(),
            "detail": self.to_string(),
        }))
    }
}
