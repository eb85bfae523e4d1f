//! Application error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::content::{BuildError, ContentError, TypeError};
use crate::permalink::PermalinkError;

/// Application errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Conflict {
        message: String,
        /// A free path the caller could use instead.
        suggestion: Option<String>,
    },

    #[error("{message}")]
    Unprocessable {
        message: String,
        details: Vec<String>,
    },

    #[error("bad request: {0}")]
    BadRequest(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    suggestion: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<String>,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Unprocessable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn unprocessable(message: impl ToString) -> Self {
        AppError::Unprocessable {
            message: message.to_string(),
            details: Vec::new(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match self {
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal server error");
                ErrorBody {
                    error: "internal server error".to_string(),
                    suggestion: None,
                    details: Vec::new(),
                }
            }
            AppError::Conflict {
                message,
                suggestion,
            } => ErrorBody {
                error: message,
                suggestion,
                details: Vec::new(),
            },
            AppError::Unprocessable { message, details } => ErrorBody {
                error: message,
                suggestion: None,
                details,
            },
            other => ErrorBody {
                error: other.to_string(),
                suggestion: None,
                details: Vec::new(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<TypeError> for AppError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::NotFound(_) | TypeError::BlockNotFound(_) => {
                AppError::NotFound(err.to_string())
            }
            TypeError::DuplicateType(_) | TypeError::DuplicateBlockType(_) => AppError::Conflict {
                message: err.to_string(),
                suggestion: None,
            },
            TypeError::UnknownBlockType { .. } => AppError::unprocessable(err),
        }
    }
}

impl From<PermalinkError> for AppError {
    fn from(err: PermalinkError) -> Self {
        match err {
            PermalinkError::NotFound(_) | PermalinkError::UnknownEntity(_) => {
                AppError::NotFound(err.to_string())
            }
            PermalinkError::Conflict { .. }
            | PermalinkError::HasChildren(_)
            | PermalinkError::Busy(_) => {
                AppError::Conflict {
                    message: err.to_string(),
                    suggestion: None,
                }
            }
            PermalinkError::UnknownParent(_)
            | PermalinkError::Cycle { .. }
            | PermalinkError::InvalidSlug(_) => AppError::unprocessable(err),
            PermalinkError::Store(e) => AppError::Internal(e),
        }
    }
}

impl From<ContentError> for AppError {
    fn from(err: ContentError) -> Self {
        match err {
            ContentError::Type(e) => e.into(),
            ContentError::Permalink(e) => e.into(),
            ContentError::NotFound(_) => AppError::NotFound(err.to_string()),
            ContentError::Store(e) => AppError::Internal(e),
        }
    }
}

impl From<BuildError> for AppError {
    fn from(err: BuildError) -> Self {
        AppError::Unprocessable {
            message: format!("type build failed with {} error(s)", err.errors.len()),
            details: err.errors.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Result type alias using AppError.
pub type AppResult<T> = Result<T, AppError>;
