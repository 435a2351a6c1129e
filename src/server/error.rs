//! HTTP error responses.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::inference::backend::BackendError;

/// Request failures. All of them are reported to the caller as 400.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request")]
    InvalidRequest,

    #[error("{0}")]
    MalformedBody(String),

    #[error("no messages provided")]
    NoMessages,

    #[error("no prompt provided")]
    NoPrompt,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::MissingJsonContentType(_) => Self::InvalidRequest,
            other => Self::MalformedBody(other.body_text()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Backend(e) = &self {
            warn!(error = %e, "Backend call failed");
        }

        let body = ErrorBody {
            error: self.to_string(),
        };
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}
