use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::errors::{StoreError, SymbolCheckError};
use crate::services::holdings_service::{FieldErrors, HoldingError};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("invalid_input")]
    Invalid(FieldErrors),

    // stable machine-readable code, e.g. "bad_id"
    #[error("{0}")]
    BadRequest(&'static str),

    #[error("not_found")]
    NotFound,

    #[error("{0}")]
    Conflict(&'static str),

    #[error(transparent)]
    Symbol(#[from] SymbolCheckError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<FieldErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Invalid(errs) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "invalid_input".into(),
                    details: Some(errs),
                    message: None,
                },
            ),
            ApiError::BadRequest(code) => (StatusCode::BAD_REQUEST, code_only(code)),
            ApiError::NotFound => (StatusCode::NOT_FOUND, code_only("not_found")),
            ApiError::Conflict(code) => (StatusCode::CONFLICT, code_only(code)),
            ApiError::Symbol(e) => (StatusCode::UNPROCESSABLE_ENTITY, code_only(e.code())),
            ApiError::Store(e) => {
                tracing::error!(error = %e, "storage failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        error: "storage_error".into(),
                        details: None,
                        message: Some(e.to_string()),
                    },
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        error: "internal_error".into(),
                        details: None,
                        message: Some(msg),
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

fn code_only(code: &str) -> ErrorBody {
    ErrorBody {
        error: code.to_string(),
        details: None,
        message: None,
    }
}

impl From<HoldingError> for ApiError {
    fn from(err: HoldingError) -> Self {
        match err {
            HoldingError::Symbol(e) => ApiError::Symbol(e),
            HoldingError::AlreadyExists => ApiError::Conflict("symbol_already_exists"),
            HoldingError::Store(e) => ApiError::Store(e),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "rejected json body");
        ApiError::BadRequest("invalid_json")
    }
}
