//! Uniform response envelope: success bodies carry `{data, message?}`,
//! paginated bodies add `meta`, and failures collapse into
//! `{message, errors?}` with a status code per failure kind.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use tracing::error;

use fieldops_core::errors::{DomainError, ValidationErrors};
use fieldops_db::repositories::RepositoryError;
use fieldops_db::PageMeta;

#[derive(Debug, Serialize)]
pub struct SuccessBody<T: Serialize> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaginatedBody<T: Serialize> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

pub fn ok<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(SuccessBody { data, message: None })).into_response()
}

pub fn ok_with_message<T: Serialize>(data: T, message: &str) -> Response {
    (StatusCode::OK, Json(SuccessBody { data, message: Some(message.to_string()) }))
        .into_response()
}

pub fn created<T: Serialize>(data: T, message: &str) -> Response {
    (StatusCode::CREATED, Json(SuccessBody { data, message: Some(message.to_string()) }))
        .into_response()
}

pub fn paginated<T: Serialize>(data: Vec<T>, meta: PageMeta) -> Response {
    (StatusCode::OK, Json(PaginatedBody { data, meta })).into_response()
}

/// Failure taxonomy of the API. Every handler error funnels through this
/// type so the envelope and status codes stay uniform.
#[derive(Debug)]
pub enum ApiError {
    Validation(ValidationErrors),
    NotFound(String),
    Conflict(String),
    Unavailable(&'static str),
    Internal(String),
}

impl ApiError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(field, message);
        Self::Validation(errors)
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Conflict(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unavailable(_) => StatusCode::NOT_IMPLEMENTED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<ValidationErrors>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::Validation(errors) => {
                ErrorBody { message: "Validation error".to_string(), errors: Some(errors) }
            }
            Self::NotFound(message) | Self::Conflict(message) => {
                ErrorBody { message, errors: None }
            }
            Self::Unavailable(feature) => {
                ErrorBody { message: format!("{feature} is not implemented"), errors: None }
            }
            Self::Internal(message) => {
                error!(
                    event_name = "api.request.internal_error",
                    error = %message,
                    "request failed with an internal error"
                );
                ErrorBody { message, errors: None }
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<RepositoryError> for ApiError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound { entity } => Self::NotFound(format!("{entity} not found")),
            RepositoryError::Domain(DomainError::Validation(errors)) => Self::Validation(errors),
            RepositoryError::Domain(domain) => Self::Conflict(domain.to_string()),
            RepositoryError::Database(source) => Self::Internal(source.to_string()),
            RepositoryError::Decode(message) => Self::Internal(message),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::Validation(errors) => Self::Validation(errors),
            other => Self::Conflict(other.to_string()),
        }
    }
}
