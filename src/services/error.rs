use crate::store::StoreError;
use crate::{ApiError, ErrorDetail};
use rocket::serde::json::Json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{message}")]
    InvalidInput {
        field: Option<String>,
        message: String,
    },

    #[error("{0}")]
    InternalError(String),
}

impl ServiceError {
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        ServiceError::InvalidInput {
            field: Some(field.to_string()),
            message: message.into(),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(detail) => ServiceError::Conflict(detail),
            other => ServiceError::InternalError(other.to_string()),
        }
    }
}

impl From<bcrypt::BcryptError> for ServiceError {
    fn from(err: bcrypt::BcryptError) -> Self {
        ServiceError::InternalError(format!("password hashing failed: {}", err))
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(detail) => ApiError::NotFound(Json(ErrorDetail::new(detail))),
            ServiceError::Unauthorized(detail) => ApiError::Unauthorized(Json(ErrorDetail::new(detail))),
            ServiceError::Conflict(detail) => ApiError::Conflict(Json(ErrorDetail::new(detail))),
            ServiceError::InvalidInput { field, message } => ApiError::BadRequest(Json(ErrorDetail {
                error: message,
                field,
            })),
            ServiceError::InternalError(detail) => {
                // Internals stay in the log; clients get a generic message.
                error!(%detail, "internal error");
                ApiError::InternalError(Json(ErrorDetail::new(
                    "An unexpected error occurred on the server.",
                )))
            }
        }
    }
}
