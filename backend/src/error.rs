use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, warn};

use crate::config;
use crate::response;

/// Failure taxonomy for the request pipeline.
///
/// Every handler returns `Result<_, AppError>`, so all failure paths funnel
/// through the single `IntoResponse` impl below and come out as the same
/// error envelope. Storage errors convert via `From<sqlx::Error>`, which
/// splits store-reported constraint violations from everything else.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or missing identifier or required input.
    #[error("{0}")]
    InvalidArgument(String),
    /// One or more field rules failed; carries the field -> message map.
    #[error("Validation failed")]
    ValidationFailed(BTreeMap<String, String>),
    #[error("{0}")]
    NotFound(String),
    #[error("Email already in use")]
    DuplicateEmail,
    #[error("User with ID {0} already has an address")]
    AddressAlreadyExists(i64),
    /// The store itself rejected the write; the payload is the store's own
    /// message.
    #[error("Validation Error")]
    StorageConstraintViolation(String),
    #[error("Internal Server Error")]
    Unhandled(#[source] sqlx::Error),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() || db.is_check_violation() => {
                AppError::StorageConstraintViolation(db.message().to_string())
            }
            _ => AppError::Unhandled(err),
        }
    }
}

impl AppError {
    /// Unhandled errors expose their detail in development mode only.
    fn stack_detail(&self, development: bool) -> Option<String> {
        match self {
            AppError::Unhandled(source) if development => Some(format!("{source:?}")),
            _ => None,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidArgument(_)
            | AppError::ValidationFailed(_)
            | AppError::DuplicateEmail
            | AppError::AddressAlreadyExists(_)
            | AppError::StorageConstraintViolation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unhandled(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Every failure is logged before it is rendered; nothing is swallowed.
        match &self {
            AppError::Unhandled(source) => error!("Unhandled error: {source:?}"),
            AppError::StorageConstraintViolation(detail) => {
                warn!("Store rejected write: {detail}")
            }
            other => warn!("Request failed ({}): {other}", status.as_u16()),
        }

        let errors = match &self {
            AppError::ValidationFailed(fields) => serde_json::to_value(fields).ok(),
            AppError::StorageConstraintViolation(detail) => Some(Value::String(detail.clone())),
            _ => None,
        };

        let stack = self.stack_detail(config::is_development());

        response::error(status, &self.to_string(), errors, stack)
    }
}
