use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use shared::Pagination;

#[derive(Serialize)]
struct SuccessBody<T> {
    status: &'static str,
    message: String,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pagination: Option<Pagination>,
}

#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stack: Option<String>,
}

/// Standard success envelope: `{status:"success", message, data}`.
pub fn success<T: Serialize>(status: StatusCode, message: &str, data: T) -> Response {
    (
        status,
        Json(SuccessBody {
            status: "success",
            message: message.to_string(),
            data,
            pagination: None,
        }),
    )
        .into_response()
}

/// Success envelope with pagination metadata attached. Always 200.
pub fn paginated<T: Serialize>(message: &str, data: Vec<T>, pagination: Pagination) -> Response {
    (
        StatusCode::OK,
        Json(SuccessBody {
            status: "success",
            message: message.to_string(),
            data,
            pagination: Some(pagination),
        }),
    )
        .into_response()
}

/// Standard error envelope: `{status:"error", message, errors?, stack?}`.
/// This is the only place error responses are shaped.
pub fn error(status: StatusCode, message: &str, errors: Option<Value>, stack: Option<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            status: "error",
            message: message.to_string(),
            errors,
            stack,
        }),
    )
        .into_response()
}
