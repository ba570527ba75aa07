//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Field name to the list of problems found with it.
///
/// Serialized as `{"amount": ["Contribution should be within NGN100 and NGN9.9m"]}`.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Application-wide error type.
///
/// Each variant maps to a specific HTTP status code and error message.
///
/// # Error Categories
///
/// - **Database Errors**: Any sqlx::Error from database operations
/// - **Authentication Errors**: Missing or unknown session token, bad webhook signature
/// - **Resource Errors**: Requested resources not found
/// - **Business Logic Errors**: Operations that violate ledger rules
/// - **Validation Errors**: Invalid request data, optionally per field
/// - **Upstream Errors**: The banking API refused or failed a transfer
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Session token is missing, invalid, or revoked.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Authentication credentials were not provided or are invalid")]
    Unauthorized,

    /// Webhook signature did not verify for either gateway.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("You're not permitted to access this resource")]
    InvalidSignature,

    /// Requested resource does not exist or doesn't belong to the caller.
    ///
    /// Returns HTTP 404 Not Found. The `&'static str` names the resource.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Not-found reported against a request field, e.g. an unknown `tudo_code`.
    ///
    /// Returns HTTP 404 with a `fields` map.
    #[error("Resource not found")]
    FieldNotFound(FieldErrors),

    /// The tudo is locked by an in-flight withdrawal.
    ///
    /// Returns HTTP 409 Conflict so payment gateways redeliver later.
    #[error("{0}")]
    Conflict(String),

    /// Wallet has insufficient balance for the requested operation.
    ///
    /// Returns HTTP 422 Unprocessable Entity.
    #[error("{0}")]
    InsufficientBalance(String),

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("{0}")]
    InvalidRequest(String),

    /// Request body failed field-level validation.
    ///
    /// Returns HTTP 400 Bad Request with a `fields` map.
    #[error("Validation failed")]
    Validation(FieldErrors),

    /// Bank transfer failed or the banking API is unavailable.
    ///
    /// Returns HTTP 503 Service Unavailable.
    #[error("{0}")]
    ServiceUnavailable(String),

    /// A payload we produced or stored could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// Single-field validation error.
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.into()]);
        AppError::Validation(errors)
    }

    /// Single-field not-found error.
    pub fn field_not_found(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.into()]);
        AppError::FieldNotFound(errors)
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::InvalidSignature => (StatusCode::FORBIDDEN, "invalid_signature"),
            AppError::NotFound(_) | AppError::FieldNotFound(_) => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            AppError::InsufficientBalance(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "insufficient_balance")
            }
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            AppError::ServiceUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable")
            }
            AppError::Database(_) | AppError::Serialization(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        }
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "error": {
///     "code": "validation_error",
///     "message": "Validation failed",
///     "fields": { "amount": ["Contribution should be within NGN100 and NGN9.9m"] }
///   }
/// }
/// ```
///
/// `fields` is only present for field-level errors. Internal errors never leak details.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let body = match self {
            AppError::Validation(ref fields) | AppError::FieldNotFound(ref fields) => json!({
                "error": {
                    "code": code,
                    "message": self.to_string(),
                    "fields": fields
                }
            }),
            AppError::Database(ref e) => {
                tracing::error!("database error: {e}");
                json!({
                    "error": {
                        "code": code,
                        "message": "An internal error occurred"
                    }
                })
            }
            AppError::Serialization(ref e) => {
                tracing::error!("serialization error: {e}");
                json!({
                    "error": {
                        "code": code,
                        "message": "An internal error occurred"
                    }
                })
            }
            _ => json!({
                "error": {
                    "code": code,
                    "message": self.to_string()
                }
            }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(error: AppError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn field_errors_are_reported_per_field() {
        let (status, body) =
            body_json(AppError::field("amount", "Contribution should be within NGN100 and NGN9.9m"))
                .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "validation_error");
        assert_eq!(
            body["error"]["fields"]["amount"][0],
            "Contribution should be within NGN100 and NGN9.9m"
        );
    }

    #[tokio::test]
    async fn database_errors_hide_details() {
        let (status, body) = body_json(AppError::Database(sqlx::Error::PoolTimedOut)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["message"], "An internal error occurred");
    }

    #[tokio::test]
    async fn conflict_maps_to_409() {
        let (status, _) = body_json(AppError::Conflict("locked".into())).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn unknown_tudo_code_is_404_with_field() {
        let (status, body) =
            body_json(AppError::field_not_found("tudo_code", "Tudo not found")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["fields"]["tudo_code"][0], "Tudo not found");
    }
}
