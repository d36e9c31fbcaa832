use axum::extract::FromRequest;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use storefront_auth::{AuthError, AuthzError, PasswordHashError, TokenError};
use storefront_core::{DomainError, FieldErrors, StoreError};
use storefront_orders::OrderError;

/// Every failure a handler can surface, with its HTTP mapping.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    /// The request body was not valid JSON for the endpoint.
    #[error("malformed request body: {0}")]
    MalformedBody(String),

    #[error("Authentication credentials were not provided.")]
    NotAuthenticated,

    #[error("{0}")]
    AuthenticationFailed(String),

    #[error("Not found.")]
    NotFound,

    #[error("{0}")]
    Conflict(String),

    /// Logged in full, reported to the client without detail.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            ApiError::MalformedBody(_) => (StatusCode::BAD_REQUEST, "parse_error"),
            ApiError::NotAuthenticated => (StatusCode::UNAUTHORIZED, "not_authenticated"),
            ApiError::AuthenticationFailed(_) => (StatusCode::UNAUTHORIZED, "authentication_failed"),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        match self {
            ApiError::Validation(fields) => (
                status,
                axum::Json(json!({
                    "error": code,
                    "message": "Invalid input.",
                    "fields": fields,
                })),
            )
                .into_response(),
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "request failed");
                json_error(status, code, "Internal server error.")
            }
            other => json_error(status, code, other.to_string()),
        }
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

impl From<FieldErrors> for ApiError {
    fn from(value: FieldErrors) -> Self {
        ApiError::Validation(value)
    }
}

impl From<DomainError> for ApiError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(fields) => ApiError::Validation(fields),
            // Ids only reach the domain from URL paths: an unparseable id
            // names no resource.
            DomainError::InvalidId(_) | DomainError::NotFound => ApiError::NotFound,
            DomainError::Conflict(msg) => ApiError::Conflict(msg),
            DomainError::InvariantViolation(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Constraint(msg) => ApiError::Conflict(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<OrderError> for ApiError {
    fn from(value: OrderError) -> Self {
        match value {
            OrderError::Domain(e) => e.into(),
            OrderError::Store(e) => e.into(),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(value: AuthzError) -> Self {
        match value {
            AuthzError::Unauthenticated => ApiError::NotAuthenticated,
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(value: AuthError) -> Self {
        ApiError::AuthenticationFailed(value.to_string())
    }
}

impl From<TokenError> for ApiError {
    fn from(value: TokenError) -> Self {
        match value {
            TokenError::Encoding(msg) => ApiError::Internal(msg),
            _ => ApiError::AuthenticationFailed("Token is invalid or expired".to_string()),
        }
    }
}

impl From<PasswordHashError> for ApiError {
    fn from(value: PasswordHashError) -> Self {
        ApiError::Internal(value.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(value: JsonRejection) -> Self {
        ApiError::MalformedBody(value.body_text())
    }
}

/// `axum::Json` whose rejection is reported as a 400 `ApiError`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);
