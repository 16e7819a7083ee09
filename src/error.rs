// HTTP API Error Types
use axum::{
    extract::rejection::JsonRejection,
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

use crate::auth::validation::ValidationErrors;
use crate::database::StoreError;
use crate::services::AuthError;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    InvalidJson(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 404 Not Found
    NotFound(String),

    // 422 Unprocessable Entity
    UnprocessableEntity {
        message: String,
        field_errors: ValidationErrors,
    },

    // 429 Too Many Requests
    TooManyRequests {
        message: String,
        retry_after: u64,
    },

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidJson(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::UnprocessableEntity { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::InvalidJson(msg) => msg,
            ApiError::Unauthorized(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::UnprocessableEntity { message, .. } => message,
            ApiError::TooManyRequests { message, .. } => message,
            ApiError::InternalServerError(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        match self {
            ApiError::UnprocessableEntity { message, field_errors } => json!({
                "success": false,
                "error": message,
                "errors": field_errors,
            }),
            _ => json!({
                "success": false,
                "error": self.message(),
            }),
        }
    }
}

impl ApiError {
    pub fn invalid_json(message: impl Into<String>) -> Self {
        ApiError::InvalidJson(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Validation(field_errors) => ApiError::UnprocessableEntity {
                message: "The given data was invalid.".to_string(),
                field_errors,
            },
            AuthError::InvalidCredentials | AuthError::Unauthenticated => ApiError::unauthorized(err.to_string()),
            AuthError::LockedOut { retry_after } => ApiError::TooManyRequests {
                message: err.to_string(),
                retry_after,
            },
            AuthError::Store(store_err) => store_err.into(),
            AuthError::TokenIssue(token_err) => {
                tracing::error!("Token issue error: {}", token_err);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => {
                tracing::error!("Credential store unavailable: {}", msg);
                ApiError::service_unavailable("Service temporarily unavailable")
            }
            // Don't expose internal errors to clients
            other => {
                tracing::error!("Credential store error: {}", other);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid_json(rejection.body_text())
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let mut response = (status, Json(self.to_json())).into_response();

        match &self {
            ApiError::TooManyRequests { retry_after, .. } => {
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(*retry_after));
            }
            ApiError::Unauthorized(_) => {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            }
            _ => {}
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_become_422_with_field_map() {
        let mut errors = ValidationErrors::new();
        errors.add("email", "The email has already been taken.");

        let api_error = ApiError::from(AuthError::Validation(errors));

        assert_eq!(api_error.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            api_error.to_json(),
            json!({
                "success": false,
                "error": "The given data was invalid.",
                "errors": {"email": ["The email has already been taken."]}
            })
        );
    }

    #[test]
    fn lockout_carries_retry_after_header() {
        let response = ApiError::from(AuthError::LockedOut { retry_after: 42 }).into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }

    #[test]
    fn failed_login_is_401_with_generic_message() {
        let api_error = ApiError::from(AuthError::InvalidCredentials);

        assert_eq!(api_error.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(api_error.to_json()["error"], "These credentials do not match our records.");
    }

    #[test]
    fn store_details_are_not_leaked() {
        let api_error = ApiError::from(AuthError::Store(StoreError::Query("relation users does not exist".into())));

        assert_eq!(api_error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!api_error.message().contains("relation"));
    }

    #[test]
    fn unavailable_store_is_503() {
        let api_error = ApiError::from(StoreError::Unavailable("pool timed out".into()));
        assert_eq!(api_error.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
