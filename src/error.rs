// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::HashMap;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },
    /// Rejected upload with a hint on how to fix it
    Rejected { message: String, hint: String },

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 429 Too Many Requests
    TooManyRequests(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 502 Bad Gateway (Azure / Kudu said no)
    BadGateway { message: String, details: Option<Value> },

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError { .. } => 400,
            ApiError::Rejected { .. } => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::TooManyRequests(_) => 429,
            ApiError::InternalServerError(_) => 500,
            ApiError::BadGateway { .. } => 502,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::Rejected { message, .. } => message,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::TooManyRequests(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::BadGateway { message, .. } => message,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "success": false,
            "message": self.message(),
            "code": self.error_code()
        });

        match self {
            ApiError::ValidationError { field_errors: Some(field_errors), .. } => {
                body["field_errors"] = json!(field_errors);
            }
            ApiError::Rejected { hint, .. } => {
                body["hint"] = json!(hint);
            }
            ApiError::BadGateway { details: Some(details), .. } => {
                body["error"] = details.clone();
            }
            _ => {}
        }

        body
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::Rejected { .. } => "VALIDATION_ERROR",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::TooManyRequests(_) => "TOO_MANY_REQUESTS",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::BadGateway { .. } => "BAD_GATEWAY",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(
        message: impl Into<String>,
        field_errors: Option<HashMap<String, String>>,
    ) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors,
        }
    }

    /// Single-field validation failure
    pub fn invalid_field(field: &str, problem: impl Into<String>) -> Self {
        let mut field_errors = HashMap::new();
        field_errors.insert(field.to_string(), problem.into());
        ApiError::validation_error("Invalid request body", Some(field_errors))
    }

    pub fn rejected(message: impl Into<String>, hint: impl Into<String>) -> Self {
        ApiError::Rejected {
            message: message.into(),
            hint: hint.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        ApiError::TooManyRequests(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn bad_gateway(message: impl Into<String>, details: Option<Value>) -> Self {
        ApiError::BadGateway {
            message: message.into(),
            details,
        }
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }

    /// Re-label an upstream failure with the operation that hit it, keeping its details
    pub fn context(self, message: impl Into<String>) -> Self {
        match self {
            ApiError::BadGateway { details, .. } => ApiError::BadGateway {
                message: message.into(),
                details,
            },
            other => other,
        }
    }
}

// Convert other error types to ApiError
impl From<crate::database::DatabaseError> for ApiError {
    fn from(err: crate::database::DatabaseError) -> Self {
        use crate::database::DatabaseError;
        match err {
            DatabaseError::NotFound(msg) => ApiError::not_found(msg),
            DatabaseError::Conflict(msg) => ApiError::conflict(msg),
            DatabaseError::ConfigMissing(_) | DatabaseError::InvalidDatabaseUrl => {
                tracing::error!("Database misconfigured: {}", err);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            DatabaseError::Sqlx(sqlx_err) => {
                // Log the real error but return generic message
                tracing::error!("SQLx error: {}", sqlx_err);
                ApiError::internal_server_error("Database error occurred")
            }
            DatabaseError::Migration(msg) => {
                tracing::error!("Migration error: {}", msg);
                ApiError::service_unavailable("Service is being updated, please try again later")
            }
        }
    }
}

impl From<crate::azure::AzureError> for ApiError {
    fn from(err: crate::azure::AzureError) -> Self {
        use crate::azure::AzureError;
        match err {
            AzureError::Api { status, body } => {
                tracing::error!("Azure API returned {}: {}", status, body);
                ApiError::bad_gateway(format!("Azure request failed ({})", status), Some(body))
            }
            AzureError::RateLimited { attempts } => {
                tracing::warn!("Azure rate limit persisted after {} attempts", attempts);
                ApiError::too_many_requests("Too many retries (429 rate limited)")
            }
            AzureError::Http(e) => {
                tracing::error!("Azure transport error: {}", e);
                ApiError::bad_gateway("Could not reach Azure", Some(json!(e.to_string())))
            }
            AzureError::InvalidResponse(msg) => {
                tracing::error!("Unexpected Azure response: {}", msg);
                ApiError::bad_gateway("Unexpected response from Azure", Some(json!(msg)))
            }
            AzureError::UnhandledState(state) => {
                ApiError::internal_server_error(format!("Unhandled app state: {}", state))
            }
        }
    }
}

impl From<crate::auth::JwtError> for ApiError {
    fn from(err: crate::auth::JwtError) -> Self {
        tracing::error!("Session token error: {}", err);
        ApiError::internal_server_error("Server configuration error")
    }
}

impl From<crate::auth::PasswordError> for ApiError {
    fn from(err: crate::auth::PasswordError) -> Self {
        tracing::error!("Password hashing error: {}", err);
        ApiError::internal_server_error("An unexpected error occurred")
    }
}

impl From<crate::services::bundle::BundleError> for ApiError {
    fn from(err: crate::services::bundle::BundleError) -> Self {
        ApiError::rejected("Validation failed.", err.to_string())
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
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_gateway_carries_upstream_body() {
        let err = ApiError::bad_gateway("Zip deploy failed", Some(json!({"Message": "boom"})));
        assert_eq!(err.status_code(), 502);
        let body = err.to_json();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Zip deploy failed");
        assert_eq!(body["error"]["Message"], "boom");
    }

    #[test]
    fn context_only_relabels_upstream_errors() {
        let err = ApiError::bad_gateway("Azure request failed (409)", Some(json!("x"))).context("Failed to create Linux Web App.");
        assert_eq!(err.message(), "Failed to create Linux Web App.");

        let err = ApiError::not_found("App not found").context("ignored");
        assert_eq!(err.message(), "App not found");
    }

    #[test]
    fn rejected_bundle_has_hint() {
        let err = ApiError::rejected("Validation failed.", "Missing `package.json`.");
        assert_eq!(err.status_code(), 400);
        let body = err.to_json();
        assert_eq!(body["message"], "Validation failed.");
        assert_eq!(body["hint"], "Missing `package.json`.");
    }

    #[test]
    fn validation_error_lists_fields() {
        let err = ApiError::invalid_field("email", "Invalid email address");
        let body = err.to_json();
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["field_errors"]["email"], "Invalid email address");
    }
}
