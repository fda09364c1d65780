//! HTTP error responses
//!
//! Every failure leaves the service as a JSON [`ErrorResponse`] whose
//! `error` field is `<service>.<ERROR_CODE>`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use consumers_store::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

/// Service name used as prefix of error codes
pub const SERVICE_NAME: &str = env!("CARGO_PKG_NAME");

/// Body of every error response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(rename = "httpCode")]
    pub http_code: u16,
    #[serde(rename = "httpError")]
    pub http_error: String,
    pub error: String,
    #[serde(rename = "errorName")]
    pub error_name: String,
    #[serde(rename = "errorDescription")]
    pub error_description: String,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("request carries no usable authorization information")]
    Unauthorized,

    #[error("request is missing the scope '{0}'")]
    MissingScope(String),

    #[error("invalid query parameter: {0}")]
    InvalidQueryParameter(String),

    #[error("invalid path parameter: {0}")]
    InvalidPathParameter(String),

    #[error("unprocessable request body: {0}")]
    UnprocessableEntity(String),

    #[error("no consumer with id {0}")]
    NoSuchConsumer(String),

    #[error("unique constraint violated: {0}")]
    UniqueConstraintViolation(String),

    #[error("database query failed: {0}")]
    DatabaseQuery(String),

    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("unknown data domain: {0}")]
    UnknownDataDomain(String),

    #[error("response could not be captured: {0}")]
    ResponseCapture(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::MissingScope(_) => StatusCode::FORBIDDEN,
            ApiError::InvalidQueryParameter(_) | ApiError::InvalidPathParameter(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NoSuchConsumer(_) => StatusCode::NOT_FOUND,
            ApiError::UniqueConstraintViolation(_) => StatusCode::CONFLICT,
            ApiError::DependencyUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::DatabaseQuery(_)
            | ApiError::UnknownDataDomain(_)
            | ApiError::ResponseCapture(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "UNAUTHORIZED_REQUEST",
            ApiError::MissingScope(_) => "SCOPE_MISSING",
            ApiError::InvalidQueryParameter(_) => "INVALID_QUERY_PARAMETER",
            ApiError::InvalidPathParameter(_) => "INVALID_PATH_PARAMETER",
            ApiError::UnprocessableEntity(_) => "UNPROCESSABLE_ENTITY",
            ApiError::NoSuchConsumer(_) => "NO_SUCH_CONSUMER",
            ApiError::UniqueConstraintViolation(_) => "UNIQUE_CONSTRAINT_VIOLATION",
            ApiError::DatabaseQuery(_) => "DATABASE_QUERY_ERROR",
            ApiError::DependencyUnavailable(_) => "DEPENDENCY_UNAVAILABLE",
            ApiError::UnknownDataDomain(_) => "UNKNOWN_DATA_DOMAIN",
            ApiError::ResponseCapture(_) => "RESPONSE_CAPTURE_FAILED",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "Unauthorized Request",
            ApiError::MissingScope(_) => "Forbidden",
            ApiError::InvalidQueryParameter(_) => "Invalid Query Parameter",
            ApiError::InvalidPathParameter(_) => "Invalid Path Parameter",
            ApiError::UnprocessableEntity(_) => "Unprocessable Entity",
            ApiError::NoSuchConsumer(_) => "No Such Consumer",
            ApiError::UniqueConstraintViolation(_) => "Unique Constraint Violation",
            ApiError::DatabaseQuery(_) => "Database Query Error",
            ApiError::DependencyUnavailable(_) => "Dependency Unavailable",
            ApiError::UnknownDataDomain(_) => "Unknown Data Domain",
            ApiError::ResponseCapture(_) => "Response Capture Failed",
        }
    }

    fn description(&self) -> String {
        match self {
            ApiError::Unauthorized => {
                "The resource you tried to access requires authorization. Please check your request"
                    .to_string()
            }
            ApiError::MissingScope(scope) => format!(
                "You tried to access a resource which is protected by the scope '{}'. \
                 Your authorization information did not contain the required scope.",
                scope
            ),
            // Backend failures are logged, not echoed to clients
            ApiError::DatabaseQuery(_) => {
                "The database query needed to answer this request failed".to_string()
            }
            ApiError::DependencyUnavailable(_) => {
                "A backing service needed to answer this request is unreachable".to_string()
            }
            ApiError::UnknownDataDomain(_) | ApiError::ResponseCapture(_) => {
                "The service is unable to answer this request".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn to_error_response(&self) -> ErrorResponse {
        let status = self.status();
        ErrorResponse {
            http_code: status.as_u16(),
            http_error: status.canonical_reason().unwrap_or_default().to_string(),
            error: format!("{}.{}", SERVICE_NAME, self.code()),
            error_name: self.title().to_string(),
            error_description: self.description(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status().is_server_error() {
            error!("Request failed: {}", self);
        }
        (self.status(), Json(self.to_error_response())).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UnknownDomain(domain) => ApiError::UnknownDataDomain(domain),
            StoreError::UniqueViolation(message) => ApiError::UniqueConstraintViolation(message),
            e if e.is_unavailable() => ApiError::DependencyUnavailable(e.to_string()),
            e => ApiError::DatabaseQuery(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_shape() {
        let body = ApiError::MissingScope("water-usage:consumers".into()).to_error_response();
        assert_eq!(body.http_code, 403);
        assert_eq!(body.http_error, "Forbidden");
        assert_eq!(body.error, "consumers.SCOPE_MISSING");

        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("httpCode").is_some());
        assert!(json.get("errorDescription").is_some());
    }

    #[test]
    fn test_store_error_mapping() {
        let unavailable: ApiError = StoreError::CacheError("connection refused".into()).into();
        assert_eq!(unavailable.status(), StatusCode::SERVICE_UNAVAILABLE);

        let unknown: ApiError = StoreError::UnknownDomain("water_usage".into()).into();
        assert_eq!(unknown.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(unknown.code(), "UNKNOWN_DATA_DOMAIN");

        let duplicate: ApiError = StoreError::UniqueViolation("name".into()).into();
        assert_eq!(duplicate.status(), StatusCode::CONFLICT);

        let query: ApiError = StoreError::QueryError("syntax".into()).into();
        assert_eq!(query.code(), "DATABASE_QUERY_ERROR");
    }

    #[test]
    fn test_backend_details_are_not_exposed() {
        let body = ApiError::DatabaseQuery("password authentication failed".into())
            .to_error_response();
        assert!(!body.error_description.contains("password"));
    }
}
