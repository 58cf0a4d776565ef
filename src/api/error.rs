use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::codec::ParseError;
use crate::domain::FieldIssue;
use crate::hardware::DeviceError;
use crate::repo::RepoError;

/// API error types that can be returned from handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation failed for {} field(s)", .0.len())]
    Validation(Vec<FieldIssue>),

    #[error("Import rejected: {0}")]
    Parse(ParseError),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Device error: {0}")]
    Device(String),

    #[error("Forecast unavailable: {0}")]
    Forecast(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

/// Error response that gets serialized to JSON
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl ApiError {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::Validation(_) | ApiError::Parse(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Device(_) | ApiError::Forecast(_) => StatusCode::BAD_GATEWAY,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error type string
    fn error_type(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NotFound",
            ApiError::BadRequest(_) => "BadRequest",
            ApiError::Validation(_) => "ValidationError",
            ApiError::Parse(_) => "ParseError",
            ApiError::Conflict(_) => "Conflict",
            ApiError::Device(_) => "DeviceError",
            ApiError::Forecast(_) => "ForecastUnavailable",
            ApiError::InternalError(_) => "InternalServerError",
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            ApiError::Validation(issues) => serde_json::to_value(issues).ok(),
            ApiError::Parse(err) => serde_json::to_value(err).ok(),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_type = self.error_type();

        let message = match &self {
            ApiError::InternalError(_) => {
                tracing::error!(error = %self, "API error occurred");
                "An internal error occurred".to_string()
            }
            ApiError::Device(_) | ApiError::Forecast(_) => {
                tracing::warn!(error = %self, "Upstream call failed");
                self.to_string()
            }
            _ => {
                tracing::debug!(error = %self, "Client error");
                self.to_string()
            }
        };

        let error_response = ErrorResponse {
            error: error_type.to_string(),
            message,
            details: self.details(),
        };

        (status, Json(error_response)).into_response()
    }
}

// Conversion from common error types

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        ApiError::InternalError(error.to_string())
    }
}

impl From<RepoError> for ApiError {
    fn from(error: RepoError) -> Self {
        match error {
            RepoError::NotFound(_) => ApiError::NotFound(error.to_string()),
            RepoError::Conflict(_) => ApiError::Conflict(error.to_string()),
            RepoError::ImportLimit { .. } => ApiError::BadRequest(error.to_string()),
        }
    }
}

impl From<DeviceError> for ApiError {
    fn from(error: DeviceError) -> Self {
        match error {
            DeviceError::UnknownSite(_) => ApiError::NotFound(error.to_string()),
            _ => ApiError::Device(error.to_string()),
        }
    }
}

impl From<ParseError> for ApiError {
    fn from(error: ParseError) -> Self {
        ApiError::Parse(error)
    }
}

impl From<MultipartError> for ApiError {
    fn from(error: MultipartError) -> Self {
        ApiError::BadRequest(format!("Invalid multipart upload: {error}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            ApiError::NotFound("test".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Validation(vec![]).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Device("offline".to_string()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::Forecast("no data".to_string()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::InternalError("test".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_conversions() {
        let id = Uuid::nil();
        assert!(matches!(ApiError::from(RepoError::NotFound(id)), ApiError::NotFound(_)));
        assert!(matches!(ApiError::from(RepoError::Conflict(id)), ApiError::Conflict(_)));
        assert!(matches!(
            ApiError::from(DeviceError::UnknownSite("x".into())),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from(DeviceError::Communication("x".into())),
            ApiError::Device(_)
        ));
    }

    #[test]
    fn test_validation_details_are_itemised() {
        let err = ApiError::Validation(vec![
            FieldIssue::new("name", "Schedule name cannot be blank."),
            FieldIssue::new("endTime", "Start and end time must differ."),
        ]);
        let details = err.details().unwrap();
        assert_eq!(details[0]["field"], "name");
        assert_eq!(details[1]["field"], "endTime");
        assert_eq!(err.to_string(), "Validation failed for 2 field(s)");
    }
}
