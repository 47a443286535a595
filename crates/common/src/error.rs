//! Error types for folio.

use axum::{
    Json,
    extract::{
        multipart::MultipartError,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value, json};
use thiserror::Error;
use validator::ValidationErrors;

/// Application result type.
pub type AppResult<T> = Result<T, AppError>;

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // === Client Errors ===
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    /// No follow edge exists between the two users.
    #[error("{0}")]
    RelationshipNotFound(String),

    /// The caller already has an edge towards the target.
    ///
    /// `status` is the wire name of the existing relationship
    /// (`following` or `requested`).
    #[error("You are already following {username}")]
    AlreadyFollowing { username: String, status: &'static str },

    /// The operation is well-formed but not allowed in the current state.
    #[error("{0}")]
    InvalidOperation(String),

    /// The request body could not be read.
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthenticated")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid field")]
    Validation(ValidationErrors),

    /// A request field could not be decoded into its expected type.
    #[error("Invalid field")]
    InvalidField { field: String, message: String },

    // === Server Errors ===
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            // 4xx Client Errors
            Self::NotFound(_) | Self::UserNotFound(_) => StatusCode::NOT_FOUND,
            Self::RelationshipNotFound(_)
            | Self::AlreadyFollowing { .. }
            | Self::InvalidOperation(_)
            | Self::Validation(_)
            | Self::InvalidField { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,

            // 5xx Server Errors
            Self::Database(_) | Self::Storage(_) | Self::Config(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::UserNotFound(_) => "USER_NOT_FOUND",
            Self::RelationshipNotFound(_) => "RELATIONSHIP_NOT_FOUND",
            Self::AlreadyFollowing { .. } => "ALREADY_FOLLOWING",
            Self::InvalidOperation(_) => "INVALID_OPERATION",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Unauthorized => "UNAUTHENTICATED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Validation(_) | Self::InvalidField { .. } => "VALIDATION_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns whether this error should be logged at error level.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Build a validation error carrying a single field message.
    #[must_use]
    pub fn field(field: &'static str, code: &'static str, message: &str) -> Self {
        let mut errors = ValidationErrors::new();
        let mut error = validator::ValidationError::new(code);
        error.message = Some(message.to_owned().into());
        errors.add(field, error);
        Self::Validation(errors)
    }

    /// Response body for this error.
    #[must_use]
    pub fn body(&self) -> Value {
        let mut error = Map::new();
        error.insert("code".into(), json!(self.error_code()));
        error.insert("message".into(), json!(self.to_string()));

        match self {
            Self::Validation(errors) => {
                error.insert("fields".into(), field_messages(errors));
            }
            Self::InvalidField { field, message } => {
                error.insert("fields".into(), json!({ field.as_str(): [message] }));
            }
            Self::AlreadyFollowing { status, .. } => {
                error.insert("status".into(), json!(status));
            }
            _ => {}
        }

        json!({ "error": error })
    }
}

/// Flatten field errors into `{field: [message, ...]}`.
fn field_messages(errors: &ValidationErrors) -> Value {
    let fields: Map<String, Value> = errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let messages: Vec<String> = errs
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map_or_else(|| format!("The {field} field is invalid."), ToString::to_string)
                })
                .collect();
            (field.to_string(), json!(messages))
        })
        .collect();
    Value::Object(fields)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        if self.is_server_error() {
            tracing::error!(error = %self, code = code, "Server error occurred");
        } else {
            tracing::debug!(error = %self, code = code, "Client error occurred");
        }

        (status, Json(self.body())).into_response()
    }
}

// === From implementations ===

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        Self::Validation(err)
    }
}

/// Field path and cause of a decode failure, found in the error's source chain.
fn decode_failure<E>(err: &(dyn std::error::Error + 'static)) -> Option<(String, String)>
where
    E: std::error::Error + 'static,
{
    let mut source = Some(err);
    while let Some(current) = source {
        if let Some(decoded) = current.downcast_ref::<serde_path_to_error::Error<E>>() {
            return Some((decoded.path().to_string(), decoded.inner().to_string()));
        }
        source = current.source();
    }
    None
}

impl AppError {
    /// Decode failure of a single request field.
    ///
    /// `fallback` names the field when the failure is at the root.
    fn invalid_field(path: String, cause: &str, fallback: &str) -> Self {
        let field = if path == "." || path == "?" {
            fallback.to_string()
        } else {
            path
        };
        Self::InvalidField {
            message: format!("The {field} field is invalid: {cause}."),
            field,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(err) => decode_failure::<serde_json::Error>(&err)
                .map_or_else(
                    || Self::invalid_field(".".to_string(), &err.body_text(), "body"),
                    |(path, cause)| Self::invalid_field(path, &cause, "body"),
                ),
            // Syntax, content type and body read failures.
            other => Self::BadRequest(other.body_text()),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        match rejection {
            QueryRejection::FailedToDeserializeQueryString(err) => {
                decode_failure::<serde::de::value::Error>(&err).map_or_else(
                    || Self::invalid_field(".".to_string(), &err.body_text(), "query"),
                    |(path, cause)| Self::invalid_field(path, &cause, "query"),
                )
            }
            other => Self::BadRequest(other.body_text()),
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        Self::BadRequest(err.body_text())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::UserNotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::RelationshipNotFound("x".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::InvalidOperation("x".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(AppError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert!(AppError::Database("x".into()).is_server_error());
    }

    #[test]
    fn test_already_following_body_carries_status() {
        let err = AppError::AlreadyFollowing {
            username: "bob".into(),
            status: "requested",
        };
        let body = err.body();
        assert_eq!(body["error"]["code"], "ALREADY_FOLLOWING");
        assert_eq!(body["error"]["status"], "requested");
        assert_eq!(body["error"]["message"], "You are already following bob");
    }

    #[test]
    fn test_invalid_field_body_matches_validation_shape() {
        let err = AppError::invalid_field("is_private".to_string(), "expected a boolean", "body");
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = err.body();
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(
            body["error"]["fields"]["is_private"][0],
            "The is_private field is invalid: expected a boolean."
        );

        let root = AppError::invalid_field(".".to_string(), "expected a map", "body");
        assert!(root.body()["error"]["fields"]["body"].is_array());
    }

    #[test]
    fn test_validation_body_lists_fields() {
        let err = AppError::field("bio", "length", "The bio may not be greater than 500 characters.");
        let body = err.body();
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(
            body["error"]["fields"]["bio"][0],
            "The bio may not be greater than 500 characters."
        );
    }
}
