use thiserror::Error;
use actix_web::{ResponseError, HttpResponse, http::StatusCode};
use serde_json::json;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable kind carried in every error response body.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Auth(_) => "unauthenticated",
            AppError::Validation(_) => "validation",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Upstream(_) => "upstream",
            AppError::Database(DatabaseError::NotFound) => "not_found",
            AppError::Database(DatabaseError::Duplicate) => "conflict",
            AppError::Database(_) => "internal",
            AppError::Config(_) | AppError::Internal(_) => "internal",
        }
    }

    /// Message safe to surface to clients. Upstream provider responses may
    /// carry secrets, so they are never echoed verbatim.
    fn client_message(&self) -> String {
        match self {
            AppError::Upstream(UpstreamError::Completion(_)) => {
                "completion provider request failed".to_string()
            }
            AppError::Upstream(UpstreamError::Billing(_)) => {
                "billing provider request failed".to_string()
            }
            AppError::Database(DatabaseError::NotFound) => "record not found".to_string(),
            AppError::Database(DatabaseError::Duplicate) => "duplicate record".to_string(),
            AppError::Database(_) | AppError::Config(_) | AppError::Internal(_) => {
                "internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

// Implement conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

// Implement conversion from sqlx::Error
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::Database(DatabaseError::NotFound),
            sqlx::Error::Database(e) if e.is_unique_violation() => {
                AppError::Database(DatabaseError::Duplicate)
            }
            _ => AppError::Database(DatabaseError::QueryError(err.to_string())),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let response = json!({
            "error": {
                "kind": self.kind(),
                "message": self.client_message()
            }
        });
        HttpResponse::build(status).json(response)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(DatabaseError::NotFound) => StatusCode::NOT_FOUND,
            AppError::Database(DatabaseError::Duplicate) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("No authorization token provided")]
    MissingToken,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Access token has expired. Please sign in again.")]
    TokenExpired,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,
}

#[derive(Error, Debug)]
pub enum UpstreamError {
    /// Completion API failure. The payload stays in logs only.
    #[error("completion API: {0}")]
    Completion(String),

    /// Billing provider failure. The payload stays in logs only.
    #[error("billing provider: {0}")]
    Billing(String),
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Record not found")]
    NotFound,

    #[error("Duplicate record")]
    Duplicate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::Internal(_)));

        let config_err = config::ConfigError::NotFound(String::from("key not found"));
        let app_err: AppError = config_err.into();
        assert!(matches!(app_err, AppError::Config(_)));

        let db_err = sqlx::Error::RowNotFound;
        let app_err: AppError = db_err.into();
        assert!(matches!(app_err, AppError::Database(DatabaseError::NotFound)));
    }

    #[test]
    fn test_error_status_codes() {
        let err = AppError::Auth(AuthError::InvalidCredentials);
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        let err = AppError::Auth(AuthError::TokenExpired);
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        let err = AppError::Validation("invalid input".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = AppError::NotFound("chat session");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err = AppError::Conflict("email already registered".to_string());
        assert_eq!(err.status_code(), StatusCode::CONFLICT);

        let err = AppError::Upstream(UpstreamError::Completion("503".to_string()));
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);

        let err = AppError::Database(DatabaseError::Duplicate);
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(AppError::Auth(AuthError::InvalidToken).kind(), "unauthenticated");
        assert_eq!(AppError::NotFound("user").kind(), "not_found");
        assert_eq!(AppError::Conflict("dup".into()).kind(), "conflict");
        assert_eq!(AppError::Database(DatabaseError::Duplicate).kind(), "conflict");
        assert_eq!(
            AppError::Upstream(UpstreamError::Billing("x".into())).kind(),
            "upstream"
        );
    }

    #[test]
    fn test_upstream_detail_not_leaked() {
        let err = AppError::Upstream(UpstreamError::Completion(
            "401 {\"error\":\"bad api key sk-secret\"}".to_string(),
        ));
        let response = err.error_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        // Display keeps the detail for logs; the response body does not use it.
        assert!(err.to_string().contains("sk-secret"));
    }
}
