//! Warden Error Types
//!
//! Stable, distinguishable error kinds raised by the session and
//! authorization core. They integrate with the unified
//! `kernel::error::AppError` system for HTTP rendering.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

/// Warden result type alias
pub type WardenResult<T> = Result<T, WardenError>;

/// Business code for an expired session
pub const SESSION_EXPIRED_CODE: i32 = -1000;
/// Business code for a disabled account
pub const ACCOUNT_DISABLED_CODE: i32 = -998;
/// Business code for a retry lockout
pub const EXCESSIVE_ATTEMPTS_CODE: i32 = -423;
/// Business code for a denied resource
pub const UNAUTHORIZED_CODE: i32 = -403;

/// Core error variants
#[derive(Debug, Error)]
pub enum WardenError {
    /// No session, or the token does not resolve to one
    #[error("{0}")]
    Unauthenticated(String),

    /// The session exists but has timed out
    #[error("Session has Expired")]
    SessionExpired,

    /// An operation referenced a session id that does not resolve
    #[error("Session Invalid: {0}")]
    InvalidSession(String),

    /// The subject lacks the authority required by the matched rule
    #[error("{0}")]
    Unauthorized(String),

    /// The subject is not enabled
    #[error("Account is disabled")]
    AccountDisabled,

    /// Login-level account problem (blank principal, duplicate login)
    #[error("{0}")]
    Account(String),

    /// Retry limiter lockout
    #[error("Too many failed attempts, locked for {minutes} minute(s)")]
    ExcessiveAttempts { minutes: u64 },

    /// Cache or shared-store failure (connection, serialization)
    #[error("Cache backend failure: {0}")]
    CacheBackend(String),

    /// Rejected at startup
    #[error("Invalid configuration: {0}")]
    ConfigurationInvalid(String),
}

impl WardenError {
    /// Default message for requests without a usable session
    pub const NOT_AUTHENTICATED: &'static str =
        "The current User is not authenticated.  Access denied.";

    pub fn unauthenticated() -> Self {
        WardenError::Unauthenticated(Self::NOT_AUTHENTICATED.to_string())
    }

    /// Stable numeric code, for the kinds that carry one
    pub fn code(&self) -> Option<i32> {
        match self {
            WardenError::SessionExpired => Some(SESSION_EXPIRED_CODE),
            WardenError::AccountDisabled => Some(ACCOUNT_DISABLED_CODE),
            WardenError::ExcessiveAttempts { .. } => Some(EXCESSIVE_ATTEMPTS_CODE),
            WardenError::Unauthorized(_) => Some(UNAUTHORIZED_CODE),
            _ => None,
        }
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            WardenError::Unauthenticated(_)
            | WardenError::SessionExpired
            | WardenError::InvalidSession(_) => ErrorKind::Unauthorized,
            WardenError::Unauthorized(_) | WardenError::AccountDisabled => ErrorKind::Forbidden,
            WardenError::Account(_) => ErrorKind::Conflict,
            WardenError::ExcessiveAttempts { .. } => ErrorKind::Locked,
            WardenError::CacheBackend(_) => ErrorKind::ServiceUnavailable,
            WardenError::ConfigurationInvalid(_) => ErrorKind::InternalServerError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.kind().status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Convert to AppError
    pub fn to_app_error(&self) -> AppError {
        let err = AppError::new(self.kind(), self.to_string());
        let err = match self.code() {
            Some(code) => err.with_code(code),
            None => err,
        };
        match self {
            WardenError::SessionExpired => err.with_action("Please sign in again"),
            _ => err,
        }
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            WardenError::CacheBackend(msg) => {
                tracing::error!(error = %msg, "Cache backend failure");
            }
            WardenError::ConfigurationInvalid(msg) => {
                tracing::error!(error = %msg, "Invalid configuration reached a request");
            }
            WardenError::ExcessiveAttempts { minutes } => {
                tracing::warn!(minutes = *minutes, "Request rejected by retry lockout");
            }
            WardenError::Unauthorized(msg) => {
                tracing::info!(reason = %msg, "Access denied");
            }
            _ => {
                tracing::debug!(error = %self, "Warden error");
            }
        }
    }
}

impl IntoResponse for WardenError {
    fn into_response(self) -> Response {
        self.log();
        self.to_app_error().into_response()
    }
}

impl From<serde_json::Error> for WardenError {
    fn from(err: serde_json::Error) -> Self {
        WardenError::CacheBackend(format!("serialization: {err}"))
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for WardenError {
    fn from(err: redis::RedisError) -> Self {
        WardenError::CacheBackend(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_codes() {
        assert_eq!(WardenError::SessionExpired.code(), Some(-1000));
        assert_eq!(WardenError::ExcessiveAttempts { minutes: 2 }.code(), Some(-423));
        assert_eq!(WardenError::AccountDisabled.code(), Some(-998));
        assert_eq!(WardenError::unauthenticated().code(), None);
    }

    #[test]
    fn test_kinds_are_distinguishable() {
        assert_eq!(WardenError::unauthenticated().kind(), ErrorKind::Unauthorized);
        assert_eq!(WardenError::SessionExpired.kind(), ErrorKind::Unauthorized);
        assert_eq!(
            WardenError::Unauthorized("denied".into()).kind(),
            ErrorKind::Forbidden
        );
        assert_eq!(
            WardenError::ExcessiveAttempts { minutes: 2 }.status_code(),
            StatusCode::LOCKED
        );
        assert_eq!(
            WardenError::CacheBackend("down".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_to_app_error_carries_code() {
        let app = WardenError::SessionExpired.to_app_error();
        assert_eq!(app.code(), Some(-1000));
        assert_eq!(app.status_code(), 401);
        assert_eq!(app.message(), "Session has Expired");
        assert!(app.action().is_some());
    }

    #[test]
    fn test_serde_error_is_backend_failure() {
        let err: WardenError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, WardenError::CacheBackend(_)));
    }
}
