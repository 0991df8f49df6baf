//! Unified error model for the console.
//! Boundary failures (identity provider, record store) are typed enums returned as values;
//! `AppError` is the tagged shape the HTTP console reports, with a status-code mapping.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Failures surfaced by the identity provider, the role directory or the session authority.
/// All are recoverable: the authority returns to (or stays in) the anonymous state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Invalid login credentials")]
    InvalidCredentials,
    #[error("Email not confirmed")]
    Unconfirmed,
    #[error("User already registered")]
    AlreadyRegistered,
    #[error("{0}")]
    InvalidInput(String),
    #[error("identity provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("session is still resolving")]
    NotSettled,
    #[error("already signed in")]
    AlreadyAuthenticated,
    #[error("session closed")]
    Closed,
}

impl AuthError {
    pub fn code_str(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::Unconfirmed => "email_not_confirmed",
            AuthError::AlreadyRegistered => "user_already_exists",
            AuthError::InvalidInput(_) => "invalid_input",
            AuthError::ProviderUnavailable(_) => "provider_unavailable",
            AuthError::NotSettled => "not_settled",
            AuthError::AlreadyAuthenticated => "already_authenticated",
            AuthError::Closed => "session_closed",
        }
    }
}

/// Failures from the record store boundary.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("record store read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("record store returned a malformed payload: {0}")]
    Malformed(String),
    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    UserInput { code: String, message: String },
    Auth { code: String, message: String },
    Forbidden { code: String, message: String },
    Fetch { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::UserInput { code, .. }
            | AppError::Auth { code, .. }
            | AppError::Forbidden { code, .. }
            | AppError::Fetch { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::UserInput { message, .. }
            | AppError::Auth { message, .. }
            | AppError::Forbidden { message, .. }
            | AppError::Fetch { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn user<S: Into<String>>(code: S, msg: S) -> Self { AppError::UserInput { code: code.into(), message: msg.into() } }
    pub fn auth<S: Into<String>>(code: S, msg: S) -> Self { AppError::Auth { code: code.into(), message: msg.into() } }
    pub fn forbidden<S: Into<String>>(code: S, msg: S) -> Self { AppError::Forbidden { code: code.into(), message: msg.into() } }
    pub fn fetch<S: Into<String>>(code: S, msg: S) -> Self { AppError::Fetch { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::UserInput { .. } => 400,
            AppError::Auth { .. } => 401,
            AppError::Forbidden { .. } => 403,
            AppError::Fetch { .. } => 503,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        let code = err.code_str().to_string();
        let message = err.to_string();
        match err {
            AuthError::InvalidInput(_) | AuthError::AlreadyRegistered => AppError::UserInput { code, message },
            AuthError::AlreadyAuthenticated | AuthError::NotSettled => AppError::Forbidden { code, message },
            AuthError::Closed => AppError::Auth { code, message },
            AuthError::ProviderUnavailable(_) => AppError::Fetch { code, message },
            AuthError::InvalidCredentials | AuthError::Unconfirmed => AppError::Auth { code, message },
        }
    }
}

impl From<FetchError> for AppError {
    fn from(err: FetchError) -> Self {
        AppError::Fetch { code: "fetch_error".into(), message: err.to_string() }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal { code: "internal_error".into(), message: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        assert_eq!(AppError::user("bad_input", "oops").http_status(), 400);
        assert_eq!(AppError::auth("auth", "no").http_status(), 401);
        assert_eq!(AppError::forbidden("denied", "admins only").http_status(), 403);
        assert_eq!(AppError::fetch("fetch_error", "down").http_status(), 503);
        assert_eq!(AppError::internal("internal", "panic").http_status(), 500);
    }

    #[test]
    fn auth_errors_map_to_app_errors() {
        let e: AppError = AuthError::InvalidCredentials.into();
        assert_eq!(e.http_status(), 401);
        assert_eq!(e.code_str(), "invalid_credentials");
        assert_eq!(e.message(), "Invalid login credentials");

        let e: AppError = AuthError::AlreadyRegistered.into();
        assert_eq!(e.http_status(), 400);

        let e: AppError = AuthError::NotSettled.into();
        assert_eq!(e.http_status(), 403);
    }

    #[test]
    fn fetch_error_maps_to_service_unavailable() {
        let e: AppError = FetchError::Unavailable("timeout".into()).into();
        assert_eq!(e.http_status(), 503);
        assert!(e.message().contains("timeout"));
    }

    #[test]
    fn serializes_with_type_tag() {
        let v = serde_json::to_value(AppError::auth("invalid_credentials", "bad")).unwrap();
        assert_eq!(v["type"], "auth");
        assert_eq!(v["code"], "invalid_credentials");
    }
}
