// crates/backend-lib/src/error.rs

//! Central error type + Axum integration.
//!
//! Security failures are answered with a redirect to the destination the
//! configuration names for them (see [`AppError::redirect_target`]); the rest
//! are rendered as a JSON error body.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use thiserror::Error;

use crate::config::SecurityConfig;

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad credentials")]
    AuthenticationFailure,

    #[error("Captcha answer rejected")]
    CaptchaFailure,

    #[error("Maximum sessions of {max} for this principal exceeded")]
    SessionLimitExceeded { max: u32 },

    #[error("Session has expired")]
    SessionExpired,

    #[error("Session identifier is invalid")]
    SessionInvalid,

    #[error("Access is denied")]
    AccessDenied,

    #[error("Full authentication is required")]
    Unauthenticated,

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::AuthenticationFailure
            | AppError::CaptchaFailure
            | AppError::SessionLimitExceeded { .. }
            | AppError::SessionExpired
            | AppError::SessionInvalid
            | AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::AccessDenied => StatusCode::FORBIDDEN,
            AppError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::AuthenticationFailure => "AUTH_001",
            AppError::CaptchaFailure => "AUTH_002",
            AppError::Unauthenticated => "AUTH_003",
            AppError::SessionLimitExceeded { .. } => "SESSION_001",
            AppError::SessionExpired => "SESSION_002",
            AppError::SessionInvalid => "SESSION_003",
            AppError::AccessDenied => "ACCESS_001",
            AppError::RateLimitExceeded => "RATE_001",
            AppError::NotFound(_) => "NF_001",
            AppError::Internal(_) => "INT_001",
        }
    }

    /// Get a sanitized message suitable for production use
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::AuthenticationFailure | AppError::CaptchaFailure => {
                "Authentication failed".to_string()
            },
            AppError::SessionLimitExceeded { .. } => {
                "This account is already signed in elsewhere".to_string()
            },
            AppError::SessionExpired => "Your session has expired".to_string(),
            AppError::SessionInvalid => "Your session is no longer valid".to_string(),
            AppError::AccessDenied => "Access denied".to_string(),
            AppError::Unauthenticated => "Please sign in".to_string(),
            AppError::RateLimitExceeded => {
                "Rate limit exceeded, please try again later".to_string()
            },
            AppError::NotFound(_) => "Resource not found".to_string(),
            AppError::Internal(_) => "An internal server error occurred".to_string(),
        }
    }

    /// The configured destination a user is redirected to for this error,
    /// or `None` when the error is answered directly
    pub fn redirect_target<'a>(&self, config: &'a SecurityConfig) -> Option<&'a str> {
        match self {
            AppError::AuthenticationFailure | AppError::CaptchaFailure => {
                Some(&config.form_login.failure_url)
            },
            AppError::SessionLimitExceeded { .. } => Some(&config.session.session_limit_url),
            AppError::SessionExpired => Some(&config.session.expired_url),
            AppError::SessionInvalid => Some(&config.session.invalid_session_url),
            AppError::AccessDenied => Some(&config.access_denied_page),
            AppError::Unauthenticated => Some(&config.form_login.login_page),
            AppError::RateLimitExceeded | AppError::NotFound(_) | AppError::Internal(_) => None,
        }
    }

    /// Redirect to the configured destination, falling back to the JSON body
    pub fn into_redirect(self, config: &SecurityConfig) -> Response {
        match self.redirect_target(config) {
            Some(target) => Redirect::to(target).into_response(),
            None => self.into_response(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        // Use detailed messages in development, sanitized in production
        let message = if cfg!(debug_assertions) {
            self.to_string()
        } else {
            self.sanitized_message()
        };

        let body = serde_json::json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("background task failed: {err}"))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
