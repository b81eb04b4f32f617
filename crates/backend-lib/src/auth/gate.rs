// ============================
// formgate-backend-lib/src/auth/gate.rs
// ============================
//! Authentication gate for login form submissions.
//!
//! Runs the captcha check (when enabled) before credential verification and
//! yields the authenticated [`Principal`]. Session creation happens downstream.
use std::collections::HashMap;
use std::sync::Arc;

use axum::http::HeaderMap;
use formgate_common::Principal;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use super::captcha::{captcha_key, CaptchaValidator};
use super::credentials::CredentialStore;
use super::password::verify_password;
use crate::config::SecurityConfig;
use crate::error::AppError;

/// The fields of one login submission
pub struct LoginAttempt {
    pub username: String,
    pub password: Zeroizing<String>,
    pub captcha_answer: Option<String>,
    pub captcha_key: Option<String>,
}

impl LoginAttempt {
    /// Read a submission using the configured parameter names. Missing
    /// username or password become empty strings; the username is trimmed.
    pub fn from_form(
        config: &SecurityConfig,
        headers: &HeaderMap,
        form: &HashMap<String, String>,
    ) -> Self {
        let field = |name: &str| form.get(name).cloned();
        Self {
            username: field(&config.form_login.username_parameter)
                .map(|u| u.trim().to_string())
                .unwrap_or_default(),
            password: Zeroizing::new(field(&config.form_login.password_parameter).unwrap_or_default()),
            captcha_answer: field(&config.captcha.parameter),
            captcha_key: captcha_key(headers, &config.captcha.cookie_name),
        }
    }
}

impl std::fmt::Debug for LoginAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginAttempt")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("captcha_answer", &self.captcha_answer.is_some())
            .field("captcha_key", &self.captcha_key.is_some())
            .finish()
    }
}

/// Intercepts login submissions ahead of session admission
#[derive(Clone)]
pub struct AuthenticationGate {
    config: Arc<SecurityConfig>,
    credentials: Arc<dyn CredentialStore>,
    captcha: Arc<dyn CaptchaValidator>,
}

impl AuthenticationGate {
    pub fn new(
        config: Arc<SecurityConfig>,
        credentials: Arc<dyn CredentialStore>,
        captcha: Arc<dyn CaptchaValidator>,
    ) -> Self {
        Self {
            config,
            credentials,
            captcha,
        }
    }

    /// Authenticate a login submission
    ///
    /// # Errors
    /// * [`AppError::CaptchaFailure`] when enforcement is on and the captcha
    ///   key or answer is missing or wrong
    /// * [`AppError::AuthenticationFailure`] for an unknown or disabled
    ///   account or a wrong password
    pub async fn attempt_authentication(&self, attempt: LoginAttempt) -> Result<Principal, AppError> {
        if self.config.captcha.enabled {
            self.check_captcha(&attempt).await?;
        }

        let LoginAttempt {
            username, password, ..
        } = attempt;

        if username.is_empty() {
            debug!("login submitted without a username");
            return Err(AppError::AuthenticationFailure);
        }

        let Some(user) = self.credentials.load_user(&username).await? else {
            info!(login_name = %username, "login failed: unknown account");
            return Err(AppError::AuthenticationFailure);
        };
        if !user.enabled {
            info!(login_name = %username, "login failed: account disabled");
            return Err(AppError::AuthenticationFailure);
        }

        // scrypt is CPU bound, verify on the blocking pool
        let hash = user.password_hash.clone();
        let verified = tokio::task::spawn_blocking(move || verify_password(&hash, &password)).await?;
        if !verified {
            info!(login_name = %username, "login failed: bad credentials");
            return Err(AppError::AuthenticationFailure);
        }

        debug!(login_name = %username, "credentials verified");
        Ok(user.principal())
    }

    async fn check_captcha(&self, attempt: &LoginAttempt) -> Result<(), AppError> {
        let answer = attempt
            .captcha_answer
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty());
        let (Some(key), Some(answer)) = (attempt.captcha_key.as_deref(), answer) else {
            warn!(login_name = %attempt.username, "captcha key or answer missing");
            return Err(AppError::CaptchaFailure);
        };
        if !self.captcha.validate(key, answer).await {
            warn!(login_name = %attempt.username, "captcha answer rejected");
            return Err(AppError::CaptchaFailure);
        }
        Ok(())
    }
}
