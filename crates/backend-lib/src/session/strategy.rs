// ============================
// formgate-backend-lib/src/session/strategy.rs
// ============================
//! What a client is told when its session id no longer resolves.
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use tracing::debug;

use crate::config::SecurityConfig;

/// Handles a request carrying a malformed or unknown session id
pub trait InvalidSessionStrategy: Send + Sync {
    fn on_invalid_session(&self, jar: CookieJar) -> Response;
}

/// Handles a request carrying a timed-out or evicted session id
pub trait ExpiredSessionStrategy: Send + Sync {
    fn on_expired_session(&self, jar: CookieJar) -> Response;
}

/// Clears the session cookie and redirects to a fixed destination
#[derive(Debug, Clone)]
pub struct RedirectSessionStrategy {
    target: String,
    cookie_name: String,
}

impl RedirectSessionStrategy {
    pub fn new(target: impl Into<String>, cookie_name: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            cookie_name: cookie_name.into(),
        }
    }

    /// Redirect to the configured invalid-session destination
    pub fn invalid(config: &SecurityConfig) -> Self {
        Self::new(&config.session.invalid_session_url, &config.session.cookie_name)
    }

    /// Redirect to the configured expired-session destination
    pub fn expired(config: &SecurityConfig) -> Self {
        Self::new(&config.session.expired_url, &config.session.cookie_name)
    }

    fn respond(&self, jar: CookieJar) -> Response {
        let jar = jar.remove(removal_cookie(&self.cookie_name));
        (jar, Redirect::to(&self.target)).into_response()
    }
}

impl InvalidSessionStrategy for RedirectSessionStrategy {
    fn on_invalid_session(&self, jar: CookieJar) -> Response {
        debug!(target_url = %self.target, "invalid session detected");
        self.respond(jar)
    }
}

impl ExpiredSessionStrategy for RedirectSessionStrategy {
    fn on_expired_session(&self, jar: CookieJar) -> Response {
        debug!(target_url = %self.target, "expired session detected");
        self.respond(jar)
    }
}

/// A cookie that, passed to `CookieJar::remove`, clears `name` at path `/`
pub fn removal_cookie(name: &str) -> Cookie<'static> {
    Cookie::build((name.to_string(), "")).path("/").build()
}
