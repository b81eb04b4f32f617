// ============================
// formgate-backend-lib/src/handlers/login.rs
// ============================
//! Login processing and logout.
use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::FormRejection, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use metrics::counter;
use tracing::{info, warn};

use crate::auth::LoginAttempt;
use crate::error::AppError;
use crate::metrics::{LOGIN_FAILED, LOGIN_REJECTED, LOGIN_SUCCEEDED};
use crate::middleware::security::{saved_request_target, SAVED_REQUEST_COOKIE};
use crate::session::{removal_cookie, DestroyReason};
use crate::AppState;

/// Handle a login form submission
///
/// Authentication failures, including a body that is not a readable form,
/// redirect to the failure URL, a login refused by the session limit to the
/// session-limit URL. On success the session cookie is set and the browser is
/// sent to its saved request or the default success URL.
pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
    form: Result<Form<HashMap<String, String>>, FormRejection>,
) -> Response {
    let config = &state.config;
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            warn!(error = %rejection, "unreadable login submission");
            counter!(LOGIN_FAILED).increment(1);
            return AppError::AuthenticationFailure.into_redirect(config);
        },
    };
    let attempt = LoginAttempt::from_form(config, &headers, &form);
    let login_name = attempt.username.clone();

    let principal = match state.gate.attempt_authentication(attempt).await {
        Ok(principal) => principal,
        Err(err) => {
            counter!(LOGIN_FAILED).increment(1);
            return err.into_redirect(config);
        },
    };

    let previous = jar
        .get(&config.session.cookie_name)
        .map(|cookie| cookie.value().to_string());
    let record = match state.registry.register_replacing(principal, previous.as_deref()) {
        Ok(record) => record,
        Err(err) => {
            counter!(LOGIN_REJECTED).increment(1);
            return err.into_redirect(config);
        },
    };

    info!(login_name = %login_name, "login succeeded");
    counter!(LOGIN_SUCCEEDED).increment(1);

    let target = if config.form_login.always_use_default_success_url {
        config.form_login.default_success_url.clone()
    } else {
        saved_request_target(&jar).unwrap_or_else(|| config.form_login.default_success_url.clone())
    };

    let session_cookie = Cookie::build((config.session.cookie_name.clone(), record.id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.session.cookie_secure)
        .build();
    let jar = jar
        .remove(removal_cookie(SAVED_REQUEST_COOKIE))
        .add(session_cookie);
    (jar, Redirect::to(&target)).into_response()
}

/// End the caller's session, if any, and redirect to the logout success URL
pub async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let config = &state.config;
    let cookie_name = &config.session.cookie_name;

    if let Some(cookie) = jar.get(cookie_name) {
        if state.registry.invalidate(cookie.value(), DestroyReason::LoggedOut) {
            info!("logout");
        } else {
            warn!("logout with a session that was not live");
        }
    }

    let jar = jar.remove(removal_cookie(cookie_name));
    (jar, Redirect::to(&config.logout.logout_success_url)).into_response()
}
