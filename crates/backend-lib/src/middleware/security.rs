// ============================
// crates/backend-lib/src/middleware/security.rs
// ============================
//! The security filter chain.
//!
//! Order per request: ignore list (bypass everything), request gate,
//! permitted paths, session lookup, access decision.
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use metrics::counter;
use tracing::{debug, warn};

use crate::access::{AccessDecision, ResourceDescriptor};
use crate::error::AppError;
use crate::matcher::matches_any;
use crate::metrics::ACCESS_DENIED;
use crate::session::{removal_cookie, SessionLookup};
use crate::AppState;

/// Cookie remembering where an unauthenticated GET was headed
pub const SAVED_REQUEST_COOKIE: &str = "SAVED_REQUEST";

/// Security middleware guarding every route of the application
pub async fn security_filter(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if matches_any(&state.ignored, &path) {
        return next.run(request).await;
    }

    if let Err(err) = state.request_gate.check(&request) {
        return err.into_response();
    }

    let config = &state.config;
    if config.permitted_paths().contains(&path.as_str()) {
        return next.run(request).await;
    }

    let Some(session_id) = jar
        .get(&config.session.cookie_name)
        .map(|cookie| cookie.value().to_string())
    else {
        return entry_point(&state, jar, &request);
    };

    match state.registry.lookup(&session_id) {
        SessionLookup::Active(record) => {
            let resource = ResourceDescriptor::new(request.method().clone(), path);
            match state.access.decide(&record.principal, &resource) {
                AccessDecision::Granted => {
                    request.extensions_mut().insert(record);
                    next.run(request).await
                },
                AccessDecision::Denied => {
                    warn!(
                        login_name = %record.principal.login_name,
                        method = %resource.method,
                        path = %resource.path,
                        "access denied"
                    );
                    counter!(ACCESS_DENIED).increment(1);
                    AppError::AccessDenied.into_redirect(config)
                },
            }
        },
        SessionLookup::Expired | SessionLookup::Evicted => {
            state.expired_session.on_expired_session(jar)
        },
        SessionLookup::LoggedOut => {
            let jar = jar.remove(removal_cookie(&config.session.cookie_name));
            entry_point(&state, jar, &request)
        },
        SessionLookup::Unknown => state.invalid_session.on_invalid_session(jar),
    }
}

/// Send an unauthenticated request to the login page, remembering a GET
/// target when the configuration honours saved requests
fn entry_point(state: &AppState, jar: CookieJar, request: &Request) -> Response {
    let form_login = &state.config.form_login;
    debug!(path = %request.uri().path(), "authentication required");

    let jar = if !form_login.always_use_default_success_url && request.method() == Method::GET {
        let target = request
            .uri()
            .path_and_query()
            .map_or("/", |pq| pq.as_str());
        let cookie = Cookie::build((SAVED_REQUEST_COOKIE, URL_SAFE_NO_PAD.encode(target)))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build();
        jar.add(cookie)
    } else {
        jar
    };
    (jar, Redirect::to(&form_login.login_page)).into_response()
}

/// Decode a saved request target, accepting only local absolute paths
pub fn saved_request_target(jar: &CookieJar) -> Option<String> {
    let raw = jar.get(SAVED_REQUEST_COOKIE)?;
    let bytes = URL_SAFE_NO_PAD.decode(raw.value()).ok()?;
    let target = String::from_utf8(bytes).ok()?;
    (target.starts_with('/') && !target.starts_with("//") && !target.contains('\\'))
        .then_some(target)
}
