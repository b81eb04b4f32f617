// ============================
// formgate-backend-lib/src/router.rs
// ============================
//! Router construction.
use std::sync::Arc;

use axum::{
    http::{header::X_FRAME_OPTIONS, HeaderValue},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};

use crate::config::{path_part, FrameOptions, SESSION_INFO_PATH};
use crate::handlers;
use crate::middleware::security::security_filter;
use crate::AppState;

/// Create the application router with every route behind the security filter
pub fn create_router(state: Arc<AppState>) -> Router {
    let config = &state.config;

    let router = Router::new()
        .route(path_part(&config.form_login.login_page), get(handlers::login_page))
        .route(path_part(&config.form_login.processing_url), post(handlers::login))
        .route(
            path_part(&config.logout.logout_url),
            get(handlers::logout).post(handlers::logout),
        )
        .route(path_part(&config.form_login.default_success_url), get(handlers::main_page))
        .route(path_part(&config.access_denied_page), get(handlers::access_denied_page))
        .route(SESSION_INFO_PATH, get(handlers::current_session))
        .fallback(handlers::fallback)
        .layer(from_fn_with_state(state.clone(), security_filter));

    let router = match frame_options_value(config.frame_options) {
        Some(value) => router.layer(SetResponseHeaderLayer::if_not_present(X_FRAME_OPTIONS, value)),
        None => router,
    };

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

fn frame_options_value(options: FrameOptions) -> Option<HeaderValue> {
    match options {
        FrameOptions::Deny => Some(HeaderValue::from_static("DENY")),
        FrameOptions::SameOrigin => Some(HeaderValue::from_static("SAMEORIGIN")),
        FrameOptions::Disabled => None,
    }
}
