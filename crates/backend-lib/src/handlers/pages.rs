// ============================
// formgate-backend-lib/src/handlers/pages.rs
// ============================
//! Placeholder pages and the JSON session view.
use std::sync::Arc;

use axum::{
    extract::State,
    http::{StatusCode, Uri},
    response::{Html, IntoResponse},
    Extension, Json,
};
use formgate_common::SessionInfo;

use crate::error::AppError;
use crate::session::SessionRecord;
use crate::AppState;

/// Minimal login form using the configured parameter names
pub async fn login_page(State(state): State<Arc<AppState>>) -> Html<String> {
    let form_login = &state.config.form_login;
    let captcha = if state.config.captcha.enabled {
        format!(
            r#"<label>Code <input name="{}" autocomplete="off"></label>"#,
            state.config.captcha.parameter
        )
    } else {
        String::new()
    };
    Html(format!(
        r#"<!doctype html>
<html>
<head><title>Sign in</title></head>
<body>
<form method="post" action="{action}">
<label>User <input name="{user}"></label>
<label>Password <input type="password" name="{pwd}"></label>
{captcha}
<button type="submit">Sign in</button>
</form>
</body>
</html>
"#,
        action = form_login.processing_url,
        user = form_login.username_parameter,
        pwd = form_login.password_parameter,
    ))
}

pub async fn main_page(Extension(record): Extension<SessionRecord>) -> Html<String> {
    Html(format!(
        "<!doctype html>\n<p>Signed in as {}</p>\n",
        record.principal.login_name
    ))
}

pub async fn access_denied_page() -> impl IntoResponse {
    (
        StatusCode::FORBIDDEN,
        Html("<!doctype html>\n<p>Access denied</p>\n"),
    )
}

/// The caller's own session
pub async fn current_session(Extension(record): Extension<SessionRecord>) -> Json<SessionInfo> {
    Json(record.info())
}

pub async fn fallback(uri: Uri) -> AppError {
    AppError::NotFound(uri.path().to_string())
}
