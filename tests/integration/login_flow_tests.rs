// =========================
// tests/integration/login_flow_tests.rs
// =========================
//! Form login, logout and the pages behind them
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
};
use formgate_backend_lib::config::FrameOptions;

use crate::test_utils::{
    app, clears_cookie, cookie_value, get, location, login, login_request, send, session_cookie,
    session_for, settings, PASSWORD,
};

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_login_page_uses_configured_fields() {
    let (app, _) = app(&settings());
    let response = send(&app, get("/login.html", None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_text(response).await;
    assert!(body.contains(r#"action="/doLogin""#));
    assert!(body.contains(r#"name="loginName""#));
    assert!(body.contains(r#"name="loginPwd""#));
    assert!(!body.contains(r#"name="authCode""#));
}

#[tokio::test]
async fn test_successful_login_sets_session_and_redirects() {
    let (app, state) = app(&settings());
    let response = login(&app, "alice", None).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/main.html");
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));
    assert!(set_cookie.contains("Path=/"));

    let id = cookie_value(&response, "SESSION").unwrap();
    assert_eq!(state.registry.sessions_for("alice").len(), 1);

    let response = send(&app, get("/main.html", Some(&session_cookie(&id)))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Signed in as alice"));
}

#[tokio::test]
async fn test_bad_credentials_redirect_to_failure_url() {
    let (app, state) = app(&settings());
    for fields in [
        vec![("loginName", "alice"), ("loginPwd", "guess")],
        vec![("loginName", "nobody"), ("loginPwd", PASSWORD)],
        vec![("loginPwd", PASSWORD)],
    ] {
        let response = send(&app, login_request(&fields, None)).await;
        assert_eq!(location(&response), "/login.html?login_failure");
        assert_eq!(cookie_value(&response, "SESSION"), None);
    }
    assert_eq!(state.registry.active_sessions(), 0);
}

#[tokio::test]
async fn test_session_view_reports_principal() {
    let (app, _) = app(&settings());
    let id = session_for(&app, "root").await;

    let response = send(&app, get("/session", Some(&session_cookie(&id)))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["loginName"], "root");
    assert_eq!(json["authorities"], serde_json::json!(["ROLE_ADMIN", "ROLE_USER"]));
    assert!(json["createdAt"].is_string());
}

#[tokio::test]
async fn test_logout_ends_session() {
    let (app, state) = app(&settings());
    let id = session_for(&app, "alice").await;

    let response = send(&app, get("/doLogout", Some(&session_cookie(&id)))).await;
    assert_eq!(location(&response), "/login.html?logout_success");
    assert!(clears_cookie(&response, "SESSION"));
    assert_eq!(state.registry.active_sessions(), 0);

    // the old id is now simply unauthenticated
    let response = send(&app, get("/main.html", Some(&session_cookie(&id)))).await;
    assert_eq!(location(&response), "/login.html");

    // and the principal may log in again
    let response = login(&app, "alice", None).await;
    assert_eq!(location(&response), "/main.html");
}

#[tokio::test]
async fn test_logout_without_session() {
    let (app, _) = app(&settings());
    let response = send(&app, get("/doLogout", None)).await;
    assert_eq!(location(&response), "/login.html?logout_success");
}

#[tokio::test]
async fn test_relogin_from_same_browser_replaces_session() {
    let (app, state) = app(&settings());
    let first = session_for(&app, "alice").await;

    let response = login(&app, "alice", Some(&session_cookie(&first))).await;
    assert_eq!(location(&response), "/main.html");
    let second = cookie_value(&response, "SESSION").unwrap();
    assert_ne!(first, second);
    assert_eq!(state.registry.sessions_for("alice").len(), 1);

    let response = send(&app, get("/main.html", Some(&session_cookie(&first)))).await;
    assert_eq!(location(&response), "/login.html");
}

#[tokio::test]
async fn test_saved_request_is_restored_after_login() {
    let mut settings = settings();
    settings.security.form_login.always_use_default_success_url = false;
    let (app, _) = app(&settings);

    let response = send(&app, get("/session?verbose=1", None)).await;
    assert_eq!(location(&response), "/login.html");
    let saved = cookie_value(&response, "SAVED_REQUEST").unwrap();

    let response = login(&app, "alice", Some(&format!("SAVED_REQUEST={saved}"))).await;
    assert_eq!(location(&response), "/session?verbose=1");
    assert!(clears_cookie(&response, "SAVED_REQUEST"));
}

#[tokio::test]
async fn test_default_success_url_ignores_saved_request() {
    let (app, _) = app(&settings());
    let response = send(&app, get("/session", None)).await;
    assert_eq!(cookie_value(&response, "SAVED_REQUEST"), None);
    assert_eq!(location(&login(&app, "alice", None).await), "/main.html");
}

#[tokio::test]
async fn test_captcha_enforced_when_enabled() {
    let mut settings = settings();
    settings.security.captcha.enabled = true;
    let (app, state) = app(&settings);

    let body = body_text(send(&app, get("/login.html", None)).await).await;
    assert!(body.contains(r#"name="authCode""#));

    // credentials alone are not enough
    let response = login(&app, "alice", None).await;
    assert_eq!(location(&response), "/login.html?login_failure");

    state.captcha.issue("k-1", "7QX2");
    let fields = [("loginName", "alice"), ("loginPwd", PASSWORD), ("authCode", "0000")];
    let response = send(&app, login_request(&fields, Some("captcha_key=k-1"))).await;
    assert_eq!(location(&response), "/login.html?login_failure");

    state.captcha.issue("k-2", "7QX2");
    let fields = [("loginName", "alice"), ("loginPwd", PASSWORD), ("authCode", "7qx2")];
    let response = send(&app, login_request(&fields, Some("theme=dark; captcha_key=k-2"))).await;
    assert_eq!(location(&response), "/main.html");
}

#[tokio::test]
async fn test_access_rules_redirect_to_denied_page() {
    let mut settings = settings();
    settings.security.access_rules.push(formgate_backend_lib::config::AccessRule {
        pattern: "/session".to_string(),
        authorities: vec!["ROLE_ADMIN".to_string()],
    });
    let (app, _) = app(&settings);

    let alice = session_for(&app, "alice").await;
    let response = send(&app, get("/session", Some(&session_cookie(&alice)))).await;
    assert_eq!(location(&response), "/403.html");

    let response = send(&app, get("/403.html", Some(&session_cookie(&alice)))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let root = session_for(&app, "root").await;
    let response = send(&app, get("/session", Some(&session_cookie(&root)))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_route_after_login_is_json_404() {
    let (app, _) = app(&settings());
    let response = send(&app, get("/nowhere", None)).await;
    assert_eq!(location(&response), "/login.html");

    let id = session_for(&app, "alice").await;
    let response = send(&app, get("/nowhere", Some(&session_cookie(&id)))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["error"]["code"], "NF_001");
}

#[tokio::test]
async fn test_frame_options_header() {
    let (router, _) = app(&settings());
    let response = send(&router, get("/login.html", None)).await;
    assert_eq!(response.headers().get(header::X_FRAME_OPTIONS).unwrap(), "SAMEORIGIN");

    let mut deny = settings();
    deny.security.frame_options = FrameOptions::Deny;
    let (router, _) = app(&deny);
    let response = send(&router, get("/main.html", None)).await;
    assert_eq!(response.headers().get(header::X_FRAME_OPTIONS).unwrap(), "DENY");

    let mut disabled = settings();
    disabled.security.frame_options = FrameOptions::Disabled;
    let (router, _) = app(&disabled);
    let response = send(&router, get("/login.html", None)).await;
    assert!(response.headers().get(header::X_FRAME_OPTIONS).is_none());
}

#[tokio::test]
async fn test_malformed_login_submission_redirects_to_failure_url() {
    let (app, state) = app(&settings());

    let json = Request::builder()
        .method("POST")
        .uri("/doLogin")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"loginName":"alice"}"#))
        .unwrap();
    let response = send(&app, json).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login.html?login_failure");

    let no_type = Request::builder()
        .method("POST")
        .uri("/doLogin")
        .body(Body::from("loginName=alice"))
        .unwrap();
    let response = send(&app, no_type).await;
    assert_eq!(location(&response), "/login.html?login_failure");
    assert_eq!(state.registry.active_sessions(), 0);
}
