// =========================
// tests/integration/request_gate_tests.rs
// =========================
//! Pre-authentication rate limiting and the ignore list
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
};
use formgate_backend_lib::config::RateLimitSettings;

use crate::test_utils::{app, get, location, send, session_cookie, session_for, settings, PASSWORD};

fn login_from(ip: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/doLogin")
        .header("x-real-ip", ip)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("loginName=alice&loginPwd={PASSWORD}x")))
        .unwrap()
}

#[tokio::test]
async fn test_rate_limit_rejects_before_authentication() {
    let mut settings = settings();
    settings.security.request_gate.rate_limit = Some(RateLimitSettings {
        max_requests: 3,
        window_secs: 60,
    });
    let (app, _) = app(&settings);

    for _ in 0..3 {
        let response = send(&app, login_from("10.1.1.1")).await;
        assert_eq!(location(&response), "/login.html?login_failure");
    }

    let response = send(&app, login_from("10.1.1.1")).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"]["code"], "RATE_001");

    // a different client has its own window
    let response = send(&app, login_from("10.1.1.2")).await;
    assert_eq!(location(&response), "/login.html?login_failure");
}

#[tokio::test]
async fn test_ignored_paths_bypass_gate_and_login() {
    let mut settings = settings();
    settings.security.request_gate.rate_limit = Some(RateLimitSettings {
        max_requests: 1,
        window_secs: 60,
    });
    let (app, _) = app(&settings);

    for _ in 0..5 {
        let response = send(&app, get("/static/css/site.css", None)).await;
        // nothing serves static files here, but security never intervened
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().get(header::LOCATION).is_none());
    }

    assert_eq!(send(&app, get("/login.html", None)).await.status(), StatusCode::OK);
    assert_eq!(
        send(&app, get("/login.html", None)).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
}

#[tokio::test]
async fn test_ignored_paths_ignore_session_state() {
    let mut settings = settings();
    settings.security.session.max_sessions_prevents_login = false;
    let (app, _) = app(&settings);

    let evicted = session_for(&app, "alice").await;
    let live = session_for(&app, "alice").await;
    let expired = session_for(&app, "root").await;
    tokio::time::pause();
    // keep `live` fresh while `expired` idles past the timeout
    tokio::time::advance(Duration::from_secs(20 * 60)).await;
    let response = send(&app, get("/main.html", Some(&session_cookie(&live)))).await;
    assert_eq!(response.status(), StatusCode::OK);
    tokio::time::advance(Duration::from_secs(11 * 60)).await;

    for id in ["forged", evicted.as_str(), expired.as_str(), live.as_str()] {
        let response = send(&app, get("/static/app.js", Some(&session_cookie(id)))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{id}");
        assert!(response.headers().get(header::LOCATION).is_none(), "{id}");
        assert!(response.headers().get(header::SET_COOKIE).is_none(), "{id}");
    }

    // the same dead ids are still routed once they leave the ignore list
    let response = send(&app, get("/main.html", Some(&session_cookie(&evicted)))).await;
    assert_eq!(location(&response), "/login.html?session_expired");
    let response = send(&app, get("/main.html", Some(&session_cookie(&expired)))).await;
    assert_eq!(location(&response), "/login.html?session_expired");
    let response = send(&app, get("/main.html", Some(&session_cookie("forged")))).await;
    assert_eq!(location(&response), "/login.html?session_invalid");
}

#[tokio::test]
async fn test_gate_is_open_by_default() {
    let (app, _) = app(&settings());
    for _ in 0..20 {
        let response = send(&app, get("/login.html", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
