// =========================
// tests/integration/session_admission_tests.rs
// =========================
//! Concurrent session control, expiry and invalid ids through the router
use std::time::Duration;

use axum::http::StatusCode;

use crate::test_utils::{
    app, clears_cookie, cookie_value, get, location, login, send, session_cookie, session_for, settings,
};

#[tokio::test]
async fn test_prevent_mode_rejects_second_login() {
    let (app, state) = app(&settings());
    let first = session_for(&app, "alice").await;

    let response = login(&app, "alice", None).await;
    assert_eq!(location(&response), "/login.html?session_limit");
    assert_eq!(cookie_value(&response, "SESSION"), None);

    let response = send(&app, get("/main.html", Some(&session_cookie(&first)))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(state.registry.sessions_for("alice").len(), 1);

    // other principals are unaffected
    let response = login(&app, "root", None).await;
    assert_eq!(location(&response), "/main.html");
}

#[tokio::test]
async fn test_evict_mode_keeps_only_latest_login() {
    let mut settings = settings();
    settings.security.session.max_sessions_prevents_login = false;
    let (app, state) = app(&settings);

    let first = session_for(&app, "alice").await;
    let second = session_for(&app, "alice").await;
    assert_ne!(first, second);

    let response = send(&app, get("/main.html", Some(&session_cookie(&first)))).await;
    assert_eq!(location(&response), "/login.html?session_expired");
    assert!(clears_cookie(&response, "SESSION"));

    let response = send(&app, get("/main.html", Some(&session_cookie(&second)))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let live: Vec<String> = state
        .registry
        .sessions_for("alice")
        .into_iter()
        .map(|record| record.id)
        .collect();
    assert_eq!(live, vec![second]);
}

#[tokio::test]
async fn test_higher_limit_admits_several_logins() {
    let mut settings = settings();
    settings.security.session.maximum_sessions = 2;
    let (app, _) = app(&settings);

    let first = session_for(&app, "alice").await;
    let second = session_for(&app, "alice").await;
    assert_eq!(
        location(&login(&app, "alice", None).await),
        "/login.html?session_limit"
    );
    for id in [first, second] {
        let response = send(&app, get("/main.html", Some(&session_cookie(&id)))).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_invalid_session_id_redirects_and_clears_cookie() {
    let (app, _) = app(&settings());
    for id in ["forged", "Zm9yZ2VkLXNlc3Npb24taWQtdGhhdC1pcy00My1jaGFy"] {
        let response = send(&app, get("/main.html", Some(&session_cookie(id)))).await;
        assert_eq!(location(&response), "/login.html?session_invalid", "{id}");
        assert!(clears_cookie(&response, "SESSION"));
    }
}

#[tokio::test]
async fn test_idle_session_expires() {
    let (app, state) = app(&settings());
    let id = session_for(&app, "alice").await;

    tokio::time::pause();
    tokio::time::advance(Duration::from_secs(29 * 60)).await;
    let response = send(&app, get("/main.html", Some(&session_cookie(&id)))).await;
    assert_eq!(response.status(), StatusCode::OK);

    tokio::time::advance(Duration::from_secs(31 * 60)).await;
    let response = send(&app, get("/main.html", Some(&session_cookie(&id)))).await;
    assert_eq!(location(&response), "/login.html?session_expired");
    assert_eq!(state.registry.active_sessions(), 0);
}

#[tokio::test]
async fn test_sweep_expires_idle_sessions() {
    let (app, state) = app(&settings());
    let id = session_for(&app, "alice").await;

    tokio::time::pause();
    tokio::time::advance(Duration::from_secs(31 * 60)).await;
    assert_eq!(state.registry.sweep(), 1);
    assert_eq!(state.registry.active_sessions(), 0);

    let response = send(&app, get("/main.html", Some(&session_cookie(&id)))).await;
    assert_eq!(location(&response), "/login.html?session_expired");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_logins_never_exceed_limit() {
    let (app, state) = app(&settings());

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let app = app.clone();
        tasks.push(tokio::spawn(async move {
            let response = login(&app, "alice", None).await;
            location(&response).to_string()
        }));
    }
    let mut admitted = 0;
    for task in tasks {
        let target = task.await.unwrap();
        if target == "/main.html" {
            admitted += 1;
        } else {
            assert_eq!(target, "/login.html?session_limit");
        }
    }

    assert_eq!(admitted, 1);
    assert_eq!(state.registry.sessions_for("alice").len(), 1);
}
