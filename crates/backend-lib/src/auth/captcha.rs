// ============================
// formgate-backend-lib/src/auth/captcha.rs
// ============================
//! Captcha key extraction and challenge validation.
//!
//! The challenge image is produced elsewhere; this side only pairs the key
//! delivered in the `captcha_key` cookie with the code the user typed.
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{header::COOKIE, HeaderMap};
use axum_extra::extract::cookie::Cookie;
use dashmap::DashMap;
use tokio::time::Instant;

/// Value of the first cookie named `cookie_name`, scanning `Cookie` headers in
/// the order received. Malformed pairs are skipped; no cookies yields `None`.
pub fn captcha_key(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == cookie_name)
        .map(|cookie| cookie.value().to_string())
}

/// Checks a user's answer against an issued challenge
#[async_trait]
pub trait CaptchaValidator: Send + Sync {
    /// Whether `answer` solves the challenge issued under `key`
    async fn validate(&self, key: &str, answer: &str) -> bool;
}

#[derive(Debug, Clone)]
struct Challenge {
    code: String,
    expires_at: Instant,
}

/// Challenge store with a fixed time to live. A challenge can be validated
/// once; the attempt consumes it whether or not the answer matched.
#[derive(Debug)]
pub struct InMemoryCaptchaStore {
    challenges: DashMap<String, Challenge>,
    ttl: Duration,
}

impl InMemoryCaptchaStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            challenges: DashMap::new(),
            ttl,
        }
    }

    /// Register the expected code for a key handed to the client
    pub fn issue(&self, key: impl Into<String>, code: impl Into<String>) {
        let challenge = Challenge {
            code: code.into(),
            expires_at: Instant::now() + self.ttl,
        };
        self.challenges.insert(key.into(), challenge);
    }

    /// Drop expired challenges; returns how many were removed
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.challenges.len();
        self.challenges.retain(|_, challenge| now < challenge.expires_at);
        before - self.challenges.len()
    }

    pub fn len(&self) -> usize {
        self.challenges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.challenges.is_empty()
    }
}

#[async_trait]
impl CaptchaValidator for InMemoryCaptchaStore {
    async fn validate(&self, key: &str, answer: &str) -> bool {
        let Some((_, challenge)) = self.challenges.remove(key) else {
            return false;
        };
        Instant::now() < challenge.expires_at
            && challenge.code.eq_ignore_ascii_case(answer.trim())
    }
}
