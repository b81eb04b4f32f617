// ============================
// crates/backend-lib/src/middleware/rate_limit.rs
// ============================
//! Fixed window request rate limit per client address.
use std::time::Duration;

use axum::extract::Request;
use axum::http::HeaderMap;
use dashmap::DashMap;
use tokio::time::Instant;

use super::request_gate::PreAuthCheck;
use crate::config::RateLimitSettings;
use crate::error::AppError;

/// Rate limit entry for a client
#[derive(Debug)]
struct RateLimitEntry {
    requests: u32,
    window_start: Instant,
}

/// Counts requests per client and rejects those over the limit
#[derive(Debug)]
pub struct ClientRateLimit {
    entries: DashMap<String, RateLimitEntry>,
    max_requests: u32,
    window: Duration,
}

impl ClientRateLimit {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            max_requests,
            window,
        }
    }

    pub fn from_settings(settings: RateLimitSettings) -> Self {
        Self::new(settings.max_requests, Duration::from_secs(settings.window_secs))
    }

    /// Count one request from `client`; `false` once the window is exhausted
    pub fn allow(&self, client: &str) -> bool {
        let now = Instant::now();
        let mut entry = self
            .entries
            .entry(client.to_string())
            .or_insert_with(|| RateLimitEntry {
                requests: 0,
                window_start: now,
            });

        // Check if window has expired
        if now.saturating_duration_since(entry.window_start) >= self.window {
            entry.requests = 0;
            entry.window_start = now;
        }

        if entry.requests >= self.max_requests {
            return false;
        }
        entry.requests += 1;
        true
    }

    /// Forget clients whose window has ended
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.window_start) < self.window);
    }

    pub fn tracked_clients(&self) -> usize {
        self.entries.len()
    }
}

impl PreAuthCheck for ClientRateLimit {
    fn name(&self) -> &'static str {
        "client-rate-limit"
    }

    fn check(&self, request: &Request) -> Result<(), AppError> {
        if self.allow(&client_address(request.headers())) {
            Ok(())
        } else {
            Err(AppError::RateLimitExceeded)
        }
    }

    fn maintain(&self) {
        self.cleanup();
    }
}

/// Client address as reported by the fronting proxy
pub fn client_address(headers: &HeaderMap) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    header("x-real-ip")
        .or_else(|| header("x-forwarded-for").and_then(|v| v.split(',').next()).map(str::trim))
        .unwrap_or("unknown")
        .to_string()
}
