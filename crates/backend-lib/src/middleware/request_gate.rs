// ============================
// crates/backend-lib/src/middleware/request_gate.rs
// ============================
//! Pre-authentication checks run ahead of login processing.
use std::sync::Arc;

use axum::extract::Request;
use metrics::counter;
use tracing::warn;

use super::rate_limit::ClientRateLimit;
use crate::config::RequestGateConfig;
use crate::error::AppError;
use crate::metrics::REQUEST_GATE_REJECTED;

/// One check a request must pass before any authentication processing
pub trait PreAuthCheck: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Reject the request with an error, or let it through
    fn check(&self, request: &Request) -> Result<(), AppError>;

    /// Periodic housekeeping, e.g. dropping stale counters
    fn maintain(&self) {}
}

/// Ordered list of [`PreAuthCheck`]s; the first rejection wins
#[derive(Clone, Default)]
pub struct RequestGate {
    checks: Vec<Arc<dyn PreAuthCheck>>,
}

impl RequestGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks enabled by configuration
    pub fn from_config(config: &RequestGateConfig) -> Self {
        let mut gate = Self::new();
        if let Some(limit) = config.rate_limit {
            gate = gate.with_check(Arc::new(ClientRateLimit::from_settings(limit)));
        }
        gate
    }

    /// Append a check
    pub fn with_check(mut self, check: Arc<dyn PreAuthCheck>) -> Self {
        self.checks.push(check);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    pub fn check(&self, request: &Request) -> Result<(), AppError> {
        for check in &self.checks {
            if let Err(err) = check.check(request) {
                warn!(check = check.name(), path = %request.uri().path(), error = %err, "request rejected before authentication");
                counter!(REQUEST_GATE_REJECTED).increment(1);
                return Err(err);
            }
        }
        Ok(())
    }

    pub fn maintain(&self) {
        for check in &self.checks {
            check.maintain();
        }
    }
}
