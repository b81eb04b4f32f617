// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for metric keys
pub const SESSION_CREATED: &str = "session.created";
pub const SESSION_EVICTED: &str = "session.evicted";
pub const SESSION_EXPIRED: &str = "session.expired";
pub const SESSION_LOGGED_OUT: &str = "session.logged_out";
pub const SESSION_ACTIVE: &str = "session.active";
pub const LOGIN_SUCCEEDED: &str = "login.succeeded";
pub const LOGIN_FAILED: &str = "login.failed";
pub const LOGIN_REJECTED: &str = "login.rejected";
pub const ACCESS_DENIED: &str = "access.denied";
pub const REQUEST_GATE_REJECTED: &str = "request_gate.rejected";
