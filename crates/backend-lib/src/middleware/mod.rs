// crates/backend-lib/src/middleware/mod.rs

//! Middleware of the security filter chain.

pub mod rate_limit;
pub mod request_gate;
pub mod security;

pub use rate_limit::{client_address, ClientRateLimit};
pub use request_gate::{PreAuthCheck, RequestGate};
pub use security::security_filter;
