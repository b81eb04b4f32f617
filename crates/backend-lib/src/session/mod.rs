// ============================
// formgate-backend-lib/src/session/mod.rs
// ============================
//! Session admission, lookup and expiry.

pub mod registry;
pub mod strategy;

pub use registry::{
    AdmissionPolicy, ConcurrencyControl, DestroyReason, SessionLimit, SessionLookup, SessionRecord,
    SessionRegistry,
};
pub use strategy::{removal_cookie, ExpiredSessionStrategy, InvalidSessionStrategy, RedirectSessionStrategy};
