// ============================
// formgate-backend-lib/src/handlers/mod.rs
// ============================
//! HTTP handlers behind the security filter.

pub mod login;
pub mod pages;

pub use login::{login, logout};
pub use pages::{access_denied_page, current_session, fallback, login_page, main_page};
