// ============================
// formgate-backend-lib/src/auth/mod.rs
// ============================
//! Authentication module.

pub mod captcha;
pub mod credentials;
pub mod gate;
pub mod password;
pub mod token_generator;

pub use captcha::{captcha_key, CaptchaValidator, InMemoryCaptchaStore};
pub use credentials::{CredentialStore, InMemoryCredentialStore, UserEntry};
pub use gate::{AuthenticationGate, LoginAttempt};
pub use password::{hash_password, hash_password_with_cost, verify_password};
pub use token_generator::generate_secure_token;
