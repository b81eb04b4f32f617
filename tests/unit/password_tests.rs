// =========================
// tests/unit/password_tests.rs
// =========================
//! Hashes produced for the `users` table
use formgate_backend_lib::auth::{hash_password, hash_password_with_cost, verify_password};

#[test]
fn test_default_cost_hash_verifies() {
    let hash = hash_password("correct horse").unwrap();
    assert!(hash.starts_with("$scrypt$"));
    assert!(verify_password(&hash, "correct horse"));
}

#[test]
fn test_each_hash_is_salted() {
    let first = hash_password_with_cost("same", 4).unwrap();
    let second = hash_password_with_cost("same", 4).unwrap();
    assert_ne!(first, second);
    assert!(verify_password(&first, "same") && verify_password(&second, "same"));
    assert!(!verify_password(&first, "same "));
}
