// ================
// common/src/lib.rs
// ================
//! Common types shared between the `formgate` server and its clients.
//! This module defines the authenticated identity and the JSON view of a session.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default name of the cookie carrying the server-issued captcha key
pub const CAPTCHA_KEY_COOKIE: &str = "captcha_key";

/// Default form parameter carrying the user's captcha answer
pub const CAPTCHA_PARAMETER: &str = "authCode";

/// An authenticated user identity plus its authorities
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Login name, unique per user
    pub login_name: String,
    /// Granted authorities (roles), kept sorted
    pub authorities: BTreeSet<String>,
}

impl Principal {
    /// Create a principal from a login name and its authorities
    pub fn new<I, A>(login_name: impl Into<String>, authorities: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        Self {
            login_name: login_name.into(),
            authorities: authorities.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether the principal holds `authority`
    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.contains(authority)
    }

    /// Whether the principal holds at least one of `authorities`
    pub fn has_any_authority<S: AsRef<str>>(&self, authorities: &[S]) -> bool {
        authorities.iter().any(|a| self.has_authority(a.as_ref()))
    }
}

/// Session details returned to an authenticated client
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// Login name of the owning principal
    #[serde(rename = "loginName")]
    pub login_name: String,
    /// Authorities of the owning principal
    pub authorities: Vec<String>,
    /// When the session was created
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl SessionInfo {
    /// Describe a session owned by `principal`, created at `created_at`
    pub fn new(principal: &Principal, created_at: DateTime<Utc>) -> Self {
        Self {
            login_name: principal.login_name.clone(),
            authorities: principal.authorities.iter().cloned().collect(),
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_principal_authorities() {
        let principal = Principal::new("alice", ["ROLE_USER", "ROLE_ADMIN"]);
        assert!(principal.has_authority("ROLE_ADMIN"));
        assert!(!principal.has_authority("ROLE_AUDITOR"));
        assert!(principal.has_any_authority(&["ROLE_AUDITOR", "ROLE_USER"]));
        assert!(!principal.has_any_authority::<&str>(&[]));
    }

    #[test]
    fn test_session_info_wire_names() {
        let principal = Principal::new("bob", ["ROLE_USER"]);
        let info = SessionInfo::new(&principal, Utc::now());
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["loginName"], "bob");
        assert_eq!(json["authorities"][0], "ROLE_USER");
        assert!(json.get("createdAt").is_some());
    }
}
