// ============================
// formgate-backend-lib/src/auth/credentials.rs
// ============================
//! User accounts and the credential store the authentication gate consults.
use async_trait::async_trait;
use dashmap::DashMap;
use formgate_common::Principal;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// A user account as configured
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntry {
    pub login_name: String,
    /// scrypt PHC string, see `formgate hash-password`
    pub password_hash: String,
    #[serde(default)]
    pub authorities: Vec<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl UserEntry {
    /// The identity this account authenticates as
    pub fn principal(&self) -> Principal {
        Principal::new(self.login_name.clone(), self.authorities.iter().cloned())
    }
}

/// Source of user identities and password hashes
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up an account by login name
    async fn load_user(&self, login_name: &str) -> Result<Option<UserEntry>, AppError>;
}

/// Credential store backed by a concurrent map
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    users: DashMap<String, UserEntry>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from configured accounts; later duplicates replace earlier ones
    pub fn from_entries(entries: impl IntoIterator<Item = UserEntry>) -> Self {
        let store = Self::new();
        for entry in entries {
            store.insert(entry);
        }
        store
    }

    /// Add or replace an account
    pub fn insert(&self, entry: UserEntry) {
        self.users.insert(entry.login_name.clone(), entry);
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn load_user(&self, login_name: &str) -> Result<Option<UserEntry>, AppError> {
        Ok(self.users.get(login_name).map(|entry| entry.value().clone()))
    }
}
