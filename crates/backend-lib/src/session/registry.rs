// ============================
// formgate-backend-lib/src/session/registry.rs
// ============================
//! Session registry and admission control.
//!
//! Owns every live [`SessionRecord`]. All changes to one principal's set of
//! sessions (register, evict, destroy, expire) happen while that principal's
//! entry in `principals` is write-locked, so concurrent logins of the same
//! principal serialize and the configured limit holds at every observation
//! point.
//!
//! Lock order is `principals` → `sessions` → `tombstones`. Code holding a
//! `sessions` guard never touches `principals`.
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use formgate_common::{Principal, SessionInfo};
use metrics::{counter, gauge};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::auth::token_generator::{generate_secure_token, is_well_formed};
use crate::config::SecurityConfig;
use crate::error::AppError;
use crate::metrics::{SESSION_ACTIVE, SESSION_CREATED, SESSION_EVICTED, SESSION_EXPIRED, SESSION_LOGGED_OUT};

/// Maximum number of concurrent sessions per principal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionLimit {
    /// A fixed maximum number of concurrent sessions.
    Fixed(u32),
    /// No per-principal limit.
    Unlimited,
}

impl SessionLimit {
    /// Check whether a given active session count has reached this limit.
    pub fn is_reached_by(&self, active_count: usize) -> bool {
        match self {
            Self::Fixed(max) => active_count >= *max as usize,
            Self::Unlimited => false,
        }
    }

    /// Return the numeric limit, or `None` for unlimited.
    pub fn as_max(&self) -> Option<u32> {
        match self {
            Self::Fixed(max) => Some(*max),
            Self::Unlimited => None,
        }
    }
}

impl From<u32> for SessionLimit {
    /// `0` means unlimited.
    fn from(value: u32) -> Self {
        if value == 0 {
            Self::Unlimited
        } else {
            Self::Fixed(value)
        }
    }
}

/// Which login wins once a principal is at its session limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyControl {
    /// Reject the new login; the earlier login keeps its session
    PreventNewLogin,
    /// Destroy the oldest session to make room for the new login
    EvictOldest,
}

/// Admission and expiry rules the registry enforces
#[derive(Debug, Clone, Copy)]
pub struct AdmissionPolicy {
    pub limit: SessionLimit,
    pub control: ConcurrencyControl,
    pub idle_timeout: Duration,
    pub tombstone_retention: Duration,
}

impl From<&SecurityConfig> for AdmissionPolicy {
    fn from(config: &SecurityConfig) -> Self {
        Self {
            limit: config.session_limit(),
            control: config.concurrency_control(),
            idle_timeout: config.session_timeout(),
            tombstone_retention: config.tombstone_retention(),
        }
    }
}

/// One active login
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: String,
    pub principal: Arc<Principal>,
    pub created_at: DateTime<Utc>,
    pub last_access: Instant,
}

impl SessionRecord {
    /// The client-facing view of this session
    pub fn info(&self) -> SessionInfo {
        SessionInfo::new(&self.principal, self.created_at)
    }
}

/// Why a session was destroyed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyReason {
    LoggedOut,
    Evicted,
    Expired,
}

#[derive(Debug, Clone, Copy)]
struct Tombstone {
    reason: DestroyReason,
    at: Instant,
}

/// Outcome of resolving a session id presented by a client
#[derive(Debug, Clone)]
pub enum SessionLookup {
    /// The session is live; its last access time was refreshed
    Active(SessionRecord),
    /// The session timed out
    Expired,
    /// The session was displaced by a newer login of the same principal
    Evicted,
    /// The session was ended by logout
    LoggedOut,
    /// Malformed, forged or long forgotten
    Unknown,
}

impl From<DestroyReason> for SessionLookup {
    fn from(reason: DestroyReason) -> Self {
        match reason {
            DestroyReason::LoggedOut => SessionLookup::LoggedOut,
            DestroyReason::Evicted => SessionLookup::Evicted,
            DestroyReason::Expired => SessionLookup::Expired,
        }
    }
}

struct RegistryInner {
    policy: AdmissionPolicy,
    /// login name → that principal's live session ids, oldest first
    principals: DashMap<String, VecDeque<String>>,
    sessions: DashMap<String, SessionRecord>,
    tombstones: DashMap<String, Tombstone>,
}

/// Shared, cloneable handle to the session registry
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

impl SessionRegistry {
    pub fn new(policy: AdmissionPolicy) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                policy,
                principals: DashMap::new(),
                sessions: DashMap::new(),
                tombstones: DashMap::new(),
            }),
        }
    }

    pub fn policy(&self) -> &AdmissionPolicy {
        &self.inner.policy
    }

    /// Admit a freshly authenticated principal and create its session
    ///
    /// # Errors
    /// [`AppError::SessionLimitExceeded`] when the principal is at its limit
    /// and the policy prevents new logins.
    pub fn register(&self, principal: Principal) -> Result<SessionRecord, AppError> {
        self.register_replacing(principal, None)
    }

    /// Like [`Self::register`], but first ends `previous`, the session the
    /// client presented while logging in. When it belongs to the same
    /// principal it is ended before the limit is checked, so re-logging in
    /// from one browser never counts against the limit. On rejection a
    /// session owned by another principal is left untouched.
    ///
    /// # Errors
    /// [`AppError::SessionLimitExceeded`] as for [`Self::register`].
    pub fn register_replacing(
        &self,
        principal: Principal,
        previous: Option<&str>,
    ) -> Result<SessionRecord, AppError> {
        let inner = &self.inner;
        let policy = inner.policy;
        let now = Instant::now();

        let mut ids = inner.principals.entry(principal.login_name.clone()).or_default();

        if let Some(previous) = previous.filter(|p| ids.iter().any(|id| id.as_str() == *p)) {
            if self.bury(previous, DestroyReason::LoggedOut, now) {
                debug!(login_name = %principal.login_name, "replaced session on re-login");
                counter!(SESSION_LOGGED_OUT).increment(1);
            }
            ids.retain(|id| id != previous);
        }

        // Sessions that timed out but were not swept yet must not hold a slot.
        let stale: Vec<String> = ids
            .iter()
            .filter(|id| {
                inner
                    .sessions
                    .get(id.as_str())
                    .map_or(true, |record| self.is_idle(&record, now))
            })
            .cloned()
            .collect();
        let purged = stale
            .iter()
            .filter(|id| self.bury(id, DestroyReason::Expired, now))
            .count();
        if purged > 0 {
            debug!(login_name = %principal.login_name, purged, "expired idle sessions on login");
            counter!(SESSION_EXPIRED).increment(purged as u64);
        }
        ids.retain(|id| !stale.contains(id));

        while policy.limit.is_reached_by(ids.len()) {
            match policy.control {
                ConcurrencyControl::PreventNewLogin => {
                    info!(
                        login_name = %principal.login_name,
                        active = ids.len(),
                        "login rejected: maximum sessions reached"
                    );
                    return Err(AppError::SessionLimitExceeded {
                        max: policy.limit.as_max().unwrap_or(u32::MAX),
                    });
                },
                ConcurrencyControl::EvictOldest => {
                    let Some(oldest) = ids.pop_front() else { break };
                    if self.bury(&oldest, DestroyReason::Evicted, now) {
                        info!(login_name = %principal.login_name, "evicted oldest session");
                        counter!(SESSION_EVICTED).increment(1);
                    }
                },
            }
        }

        let record = SessionRecord {
            id: generate_secure_token(),
            principal: Arc::new(principal),
            created_at: Utc::now(),
            last_access: now,
        };
        inner.sessions.insert(record.id.clone(), record.clone());
        ids.push_back(record.id.clone());
        drop(ids);

        if let Some(previous) = previous {
            self.invalidate(previous, DestroyReason::LoggedOut);
        }

        debug!(login_name = %record.principal.login_name, "session created");
        counter!(SESSION_CREATED).increment(1);
        gauge!(SESSION_ACTIVE).set(inner.sessions.len() as f64);
        Ok(record)
    }

    /// Resolve a presented session id, refreshing its last access time when live
    pub fn lookup(&self, id: &str) -> SessionLookup {
        if !is_well_formed(id) {
            return SessionLookup::Unknown;
        }
        let now = Instant::now();
        {
            let Some(mut record) = self.inner.sessions.get_mut(id) else {
                // Tombstones are written before records are removed, so a
                // miss here is either a tombstone or a never-issued id.
                return match self.inner.tombstones.get(id) {
                    Some(tombstone) => tombstone.reason.into(),
                    None => SessionLookup::Unknown,
                };
            };
            if !self.is_idle(&record, now) {
                record.last_access = now;
                return SessionLookup::Active(record.clone());
            }
        }
        self.expire(id, now);
        SessionLookup::Expired
    }

    /// Destroy a session; returns whether it was live
    pub fn invalidate(&self, id: &str, reason: DestroyReason) -> bool {
        let Some(owner) = self
            .inner
            .sessions
            .get(id)
            .map(|record| record.principal.login_name.clone())
        else {
            return false;
        };
        let destroyed = self.destroy_owned(&owner, id, reason, |_| true);
        if destroyed {
            match reason {
                DestroyReason::LoggedOut => counter!(SESSION_LOGGED_OUT).increment(1),
                DestroyReason::Evicted => counter!(SESSION_EVICTED).increment(1),
                DestroyReason::Expired => counter!(SESSION_EXPIRED).increment(1),
            }
        }
        destroyed
    }

    /// Remove idle sessions and forget old tombstones; returns the number of
    /// sessions expired
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let idle: Vec<String> = self
            .inner
            .sessions
            .iter()
            .filter(|entry| self.is_idle(entry.value(), now))
            .map(|entry| entry.key().clone())
            .collect();

        let expired = idle.iter().filter(|id| self.expire(id, now)).count();

        let retention = self.inner.policy.tombstone_retention;
        self.inner
            .tombstones
            .retain(|_, tombstone| now.saturating_duration_since(tombstone.at) < retention);
        self.inner.principals.retain(|_, ids| !ids.is_empty());

        if expired > 0 {
            info!(expired, active = self.inner.sessions.len(), "expired idle sessions");
        }
        gauge!(SESSION_ACTIVE).set(self.inner.sessions.len() as f64);
        expired
    }

    /// Run [`Self::sweep`] every `interval` until the returned task is aborted
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                registry.sweep();
            }
        })
    }

    /// Live sessions of one principal, oldest first
    pub fn sessions_for(&self, login_name: &str) -> Vec<SessionRecord> {
        let Some(ids) = self.inner.principals.get(login_name) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| self.inner.sessions.get(id.as_str()).map(|r| r.value().clone()))
            .collect()
    }

    /// Number of live sessions across all principals
    pub fn active_sessions(&self) -> usize {
        self.inner.sessions.len()
    }

    fn is_idle(&self, record: &SessionRecord, now: Instant) -> bool {
        now.saturating_duration_since(record.last_access) >= self.inner.policy.idle_timeout
    }

    // Expire `id` if it is still idle once its owner is locked.
    fn expire(&self, id: &str, now: Instant) -> bool {
        let Some(owner) = self
            .inner
            .sessions
            .get(id)
            .map(|record| record.principal.login_name.clone())
        else {
            return false;
        };
        let expired = self.destroy_owned(&owner, id, DestroyReason::Expired, |record| {
            self.is_idle(record, now)
        });
        if expired {
            debug!(login_name = %owner, "session expired");
            counter!(SESSION_EXPIRED).increment(1);
        }
        expired
    }

    fn destroy_owned(
        &self,
        owner: &str,
        id: &str,
        reason: DestroyReason,
        condition: impl Fn(&SessionRecord) -> bool,
    ) -> bool {
        let inner = &self.inner;
        let destroyed = {
            let mut ids = inner.principals.get_mut(owner);
            let applies = inner
                .sessions
                .get(id)
                .is_some_and(|record| condition(record.value()));
            if !applies {
                return false;
            }
            let destroyed = self.bury(id, reason, Instant::now());
            match ids.as_mut() {
                Some(ids) => ids.retain(|s| s != id),
                None => warn!(login_name = %owner, "session owner missing from registry"),
            }
            destroyed
        };
        inner.principals.remove_if(owner, |_, ids| ids.is_empty());
        destroyed
    }

    // Caller holds the owner's `principals` entry.
    fn bury(&self, id: &str, reason: DestroyReason, now: Instant) -> bool {
        if !self.inner.sessions.contains_key(id) {
            return false;
        }
        self.inner
            .tombstones
            .insert(id.to_string(), Tombstone { reason, at: now });
        self.inner.sessions.remove(id).is_some()
    }
}
