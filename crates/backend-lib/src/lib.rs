// ============================
// formgate-backend-lib/src/lib.rs
// ============================
//! Core library of the `formgate` form-login security front.

pub mod access;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod matcher;
pub mod metrics;
pub mod middleware;
pub mod router;
pub mod session;

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use crate::access::{AccessDecisionPolicy, AuthenticatedPolicy, UrlAuthorityPolicy};
use crate::auth::{AuthenticationGate, CaptchaValidator, CredentialStore, InMemoryCaptchaStore, InMemoryCredentialStore};
use crate::config::{SecurityConfig, Settings};
use crate::matcher::AntPattern;
use crate::middleware::request_gate::{PreAuthCheck, RequestGate};
use crate::session::{
    AdmissionPolicy, ExpiredSessionStrategy, InvalidSessionStrategy, RedirectSessionStrategy, SessionRegistry,
};

/// Application state shared across all handlers
pub struct AppState {
    /// Immutable security configuration
    pub config: Arc<SecurityConfig>,
    /// Live sessions and admission control
    pub registry: SessionRegistry,
    /// Login form authentication
    pub gate: AuthenticationGate,
    /// Default captcha challenge store
    pub captcha: Arc<InMemoryCaptchaStore>,
    pub access: Arc<dyn AccessDecisionPolicy>,
    pub request_gate: RequestGate,
    pub invalid_session: Arc<dyn InvalidSessionStrategy>,
    pub expired_session: Arc<dyn ExpiredSessionStrategy>,
    /// Paths that bypass security entirely
    pub ignored: Vec<AntPattern>,
}

impl AppState {
    /// Create the application state from validated settings, seeding the
    /// credential store with the configured users
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        settings.validate()?;
        let credentials = InMemoryCredentialStore::from_entries(settings.users.iter().cloned());
        info!(users = credentials.len(), "credential store seeded");
        AppStateBuilder::new(settings.security.clone())
            .credentials(Arc::new(credentials))
            .build()
    }

    /// Start the session sweeper and request gate housekeeping
    pub fn spawn_background_tasks(&self) -> Vec<JoinHandle<()>> {
        let interval = self.config.sweep_interval();
        let sweeper = self.registry.spawn_sweeper(interval);

        let request_gate = self.request_gate.clone();
        let captcha = self.captcha.clone();
        let housekeeping = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                request_gate.maintain();
                captcha.sweep();
            }
        });

        vec![sweeper, housekeeping]
    }
}

/// Assembles an [`AppState`] with optional custom collaborators
pub struct AppStateBuilder {
    config: SecurityConfig,
    credentials: Option<Arc<dyn CredentialStore>>,
    captcha: Option<Arc<dyn CaptchaValidator>>,
    access: Option<Arc<dyn AccessDecisionPolicy>>,
    checks: Vec<Arc<dyn PreAuthCheck>>,
}

impl AppStateBuilder {
    pub fn new(config: SecurityConfig) -> Self {
        Self {
            config,
            credentials: None,
            captcha: None,
            access: None,
            checks: Vec::new(),
        }
    }

    pub fn credentials(mut self, credentials: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Replace the in-memory captcha store as the gate's validator
    pub fn captcha_validator(mut self, validator: Arc<dyn CaptchaValidator>) -> Self {
        self.captcha = Some(validator);
        self
    }

    pub fn access_policy(mut self, policy: Arc<dyn AccessDecisionPolicy>) -> Self {
        self.access = Some(policy);
        self
    }

    /// Run `check` after the configured request gate checks
    pub fn pre_auth_check(mut self, check: Arc<dyn PreAuthCheck>) -> Self {
        self.checks.push(check);
        self
    }

    /// # Errors
    /// Fails when the security configuration does not validate.
    pub fn build(self) -> anyhow::Result<AppState> {
        self.config.validate()?;
        let config = Arc::new(self.config);

        let captcha_store = Arc::new(InMemoryCaptchaStore::new(config.captcha_ttl()));
        let validator: Arc<dyn CaptchaValidator> = match self.captcha {
            Some(validator) => validator,
            None => captcha_store.clone(),
        };
        let credentials = self
            .credentials
            .unwrap_or_else(|| Arc::new(InMemoryCredentialStore::new()));

        let access = self.access.unwrap_or_else(|| {
            let policy = UrlAuthorityPolicy::new(&config.access_rules);
            if policy.is_empty() {
                Arc::new(AuthenticatedPolicy) as Arc<dyn AccessDecisionPolicy>
            } else {
                Arc::new(policy)
            }
        });

        let request_gate = self
            .checks
            .into_iter()
            .fold(RequestGate::from_config(&config.request_gate), RequestGate::with_check);

        let policy = AdmissionPolicy::from(config.as_ref());
        info!(
            limit = ?policy.limit,
            control = ?policy.control,
            idle_timeout = ?policy.idle_timeout,
            captcha = config.captcha.enabled,
            "security configured"
        );

        Ok(AppState {
            registry: SessionRegistry::new(policy),
            gate: AuthenticationGate::new(config.clone(), credentials, validator),
            captcha: captcha_store,
            access,
            request_gate,
            invalid_session: Arc::new(RedirectSessionStrategy::invalid(&config)),
            expired_session: Arc::new(RedirectSessionStrategy::expired(&config)),
            ignored: config.ignored_patterns(),
            config,
        })
    }
}
