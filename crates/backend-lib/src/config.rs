// ============================
// formgate-backend-lib/src/config.rs
// ============================
//! Configuration management.
//!
//! Every security rule (login URLs, redirect destinations, session limits,
//! exemptions) lives in one immutable [`SecurityConfig`] record that is built
//! once at startup and shared behind an `Arc`.
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use formgate_common::{CAPTCHA_KEY_COOKIE, CAPTCHA_PARAMETER};
use serde::{Deserialize, Serialize};

use crate::auth::UserEntry;
use crate::matcher::AntPattern;
use crate::session::{ConcurrencyControl, SessionLimit};

/// Default configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "formgate.toml";

/// Prefix of environment overrides, e.g. `FORMGATE_SECURITY__SESSION__TIMEOUT_SECS`
pub const ENV_PREFIX: &str = "FORMGATE_";

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Log level or `EnvFilter` directive
    pub log_level: String,
    /// Log output format
    pub log_format: LogFormat,
    /// Security rules
    pub security: SecurityConfig,
    /// Accounts served by the in-memory credential store
    pub users: Vec<UserEntry>,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// The complete set of security rules
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub form_login: FormLoginConfig,
    pub logout: LogoutConfig,
    pub session: SessionConfig,
    pub captcha: CaptchaConfig,
    /// Where an authenticated but unauthorized request is sent
    pub access_denied_page: String,
    /// Ant patterns that bypass security entirely
    pub ignoring: Vec<String>,
    /// Ant pattern to authority rules; empty means any authenticated user
    pub access_rules: Vec<AccessRule>,
    pub request_gate: RequestGateConfig,
    pub frame_options: FrameOptions,
}

/// Form login behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormLoginConfig {
    /// Login page, the unauthenticated entry point
    pub login_page: String,
    /// Where the login form is submitted
    pub processing_url: String,
    /// Destination after a successful login
    pub default_success_url: String,
    /// Ignore any saved request and always go to `default_success_url`
    pub always_use_default_success_url: bool,
    /// Destination after a failed login
    pub failure_url: String,
    pub username_parameter: String,
    pub password_parameter: String,
}

/// Logout behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogoutConfig {
    pub logout_url: String,
    pub logout_success_url: String,
}

/// Session management
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name of the session identifier cookie
    pub cookie_name: String,
    /// Mark the session cookie `Secure`
    pub cookie_secure: bool,
    /// Maximum concurrent sessions per principal, `0` for unlimited
    pub maximum_sessions: u32,
    /// At the limit, reject the new login instead of evicting the oldest session
    pub max_sessions_prevents_login: bool,
    /// Idle timeout in seconds
    pub timeout_secs: u64,
    /// Interval of the background expiry sweep in seconds
    pub sweep_interval_secs: u64,
    /// How long a destroyed session id is remembered, in seconds
    pub tombstone_retention_secs: u64,
    /// Destination for a malformed or unknown session id
    pub invalid_session_url: String,
    /// Destination for a timed-out or evicted session id
    pub expired_url: String,
    /// Destination when a login is rejected by the session limit
    pub session_limit_url: String,
}

/// Captcha check performed by the authentication gate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptchaConfig {
    /// Enforce the captcha on login; off unless configured
    pub enabled: bool,
    /// Form parameter holding the user's answer
    pub parameter: String,
    /// Cookie holding the server-issued captcha key
    pub cookie_name: String,
    /// Lifetime of an issued challenge in seconds
    pub ttl_secs: u64,
}

/// A URL pattern and the authorities allowed to access it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRule {
    pub pattern: String,
    pub authorities: Vec<String>,
}

/// Pre-authentication checks
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestGateConfig {
    /// Per-client request rate limit; disabled when absent
    pub rate_limit: Option<RateLimitSettings>,
}

/// Fixed window rate limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSettings {
    pub max_requests: u32,
    pub window_secs: u64,
}

/// `X-Frame-Options` response header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FrameOptions {
    Deny,
    SameOrigin,
    Disabled,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            security: SecurityConfig::default(),
            users: Vec::new(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            form_login: FormLoginConfig::default(),
            logout: LogoutConfig::default(),
            session: SessionConfig::default(),
            captcha: CaptchaConfig::default(),
            access_denied_page: "/403.html".to_string(),
            ignoring: vec!["/static/**".to_string()],
            access_rules: Vec::new(),
            request_gate: RequestGateConfig::default(),
            frame_options: FrameOptions::SameOrigin,
        }
    }
}

impl Default for FormLoginConfig {
    fn default() -> Self {
        Self {
            login_page: "/login.html".to_string(),
            processing_url: "/doLogin".to_string(),
            default_success_url: "/main.html".to_string(),
            always_use_default_success_url: true,
            failure_url: "/login.html?login_failure".to_string(),
            username_parameter: "loginName".to_string(),
            password_parameter: "loginPwd".to_string(),
        }
    }
}

impl Default for LogoutConfig {
    fn default() -> Self {
        Self {
            logout_url: "/doLogout".to_string(),
            logout_success_url: "/login.html?logout_success".to_string(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "SESSION".to_string(),
            cookie_secure: false,
            maximum_sessions: 1,
            max_sessions_prevents_login: true,
            timeout_secs: 30 * 60, // 30 minutes
            sweep_interval_secs: 60,
            tombstone_retention_secs: 60 * 60,
            invalid_session_url: "/login.html?session_invalid".to_string(),
            expired_url: "/login.html?session_expired".to_string(),
            session_limit_url: "/login.html?session_limit".to_string(),
        }
    }
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            parameter: CAPTCHA_PARAMETER.to_string(),
            cookie_name: CAPTCHA_KEY_COOKIE.to_string(),
            ttl_secs: 5 * 60,
        }
    }
}

impl Settings {
    /// Layered configuration: defaults, then `formgate.toml`, then environment
    pub fn figment() -> Figment {
        Self::figment_from(DEFAULT_CONFIG_FILE)
    }

    /// Layered configuration reading the given TOML file
    pub fn figment_from(path: impl AsRef<Path>) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load and validate settings from the default locations
    pub fn load() -> Result<Self> {
        Self::extract(Self::figment())
    }

    /// Load and validate settings from an explicit file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            bail!("configuration file {} does not exist", path.display());
        }
        Self::extract(Self::figment_from(path))
    }

    fn extract(figment: Figment) -> Result<Self> {
        let settings: Settings = figment.extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.log_level.trim().is_empty() {
            bail!("log_level must not be empty");
        }
        let mut seen = std::collections::HashSet::new();
        for user in &self.users {
            if user.login_name.trim().is_empty() {
                bail!("users: login_name must not be empty");
            }
            if !seen.insert(user.login_name.as_str()) {
                bail!("users: duplicate login_name {:?}", user.login_name);
            }
        }
        self.security.validate()
    }
}

impl SecurityConfig {
    /// Reject rules that cannot be served
    pub fn validate(&self) -> Result<()> {
        let redirects = [
            ("form_login.login_page", &self.form_login.login_page),
            ("form_login.processing_url", &self.form_login.processing_url),
            ("form_login.default_success_url", &self.form_login.default_success_url),
            ("form_login.failure_url", &self.form_login.failure_url),
            ("logout.logout_url", &self.logout.logout_url),
            ("logout.logout_success_url", &self.logout.logout_success_url),
            ("session.invalid_session_url", &self.session.invalid_session_url),
            ("session.expired_url", &self.session.expired_url),
            ("session.session_limit_url", &self.session.session_limit_url),
            ("access_denied_page", &self.access_denied_page),
        ];
        for (name, url) in redirects {
            if !url.starts_with('/') || url.starts_with("//") {
                bail!("{name} must be a local absolute path, got {url:?}");
            }
        }

        // These become routes, so their path parts must not collide.
        let routed = [
            path_part(&self.form_login.login_page),
            path_part(&self.form_login.processing_url),
            path_part(&self.form_login.default_success_url),
            path_part(&self.logout.logout_url),
            path_part(&self.access_denied_page),
            SESSION_INFO_PATH,
        ];
        for (i, a) in routed.iter().enumerate() {
            if a.contains(['{', '}', '*']) {
                bail!("route path {a:?} must not contain wildcards or captures");
            }
            if routed[i + 1..].contains(a) {
                bail!("route path {a:?} is configured more than once");
            }
        }

        let params = [
            &self.form_login.username_parameter,
            &self.form_login.password_parameter,
            &self.captcha.parameter,
            &self.captcha.cookie_name,
            &self.session.cookie_name,
        ];
        if params.iter().any(|p| p.trim().is_empty()) {
            bail!("parameter and cookie names must not be empty");
        }
        if self.session.timeout_secs == 0 {
            bail!("session.timeout_secs must be greater than zero");
        }
        if self.session.sweep_interval_secs == 0 {
            bail!("session.sweep_interval_secs must be greater than zero");
        }
        if self.captcha.enabled && self.captcha.ttl_secs == 0 {
            bail!("captcha.ttl_secs must be greater than zero");
        }
        for pattern in self.ignoring.iter().chain(self.access_rules.iter().map(|r| &r.pattern)) {
            if !pattern.starts_with('/') {
                bail!("pattern {pattern:?} must start with '/'");
            }
        }
        if let Some(limit) = self.request_gate.rate_limit {
            if limit.max_requests == 0 || limit.window_secs == 0 {
                bail!("request_gate.rate_limit values must be greater than zero");
            }
        }
        Ok(())
    }

    /// Session limit as configured, `0` meaning unlimited
    pub fn session_limit(&self) -> SessionLimit {
        SessionLimit::from(self.session.maximum_sessions)
    }

    /// Which login wins when the session limit is reached
    pub fn concurrency_control(&self) -> ConcurrencyControl {
        if self.session.max_sessions_prevents_login {
            ConcurrencyControl::PreventNewLogin
        } else {
            ConcurrencyControl::EvictOldest
        }
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session.timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.session.sweep_interval_secs)
    }

    pub fn tombstone_retention(&self) -> Duration {
        Duration::from_secs(self.session.tombstone_retention_secs)
    }

    pub fn captcha_ttl(&self) -> Duration {
        Duration::from_secs(self.captcha.ttl_secs)
    }

    /// Compiled ignore patterns
    pub fn ignored_patterns(&self) -> Vec<AntPattern> {
        self.ignoring.iter().map(|p| AntPattern::new(p)).collect()
    }

    /// Paths reachable without a session
    pub fn permitted_paths(&self) -> [&str; 4] {
        [
            path_part(&self.form_login.login_page),
            path_part(&self.form_login.processing_url),
            path_part(&self.logout.logout_url),
            path_part(&self.access_denied_page),
        ]
    }
}

/// Path of the JSON session view
pub const SESSION_INFO_PATH: &str = "/session";

/// The path component of a configured URL, without query or fragment
pub fn path_part(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}
