// ============================
// formgate-backend-lib/src/access.rs
// ============================
//! Authorization of authenticated requests.
use axum::http::Method;
use formgate_common::Principal;

use crate::config::AccessRule;
use crate::matcher::AntPattern;

/// The resource a request asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub method: Method,
    pub path: String,
}

impl ResourceDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Granted,
    Denied,
}

/// Decides whether a principal may access a resource
pub trait AccessDecisionPolicy: Send + Sync {
    fn decide(&self, principal: &Principal, resource: &ResourceDescriptor) -> AccessDecision;
}

/// Grants every authenticated principal
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthenticatedPolicy;

impl AccessDecisionPolicy for AuthenticatedPolicy {
    fn decide(&self, _principal: &Principal, _resource: &ResourceDescriptor) -> AccessDecision {
        AccessDecision::Granted
    }
}

/// Maps URL patterns to the authorities allowed to use them. The first rule
/// whose pattern matches decides; a path no rule matches is granted.
#[derive(Debug, Clone, Default)]
pub struct UrlAuthorityPolicy {
    rules: Vec<(AntPattern, Vec<String>)>,
}

impl UrlAuthorityPolicy {
    pub fn new(rules: &[AccessRule]) -> Self {
        Self {
            rules: rules
                .iter()
                .map(|rule| (AntPattern::new(&rule.pattern), rule.authorities.clone()))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl AccessDecisionPolicy for UrlAuthorityPolicy {
    fn decide(&self, principal: &Principal, resource: &ResourceDescriptor) -> AccessDecision {
        let Some((_, required)) = self
            .rules
            .iter()
            .find(|(pattern, _)| pattern.matches(&resource.path))
        else {
            return AccessDecision::Granted;
        };
        if principal.has_any_authority(required) {
            AccessDecision::Granted
        } else {
            AccessDecision::Denied
        }
    }
}
