// crates/manifest-trust-service/src/auth.rs
// ============================================================================
// Module: Service Authorization
// Description: Caller principals, admin role checks, and webhook secrets.
// Purpose: Gate administrative operations and authenticate webhook callers.
// Dependencies: subtle
// ============================================================================

//! ## Overview
//! Authentication happens in the transport binding; this module receives an
//! already authenticated [`Principal`] and decides whether it may perform an
//! administrative operation. Lifecycle webhooks carry no user session and are
//! authenticated by a shared secret compared in constant time.
//!
//! Security posture: fail closed. A webhook is rejected when no secret is
//! configured, and an empty role set grants nothing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use subtle::ConstantTimeEq;

// ============================================================================
// SECTION: Principals
// ============================================================================

/// Authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Subject identifier.
    pub subject: String,
    /// Roles held by the subject.
    pub roles: BTreeSet<String>,
}

impl Principal {
    /// Creates a principal with the given roles.
    #[must_use]
    pub fn new(
        subject: impl Into<String>,
        roles: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            subject: subject.into(),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a principal with no roles.
    #[must_use]
    pub fn anonymous(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            roles: BTreeSet::new(),
        }
    }
}

/// Role-based admin policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminPolicy {
    /// Roles granting administrative privilege.
    admin_roles: BTreeSet<String>,
}

impl AdminPolicy {
    /// Creates a policy from the configured admin roles.
    #[must_use]
    pub fn new(roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            admin_roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true when `principal` holds any admin role.
    #[must_use]
    pub fn is_admin(&self, principal: &Principal) -> bool {
        principal.roles.iter().any(|role| self.admin_roles.contains(role))
    }
}

// ============================================================================
// SECTION: Webhook Secrets
// ============================================================================

/// Shared secret used to authenticate lifecycle webhooks.
#[derive(Clone)]
pub struct WebhookSecret(Option<String>);

impl WebhookSecret {
    /// Wraps an optional configured secret. Empty secrets count as unset.
    #[must_use]
    pub fn new(secret: Option<String>) -> Self {
        Self(secret.filter(|value| !value.is_empty()))
    }

    /// Returns true when a secret is configured.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.0.is_some()
    }

    /// Compares a presented secret in constant time.
    #[must_use]
    pub fn matches(&self, presented: &str) -> bool {
        self.0.as_deref().is_some_and(|expected| constant_time_eq_str(expected, presented))
    }
}

impl std::fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label =
            if self.is_configured() { "WebhookSecret(<redacted>)" } else { "WebhookSecret(unset)" };
        f.write_str(label)
    }
}

/// Compares two strings in constant time.
#[must_use]
pub fn constant_time_eq_str(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_requires_configured_role() {
        let policy = AdminPolicy::new(["admin", "security"]);
        assert!(policy.is_admin(&Principal::new("ops", ["security"])));
        assert!(!policy.is_admin(&Principal::new("dev", ["viewer"])));
        assert!(!policy.is_admin(&Principal::anonymous("nobody")));
    }

    #[test]
    fn unset_or_empty_secret_rejects_everything() {
        assert!(!WebhookSecret::new(None).matches(""));
        assert!(!WebhookSecret::new(Some(String::new())).matches(""));
        let secret = WebhookSecret::new(Some("s3cret".to_string()));
        assert!(secret.matches("s3cret"));
        assert!(!secret.matches("s3cre"));
    }
}
