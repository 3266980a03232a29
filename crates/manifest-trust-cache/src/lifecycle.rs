// crates/manifest-trust-cache/src/lifecycle.rs
// ============================================================================
// Module: Lifecycle Events
// Description: Maps agent lifecycle notifications onto cache actions.
// Purpose: Keep cached manifests consistent with registry lifecycle changes.
// Dependencies: manifest-trust-core, serde, crate::cache
// ============================================================================

//! ## Overview
//! Lifecycle notifications arrive from the agent registry (typically through
//! an authenticated webhook). Every kind invalidates the affected entries
//! before returning; `approved` additionally warms the newly approved version
//! so the first consumer request is a hit.
//!
//! `deprecated` and `revoked` also retire the agent (or one version) from
//! warming: its request counts are dropped and later warming passes skip it
//! until a fresh approval reinstates it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;

use manifest_trust_core::AgentId;
use manifest_trust_core::AuditEvent;
use manifest_trust_core::CacheKey;
use manifest_trust_core::ManifestVersion;
use manifest_trust_core::VersionSelector;
use serde::Deserialize;
use serde::Serialize;

use crate::cache::ManifestCache;
use crate::cache::Origin;
use crate::cache::lock;

// ============================================================================
// SECTION: Events
// ============================================================================

/// Agent lifecycle event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleKind {
    /// A manifest version was approved.
    Approved,
    /// A manifest version was updated.
    Updated,
    /// A manifest version was deprecated.
    Deprecated,
    /// A manifest version or agent was revoked.
    Revoked,
}

impl LifecycleKind {
    /// All lifecycle kinds.
    pub const ALL: [Self; 4] = [Self::Approved, Self::Updated, Self::Deprecated, Self::Revoked];

    /// Returns the wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Updated => "updated",
            Self::Deprecated => "deprecated",
            Self::Revoked => "revoked",
        }
    }

    /// Parses a wire label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == label)
    }
}

impl fmt::Display for LifecycleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    /// Event kind.
    #[serde(rename = "event")]
    pub kind: LifecycleKind,
    /// Affected agent.
    pub agent_id: AgentId,
    /// Affected version; `None` targets every version of the agent.
    #[serde(default)]
    pub version: Option<ManifestVersion>,
}

/// Result of applying a lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleOutcome {
    /// Event kind applied.
    pub kind: LifecycleKind,
    /// Slots removed.
    pub invalidated: usize,
    /// Key warmed after approval.
    pub warmed: Option<CacheKey>,
    /// Warm failure after approval, when the warm did not succeed.
    pub warm_error: Option<String>,
}

/// Warming exclusion recorded for an agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Retirement {
    /// Every version of the agent.
    Agent,
    /// Listed versions only.
    Versions(BTreeSet<ManifestVersion>),
}

// ============================================================================
// SECTION: Handling
// ============================================================================

impl ManifestCache {
    /// Applies a lifecycle event.
    ///
    /// Invalidation completes before this returns, so a `get` issued
    /// afterwards never observes the superseded entry. A failed warm after
    /// approval is reported in the outcome and does not fail the event.
    pub async fn handle_lifecycle_event(&self, event: &LifecycleEvent) -> LifecycleOutcome {
        let invalidated = self.remove_for_agent(&event.agent_id, event.version.as_ref(), true);
        match event.kind {
            LifecycleKind::Deprecated | LifecycleKind::Revoked => {
                self.retire(&event.agent_id, event.version.as_ref());
            }
            LifecycleKind::Approved => self.reinstate(&event.agent_id, event.version.as_ref()),
            LifecycleKind::Updated => {}
        }
        let mut outcome = LifecycleOutcome {
            kind: event.kind,
            invalidated,
            warmed: None,
            warm_error: None,
        };
        if event.kind == LifecycleKind::Approved {
            let key = CacheKey::new(event.agent_id.clone(), event.version.clone());
            match self.get_with_origin(&key, Origin::Warm).await {
                Ok(_) => outcome.warmed = Some(key),
                Err(err) => outcome.warm_error = Some(err.to_string()),
            }
        }
        self.audit.emit(AuditEvent::LifecycleApplied {
            kind: event.kind.as_str().to_string(),
            agent_id: event.agent_id.to_string(),
            version: event.version.as_ref().map(ToString::to_string),
            invalidated,
            warmed: outcome.warmed.is_some(),
        });
        outcome
    }

    /// Returns true when lifecycle events have excluded `key` from warming.
    ///
    /// A version-scoped retirement leaves the agent's `latest` key eligible;
    /// warming still refuses to install a deprecated manifest it resolves to.
    #[must_use]
    pub fn is_retired(&self, key: &CacheKey) -> bool {
        match lock(&self.retired).get(&key.agent_id) {
            None => false,
            Some(Retirement::Agent) => true,
            Some(Retirement::Versions(versions)) => match &key.version {
                VersionSelector::Exact(version) => versions.contains(version),
                VersionSelector::Latest => false,
            },
        }
    }

    /// Records a retirement and forgets the matching request counts.
    fn retire(&self, agent_id: &AgentId, version: Option<&ManifestVersion>) {
        {
            let mut retired = lock(&self.retired);
            match version {
                None => {
                    retired.insert(agent_id.clone(), Retirement::Agent);
                }
                Some(version) => {
                    let entry = retired
                        .entry(agent_id.clone())
                        .or_insert_with(|| Retirement::Versions(BTreeSet::new()));
                    if let Retirement::Versions(versions) = entry {
                        versions.insert(version.clone());
                    }
                }
            }
        }
        lock(&self.request_counts).retain(|key, _| {
            &key.agent_id != agent_id
                || matches!(
                    (&key.version, version),
                    (VersionSelector::Exact(exact), Some(version)) if exact != version
                )
        });
    }

    /// Lifts a retirement after a new approval.
    fn reinstate(&self, agent_id: &AgentId, version: Option<&ManifestVersion>) {
        let mut retired = lock(&self.retired);
        let lifted = match (retired.get_mut(agent_id), version) {
            (None, _) => false,
            (Some(Retirement::Versions(versions)), Some(version)) => {
                versions.remove(version);
                versions.is_empty()
            }
            (Some(_), _) => true,
        };
        if lifted {
            retired.remove(agent_id);
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
