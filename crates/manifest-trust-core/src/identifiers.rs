// crates/manifest-trust-core/src/identifiers.rs
// ============================================================================
// Module: Manifest Trust Identifiers
// Description: Canonical identifiers for agents, manifest versions, and keys.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! This module defines the string-based identifiers used throughout the manifest
//! trust subsystem. Identifiers are opaque wrappers that serialize as strings.
//! Pattern validation (for example the `sa-` agent prefix) is enforced by the
//! manifest validator rather than by these constructors, so stored records with
//! legacy identifiers can still be loaded and reported on.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Required prefix for agent identifiers.
pub const AGENT_ID_PREFIX: &str = "sa-";
/// Selector label for the latest approved manifest version.
pub const LATEST_VERSION_LABEL: &str = "latest";

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Agent identifier (`sa-[a-z0-9-]+`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    /// Creates a new agent identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true when the identifier matches `sa-[a-z0-9-]+`.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.0.strip_prefix(AGENT_ID_PREFIX).is_some_and(|rest| {
            !rest.is_empty()
                && rest
                    .bytes()
                    .all(|byte| byte.is_ascii_lowercase() || byte.is_ascii_digit() || byte == b'-')
        })
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for AgentId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for AgentId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Semantic manifest version string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManifestVersion(String);

impl ManifestVersion {
    /// Creates a new manifest version.
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    /// Returns the version as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses the version as a semantic version.
    ///
    /// # Errors
    ///
    /// Returns [`semver::Error`] when the version is not valid semver.
    pub fn parse_semver(&self) -> Result<semver::Version, semver::Error> {
        semver::Version::parse(&self.0)
    }
}

impl fmt::Display for ManifestVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ManifestVersion {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ManifestVersion {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Signing/verification key identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(String);

impl KeyId {
    /// Creates a new key identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for KeyId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for KeyId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Version Selection
// ============================================================================

/// Version selector used when requesting a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "version")]
pub enum VersionSelector {
    /// Latest approved version as resolved by the record store.
    Latest,
    /// Exact manifest version.
    Exact(ManifestVersion),
}

impl VersionSelector {
    /// Returns the exact version when one is selected.
    #[must_use]
    pub const fn exact(&self) -> Option<&ManifestVersion> {
        match self {
            Self::Latest => None,
            Self::Exact(version) => Some(version),
        }
    }
}

impl fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str(LATEST_VERSION_LABEL),
            Self::Exact(version) => version.fmt(f),
        }
    }
}

impl From<ManifestVersion> for VersionSelector {
    fn from(value: ManifestVersion) -> Self {
        Self::Exact(value)
    }
}

impl From<Option<ManifestVersion>> for VersionSelector {
    fn from(value: Option<ManifestVersion>) -> Self {
        value.map_or(Self::Latest, Self::Exact)
    }
}

// ============================================================================
// SECTION: Cache Keys
// ============================================================================

/// Manifest cache key: agent identifier plus version selector.
///
/// # Invariants
/// - String form is `agent@version`, `agent@latest`, or a bare `agent` (latest).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    /// Agent identifier.
    pub agent_id: AgentId,
    /// Version selector.
    pub version: VersionSelector,
}

impl CacheKey {
    /// Creates a cache key.
    #[must_use]
    pub fn new(agent_id: impl Into<AgentId>, version: impl Into<VersionSelector>) -> Self {
        Self {
            agent_id: agent_id.into(),
            version: version.into(),
        }
    }

    /// Creates a cache key for the latest version of an agent.
    #[must_use]
    pub fn latest(agent_id: impl Into<AgentId>) -> Self {
        Self {
            agent_id: agent_id.into(),
            version: VersionSelector::Latest,
        }
    }

    /// Creates a cache key for an exact agent version.
    #[must_use]
    pub fn exact(agent_id: impl Into<AgentId>, version: impl Into<ManifestVersion>) -> Self {
        Self {
            agent_id: agent_id.into(),
            version: VersionSelector::Exact(version.into()),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.agent_id, self.version)
    }
}

/// Errors raised when parsing cache keys.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheKeyParseError {
    /// Agent component is empty.
    #[error("cache key is missing an agent identifier")]
    MissingAgent,
    /// Version component is empty after `@`.
    #[error("cache key is missing a version after '@'")]
    MissingVersion,
}

impl FromStr for CacheKey {
    type Err = CacheKeyParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (agent, version) = match value.split_once('@') {
            Some((agent, version)) => (agent.trim(), Some(version.trim())),
            None => (value.trim(), None),
        };
        if agent.is_empty() {
            return Err(CacheKeyParseError::MissingAgent);
        }
        let version = match version {
            None => VersionSelector::Latest,
            Some("") => return Err(CacheKeyParseError::MissingVersion),
            Some(LATEST_VERSION_LABEL) => VersionSelector::Latest,
            Some(version) => VersionSelector::Exact(ManifestVersion::new(version)),
        };
        Ok(Self {
            agent_id: AgentId::new(agent),
            version,
        })
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use super::*;

    #[test]
    fn agent_id_pattern() {
        assert!(AgentId::new("sa-email-basic").is_well_formed());
        assert!(AgentId::new("sa-x2").is_well_formed());
        assert!(!AgentId::new("sa-").is_well_formed());
        assert!(!AgentId::new("sa-Email").is_well_formed());
        assert!(!AgentId::new("agent-email").is_well_formed());
        assert!(!AgentId::new("sa-email_basic").is_well_formed());
    }

    #[test]
    fn cache_key_round_trips_display() {
        let exact: CacheKey = "sa-x@1.0.0".parse().unwrap();
        assert_eq!(exact, CacheKey::exact("sa-x", "1.0.0"));
        assert_eq!(exact.to_string(), "sa-x@1.0.0");

        let bare: CacheKey = "sa-whatsapp".parse().unwrap();
        assert_eq!(bare, CacheKey::latest("sa-whatsapp"));
        assert_eq!(bare.to_string(), "sa-whatsapp@latest");
        assert_eq!("sa-whatsapp@latest".parse::<CacheKey>().unwrap(), bare);
    }

    #[test]
    fn cache_key_rejects_empty_components() {
        assert_eq!("@1.0.0".parse::<CacheKey>(), Err(CacheKeyParseError::MissingAgent));
        assert_eq!("sa-x@".parse::<CacheKey>(), Err(CacheKeyParseError::MissingVersion));
    }
}
