// crates/manifest-trust-core/src/manifest.rs
// ============================================================================
// Module: Manifest Content Model
// Description: Agent manifest core fields and their canonical content hash.
// Purpose: Define the signed object and the deterministic digest over it.
// Dependencies: serde, serde_json, crate::hashing
// ============================================================================

//! ## Overview
//! [`ManifestCore`] is the descriptor an authority signs. The content hash is
//! computed over its RFC 8785 canonical form with volatile fields removed, so
//! re-serialization or field reordering never changes the digest while any
//! semantic edit does.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::hashing::DEFAULT_HASH_ALGORITHM;
use crate::hashing::HashDigest;
use crate::hashing::HashError;
use crate::hashing::hash_canonical_json;
use crate::identifiers::AgentId;
use crate::identifiers::ManifestVersion;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Fields excluded from the content hash because they change without changing meaning.
pub const VOLATILE_FIELDS: &[&str] = &["updated_at"];

// ============================================================================
// SECTION: Manifest Types
// ============================================================================

/// Capability exposed by an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    /// Capability name, unique within a manifest.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON schema for the capability input.
    pub input_schema: Value,
    /// JSON schema for the capability output.
    pub output_schema: Value,
    /// Credential names the capability requires at invocation time.
    #[serde(default)]
    pub required_credentials: Vec<String>,
    /// Cost in platform credits per invocation.
    #[serde(default)]
    pub cost: Option<u64>,
}

/// Security posture declared by the agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityDescriptor {
    /// Platform permissions requested.
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Agent performs outbound network calls.
    #[serde(default)]
    pub network_access: bool,
    /// Agent reads or writes the filesystem.
    #[serde(default)]
    pub filesystem_access: bool,
    /// Agent handles sensitive data.
    #[serde(default)]
    pub handles_sensitive_data: bool,
    /// External APIs the agent calls.
    #[serde(default)]
    pub external_apis: Vec<String>,
}

/// Authorship metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Author or publishing team.
    pub author: String,
    /// License identifier.
    pub license: String,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Agent manifest content covered by the content hash and signature.
///
/// # Invariants
/// - Capability names are unique (enforced by the manifest validator).
/// - `updated_at` is excluded from the content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestCore {
    /// Agent identifier.
    pub agent_id: AgentId,
    /// Display name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Semantic version.
    pub version: ManifestVersion,
    /// Ordered capability list.
    pub capabilities: Vec<Capability>,
    /// Security descriptor.
    #[serde(default)]
    pub security: SecurityDescriptor,
    /// Authorship metadata.
    pub metadata: ManifestMetadata,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last update time (volatile).
    pub updated_at: Timestamp,
    /// Checksum over the agent's code artifact.
    pub code_checksum: HashDigest,
}

impl ManifestCore {
    /// Computes the canonical content hash for this manifest.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when canonicalization fails.
    pub fn content_hash(&self) -> Result<HashDigest, HashError> {
        compute_content_hash(self)
    }

    /// Returns the capability with the given name.
    #[must_use]
    pub fn capability(&self, name: &str) -> Option<&Capability> {
        self.capabilities.iter().find(|capability| capability.name == name)
    }
}

// ============================================================================
// SECTION: Content Hash
// ============================================================================

/// Computes the content hash of a manifest over its canonical JSON form.
///
/// The hash depends only on logical content: object key order is normalized by
/// RFC 8785 and [`VOLATILE_FIELDS`] are removed before hashing.
///
/// # Errors
///
/// Returns [`HashError`] when the manifest cannot be serialized.
pub fn compute_content_hash(core: &ManifestCore) -> Result<HashDigest, HashError> {
    let mut value =
        serde_json::to_value(core).map_err(|err| HashError::Canonicalization(err.to_string()))?;
    if let Value::Object(map) = &mut value {
        for field in VOLATILE_FIELDS {
            map.remove(*field);
        }
    }
    hash_canonical_json(DEFAULT_HASH_ALGORITHM, &value)
}
