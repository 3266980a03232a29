// crates/manifest-trust-core/src/signed.rs
// ============================================================================
// Module: Signed Manifest Envelope
// Description: Signature metadata, lifecycle status, and the signed envelope.
// Purpose: Bind a manifest to its content hash, signature, and approval state.
// Dependencies: serde, thiserror, crate::{hashing, manifest}
// ============================================================================

//! ## Overview
//! A [`SignedManifest`] aggregates the manifest content, its stored content
//! hash, the authority's signature, and lifecycle status. Status changes are
//! forward-only: drafts may be approved or revoked, approved manifests may be
//! deprecated or revoked, and deprecated/revoked manifests are terminal.
//!
//! The signature records the digest it was issued over, so a manifest edited
//! and re-hashed after signing is still detected as a content mismatch.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::hashing::HashDigest;
use crate::hashing::HashError;
use crate::identifiers::KeyId;
use crate::manifest::ManifestCore;
use crate::manifest::compute_content_hash;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Current signed-manifest schema version.
pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

// ============================================================================
// SECTION: Signature Types
// ============================================================================

/// Signature algorithms accepted for manifest signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    /// RSASSA-PKCS1-v1_5 with SHA-256.
    #[serde(rename = "RS256")]
    Rs256,
    /// ECDSA over P-256 with SHA-256.
    #[serde(rename = "ES256")]
    Es256,
    /// Ed25519.
    #[serde(rename = "EdDSA")]
    EdDsa,
}

impl SignatureAlgorithm {
    /// All supported signature algorithms.
    pub const ALL: [Self; 3] = [Self::Rs256, Self::Es256, Self::EdDsa];

    /// Returns the JOSE algorithm label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rs256 => "RS256",
            Self::Es256 => "ES256",
            Self::EdDsa => "EdDSA",
        }
    }

    /// Parses a JOSE algorithm label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|algorithm| algorithm.as_str() == label)
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signature issued by the manifest authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestSignature {
    /// Signature algorithm.
    pub algorithm: SignatureAlgorithm,
    /// Base64 (standard alphabet) signature bytes.
    pub signature: String,
    /// Identifier of the signing key.
    pub key_id: KeyId,
    /// Content hash the signature was computed over.
    pub content_hash: HashDigest,
    /// Identity of the signer.
    pub signed_by: String,
    /// Signing time.
    pub signed_at: Timestamp,
}

// ============================================================================
// SECTION: Lifecycle Status
// ============================================================================

/// Manifest lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestStatus {
    /// Not yet approved.
    Draft,
    /// Approved by the authority.
    Approved,
    /// Superseded; terminal.
    Deprecated,
    /// Withdrawn; terminal.
    Revoked,
}

impl ManifestStatus {
    /// Returns the stable label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Approved => "approved",
            Self::Deprecated => "deprecated",
            Self::Revoked => "revoked",
        }
    }

    /// Returns true when no further transitions are allowed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Deprecated | Self::Revoked)
    }

    /// Returns true when `self -> next` is a permitted transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::Approved | Self::Revoked)
                | (Self::Approved, Self::Deprecated | Self::Revoked)
        )
    }
}

impl fmt::Display for ManifestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by lifecycle transitions and approval checks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// Transition is not permitted from the current status.
    #[error("illegal status transition {from} -> {to}")]
    Illegal {
        /// Current status.
        from: ManifestStatus,
        /// Requested status.
        to: ManifestStatus,
    },
    /// Approved manifests must carry an approver identity.
    #[error("approved manifest is missing approver identity")]
    MissingApprover,
    /// Approved manifests must carry an approval time.
    #[error("approved manifest is missing approval time")]
    MissingApprovalTime,
    /// Only signed manifests may be approved.
    #[error("manifest must be signed before approval")]
    Unsigned,
}

// ============================================================================
// SECTION: Signed Manifest
// ============================================================================

/// Signed, versioned manifest envelope.
///
/// # Invariants
/// - `content_hash` equals [`compute_content_hash`] of `manifest` when untampered.
/// - `status == Approved` requires `approved_by` and `approved_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedManifest {
    /// Envelope schema version.
    pub schema_version: u32,
    /// Manifest content.
    pub manifest: ManifestCore,
    /// Authority signature (absent for unsigned drafts).
    #[serde(default)]
    pub signature: Option<ManifestSignature>,
    /// Lifecycle status.
    pub status: ManifestStatus,
    /// Approver identity.
    #[serde(default)]
    pub approved_by: Option<String>,
    /// Approval time.
    #[serde(default)]
    pub approved_at: Option<Timestamp>,
    /// Stored content hash.
    pub content_hash: HashDigest,
}

impl SignedManifest {
    /// Creates an unsigned draft envelope with a freshly computed content hash.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when the manifest cannot be hashed.
    pub fn draft(manifest: ManifestCore) -> Result<Self, HashError> {
        let content_hash = compute_content_hash(&manifest)?;
        Ok(Self {
            schema_version: MANIFEST_SCHEMA_VERSION,
            manifest,
            signature: None,
            status: ManifestStatus::Draft,
            approved_by: None,
            approved_at: None,
            content_hash,
        })
    }

    /// Recomputes the content hash from the manifest fields.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when the manifest cannot be hashed.
    pub fn recompute_content_hash(&self) -> Result<HashDigest, HashError> {
        compute_content_hash(&self.manifest)
    }

    /// Returns true when the stored hash matches the manifest content.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when the manifest cannot be hashed.
    pub fn content_hash_matches(&self) -> Result<bool, HashError> {
        Ok(self.recompute_content_hash()? == self.content_hash)
    }

    /// Replaces the stored hash with one recomputed from the current content.
    ///
    /// Existing signatures are left in place and will no longer verify if the
    /// content changed since signing.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when the manifest cannot be hashed.
    pub fn rehash(&mut self) -> Result<(), HashError> {
        self.content_hash = self.recompute_content_hash()?;
        Ok(())
    }

    /// Checks the approval invariant for the current status.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] when an approved manifest lacks approval data.
    pub fn validate_approval(&self) -> Result<(), TransitionError> {
        if self.status != ManifestStatus::Approved {
            return Ok(());
        }
        if self.approved_by.as_deref().is_none_or(str::is_empty) {
            return Err(TransitionError::MissingApprover);
        }
        if self.approved_at.is_none() {
            return Err(TransitionError::MissingApprovalTime);
        }
        Ok(())
    }

    /// Applies a lifecycle transition.
    ///
    /// Approving records `actor` and `at` as the approver identity and time.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] when the transition is not permitted.
    pub fn transition(
        &mut self,
        to: ManifestStatus,
        actor: &str,
        at: Timestamp,
    ) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(to) {
            return Err(TransitionError::Illegal {
                from: self.status,
                to,
            });
        }
        if to == ManifestStatus::Approved {
            if self.signature.is_none() {
                return Err(TransitionError::Unsigned);
            }
            if actor.is_empty() {
                return Err(TransitionError::MissingApprover);
            }
            self.approved_by = Some(actor.to_string());
            self.approved_at = Some(at);
        }
        self.status = to;
        Ok(())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
