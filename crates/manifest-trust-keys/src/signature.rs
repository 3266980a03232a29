// crates/manifest-trust-keys/src/signature.rs
// ============================================================================
// Module: Signature Service
// Description: Manifest signing, verification, and key distribution.
// Purpose: Bind manifest content hashes to registry keys and check them later.
// Dependencies: base64, manifest-trust-core, crate::{codec, key, registry}
// ============================================================================

//! ## Overview
//! Signatures are produced over the RFC 8785 canonical JSON of the manifest's
//! [`HashDigest`], never over ad-hoc serialized manifest bytes. Verification
//! runs a fixed sequence and stops at the first failure:
//!
//! 1. Recompute the content hash and compare it to both the stored hash and
//!    the hash recorded in the signature ([`VerificationError::HashMismatch`]).
//! 2. Resolve the signing key ([`VerificationError::KeyNotFound`]).
//! 3. Check the signature bytes ([`VerificationError::SignatureInvalid`]).
//! 4. Classify key validity: revoked keys fail, expired keys pass with a
//!    warning inside the grace window, and fail outside it.
//!
//! Verification never mutates the registry or the manifest.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64;
use manifest_trust_core::HashAlgorithm;
use manifest_trust_core::HashDigest;
use manifest_trust_core::HashError;
use manifest_trust_core::KeyId;
use manifest_trust_core::ManifestCore;
use manifest_trust_core::ManifestSignature;
use manifest_trust_core::ManifestValidationError;
use manifest_trust_core::ManifestValidator;
use manifest_trust_core::SignatureAlgorithm;
use manifest_trust_core::SignedManifest;
use manifest_trust_core::Timestamp;
use manifest_trust_core::hashing::canonical_json_bytes;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::codec::FingerprintAlgorithm;
use crate::codec::Jwks;
use crate::key::KeyError;
use crate::key::KeyFormat;
use crate::key::KeyStatus;
use crate::key::KeyType;
use crate::key::KeyUsage;
use crate::registry::KeyRegistry;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default grace window for signatures made by keys that have since expired.
pub const DEFAULT_EXPIRED_KEY_GRACE_DAYS: u32 = 90;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while signing a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignError {
    /// Manifest failed validation.
    #[error("manifest validation failed: {0}")]
    Validation(#[from] ManifestValidationError),
    /// Content hash could not be computed.
    #[error(transparent)]
    Hashing(#[from] HashError),
    /// Key lookup or signing primitive failed.
    #[error(transparent)]
    Key(#[from] KeyError),
    /// Key is not permitted to sign.
    #[error("key {0} is not permitted to sign")]
    UsageNotPermitted(KeyId),
    /// Key has no private material.
    #[error("key {0} has no private key material")]
    MissingPrivateKey(KeyId),
    /// Key is inactive, expired, or revoked.
    #[error("key {0} is not valid for signing")]
    KeyNotValid(KeyId),
}

/// Verification failures, in the order they are checked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    /// Content changed after signing.
    #[error("content hash mismatch: expected {expected}, computed {actual}")]
    HashMismatch {
        /// Hash that was stored or signed.
        expected: HashDigest,
        /// Hash recomputed from the manifest content.
        actual: HashDigest,
    },
    /// Manifest carries no signature.
    #[error("manifest is not signed")]
    MissingSignature,
    /// Signing key is not registered.
    #[error("signing key not found: {0}")]
    KeyNotFound(KeyId),
    /// Signature algorithm does not match the key.
    #[error("signature algorithm {actual} does not match key {key_id} ({expected})")]
    AlgorithmMismatch {
        /// Signing key identifier.
        key_id: KeyId,
        /// Algorithm of the registered key.
        expected: SignatureAlgorithm,
        /// Algorithm declared on the signature.
        actual: SignatureAlgorithm,
    },
    /// Key is not permitted to verify.
    #[error("key {0} is not permitted to verify")]
    UsageNotPermitted(KeyId),
    /// Signature bytes do not verify.
    #[error("signature invalid for key {0}")]
    SignatureInvalid(KeyId),
    /// Key has been revoked.
    #[error("signing key revoked: {0}")]
    KeyRevoked(KeyId),
    /// Key expired and the signature is outside the grace policy.
    #[error("signing key {key_id} expired at {expired_at}")]
    KeyExpired {
        /// Signing key identifier.
        key_id: KeyId,
        /// Expiry time.
        expired_at: Timestamp,
    },
    /// Key registry cannot be read.
    #[error("key registry unavailable: {0}")]
    RegistryUnavailable(String),
    /// Content hash could not be computed.
    #[error(transparent)]
    Hashing(#[from] HashError),
}

impl VerificationError {
    /// Returns a stable label for the error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::HashMismatch { .. } => "hash_mismatch",
            Self::MissingSignature => "missing_signature",
            Self::KeyNotFound(_) => "key_not_found",
            Self::AlgorithmMismatch { .. } => "algorithm_mismatch",
            Self::UsageNotPermitted(_) => "usage_not_permitted",
            Self::SignatureInvalid(_) => "signature_invalid",
            Self::KeyRevoked(_) => "key_revoked",
            Self::KeyExpired { .. } => "key_expired",
            Self::RegistryUnavailable(_) => "registry_unavailable",
            Self::Hashing(_) => "hashing",
        }
    }
}

// ============================================================================
// SECTION: Verification Results
// ============================================================================

/// Non-fatal findings attached to a successful verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum VerificationWarning {
    /// Key expired after signing; accepted within the grace window.
    KeyExpired {
        /// Expiry time.
        expired_at: Timestamp,
    },
    /// Key was deactivated (for example by rotation) but is still trusted.
    KeyInactive,
}

impl VerificationWarning {
    /// Returns a stable label for the warning.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::KeyExpired { .. } => "key_expired",
            Self::KeyInactive => "key_inactive",
        }
    }
}

/// Successful verification result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    /// Signing key identifier.
    pub key_id: KeyId,
    /// Signature algorithm.
    pub algorithm: SignatureAlgorithm,
    /// Verified content hash.
    pub content_hash: HashDigest,
    /// Signer identity.
    pub signed_by: String,
    /// Signing time.
    pub signed_at: Timestamp,
    /// Key status at verification time.
    pub key_status: KeyStatus,
    /// Non-fatal findings.
    pub warnings: Vec<VerificationWarning>,
}

impl VerificationReport {
    /// Returns true when verification produced warnings.
    #[must_use]
    pub const fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Supported algorithm discovery document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedAlgorithms {
    /// JOSE signature algorithm labels.
    pub signature_algorithms: Vec<String>,
    /// Content hash algorithm labels.
    pub hash_algorithms: Vec<String>,
    /// Fingerprint algorithm labels.
    pub fingerprint_algorithms: Vec<String>,
    /// Key type labels.
    pub key_types: Vec<String>,
    /// Key output format labels.
    pub key_formats: Vec<String>,
}

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Verification policy knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationPolicy {
    /// Days after key expiry during which earlier signatures still verify.
    pub expired_key_grace_days: u32,
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self {
            expired_key_grace_days: DEFAULT_EXPIRED_KEY_GRACE_DAYS,
        }
    }
}

// ============================================================================
// SECTION: Service
// ============================================================================

/// Signs and verifies manifests against a key registry.
#[derive(Debug, Clone)]
pub struct SignatureService {
    /// Shared key registry.
    registry: Arc<KeyRegistry>,
    /// Verification policy.
    policy: VerificationPolicy,
}

impl SignatureService {
    /// Creates a service over the given registry.
    #[must_use]
    pub const fn new(registry: Arc<KeyRegistry>, policy: VerificationPolicy) -> Self {
        Self {
            registry,
            policy,
        }
    }

    /// Returns the key registry.
    #[must_use]
    pub const fn registry(&self) -> &Arc<KeyRegistry> {
        &self.registry
    }

    /// Returns the verification policy.
    #[must_use]
    pub const fn policy(&self) -> VerificationPolicy {
        self.policy
    }

    /// Validates and signs manifest content with the given key.
    ///
    /// # Errors
    ///
    /// Returns [`SignError`] when validation fails or the key cannot sign at `now`.
    pub fn sign(
        &self,
        core: &ManifestCore,
        key_id: &KeyId,
        signed_by: &str,
        now: Timestamp,
    ) -> Result<ManifestSignature, SignError> {
        ManifestValidator::validate(core)?;
        let record = self.registry.record(key_id)?;
        if !record.usages.contains(&KeyUsage::Sign) {
            return Err(SignError::UsageNotPermitted(key_id.clone()));
        }
        let Some(private_key) = record.private_key() else {
            return Err(SignError::MissingPrivateKey(key_id.clone()));
        };
        if !record.status(now).is_valid {
            return Err(SignError::KeyNotValid(key_id.clone()));
        }
        let content_hash = core.content_hash()?;
        let message = canonical_json_bytes(&content_hash)?;
        let signature = private_key.sign(&message)?;
        Ok(ManifestSignature {
            algorithm: record.algorithm(),
            signature: Base64.encode(signature),
            key_id: key_id.clone(),
            content_hash,
            signed_by: signed_by.to_string(),
            signed_at: now,
        })
    }

    /// Signs manifest content and wraps it in a draft envelope.
    ///
    /// # Errors
    ///
    /// Returns [`SignError`] when signing fails.
    pub fn sign_manifest(
        &self,
        core: ManifestCore,
        key_id: &KeyId,
        signed_by: &str,
        now: Timestamp,
    ) -> Result<SignedManifest, SignError> {
        let signature = self.sign(&core, key_id, signed_by, now)?;
        let mut signed = SignedManifest::draft(core)?;
        signed.signature = Some(signature);
        Ok(signed)
    }

    /// Verifies a signed manifest at `now`.
    ///
    /// # Errors
    ///
    /// Returns the first [`VerificationError`] encountered.
    pub fn verify(
        &self,
        manifest: &SignedManifest,
        now: Timestamp,
    ) -> Result<VerificationReport, VerificationError> {
        let actual = manifest.recompute_content_hash()?;
        if actual != manifest.content_hash {
            return Err(VerificationError::HashMismatch {
                expected: manifest.content_hash.clone(),
                actual,
            });
        }
        let signature = manifest.signature.as_ref().ok_or(VerificationError::MissingSignature)?;
        if signature.content_hash != actual {
            return Err(VerificationError::HashMismatch {
                expected: signature.content_hash.clone(),
                actual,
            });
        }

        let record = self.registry.record(&signature.key_id).map_err(|err| match err {
            KeyError::KeyNotFound(key_id) => VerificationError::KeyNotFound(key_id),
            other => VerificationError::RegistryUnavailable(other.to_string()),
        })?;
        let expected = record.algorithm();
        if expected != signature.algorithm {
            return Err(VerificationError::AlgorithmMismatch {
                key_id: record.key_id,
                expected,
                actual: signature.algorithm,
            });
        }
        if !record.usages.contains(&KeyUsage::Verify) {
            return Err(VerificationError::UsageNotPermitted(record.key_id));
        }

        let message = canonical_json_bytes(&actual)?;
        let signature_bytes = Base64
            .decode(signature.signature.as_bytes())
            .map_err(|_| VerificationError::SignatureInvalid(record.key_id.clone()))?;
        if !record.public_key.verify(&message, &signature_bytes) {
            return Err(VerificationError::SignatureInvalid(record.key_id));
        }

        let key_status = self.with_grace(record.status(now), now);
        let mut warnings = Vec::new();
        if key_status.is_revoked {
            return Err(VerificationError::KeyRevoked(record.key_id));
        }
        if let Some(expired_at) = record.expires_at.filter(|_| key_status.is_expired) {
            let grace_end =
                expired_at.saturating_add_days(i64::from(self.policy.expired_key_grace_days));
            if signature.signed_at >= expired_at || now > grace_end {
                return Err(VerificationError::KeyExpired {
                    key_id: record.key_id,
                    expired_at,
                });
            }
            warnings.push(VerificationWarning::KeyExpired {
                expired_at,
            });
        } else if !key_status.is_active {
            warnings.push(VerificationWarning::KeyInactive);
        }

        Ok(VerificationReport {
            key_id: record.key_id,
            algorithm: signature.algorithm,
            content_hash: actual,
            signed_by: signature.signed_by.clone(),
            signed_at: signature.signed_at,
            key_status,
            warnings,
        })
    }

    /// Returns key status flags at `now` with the expiry grace window applied.
    ///
    /// `can_verify` turns false once `now` passes expiry plus the grace
    /// window. Inside the window it stays true, though only signatures made
    /// before expiry will verify.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::KeyNotFound`] for unknown identifiers.
    pub fn key_status(&self, key_id: &KeyId, now: Timestamp) -> Result<KeyStatus, KeyError> {
        let status = self.registry.status(key_id, now)?;
        Ok(self.with_grace(status, now))
    }

    /// Clears `can_verify` for expired keys past the grace window.
    fn with_grace(&self, mut status: KeyStatus, now: Timestamp) -> KeyStatus {
        if let Some(expires_at) = status.expires_at.filter(|_| status.is_expired) {
            let grace_days = i64::from(self.policy.expired_key_grace_days);
            if now > expires_at.saturating_add_days(grace_days) {
                status.can_verify = false;
            }
        }
        status
    }

    /// Returns the JSON Web Key Set of keys valid for verification at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] when the registry is unavailable or a key cannot be encoded.
    pub fn jwks(&self, now: Timestamp) -> Result<Jwks, KeyError> {
        let keys = self
            .registry
            .valid_records(now)?
            .into_iter()
            .filter(|record| record.usages.contains(&KeyUsage::Verify))
            .map(|record| record.public_key.to_jwk(&record.key_id))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Jwks {
            keys,
        })
    }

    /// Returns the algorithms, key types, and formats this service supports.
    #[must_use]
    pub fn supported_algorithms() -> SupportedAlgorithms {
        SupportedAlgorithms {
            signature_algorithms: SignatureAlgorithm::ALL
                .iter()
                .map(|algorithm| algorithm.as_str().to_string())
                .collect(),
            hash_algorithms: vec![HashAlgorithm::Sha256.as_str().to_string()],
            fingerprint_algorithms: FingerprintAlgorithm::ALL
                .iter()
                .map(|algorithm| algorithm.as_str().to_string())
                .collect(),
            key_types: KeyType::ALL.iter().map(|key_type| key_type.as_str().to_string()).collect(),
            key_formats: KeyFormat::ALL.iter().map(|format| format.as_str().to_string()).collect(),
        }
    }
}
