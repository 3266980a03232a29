// crates/manifest-trust-core/src/hashing.rs
// ============================================================================
// Module: Manifest Content Digests
// Description: JCS canonical bytes and SHA-256 digests for manifest content.
// Purpose: Give manifests and signatures one byte-exact hashing contract.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! A manifest's content hash is SHA-256 over the RFC 8785 canonical JSON of
//! its content, so two manifests that differ only in key order or whitespace
//! share a digest and any semantic edit changes it. Signatures are made over
//! the canonical bytes of the [`HashDigest`] itself, which binds the algorithm
//! label into the signed message. Code checksums and fingerprints hash raw
//! bytes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Digests
// ============================================================================

/// Digest algorithms accepted in manifests and signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    /// SHA-256.
    Sha256,
}

impl HashAlgorithm {
    /// Wire label, as it appears in `content_hash.algorithm`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
        }
    }
}

/// Algorithm used for new content hashes.
pub const DEFAULT_HASH_ALGORITHM: HashAlgorithm = HashAlgorithm::Sha256;

/// Algorithm-tagged digest stored on signed manifests.
///
/// Equality compares both the algorithm and the hex value, so a digest
/// recomputed under another algorithm never matches a stored one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HashDigest {
    /// Digest algorithm.
    pub algorithm: HashAlgorithm,
    /// Lowercase hex digest.
    pub value: String,
}

impl HashDigest {
    /// Wraps raw digest output.
    #[must_use]
    pub fn new(algorithm: HashAlgorithm, bytes: &[u8]) -> Self {
        Self {
            algorithm,
            value: hex_encode(bytes),
        }
    }
}

impl fmt::Display for HashDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm.as_str(), self.value)
    }
}

/// Content could not be brought into canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HashError {
    /// Serializer rejected the value (for example a non-finite float).
    #[error("failed to canonicalize json: {0}")]
    Canonicalization(String),
}

// ============================================================================
// SECTION: Canonical Form
// ============================================================================

/// Serializes `value` as RFC 8785 canonical JSON.
///
/// These are the exact bytes that content hashes and signatures cover.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when the value cannot be serialized.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, HashError> {
    serde_jcs::to_vec(value).map_err(|err| HashError::Canonicalization(err.to_string()))
}

/// Digests the canonical JSON form of `value`.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when the value cannot be serialized.
pub fn hash_canonical_json<T: Serialize + ?Sized>(
    algorithm: HashAlgorithm,
    value: &T,
) -> Result<HashDigest, HashError> {
    canonical_json_bytes(value).map(|bytes| hash_bytes(algorithm, &bytes))
}

/// Digests raw bytes such as a code bundle or DER key.
#[must_use]
pub fn hash_bytes(algorithm: HashAlgorithm, bytes: &[u8]) -> HashDigest {
    let digest = match algorithm {
        HashAlgorithm::Sha256 => Sha256::digest(bytes),
    };
    HashDigest::new(algorithm, &digest)
}

/// Lowercase hex, two digits per byte.
#[must_use]
pub fn hex_encode(bytes: &[u8]) -> String {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    bytes
        .iter()
        .flat_map(|byte| [DIGITS[usize::from(byte >> 4)], DIGITS[usize::from(byte & 0x0f)]])
        .map(char::from)
        .collect()
}
