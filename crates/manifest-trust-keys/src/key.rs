// crates/manifest-trust-keys/src/key.rs
// ============================================================================
// Module: Key Records
// Description: Key types, usages, key material, and lifecycle status.
// Purpose: Model signing and verification keys independent of any manifest.
// Dependencies: ed25519-dalek, p256, rsa, sha2, serde, thiserror
// ============================================================================

//! ## Overview
//! A [`KeyRecord`] binds a key identifier to parsed public material, optional
//! private material, permitted usages, and lifecycle flags. Key type and
//! signature algorithm are derived from the material itself, so a record can
//! never claim an algorithm its key cannot produce.
//!
//! Records are never deleted. Rotation deactivates a key and revocation flags
//! it, both keeping the material available so historical signatures can still
//! be classified.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;

use manifest_trust_core::KeyId;
use manifest_trust_core::SignatureAlgorithm;
use manifest_trust_core::Timestamp;
use rsa::RsaPrivateKey;
use rsa::RsaPublicKey;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by key parsing, encoding, and registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// Key identifier is not registered.
    #[error("key not found: {0}")]
    KeyNotFound(KeyId),
    /// Key identifier is already registered.
    #[error("key already registered: {0}")]
    DuplicateKey(KeyId),
    /// Key material or encoding is malformed.
    #[error("invalid key format: {0}")]
    InvalidFormat(String),
    /// Requested format, type, or algorithm is not supported.
    #[error("unsupported: {0}")]
    Unsupported(String),
    /// Private material does not match the record's public key.
    #[error("private key does not match public key for {0}")]
    KeyPairMismatch(KeyId),
    /// Cryptographic operation failed.
    #[error("crypto failure: {0}")]
    Crypto(String),
    /// Registry storage cannot be read or written.
    #[error("key registry unavailable: {0}")]
    Unavailable(String),
}

impl KeyError {
    /// Returns a stable label for the error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::KeyNotFound(_) => "key_not_found",
            Self::DuplicateKey(_) => "duplicate_key",
            Self::InvalidFormat(_) => "invalid_format",
            Self::Unsupported(_) => "unsupported",
            Self::KeyPairMismatch(_) => "key_pair_mismatch",
            Self::Crypto(_) => "crypto",
            Self::Unavailable(_) => "unavailable",
        }
    }
}

// ============================================================================
// SECTION: Key Classification
// ============================================================================

/// Supported key types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    /// RSA (2048 bits or more).
    Rsa,
    /// ECDSA over NIST P-256.
    Ecdsa,
    /// Ed25519.
    Ed25519,
}

impl KeyType {
    /// All supported key types.
    pub const ALL: [Self; 3] = [Self::Rsa, Self::Ecdsa, Self::Ed25519];

    /// Returns the stable label for the key type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rsa => "rsa",
            Self::Ecdsa => "ecdsa",
            Self::Ed25519 => "ed25519",
        }
    }

    /// Parses a key type label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key_type| key_type.as_str().eq_ignore_ascii_case(label))
    }

    /// Returns the signature algorithm produced by keys of this type.
    #[must_use]
    pub const fn algorithm(self) -> SignatureAlgorithm {
        match self {
            Self::Rsa => SignatureAlgorithm::Rs256,
            Self::Ecdsa => SignatureAlgorithm::Es256,
            Self::Ed25519 => SignatureAlgorithm::EdDsa,
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Permitted key usages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyUsage {
    /// Produce manifest signatures.
    Sign,
    /// Verify manifest signatures.
    Verify,
    /// Encrypt payloads.
    Encrypt,
    /// Decrypt payloads.
    Decrypt,
}

impl KeyUsage {
    /// Returns the stable label for the usage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sign => "sign",
            Self::Verify => "verify",
            Self::Encrypt => "encrypt",
            Self::Decrypt => "decrypt",
        }
    }
}

/// Public key output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyFormat {
    /// SPKI PEM text.
    Pem,
    /// RFC 7517 JSON Web Key.
    Jwk,
    /// SPKI DER bytes.
    Der,
}

impl KeyFormat {
    /// All supported formats.
    pub const ALL: [Self; 3] = [Self::Pem, Self::Jwk, Self::Der];

    /// Returns the stable label for the format.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pem => "pem",
            Self::Jwk => "jwk",
            Self::Der => "der",
        }
    }

    /// Parses a format label.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Unsupported`] for unknown labels.
    pub fn from_label(label: &str) -> Result<Self, KeyError> {
        Self::ALL
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(label))
            .ok_or_else(|| KeyError::Unsupported(format!("key format {label}")))
    }
}

// ============================================================================
// SECTION: Key Material
// ============================================================================

/// Parsed public key material.
#[derive(Debug, Clone, PartialEq)]
pub enum PublicKey {
    /// RSA public key.
    Rsa(RsaPublicKey),
    /// P-256 verifying key.
    Ecdsa(p256::ecdsa::VerifyingKey),
    /// Ed25519 verifying key.
    Ed25519(ed25519_dalek::VerifyingKey),
}

impl PublicKey {
    /// Returns the key type of this material.
    #[must_use]
    pub const fn key_type(&self) -> KeyType {
        match self {
            Self::Rsa(_) => KeyType::Rsa,
            Self::Ecdsa(_) => KeyType::Ecdsa,
            Self::Ed25519(_) => KeyType::Ed25519,
        }
    }

    /// Verifies `signature` over `message`. Malformed signatures return false.
    #[must_use]
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        match self {
            Self::Rsa(key) => {
                use rsa::signature::Verifier;
                let Ok(signature) = rsa::pkcs1v15::Signature::try_from(signature) else {
                    return false;
                };
                let verifying_key = rsa::pkcs1v15::VerifyingKey::<sha2::Sha256>::new(key.clone());
                verifying_key.verify(message, &signature).is_ok()
            }
            Self::Ecdsa(key) => {
                use p256::ecdsa::signature::Verifier;
                let Ok(signature) = p256::ecdsa::Signature::from_slice(signature) else {
                    return false;
                };
                key.verify(message, &signature).is_ok()
            }
            Self::Ed25519(key) => {
                let Ok(signature) = ed25519_dalek::Signature::from_slice(signature) else {
                    return false;
                };
                key.verify_strict(message, &signature).is_ok()
            }
        }
    }
}

/// Parsed private key material.
#[derive(Clone)]
pub enum PrivateKey {
    /// RSA private key.
    Rsa(Box<RsaPrivateKey>),
    /// P-256 signing key.
    Ecdsa(p256::ecdsa::SigningKey),
    /// Ed25519 signing key.
    Ed25519(ed25519_dalek::SigningKey),
}

impl PrivateKey {
    /// Returns the key type of this material.
    #[must_use]
    pub const fn key_type(&self) -> KeyType {
        match self {
            Self::Rsa(_) => KeyType::Rsa,
            Self::Ecdsa(_) => KeyType::Ecdsa,
            Self::Ed25519(_) => KeyType::Ed25519,
        }
    }

    /// Derives the matching public key.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        match self {
            Self::Rsa(key) => PublicKey::Rsa(RsaPublicKey::from(key.as_ref())),
            Self::Ecdsa(key) => PublicKey::Ecdsa(p256::ecdsa::VerifyingKey::from(key)),
            Self::Ed25519(key) => PublicKey::Ed25519(key.verifying_key()),
        }
    }

    /// Signs `message` and returns the raw signature bytes.
    ///
    /// ECDSA signatures use the fixed-size `r || s` encoding.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Crypto`] when the signing primitive fails.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, KeyError> {
        match self {
            Self::Rsa(key) => {
                use rsa::signature::SignatureEncoding;
                use rsa::signature::Signer;
                let signing_key =
                    rsa::pkcs1v15::SigningKey::<sha2::Sha256>::new(key.as_ref().clone());
                let signature = signing_key
                    .try_sign(message)
                    .map_err(|err| KeyError::Crypto(err.to_string()))?;
                Ok(signature.to_vec())
            }
            Self::Ecdsa(key) => {
                use p256::ecdsa::signature::Signer;
                let signature: p256::ecdsa::Signature =
                    key.try_sign(message).map_err(|err| KeyError::Crypto(err.to_string()))?;
                Ok(signature.to_bytes().to_vec())
            }
            Self::Ed25519(key) => {
                use ed25519_dalek::Signer;
                let signature =
                    key.try_sign(message).map_err(|err| KeyError::Crypto(err.to_string()))?;
                Ok(signature.to_bytes().to_vec())
            }
        }
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey({}, redacted)", self.key_type())
    }
}

// ============================================================================
// SECTION: Key Record
// ============================================================================

/// Registered key with lifecycle state.
///
/// # Invariants
/// - `key_type` and `algorithm` are derived from `public_key`.
/// - When present, `private_key` matches `public_key`.
/// - A revoked key is never active.
#[derive(Debug, Clone)]
pub struct KeyRecord {
    /// Key identifier.
    pub key_id: KeyId,
    /// Public key material.
    pub public_key: PublicKey,
    /// Private key material for signer keys.
    private_key: Option<PrivateKey>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Expiry time, if any.
    pub expires_at: Option<Timestamp>,
    /// Active flag (cleared on rotation or manual deactivation).
    pub active: bool,
    /// Revocation time when revoked.
    pub revoked_at: Option<Timestamp>,
    /// Permitted usages.
    pub usages: BTreeSet<KeyUsage>,
}

impl KeyRecord {
    /// Creates an active verification-only record.
    #[must_use]
    pub fn verifier(
        key_id: impl Into<KeyId>,
        public_key: PublicKey,
        created_at: Timestamp,
    ) -> Self {
        Self {
            key_id: key_id.into(),
            public_key,
            private_key: None,
            created_at,
            expires_at: None,
            active: true,
            revoked_at: None,
            usages: BTreeSet::from([KeyUsage::Verify]),
        }
    }

    /// Creates an active signer record permitted to sign and verify.
    #[must_use]
    pub fn signer(
        key_id: impl Into<KeyId>,
        private_key: PrivateKey,
        created_at: Timestamp,
    ) -> Self {
        Self {
            key_id: key_id.into(),
            public_key: private_key.public_key(),
            private_key: Some(private_key),
            created_at,
            expires_at: None,
            active: true,
            revoked_at: None,
            usages: BTreeSet::from([KeyUsage::Sign, KeyUsage::Verify]),
        }
    }

    /// Attaches private material to a record.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::KeyPairMismatch`] when the private key does not
    /// derive this record's public key.
    pub fn with_private_key(mut self, private_key: PrivateKey) -> Result<Self, KeyError> {
        if private_key.public_key() != self.public_key {
            return Err(KeyError::KeyPairMismatch(self.key_id));
        }
        self.private_key = Some(private_key);
        Ok(self)
    }

    /// Sets the expiry time.
    #[must_use]
    pub const fn with_expiry(mut self, expires_at: Option<Timestamp>) -> Self {
        self.expires_at = expires_at;
        self
    }

    /// Replaces the permitted usages.
    #[must_use]
    pub fn with_usages(mut self, usages: impl IntoIterator<Item = KeyUsage>) -> Self {
        self.usages = usages.into_iter().collect();
        self
    }

    /// Sets the active flag.
    #[must_use]
    pub const fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Returns the key type.
    #[must_use]
    pub const fn key_type(&self) -> KeyType {
        self.public_key.key_type()
    }

    /// Returns the signature algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> SignatureAlgorithm {
        self.key_type().algorithm()
    }

    /// Returns the private key when this record can sign.
    #[must_use]
    pub const fn private_key(&self) -> Option<&PrivateKey> {
        self.private_key.as_ref()
    }

    /// Returns true when the record has been revoked.
    #[must_use]
    pub const fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Returns true when the key has expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    /// Computes the independently inspectable status flags at `now`.
    #[must_use]
    pub fn status(&self, now: Timestamp) -> KeyStatus {
        let is_revoked = self.is_revoked();
        let is_active = self.active && !is_revoked;
        let is_expired = self.is_expired(now);
        let is_valid = is_active && !is_expired;
        KeyStatus {
            key_id: self.key_id.clone(),
            is_active,
            is_expired,
            is_revoked,
            is_valid,
            can_sign: is_valid
                && self.private_key.is_some()
                && self.usages.contains(&KeyUsage::Sign),
            can_verify: !is_revoked && self.usages.contains(&KeyUsage::Verify),
            expires_at: self.expires_at,
        }
    }
}

/// Key status flags.
///
/// From [`KeyRecord::status`], `can_verify` stays true for inactive or
/// expired keys and only revocation clears it. The signature service's
/// `key_status` also clears it once the expiry grace window has passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyStatus {
    /// Key identifier.
    pub key_id: KeyId,
    /// Key is active and not revoked.
    pub is_active: bool,
    /// Key is past its expiry time.
    pub is_expired: bool,
    /// Key has been revoked.
    pub is_revoked: bool,
    /// Key is active and unexpired.
    pub is_valid: bool,
    /// Key may produce new signatures.
    pub can_sign: bool,
    /// Key may be used to check signatures.
    pub can_verify: bool,
    /// Expiry time, if any.
    pub expires_at: Option<Timestamp>,
}

/// Public description of a registered key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInfo {
    /// Key identifier.
    pub key_id: KeyId,
    /// Key type.
    pub key_type: KeyType,
    /// Signature algorithm.
    pub algorithm: SignatureAlgorithm,
    /// Creation time.
    pub created_at: Timestamp,
    /// Expiry time, if any.
    pub expires_at: Option<Timestamp>,
    /// Active flag.
    pub active: bool,
    /// Revocation time when revoked.
    pub revoked_at: Option<Timestamp>,
    /// Permitted usages.
    pub usages: BTreeSet<KeyUsage>,
    /// SHA-256 fingerprint over the SPKI DER encoding.
    pub fingerprint: String,
}
