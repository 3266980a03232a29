// crates/manifest-trust-keys/src/generate.rs
// ============================================================================
// Module: Key Generation
// Description: Fresh signing key pairs for administrative key creation.
// Purpose: Produce registry-ready signer records plus exportable private PEM.
// Dependencies: rand, rsa, p256, ed25519-dalek, crate::key
// ============================================================================

//! ## Overview
//! Generated keys use the operating system RNG. RSA keys are 2048 bits, which
//! is the minimum accepted for RS256 manifest signatures.

// ============================================================================
// SECTION: Imports
// ============================================================================

use manifest_trust_core::KeyId;
use manifest_trust_core::Timestamp;
use rand::rngs::OsRng;
use rsa::RsaPrivateKey;

use crate::key::KeyError;
use crate::key::KeyRecord;
use crate::key::KeyType;
use crate::key::PrivateKey;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// RSA modulus size for generated keys.
pub const RSA_KEY_BITS: usize = 2048;

// ============================================================================
// SECTION: Generation
// ============================================================================

/// Newly generated key pair.
#[derive(Clone)]
pub struct GeneratedKey {
    /// Signer record ready for registration.
    pub record: KeyRecord,
    /// PKCS#8 PEM of the private key.
    pub private_key_pem: String,
}

/// Generates a signing key pair of the requested type.
///
/// # Errors
///
/// Returns [`KeyError::Crypto`] when key generation fails.
pub fn generate_signing_key(
    key_type: KeyType,
    key_id: impl Into<KeyId>,
    created_at: Timestamp,
) -> Result<GeneratedKey, KeyError> {
    let private_key = match key_type {
        KeyType::Rsa => {
            let key = RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)
                .map_err(|err| KeyError::Crypto(err.to_string()))?;
            PrivateKey::Rsa(Box::new(key))
        }
        KeyType::Ecdsa => PrivateKey::Ecdsa(p256::ecdsa::SigningKey::random(&mut OsRng)),
        KeyType::Ed25519 => PrivateKey::Ed25519(ed25519_dalek::SigningKey::generate(&mut OsRng)),
    };
    let private_key_pem = private_key.to_pkcs8_pem()?;
    Ok(GeneratedKey {
        record: KeyRecord::signer(key_id, private_key, created_at),
        private_key_pem,
    })
}
