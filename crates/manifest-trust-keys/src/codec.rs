// crates/manifest-trust-keys/src/codec.rs
// ============================================================================
// Module: Key Codecs
// Description: PEM, DER, and JWK encodings plus key fingerprints.
// Purpose: Convert key material losslessly between distribution formats.
// Dependencies: base64, ed25519-dalek, p256, rsa, sha1, md-5, sha2, serde
// ============================================================================

//! ## Overview
//! Public keys are encoded as SubjectPublicKeyInfo (PEM or DER) or as RFC 7517
//! JSON Web Keys (`RSA`, `EC` P-256, and RFC 8037 `OKP` Ed25519). Every
//! encoding decodes back to the same [`PublicKey`], so DER is the canonical
//! byte form used for fingerprints. Private keys are read and written as
//! PKCS#8 PEM only.
//!
//! Unsupported formats or algorithms fail with a typed error and never fall
//! back to another encoding.

// ============================================================================
// SECTION: Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as Base64Url;
use manifest_trust_core::KeyId;
use manifest_trust_core::hashing::hex_encode;
use rsa::BigUint;
use rsa::RsaPrivateKey;
use rsa::RsaPublicKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::pkcs8::EncodePrivateKey;
use rsa::pkcs8::EncodePublicKey;
use rsa::pkcs8::LineEnding;
use rsa::traits::PublicKeyParts;
use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;

use crate::key::KeyError;
use crate::key::KeyFormat;
use crate::key::KeyType;
use crate::key::PrivateKey;
use crate::key::PublicKey;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// JWK curve name for P-256.
const CURVE_P256: &str = "P-256";
/// JWK curve name for Ed25519.
const CURVE_ED25519: &str = "Ed25519";
/// Byte length of a P-256 field element.
const P256_COORDINATE_LEN: usize = 32;
/// Byte length of an Ed25519 public key.
const ED25519_KEY_LEN: usize = 32;

// ============================================================================
// SECTION: JSON Web Keys
// ============================================================================

/// RFC 7517 JSON Web Key (public members only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type (`RSA`, `EC`, or `OKP`).
    pub kty: String,
    /// Key identifier.
    pub kid: String,
    /// Public key use (`sig`).
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    /// JOSE algorithm label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    /// Curve name for `EC` and `OKP` keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    /// RSA modulus.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    /// RSA public exponent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    /// X coordinate (`EC`) or public key bytes (`OKP`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    /// Y coordinate (`EC`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
}

/// JSON Web Key Set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwks {
    /// Published keys.
    pub keys: Vec<Jwk>,
}

/// Public key rendered in a requested format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportedKey {
    /// SPKI PEM text.
    Pem(String),
    /// JSON Web Key.
    Jwk(Jwk),
    /// SPKI DER bytes.
    Der(Vec<u8>),
}

impl ExportedKey {
    /// Returns the format of this export.
    #[must_use]
    pub const fn format(&self) -> KeyFormat {
        match self {
            Self::Pem(_) => KeyFormat::Pem,
            Self::Jwk(_) => KeyFormat::Jwk,
            Self::Der(_) => KeyFormat::Der,
        }
    }

    /// Returns a JSON value: PEM as text, DER as standard base64, JWK as an object.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidFormat`] when the JWK cannot be serialized.
    pub fn to_json(&self) -> Result<serde_json::Value, KeyError> {
        match self {
            Self::Pem(pem) => Ok(serde_json::Value::String(pem.clone())),
            Self::Der(der) => Ok(serde_json::Value::String(Base64.encode(der))),
            Self::Jwk(jwk) => {
                serde_json::to_value(jwk).map_err(|err| KeyError::InvalidFormat(err.to_string()))
            }
        }
    }
}

// ============================================================================
// SECTION: Public Key Encoding
// ============================================================================

impl PublicKey {
    /// Parses SPKI PEM as the given key type.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidFormat`] when the PEM is not a key of `key_type`.
    pub fn from_pem(key_type: KeyType, pem: &str) -> Result<Self, KeyError> {
        let pem = pem.trim();
        match key_type {
            KeyType::Rsa => RsaPublicKey::from_public_key_pem(pem).map(Self::Rsa).map_err(invalid),
            KeyType::Ecdsa => {
                p256::ecdsa::VerifyingKey::from_public_key_pem(pem)
                    .map(Self::Ecdsa)
                    .map_err(invalid)
            }
            KeyType::Ed25519 => ed25519_dalek::VerifyingKey::from_public_key_pem(pem)
                .map(Self::Ed25519)
                .map_err(invalid),
        }
    }

    /// Parses SPKI DER as the given key type.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidFormat`] when the DER is not a key of `key_type`.
    pub fn from_der(key_type: KeyType, der: &[u8]) -> Result<Self, KeyError> {
        match key_type {
            KeyType::Rsa => RsaPublicKey::from_public_key_der(der).map(Self::Rsa).map_err(invalid),
            KeyType::Ecdsa => {
                p256::ecdsa::VerifyingKey::from_public_key_der(der)
                    .map(Self::Ecdsa)
                    .map_err(invalid)
            }
            KeyType::Ed25519 => ed25519_dalek::VerifyingKey::from_public_key_der(der)
                .map(Self::Ed25519)
                .map_err(invalid),
        }
    }

    /// Encodes the key as SPKI DER.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidFormat`] when encoding fails.
    pub fn to_der(&self) -> Result<Vec<u8>, KeyError> {
        let document = match self {
            Self::Rsa(key) => key.to_public_key_der(),
            Self::Ecdsa(key) => key.to_public_key_der(),
            Self::Ed25519(key) => key.to_public_key_der(),
        }
        .map_err(invalid)?;
        Ok(document.as_bytes().to_vec())
    }

    /// Encodes the key as SPKI PEM with LF line endings.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidFormat`] when encoding fails.
    pub fn to_pem(&self) -> Result<String, KeyError> {
        match self {
            Self::Rsa(key) => key.to_public_key_pem(LineEnding::LF),
            Self::Ecdsa(key) => key.to_public_key_pem(LineEnding::LF),
            Self::Ed25519(key) => key.to_public_key_pem(LineEnding::LF),
        }
        .map_err(invalid)
    }

    /// Encodes the key as a JWK.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidFormat`] when the key cannot be encoded.
    pub fn to_jwk(&self, key_id: &KeyId) -> Result<Jwk, KeyError> {
        let mut jwk = Jwk {
            kty: String::new(),
            kid: key_id.to_string(),
            key_use: Some("sig".to_string()),
            alg: Some(self.key_type().algorithm().as_str().to_string()),
            crv: None,
            n: None,
            e: None,
            x: None,
            y: None,
        };
        match self {
            Self::Rsa(key) => {
                jwk.kty = "RSA".to_string();
                jwk.n = Some(Base64Url.encode(key.n().to_bytes_be()));
                jwk.e = Some(Base64Url.encode(key.e().to_bytes_be()));
            }
            Self::Ecdsa(key) => {
                let point = key.to_encoded_point(false);
                let (Some(x), Some(y)) = (point.x(), point.y()) else {
                    return Err(KeyError::InvalidFormat("p-256 point at infinity".to_string()));
                };
                jwk.kty = "EC".to_string();
                jwk.crv = Some(CURVE_P256.to_string());
                jwk.x = Some(Base64Url.encode(x));
                jwk.y = Some(Base64Url.encode(y));
            }
            Self::Ed25519(key) => {
                jwk.kty = "OKP".to_string();
                jwk.crv = Some(CURVE_ED25519.to_string());
                jwk.x = Some(Base64Url.encode(key.to_bytes()));
            }
        }
        Ok(jwk)
    }

    /// Decodes a JWK into public key material.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Unsupported`] for unknown key types or curves and
    /// [`KeyError::InvalidFormat`] for malformed members.
    pub fn from_jwk(jwk: &Jwk) -> Result<Self, KeyError> {
        match jwk.kty.as_str() {
            "RSA" => {
                let n = decode_member(jwk.n.as_deref(), "n")?;
                let e = decode_member(jwk.e.as_deref(), "e")?;
                RsaPublicKey::new(BigUint::from_bytes_be(&n), BigUint::from_bytes_be(&e))
                    .map(Self::Rsa)
                    .map_err(invalid)
            }
            "EC" => {
                expect_curve(jwk, CURVE_P256)?;
                let x = decode_member(jwk.x.as_deref(), "x")?;
                let y = decode_member(jwk.y.as_deref(), "y")?;
                if x.len() != P256_COORDINATE_LEN || y.len() != P256_COORDINATE_LEN {
                    return Err(KeyError::InvalidFormat("p-256 coordinate length".to_string()));
                }
                let point = p256::EncodedPoint::from_affine_coordinates(
                    p256::FieldBytes::from_slice(&x),
                    p256::FieldBytes::from_slice(&y),
                    false,
                );
                p256::ecdsa::VerifyingKey::from_encoded_point(&point)
                    .map(Self::Ecdsa)
                    .map_err(invalid)
            }
            "OKP" => {
                expect_curve(jwk, CURVE_ED25519)?;
                let x = decode_member(jwk.x.as_deref(), "x")?;
                let bytes: [u8; ED25519_KEY_LEN] = x
                    .as_slice()
                    .try_into()
                    .map_err(|_| KeyError::InvalidFormat("ed25519 key length".to_string()))?;
                ed25519_dalek::VerifyingKey::from_bytes(&bytes).map(Self::Ed25519).map_err(invalid)
            }
            other => Err(KeyError::Unsupported(format!("jwk key type {other}"))),
        }
    }

    /// Renders the key in the requested format.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] when encoding fails.
    pub fn export(&self, key_id: &KeyId, format: KeyFormat) -> Result<ExportedKey, KeyError> {
        Ok(match format {
            KeyFormat::Pem => ExportedKey::Pem(self.to_pem()?),
            KeyFormat::Jwk => ExportedKey::Jwk(self.to_jwk(key_id)?),
            KeyFormat::Der => ExportedKey::Der(self.to_der()?),
        })
    }

    /// Computes a lowercase hex fingerprint over the SPKI DER encoding.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] when the key cannot be DER-encoded.
    pub fn fingerprint(&self, algorithm: FingerprintAlgorithm) -> Result<String, KeyError> {
        let der = self.to_der()?;
        Ok(match algorithm {
            FingerprintAlgorithm::Sha256 => hex_encode(&sha2::Sha256::digest(&der)),
            FingerprintAlgorithm::Sha1 => hex_encode(&sha1::Sha1::digest(&der)),
            FingerprintAlgorithm::Md5 => hex_encode(&md5::Md5::digest(&der)),
        })
    }
}

// ============================================================================
// SECTION: Private Key Encoding
// ============================================================================

impl PrivateKey {
    /// Parses PKCS#8 PEM as the given key type.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidFormat`] when the PEM is not a key of `key_type`.
    pub fn from_pkcs8_pem(key_type: KeyType, pem: &str) -> Result<Self, KeyError> {
        let pem = pem.trim();
        match key_type {
            KeyType::Rsa => RsaPrivateKey::from_pkcs8_pem(pem)
                .map(|key| Self::Rsa(Box::new(key)))
                .map_err(invalid),
            KeyType::Ecdsa => {
                p256::ecdsa::SigningKey::from_pkcs8_pem(pem).map(Self::Ecdsa).map_err(invalid)
            }
            KeyType::Ed25519 => {
                ed25519_dalek::SigningKey::from_pkcs8_pem(pem).map(Self::Ed25519).map_err(invalid)
            }
        }
    }

    /// Encodes the key as PKCS#8 PEM with LF line endings.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidFormat`] when encoding fails.
    pub fn to_pkcs8_pem(&self) -> Result<String, KeyError> {
        let pem = match self {
            Self::Rsa(key) => key.to_pkcs8_pem(LineEnding::LF),
            Self::Ecdsa(key) => key.to_pkcs8_pem(LineEnding::LF),
            Self::Ed25519(key) => key.to_pkcs8_pem(LineEnding::LF),
        }
        .map_err(invalid)?;
        Ok(pem.as_str().to_string())
    }
}

// ============================================================================
// SECTION: Fingerprints
// ============================================================================

/// Fingerprint digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintAlgorithm {
    /// SHA-256.
    Sha256,
    /// SHA-1.
    Sha1,
    /// MD5.
    Md5,
}

impl FingerprintAlgorithm {
    /// All supported fingerprint algorithms.
    pub const ALL: [Self; 3] = [Self::Sha256, Self::Sha1, Self::Md5];

    /// Returns the stable label for the algorithm.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha1 => "sha1",
            Self::Md5 => "md5",
        }
    }

    /// Parses a fingerprint algorithm label.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Unsupported`] for unknown labels.
    pub fn from_label(label: &str) -> Result<Self, KeyError> {
        Self::ALL
            .into_iter()
            .find(|algorithm| algorithm.as_str().eq_ignore_ascii_case(label))
            .ok_or_else(|| KeyError::Unsupported(format!("fingerprint algorithm {label}")))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Maps a codec error into [`KeyError::InvalidFormat`].
fn invalid(err: impl std::fmt::Display) -> KeyError {
    KeyError::InvalidFormat(err.to_string())
}

/// Decodes a required base64url JWK member.
fn decode_member(value: Option<&str>, name: &str) -> Result<Vec<u8>, KeyError> {
    let value = value.ok_or_else(|| KeyError::InvalidFormat(format!("jwk missing {name}")))?;
    Base64Url
        .decode(value)
        .map_err(|_| KeyError::InvalidFormat(format!("jwk member {name} is not base64url")))
}

/// Requires the JWK curve to equal `expected`.
fn expect_curve(jwk: &Jwk, expected: &str) -> Result<(), KeyError> {
    match jwk.crv.as_deref() {
        Some(curve) if curve == expected => Ok(()),
        Some(curve) => Err(KeyError::Unsupported(format!("jwk curve {curve}"))),
        None => Err(KeyError::InvalidFormat("jwk missing crv".to_string())),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
