// crates/manifest-trust-keys/src/lib.rs
// ============================================================================
// Module: Manifest Trust Keys Library
// Description: Key registry, key codecs, and the manifest signature service.
// Purpose: Expose signing, verification, and key distribution operations.
// Dependencies: crate::{codec, generate, key, registry, signature}
// ============================================================================

//! ## Overview
//! This crate owns key material. The [`KeyRegistry`] tracks key lifecycle, the
//! codec module converts public keys between PEM, DER, and JWK, and the
//! [`SignatureService`] signs and verifies manifest content hashes.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod codec;
pub mod generate;
pub mod key;
pub mod registry;
pub mod signature;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use codec::ExportedKey;
pub use codec::FingerprintAlgorithm;
pub use codec::Jwk;
pub use codec::Jwks;
pub use generate::GeneratedKey;
pub use generate::generate_signing_key;
pub use key::KeyError;
pub use key::KeyFormat;
pub use key::KeyInfo;
pub use key::KeyRecord;
pub use key::KeyStatus;
pub use key::KeyType;
pub use key::KeyUsage;
pub use key::PrivateKey;
pub use key::PublicKey;
pub use registry::HealthStatus;
pub use registry::KeyRegistry;
pub use registry::RegistryHealth;
pub use signature::DEFAULT_EXPIRED_KEY_GRACE_DAYS;
pub use signature::SignError;
pub use signature::SignatureService;
pub use signature::SupportedAlgorithms;
pub use signature::VerificationError;
pub use signature::VerificationPolicy;
pub use signature::VerificationReport;
pub use signature::VerificationWarning;
