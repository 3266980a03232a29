// crates/manifest-trust-keys/tests/registry.rs
// ============================================================================
// Module: Key Registry Tests
// Description: Registration, lookup formats, listing, status, and JWKS output.
// ============================================================================
//! ## Overview
//! Validates key registry lifecycle operations and public key distribution.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::sync::Arc;

use manifest_trust_core::KeyId;
use manifest_trust_core::Timestamp;
use manifest_trust_keys::ExportedKey;
use manifest_trust_keys::FingerprintAlgorithm;
use manifest_trust_keys::HealthStatus;
use manifest_trust_keys::KeyError;
use manifest_trust_keys::KeyFormat;
use manifest_trust_keys::KeyRecord;
use manifest_trust_keys::KeyRegistry;
use manifest_trust_keys::KeyType;
use manifest_trust_keys::PrivateKey;
use manifest_trust_keys::PublicKey;
use manifest_trust_keys::SignatureService;
use manifest_trust_keys::VerificationPolicy;
use manifest_trust_keys::generate_signing_key;

const RSA_PRIVATE_PEM: &str = include_str!("fixtures/rsa-2048.pem");

fn now() -> Timestamp {
    Timestamp::from_unix_millis(1_704_067_200_000)
}

fn registry_with_keys() -> KeyRegistry {
    let registry = KeyRegistry::new();
    let rsa = PrivateKey::from_pkcs8_pem(KeyType::Rsa, RSA_PRIVATE_PEM).unwrap();
    registry.register(KeyRecord::signer("rsa-1", rsa, now())).unwrap();
    registry
        .register(generate_signing_key(KeyType::Ecdsa, "ec-1", now()).unwrap().record)
        .unwrap();
    let ed = generate_signing_key(KeyType::Ed25519, "ed-1", now()).unwrap();
    registry.register(KeyRecord::verifier("ed-1", ed.record.public_key, now())).unwrap();
    registry
}

#[test]
fn duplicate_registration_is_rejected() {
    let registry = registry_with_keys();
    let again = generate_signing_key(KeyType::Ed25519, "ed-1", now()).unwrap();
    assert_eq!(registry.register(again.record), Err(KeyError::DuplicateKey(KeyId::new("ed-1"))));
    assert_eq!(registry.len().unwrap(), 3);
}

#[test]
fn get_unknown_key_is_key_not_found() {
    let registry = registry_with_keys();
    assert_eq!(
        registry.get(&KeyId::new("missing"), KeyFormat::Pem),
        Err(KeyError::KeyNotFound(KeyId::new("missing")))
    );
}

#[test]
fn every_format_decodes_to_the_registered_key() {
    let registry = registry_with_keys();
    for (key_id, key_type) in
        [("rsa-1", KeyType::Rsa), ("ec-1", KeyType::Ecdsa), ("ed-1", KeyType::Ed25519)]
    {
        let key_id = KeyId::new(key_id);
        let expected = registry.record(&key_id).unwrap().public_key;
        let ExportedKey::Pem(pem) = registry.get(&key_id, KeyFormat::Pem).unwrap() else {
            panic!("expected pem");
        };
        let ExportedKey::Der(der) = registry.get(&key_id, KeyFormat::Der).unwrap() else {
            panic!("expected der");
        };
        let ExportedKey::Jwk(jwk) = registry.get(&key_id, KeyFormat::Jwk).unwrap() else {
            panic!("expected jwk");
        };
        assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----"));
        assert_eq!(PublicKey::from_pem(key_type, &pem).unwrap(), expected);
        assert_eq!(PublicKey::from_der(key_type, &der).unwrap(), expected);
        assert_eq!(PublicKey::from_jwk(&jwk).unwrap(), expected);
        assert_eq!(jwk.kid, key_id.as_str());
        assert_eq!(jwk.alg.as_deref(), Some(key_type.algorithm().as_str()));
    }
}

#[test]
fn list_filters_by_type_and_validity() {
    let registry = registry_with_keys();
    assert_eq!(registry.list(None, false, now()).unwrap().len(), 3);
    let rsa_keys = registry.list(Some(KeyType::Rsa), false, now()).unwrap();
    assert_eq!(rsa_keys.len(), 1);
    assert_eq!(rsa_keys[0].fingerprint.len(), 64);

    registry.deactivate(&KeyId::new("ec-1")).unwrap();
    let active: Vec<String> = registry
        .list(None, true, now())
        .unwrap()
        .into_iter()
        .map(|info| info.key_id.to_string())
        .collect();
    assert_eq!(active, vec!["ed-1".to_string(), "rsa-1".to_string()]);
}

#[test]
fn fingerprint_is_deterministic_per_algorithm() {
    let registry = registry_with_keys();
    let key_id = KeyId::new("rsa-1");
    for algorithm in FingerprintAlgorithm::ALL {
        let first = registry.fingerprint(&key_id, algorithm).unwrap();
        assert_eq!(registry.fingerprint(&key_id, algorithm).unwrap(), first);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}

#[test]
fn status_flags_are_independent() {
    let registry = KeyRegistry::new();
    let generated = generate_signing_key(KeyType::Ed25519, "k", now()).unwrap();
    let expires_at = now().saturating_add_days(1);
    registry.register(generated.record.with_expiry(Some(expires_at))).unwrap();
    let key_id = KeyId::new("k");

    let fresh = registry.status(&key_id, now()).unwrap();
    assert!(fresh.is_active && fresh.is_valid && fresh.can_sign && fresh.can_verify);

    let later = registry.status(&key_id, now().saturating_add_days(2)).unwrap();
    assert!(later.is_active && later.is_expired && !later.is_valid);
    assert!(!later.can_sign && later.can_verify);

    registry.revoke(&key_id, now()).unwrap();
    let revoked = registry.status(&key_id, now()).unwrap();
    assert!(revoked.is_revoked && !revoked.is_active && !revoked.can_verify);
}

#[test]
fn rotate_is_atomic_on_error() {
    let registry = registry_with_keys();
    let next = generate_signing_key(KeyType::Ed25519, "ec-1", now()).unwrap();
    assert!(matches!(
        registry.rotate(&KeyId::new("rsa-1"), next.record),
        Err(KeyError::DuplicateKey(_))
    ));
    assert!(registry.status(&KeyId::new("rsa-1"), now()).unwrap().is_active);
}

#[test]
fn jwks_publishes_only_valid_verification_keys() {
    let registry = Arc::new(registry_with_keys());
    registry.revoke(&KeyId::new("ec-1"), now()).unwrap();
    let service = SignatureService::new(Arc::clone(&registry), VerificationPolicy::default());
    let jwks = service.jwks(now()).unwrap();
    let kids: Vec<&str> = jwks.keys.iter().map(|jwk| jwk.kid.as_str()).collect();
    assert_eq!(kids, vec!["ed-1", "rsa-1"]);
    let value = serde_json::to_value(&jwks).unwrap();
    assert_eq!(value["keys"][0]["kty"], "OKP");
    assert_eq!(value["keys"][0]["crv"], "Ed25519");
    assert_eq!(value["keys"][1]["kty"], "RSA");
    assert_eq!(value["keys"][1]["use"], "sig");
}

#[test]
fn health_degrades_without_valid_keys() {
    let registry = KeyRegistry::new();
    assert_eq!(registry.health(now()).status, HealthStatus::Degraded);
    let registry = registry_with_keys();
    let health = registry.health(now());
    assert_eq!(health.status, HealthStatus::Healthy);
    assert_eq!(health.signing_keys, 2);
}

#[test]
fn supported_algorithms_lists_every_option() {
    let supported = SignatureService::supported_algorithms();
    assert_eq!(supported.signature_algorithms, vec!["RS256", "ES256", "EdDSA"]);
    assert_eq!(supported.key_formats, vec!["pem", "jwk", "der"]);
    assert_eq!(supported.fingerprint_algorithms, vec!["sha256", "sha1", "md5"]);
}
