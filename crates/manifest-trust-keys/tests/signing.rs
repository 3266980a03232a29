// crates/manifest-trust-keys/tests/signing.rs
// ============================================================================
// Module: Manifest Signing Tests
// Description: Sign/verify behavior across algorithms and key lifecycle states.
// ============================================================================
//! ## Overview
//! Covers the RS256 approval scenario, tamper detection, the expired-key grace
//! window, revocation, and the signing preconditions.

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

use manifest_trust_core::Capability;
use manifest_trust_core::HashAlgorithm;
use manifest_trust_core::KeyId;
use manifest_trust_core::ManifestCore;
use manifest_trust_core::ManifestMetadata;
use manifest_trust_core::SecurityDescriptor;
use manifest_trust_core::SignatureAlgorithm;
use manifest_trust_core::Timestamp;
use manifest_trust_core::hashing::hash_bytes;
use manifest_trust_keys::KeyRecord;
use manifest_trust_keys::KeyRegistry;
use manifest_trust_keys::KeyType;
use manifest_trust_keys::KeyUsage;
use manifest_trust_keys::PrivateKey;
use manifest_trust_keys::PublicKey;
use manifest_trust_keys::SignError;
use manifest_trust_keys::SignatureService;
use manifest_trust_keys::VerificationError;
use manifest_trust_keys::VerificationPolicy;
use manifest_trust_keys::VerificationWarning;
use manifest_trust_keys::generate_signing_key;
use proptest::prelude::*;
use serde_json::json;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

const RSA_KEY_ID: &str = "renum-signing-key-2024-001";
const RSA_PRIVATE_PEM: &str = include_str!("fixtures/rsa-2048.pem");
const RSA_PUBLIC_PEM: &str = include_str!("fixtures/rsa-2048.pub.pem");
const DAY_MS: i64 = 24 * 60 * 60 * 1000;
const T0: i64 = 1_704_067_200_000;

fn email_manifest() -> ManifestCore {
    ManifestCore {
        agent_id: "sa-email-basic".into(),
        name: "Email Basic".to_string(),
        description: "Sends transactional email".to_string(),
        version: "1.0.0".into(),
        capabilities: vec![Capability {
            name: "send_email".to_string(),
            description: "Send one email".to_string(),
            input_schema: json!({"type": "object", "properties": {"to": {"type": "string"}}}),
            output_schema: json!({"type": "object"}),
            required_credentials: vec!["smtp".to_string()],
            cost: Some(1),
        }],
        security: SecurityDescriptor {
            network_access: true,
            ..SecurityDescriptor::default()
        },
        metadata: ManifestMetadata {
            author: "platform-team".to_string(),
            license: "Apache-2.0".to_string(),
            tags: Vec::new(),
        },
        created_at: Timestamp::from_unix_millis(T0),
        updated_at: Timestamp::from_unix_millis(T0),
        code_checksum: hash_bytes(HashAlgorithm::Sha256, b"email-agent"),
    }
}

fn service_with(record: KeyRecord) -> SignatureService {
    let registry = Arc::new(KeyRegistry::new());
    registry.register(record).unwrap();
    SignatureService::new(registry, VerificationPolicy::default())
}

fn rsa_service() -> SignatureService {
    let private_key = PrivateKey::from_pkcs8_pem(KeyType::Rsa, RSA_PRIVATE_PEM).unwrap();
    service_with(KeyRecord::signer(RSA_KEY_ID, private_key, Timestamp::from_unix_millis(T0)))
}

fn ed25519_service(key_id: &str, expires_at: Option<Timestamp>) -> SignatureService {
    let generated =
        generate_signing_key(KeyType::Ed25519, key_id, Timestamp::from_unix_millis(T0)).unwrap();
    service_with(generated.record.with_expiry(expires_at))
}

fn at(days: i64) -> Timestamp {
    Timestamp::from_unix_millis(T0 + days * DAY_MS)
}

// ============================================================================
// SECTION: End-to-End
// ============================================================================

#[test]
fn rs256_manifest_round_trip_and_tamper_detection() {
    let service = rsa_service();
    let key_id = KeyId::new(RSA_KEY_ID);
    let signed = service.sign_manifest(email_manifest(), &key_id, "authority", at(1)).unwrap();
    let signature = signed.signature.clone().unwrap();
    assert_eq!(signature.algorithm, SignatureAlgorithm::Rs256);
    assert_eq!(signature.content_hash, signed.content_hash);

    let report = service.verify(&signed, at(2)).unwrap();
    assert!(!report.has_warnings());
    assert_eq!(report.key_id, key_id);
    assert!(report.key_status.can_verify);

    let mut tampered = signed;
    tampered.manifest.description = "Sends marketing email".to_string();
    tampered.rehash().unwrap();
    assert!(matches!(
        service.verify(&tampered, at(2)),
        Err(VerificationError::HashMismatch { .. })
    ));
}

#[test]
fn rsa_fixture_public_key_matches_private_key() {
    let private_key = PrivateKey::from_pkcs8_pem(KeyType::Rsa, RSA_PRIVATE_PEM).unwrap();
    let public_key = PublicKey::from_pem(KeyType::Rsa, RSA_PUBLIC_PEM).unwrap();
    assert_eq!(private_key.public_key(), public_key);
    let record = KeyRecord::verifier(RSA_KEY_ID, public_key, Timestamp::from_unix_millis(T0));
    record.with_private_key(private_key).unwrap();
}

#[test]
fn es256_and_eddsa_signatures_verify() {
    for key_type in [KeyType::Ecdsa, KeyType::Ed25519] {
        let generated = generate_signing_key(key_type, "key-a", at(0)).unwrap();
        let service = service_with(generated.record);
        let key_id = KeyId::new("key-a");
        let signed = service.sign_manifest(email_manifest(), &key_id, "authority", at(1)).unwrap();
        let report = service.verify(&signed, at(1)).unwrap();
        assert_eq!(report.algorithm, key_type.algorithm());
    }
}

#[test]
fn stored_hash_edit_without_rehash_is_detected() {
    let service = ed25519_service("key-a", None);
    let mut signed =
        service.sign_manifest(email_manifest(), &KeyId::new("key-a"), "authority", at(1)).unwrap();
    signed.manifest.capabilities[0].cost = Some(100);
    let err = service.verify(&signed, at(1)).unwrap_err();
    assert_eq!(err.kind(), "hash_mismatch");
}

// ============================================================================
// SECTION: Key Lifecycle
// ============================================================================

#[test]
fn expired_key_verifies_with_warning_then_fails_after_revocation() {
    let service = ed25519_service("key-a", Some(at(10)));
    let key_id = KeyId::new("key-a");
    let signed = service.sign_manifest(email_manifest(), &key_id, "authority", at(1)).unwrap();

    let report = service.verify(&signed, at(20)).unwrap();
    assert_eq!(report.warnings, vec![VerificationWarning::KeyExpired { expired_at: at(10) }]);
    assert!(report.key_status.is_expired);
    assert!(report.key_status.can_verify);
    assert!(!report.key_status.is_valid);

    service.registry().revoke(&key_id, at(21)).unwrap();
    assert_eq!(
        service.verify(&signed, at(22)),
        Err(VerificationError::KeyRevoked(key_id))
    );
}

#[test]
fn expired_key_fails_outside_grace_window() {
    let service = ed25519_service("key-a", Some(at(10)));
    let signed =
        service.sign_manifest(email_manifest(), &KeyId::new("key-a"), "authority", at(1)).unwrap();
    let grace = i64::from(VerificationPolicy::default().expired_key_grace_days);
    assert!(service.verify(&signed, at(10 + grace)).is_ok());
    assert!(matches!(
        service.verify(&signed, at(11 + grace)),
        Err(VerificationError::KeyExpired { .. })
    ));

    let key_id = KeyId::new("key-a");
    let in_window = service.key_status(&key_id, at(10 + grace)).unwrap();
    assert!(in_window.is_expired && in_window.can_verify);
    let past_window = service.key_status(&key_id, at(11 + grace)).unwrap();
    assert!(past_window.is_expired && !past_window.can_verify);
    assert!(service.registry().status(&key_id, at(11 + grace)).unwrap().can_verify);
}

#[test]
fn signature_dated_after_expiry_is_rejected() {
    let service = ed25519_service("key-a", Some(at(10)));
    let mut signed =
        service.sign_manifest(email_manifest(), &KeyId::new("key-a"), "authority", at(1)).unwrap();
    if let Some(signature) = signed.signature.as_mut() {
        signature.signed_at = at(11);
    }
    assert!(matches!(
        service.verify(&signed, at(12)),
        Err(VerificationError::KeyExpired { .. })
    ));
}

#[test]
fn rotated_key_still_verifies_with_inactive_warning() {
    let service = ed25519_service("key-a", None);
    let old = KeyId::new("key-a");
    let signed = service.sign_manifest(email_manifest(), &old, "authority", at(1)).unwrap();
    let next = generate_signing_key(KeyType::Ed25519, "key-b", at(2)).unwrap();
    service.registry().rotate(&old, next.record).unwrap();
    let report = service.verify(&signed, at(3)).unwrap();
    assert_eq!(report.warnings, vec![VerificationWarning::KeyInactive]);
    assert!(matches!(
        service.sign(&email_manifest(), &old, "authority", at(3)),
        Err(SignError::KeyNotValid(_))
    ));
}

#[test]
fn unknown_key_and_missing_signature_are_reported() {
    let service = ed25519_service("key-a", None);
    let mut signed =
        service.sign_manifest(email_manifest(), &KeyId::new("key-a"), "authority", at(1)).unwrap();
    let mut unknown = signed.clone();
    if let Some(signature) = unknown.signature.as_mut() {
        signature.key_id = KeyId::new("key-z");
    }
    assert_eq!(
        service.verify(&unknown, at(1)),
        Err(VerificationError::KeyNotFound(KeyId::new("key-z")))
    );
    signed.signature = None;
    assert_eq!(service.verify(&signed, at(1)), Err(VerificationError::MissingSignature));
}

#[test]
fn forged_signature_bytes_are_invalid() {
    let service = ed25519_service("key-a", None);
    let mut signed =
        service.sign_manifest(email_manifest(), &KeyId::new("key-a"), "authority", at(1)).unwrap();
    let other = ed25519_service("key-a", None);
    let forged =
        other.sign_manifest(email_manifest(), &KeyId::new("key-a"), "authority", at(1)).unwrap();
    signed.signature = forged.signature;
    assert_eq!(
        service.verify(&signed, at(1)),
        Err(VerificationError::SignatureInvalid(KeyId::new("key-a")))
    );
}

// ============================================================================
// SECTION: Signing Preconditions
// ============================================================================

#[test]
fn signing_requires_valid_manifest_and_sign_usage() {
    let service = ed25519_service("key-a", None);
    let key_id = KeyId::new("key-a");
    let mut invalid = email_manifest();
    invalid.agent_id = "email".into();
    assert!(matches!(
        service.sign(&invalid, &key_id, "authority", at(1)),
        Err(SignError::Validation(_))
    ));

    let generated = generate_signing_key(KeyType::Ed25519, "verify-only", at(0)).unwrap();
    service.registry().register(generated.record.with_usages([KeyUsage::Verify])).unwrap();
    assert!(matches!(
        service.sign(&email_manifest(), &KeyId::new("verify-only"), "authority", at(1)),
        Err(SignError::UsageNotPermitted(_))
    ));
}

// ============================================================================
// SECTION: Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn sign_then_verify_succeeds_and_any_edit_is_detected(
        name in "[A-Za-z][A-Za-z ]{0,30}",
        cost in 0_u64..1_000,
        edited in "[a-z]{1,20}",
    ) {
        let service = ed25519_service("key-p", None);
        let mut core = email_manifest();
        core.name = name;
        core.capabilities[0].cost = Some(cost);
        let signed = service.sign_manifest(core, &KeyId::new("key-p"), "authority", at(1)).unwrap();
        prop_assert!(service.verify(&signed, at(1)).is_ok());

        let mut tampered = signed;
        prop_assume!(tampered.manifest.metadata.license != edited);
        tampered.manifest.metadata.license = edited;
        tampered.rehash().unwrap();
        let is_hash_mismatch =
            matches!(service.verify(&tampered, at(1)), Err(VerificationError::HashMismatch { .. }));
        prop_assert!(is_hash_mismatch);
    }
}
