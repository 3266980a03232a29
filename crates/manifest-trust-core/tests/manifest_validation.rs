// crates/manifest-trust-core/tests/manifest_validation.rs
// ============================================================================
// Module: Manifest Validation Tests
// Description: Verifies structural checks and lifecycle transitions.
// ============================================================================
//! ## Overview
//! Exercises the validator's identifier, version, field, and capability rules,
//! plus the approval invariant on signed manifests.

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

use manifest_trust_core::Capability;
use manifest_trust_core::HashAlgorithm;
use manifest_trust_core::HashDigest;
use manifest_trust_core::ManifestCore;
use manifest_trust_core::ManifestMetadata;
use manifest_trust_core::ManifestSignature;
use manifest_trust_core::ManifestStatus;
use manifest_trust_core::ManifestValidationError;
use manifest_trust_core::ManifestValidator;
use manifest_trust_core::SecurityDescriptor;
use manifest_trust_core::SignatureAlgorithm;
use manifest_trust_core::SignedManifest;
use manifest_trust_core::Timestamp;
use manifest_trust_core::TransitionError;
use manifest_trust_core::hashing::hash_bytes;
use serde_json::json;

fn capability(name: &str) -> Capability {
    Capability {
        name: name.to_string(),
        description: format!("{name} capability"),
        input_schema: json!({"type": "object"}),
        output_schema: json!({"type": "object"}),
        required_credentials: Vec::new(),
        cost: None,
    }
}

fn manifest() -> ManifestCore {
    ManifestCore {
        agent_id: "sa-whatsapp".into(),
        name: "WhatsApp".to_string(),
        description: "Sends WhatsApp messages".to_string(),
        version: "2.1.0".into(),
        capabilities: vec![capability("send_message"), capability("list_chats")],
        security: SecurityDescriptor::default(),
        metadata: ManifestMetadata {
            author: "messaging".to_string(),
            license: "MIT".to_string(),
            tags: Vec::new(),
        },
        created_at: Timestamp::from_unix_millis(0),
        updated_at: Timestamp::from_unix_millis(0),
        code_checksum: hash_bytes(HashAlgorithm::Sha256, b"code"),
    }
}

// ============================================================================
// SECTION: Validator
// ============================================================================

#[test]
fn well_formed_manifest_passes() {
    ManifestValidator::validate(&manifest()).unwrap();
    assert!(ManifestValidator::issues(&manifest()).is_empty());
}

#[test]
fn agent_id_requires_prefix_and_charset() {
    for bad in ["whatsapp", "sa-", "sa-WhatsApp", "sa_whatsapp", "sa-what sapp"] {
        let mut core = manifest();
        core.agent_id = bad.into();
        assert_eq!(
            ManifestValidator::validate(&core),
            Err(ManifestValidationError::InvalidAgentId(bad.to_string())),
            "{bad}"
        );
    }
}

#[test]
fn version_must_be_semver() {
    let mut core = manifest();
    core.version = "v2".into();
    assert!(matches!(
        ManifestValidator::validate(&core),
        Err(ManifestValidationError::InvalidVersion(version, _)) if version == "v2"
    ));
}

#[test]
fn duplicate_capability_names_are_rejected() {
    let mut core = manifest();
    core.capabilities.push(capability("send_message"));
    assert!(
        ManifestValidator::issues(&core)
            .contains(&ManifestValidationError::DuplicateCapability("send_message".to_string()))
    );
}

#[test]
fn empty_capability_list_is_rejected() {
    let mut core = manifest();
    core.capabilities.clear();
    assert_eq!(ManifestValidator::validate(&core), Err(ManifestValidationError::NoCapabilities));
}

#[test]
fn issues_reports_every_violation() {
    let mut core = manifest();
    core.name = "  ".to_string();
    core.metadata.author = String::new();
    core.capabilities[0].name = "SendMessage".to_string();
    core.capabilities[1].output_schema = json!("string");
    core.capabilities[1].required_credentials = vec![String::new()];
    core.code_checksum = HashDigest {
        algorithm: HashAlgorithm::Sha256,
        value: String::new(),
    };
    let issues = ManifestValidator::issues(&core);
    assert_eq!(
        issues,
        vec![
            ManifestValidationError::MissingField("name"),
            ManifestValidationError::MissingField("metadata.author"),
            ManifestValidationError::MissingChecksum,
            ManifestValidationError::InvalidCapabilityName("SendMessage".to_string()),
            ManifestValidationError::InvalidSchema {
                capability: "list_chats".to_string(),
                schema: "output",
            },
            ManifestValidationError::EmptyCredential("list_chats".to_string()),
        ]
    );
}

// ============================================================================
// SECTION: Lifecycle
// ============================================================================

fn signature(content_hash: HashDigest) -> ManifestSignature {
    ManifestSignature {
        algorithm: SignatureAlgorithm::EdDsa,
        signature: "c2ln".to_string(),
        key_id: "key-1".into(),
        content_hash,
        signed_by: "authority".to_string(),
        signed_at: Timestamp::from_unix_millis(10),
    }
}

#[test]
fn approval_requires_signature_and_records_approver() {
    let mut signed = SignedManifest::draft(manifest()).unwrap();
    let at = Timestamp::from_unix_millis(20);
    assert_eq!(
        signed.transition(ManifestStatus::Approved, "reviewer", at),
        Err(TransitionError::Unsigned)
    );
    signed.signature = Some(signature(signed.content_hash.clone()));
    signed.transition(ManifestStatus::Approved, "reviewer", at).unwrap();
    assert_eq!(signed.status, ManifestStatus::Approved);
    assert_eq!(signed.approved_by.as_deref(), Some("reviewer"));
    assert_eq!(signed.approved_at, Some(at));
    signed.validate_approval().unwrap();
}

#[test]
fn approved_without_approver_fails_invariant() {
    let mut signed = SignedManifest::draft(manifest()).unwrap();
    signed.status = ManifestStatus::Approved;
    assert_eq!(signed.validate_approval(), Err(TransitionError::MissingApprover));
    signed.approved_by = Some("reviewer".to_string());
    assert_eq!(signed.validate_approval(), Err(TransitionError::MissingApprovalTime));
}

#[test]
fn revoked_is_terminal() {
    let mut signed = SignedManifest::draft(manifest()).unwrap();
    let at = Timestamp::from_unix_millis(1);
    signed.transition(ManifestStatus::Revoked, "security", at).unwrap();
    assert_eq!(
        signed.transition(ManifestStatus::Approved, "reviewer", at),
        Err(TransitionError::Illegal {
            from: ManifestStatus::Revoked,
            to: ManifestStatus::Approved,
        })
    );
}
