// crates/manifest-trust-core/tests/content_hash.rs
// ============================================================================
// Module: Manifest Content Hash Tests
// Description: Verifies determinism and sensitivity of the manifest content hash.
// ============================================================================
//! ## Overview
//! The content hash must depend only on logical manifest content: key order and
//! volatile timestamps never change it, while any semantic edit always does.

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
use manifest_trust_core::ManifestCore;
use manifest_trust_core::ManifestMetadata;
use manifest_trust_core::SecurityDescriptor;
use manifest_trust_core::SignedManifest;
use manifest_trust_core::Timestamp;
use manifest_trust_core::compute_content_hash;
use manifest_trust_core::hashing::hash_bytes;
use proptest::prelude::*;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

fn sample_manifest() -> ManifestCore {
    ManifestCore {
        agent_id: "sa-email-basic".into(),
        name: "Email Basic".to_string(),
        description: "Sends transactional email".to_string(),
        version: "1.0.0".into(),
        capabilities: vec![Capability {
            name: "send_email".to_string(),
            description: "Send one email".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {"to": {"type": "string"}, "body": {"type": "string"}},
                "required": ["to", "body"]
            }),
            output_schema: json!({"type": "object", "properties": {"id": {"type": "string"}}}),
            required_credentials: vec!["smtp".to_string()],
            cost: Some(2),
        }],
        security: SecurityDescriptor {
            permissions: vec!["email:send".to_string()],
            network_access: true,
            filesystem_access: false,
            handles_sensitive_data: true,
            external_apis: vec!["smtp.example.com".to_string()],
        },
        metadata: ManifestMetadata {
            author: "platform-team".to_string(),
            license: "Apache-2.0".to_string(),
            tags: vec!["email".to_string()],
        },
        created_at: Timestamp::from_unix_millis(1_704_067_200_000),
        updated_at: Timestamp::from_unix_millis(1_704_067_200_000),
        code_checksum: hash_bytes(HashAlgorithm::Sha256, b"agent-code"),
    }
}

/// Rebuilds every JSON object with its keys inserted in reverse order.
fn reverse_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let entries: Vec<(String, Value)> = map.into_iter().collect();
            let mut reversed = Map::new();
            for (key, value) in entries.into_iter().rev() {
                reversed.insert(key, reverse_keys(value));
            }
            Value::Object(reversed)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(reverse_keys).collect()),
        other => other,
    }
}

// ============================================================================
// SECTION: Determinism
// ============================================================================

#[test]
fn content_hash_is_stable_across_serialization_round_trips() {
    let manifest = sample_manifest();
    let expected = compute_content_hash(&manifest).unwrap();
    let text = serde_json::to_string_pretty(&manifest).unwrap();
    let reparsed: ManifestCore = serde_json::from_str(&text).unwrap();
    assert_eq!(compute_content_hash(&reparsed).unwrap(), expected);
    assert_eq!(expected.algorithm, HashAlgorithm::Sha256);
    assert_eq!(expected.value.len(), 64);
}

#[test]
fn content_hash_ignores_key_insertion_order() {
    let manifest = sample_manifest();
    let value = serde_json::to_value(&manifest).unwrap();
    let reordered: ManifestCore = serde_json::from_value(reverse_keys(value)).unwrap();
    assert_eq!(
        compute_content_hash(&reordered).unwrap(),
        compute_content_hash(&manifest).unwrap()
    );
}

#[test]
fn content_hash_excludes_updated_at() {
    let manifest = sample_manifest();
    let mut touched = manifest.clone();
    touched.updated_at = Timestamp::from_unix_millis(1_800_000_000_000);
    assert_eq!(
        compute_content_hash(&touched).unwrap(),
        compute_content_hash(&manifest).unwrap()
    );
}

#[test]
fn content_hash_covers_capability_order() {
    let mut manifest = sample_manifest();
    let mut second = manifest.capabilities[0].clone();
    second.name = "list_templates".to_string();
    manifest.capabilities.push(second);
    let before = compute_content_hash(&manifest).unwrap();
    manifest.capabilities.reverse();
    assert_ne!(compute_content_hash(&manifest).unwrap(), before);
}

#[test]
fn signed_manifest_detects_unrehashed_edits() {
    let mut signed = SignedManifest::draft(sample_manifest()).unwrap();
    assert!(signed.content_hash_matches().unwrap());
    signed.manifest.description = "Sends marketing email".to_string();
    assert!(!signed.content_hash_matches().unwrap());
    signed.rehash().unwrap();
    assert!(signed.content_hash_matches().unwrap());
}

// ============================================================================
// SECTION: Properties
// ============================================================================

proptest! {
    #[test]
    fn any_description_edit_changes_hash(description in "[a-zA-Z0-9 ]{1,64}") {
        let manifest = sample_manifest();
        prop_assume!(description != manifest.description);
        let mut edited = manifest.clone();
        edited.description = description;
        prop_assert_ne!(
            compute_content_hash(&edited).unwrap(),
            compute_content_hash(&manifest).unwrap()
        );
    }

    #[test]
    fn any_cost_edit_changes_hash(cost in proptest::option::of(0_u64..10_000)) {
        let manifest = sample_manifest();
        prop_assume!(cost != manifest.capabilities[0].cost);
        let mut edited = manifest.clone();
        edited.capabilities[0].cost = cost;
        prop_assert_ne!(
            compute_content_hash(&edited).unwrap(),
            compute_content_hash(&manifest).unwrap()
        );
    }

    #[test]
    fn updated_at_never_changes_hash(millis in 0_i64..4_000_000_000_000) {
        let manifest = sample_manifest();
        let mut edited = manifest.clone();
        edited.updated_at = Timestamp::from_unix_millis(millis);
        prop_assert_eq!(
            compute_content_hash(&edited).unwrap(),
            compute_content_hash(&manifest).unwrap()
        );
    }
}
