// crates/manifest-trust-service/tests/service.rs
// ============================================================================
// Module: Service Facade Tests
// Description: Authorization, key distribution, approval, and cache admin.
// ============================================================================
//! ## Overview
//! Builds the service from TOML configuration over an in-memory record store
//! and exercises each operation through the facade.

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

use manifest_trust_cache::CacheError;
use manifest_trust_cache::InMemoryRecordStore;
use manifest_trust_cache::LifecycleEvent;
use manifest_trust_cache::LifecycleKind;
use manifest_trust_cache::RecordStore;
use manifest_trust_config::ManifestTrustConfig;
use manifest_trust_core::AgentId;
use manifest_trust_core::AuditEvent;
use manifest_trust_core::AuditSink;
use manifest_trust_core::CacheKey;
use manifest_trust_core::Capability;
use manifest_trust_core::HashAlgorithm;
use manifest_trust_core::KeyId;
use manifest_trust_core::ManifestCore;
use manifest_trust_core::ManifestMetadata;
use manifest_trust_core::ManifestStatus;
use manifest_trust_core::ManifestVersion;
use manifest_trust_core::MemoryAuditSink;
use manifest_trust_core::SecurityDescriptor;
use manifest_trust_core::Timestamp;
use manifest_trust_core::hashing::hash_bytes;
use manifest_trust_keys::ExportedKey;
use manifest_trust_keys::HealthStatus;
use manifest_trust_keys::KeyType;
use manifest_trust_keys::generate_signing_key;
use manifest_trust_service::ManifestTrustService;
use manifest_trust_service::Principal;
use manifest_trust_service::ServiceError;
use manifest_trust_service::WebhookSecret;
use serde_json::json;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

const KEY_ID: &str = "authority-1";

struct Fixture {
    service: ManifestTrustService,
    store: Arc<InMemoryRecordStore>,
    audit: Arc<MemoryAuditSink>,
    admin: Principal,
}

impl Fixture {
    async fn new() -> Self {
        let config = ManifestTrustConfig::from_toml("[cache]\nbackground_warming = false\n")
            .expect("config");
        let store = Arc::new(InMemoryRecordStore::new());
        let audit = Arc::new(MemoryAuditSink::new());
        let service = ManifestTrustService::init(
            &config,
            Arc::clone(&store) as Arc<dyn RecordStore>,
            Arc::clone(&audit) as Arc<dyn AuditSink>,
        )
        .await
        .expect("init");
        let admin = Principal::new("ops@example.com", ["admin"]);
        let generated =
            generate_signing_key(KeyType::Ed25519, KEY_ID, Timestamp::now()).expect("generate");
        service.register_key(&admin, generated.record).expect("register");
        Self {
            service,
            store,
            audit,
            admin,
        }
    }

    fn publish(&self, agent: &str, version: &str) {
        let signed = self
            .service
            .approve_manifest(&self.admin, manifest(agent, version), &KeyId::new(KEY_ID))
            .expect("approve");
        self.store.insert(signed);
    }

    fn denials(&self) -> usize {
        self.audit
            .events()
            .iter()
            .filter(|event| matches!(event, AuditEvent::AdminDenied { .. }))
            .count()
    }
}

fn manifest(agent: &str, version: &str) -> ManifestCore {
    let created = Timestamp::from_unix_millis(1_704_067_200_000);
    ManifestCore {
        agent_id: agent.into(),
        name: format!("{agent} agent"),
        description: "Relays messages".to_string(),
        version: version.into(),
        capabilities: vec![Capability {
            name: "send_message".to_string(),
            description: "Send one message".to_string(),
            input_schema: json!({"type": "object"}),
            output_schema: json!({"type": "object"}),
            required_credentials: Vec::new(),
            cost: None,
        }],
        security: SecurityDescriptor::default(),
        metadata: ManifestMetadata {
            author: "platform".to_string(),
            license: "Apache-2.0".to_string(),
            tags: Vec::new(),
        },
        created_at: created,
        updated_at: created,
        code_checksum: hash_bytes(HashAlgorithm::Sha256, agent.as_bytes()),
    }
}

// ============================================================================
// SECTION: Authorization
// ============================================================================

#[tokio::test]
async fn admin_operations_reject_non_admins() {
    let fixture = Fixture::new().await;
    let viewer = Principal::new("viewer@example.com", ["viewer"]);

    let err = fixture.service.cache_stats(&viewer).unwrap_err();
    assert_eq!(err.kind(), "unauthorized");
    assert!(fixture.service.cache_config(&Principal::anonymous("anon")).is_err());
    assert!(fixture.service.clear_cache(&viewer, "test").is_err());
    assert!(fixture.service.revoke_key(&viewer, &KeyId::new(KEY_ID)).is_err());
    assert!(
        fixture
            .service
            .approve_manifest(&viewer, manifest("sa-slack", "1.0.0"), &KeyId::new(KEY_ID))
            .is_err()
    );
    assert_eq!(fixture.denials(), 5);

    assert!(fixture.service.cache_stats(&fixture.admin).is_ok());
    assert_eq!(fixture.denials(), 5);
    fixture.service.shutdown().await;
}

#[tokio::test]
async fn webhook_requires_matching_secret() {
    let fixture = Fixture::new().await;
    let event = LifecycleEvent {
        kind: LifecycleKind::Deprecated,
        agent_id: "sa-slack".into(),
        version: None,
    };

    let err = fixture.service.lifecycle_webhook("anything", &event).await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Unauthorized(message) if message.contains("not configured")
    ));

    let service = fixture
        .service
        .with_webhook_secret(WebhookSecret::new(Some("s3cret".to_string())));
    assert!(service.lifecycle_webhook("wrong", &event).await.is_err());
    let outcome = service.lifecycle_webhook("s3cret", &event).await.unwrap();
    assert_eq!(outcome.kind, LifecycleKind::Deprecated);
    service.shutdown().await;
}

// ============================================================================
// SECTION: Keys
// ============================================================================

#[tokio::test]
async fn key_distribution_operations() {
    let fixture = Fixture::new().await;
    let key_id = KeyId::new(KEY_ID);

    let keys = fixture.service.list_keys(Some("ed25519"), true).unwrap();
    assert_eq!(keys.len(), 1);
    assert!(fixture.service.list_keys(Some("rsa"), false).unwrap().is_empty());
    let err = fixture.service.list_keys(Some("dsa"), false).unwrap_err();
    assert_eq!(err.kind(), "invalid_format");

    assert!(matches!(fixture.service.get_key(&key_id, "pem").unwrap(), ExportedKey::Pem(_)));
    assert!(matches!(fixture.service.get_key(&key_id, "jwk").unwrap(), ExportedKey::Jwk(_)));
    assert_eq!(fixture.service.get_key(&key_id, "xml").unwrap_err().kind(), "invalid_format");
    assert_eq!(
        fixture.service.get_key(&KeyId::new("missing"), "pem").unwrap_err().kind(),
        "not_found"
    );

    let jwks = fixture.service.jwks().unwrap();
    assert_eq!(jwks.keys.len(), 1);
    assert_eq!(jwks.keys[0].kid, KEY_ID);
    assert_eq!(jwks.keys[0].kty, "OKP");

    let fingerprint = fixture.service.fingerprint(&key_id, "sha256").unwrap();
    assert_eq!(fingerprint, fixture.service.fingerprint(&key_id, "sha256").unwrap());
    assert_ne!(fingerprint, fixture.service.fingerprint(&key_id, "md5").unwrap());

    let status = fixture.service.key_status(&key_id).unwrap();
    assert!(status.is_valid && status.can_sign);
    assert!(!fixture.service.supported_algorithms().signature_algorithms.is_empty());
    fixture.service.shutdown().await;
}

#[tokio::test]
async fn rotation_and_revocation_update_jwks() {
    let fixture = Fixture::new().await;
    let next = generate_signing_key(KeyType::Ecdsa, "authority-2", Timestamp::now()).unwrap();
    fixture.service.rotate_key(&fixture.admin, &KeyId::new(KEY_ID), next.record).unwrap();

    let kids: Vec<String> =
        fixture.service.jwks().unwrap().keys.into_iter().map(|jwk| jwk.kid).collect();
    assert_eq!(kids, vec!["authority-2".to_string()]);
    assert!(!fixture.service.key_status(&KeyId::new(KEY_ID)).unwrap().is_active);

    fixture.service.revoke_key(&fixture.admin, &KeyId::new("authority-2")).unwrap();
    assert!(fixture.service.jwks().unwrap().keys.is_empty());
    assert_eq!(fixture.service.health().status, HealthStatus::Degraded);
    assert!(fixture.audit.events().iter().any(|event| matches!(
        event,
        AuditEvent::KeyRevoked { key_id } if key_id == "authority-2"
    )));
    fixture.service.shutdown().await;
}

// ============================================================================
// SECTION: Manifests
// ============================================================================

#[tokio::test]
async fn approved_manifest_verifies_and_serves_through_cache() {
    let fixture = Fixture::new().await;
    let signed = fixture
        .service
        .approve_manifest(&fixture.admin, manifest("sa-whatsapp", "1.0.0"), &KeyId::new(KEY_ID))
        .unwrap();
    assert_eq!(signed.status, ManifestStatus::Approved);
    assert_eq!(signed.approved_by.as_deref(), Some("ops@example.com"));

    let report = fixture.service.verify_manifest(&signed).unwrap();
    assert_eq!(report.key_id, KeyId::new(KEY_ID));
    assert_eq!(report.signed_by, "ops@example.com");

    let mut tampered = signed.clone();
    tampered.manifest.description = "Exfiltrates messages".to_string();
    assert_eq!(fixture.service.verify_manifest(&tampered).unwrap_err().kind(), "hash_mismatch");

    fixture.store.insert(signed);
    let agent = AgentId::new("sa-whatsapp");
    let served = fixture.service.get_manifest(&agent, None).await.unwrap();
    assert_eq!(served.manifest.version, ManifestVersion::new("1.0.0"));
    let exact = fixture
        .service
        .get_manifest(&agent, Some(&ManifestVersion::new("1.0.0")))
        .await
        .unwrap();
    assert_eq!(exact.content_hash, served.content_hash);

    let missing = fixture.service.get_manifest(&AgentId::new("sa-absent"), None).await;
    assert!(matches!(missing, Err(ServiceError::Cache(CacheError::NotFound(_)))));
    fixture.service.shutdown().await;
}

// ============================================================================
// SECTION: Cache Administration
// ============================================================================

#[tokio::test]
async fn cache_admin_warm_invalidate_clear() {
    let fixture = Fixture::new().await;
    fixture.publish("sa-slack", "2.0.0");
    fixture.publish("sa-email", "1.1.0");

    let keys = [CacheKey::exact("sa-slack", "2.0.0"), CacheKey::latest("sa-email")];
    let report = fixture.service.warm_cache(&fixture.admin, Some(&keys)).await.unwrap();
    assert_eq!(report.requested, 2);
    assert_eq!(report.warmed, 2);
    assert!(report.failed.is_empty());
    assert!(fixture.service.cache().contains(&CacheKey::exact("sa-slack", "2.0.0")));
    assert!(!fixture.service.cache().contains(&CacheKey::latest("sa-slack")));

    let stats = fixture.service.cache_stats(&fixture.admin).unwrap();
    assert_eq!(stats.entries, 2);
    assert_eq!(stats.hits, 0);

    let removed = fixture
        .service
        .invalidate(&fixture.admin, &AgentId::new("sa-slack"), None, "agent_updated")
        .unwrap();
    assert_eq!(removed, 1);
    assert_eq!(fixture.service.clear_cache(&fixture.admin, "maintenance").unwrap(), 1);
    assert_eq!(fixture.service.cache_stats(&fixture.admin).unwrap().entries, 0);

    let config = fixture.service.cache_config(&fixture.admin).unwrap();
    assert_eq!(config.max_entries, fixture.service.cache().settings().max_entries);
    fixture.service.shutdown().await;
}

#[tokio::test]
async fn revoking_a_key_stops_serving_manifests_it_signed() {
    let fixture = Fixture::new().await;
    fixture.publish("sa-a", "1.0.0");
    let agent = AgentId::new("sa-a");
    fixture.service.get_manifest(&agent, None).await.unwrap();
    assert!(fixture.service.cache().contains(&CacheKey::latest("sa-a")));

    let removed = fixture.service.revoke_key(&fixture.admin, &KeyId::new(KEY_ID)).unwrap();
    assert_eq!(removed, 1);
    assert!(!fixture.service.cache().contains(&CacheKey::latest("sa-a")));

    let err = fixture.service.get_manifest(&agent, None).await.unwrap_err();
    assert_eq!(err.kind(), "key_revoked");
    assert!(fixture.audit.events().iter().any(|event| matches!(
        event,
        AuditEvent::CacheKeyPurged { key_id, removed: 1, reason } if key_id == KEY_ID
            && reason == "key_revoked"
    )));
    fixture.service.shutdown().await;
}

#[tokio::test]
async fn approval_event_warms_new_version() {
    let fixture = Fixture::new().await;
    fixture.publish("sa-slack", "2.0.0");
    let event = LifecycleEvent {
        kind: LifecycleKind::Approved,
        agent_id: "sa-slack".into(),
        version: Some(ManifestVersion::new("2.0.0")),
    };
    let outcome = fixture.service.lifecycle_event(&fixture.admin, &event).await.unwrap();
    assert!(outcome.warmed.is_some());
    assert!(outcome.warm_error.is_none());
    assert_eq!(fixture.service.cache_stats(&fixture.admin).unwrap().entries, 1);
    fixture.service.shutdown().await;
}

#[tokio::test]
async fn health_combines_keys_and_cache() {
    let fixture = Fixture::new().await;
    let health = fixture.service.health();
    assert_eq!(health.status, HealthStatus::Healthy);
    assert_eq!(health.keys.valid_keys, 1);
    assert_eq!(health.keys.signing_keys, 1);

    fixture.service.shutdown().await;
    let err = fixture.service.get_manifest(&AgentId::new("sa-slack"), None).await.unwrap_err();
    assert_eq!(err.kind(), "shutting_down");
}
