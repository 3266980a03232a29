// crates/manifest-trust-service/src/service.rs
// ============================================================================
// Module: Manifest Trust Service
// Description: Facade over the key registry, signature service, and cache.
// Purpose: Expose key distribution, verification, and cache administration.
// Dependencies: manifest-trust-{core,keys,cache,config}, crate::{auth, error}
// ============================================================================

//! ## Overview
//! [`ManifestTrustService`] wires the subsystem together from configuration
//! and exposes each external operation as a method, independent of any
//! transport. Public key distribution and verification need no privilege.
//! Cache administration, key lifecycle changes, and manifest approval require
//! an admin [`Principal`]; denials are audited. Lifecycle webhooks are
//! authenticated by a shared secret instead of a principal.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use manifest_trust_cache::CacheConfigView;
use manifest_trust_cache::CacheHealth;
use manifest_trust_cache::CacheStats;
use manifest_trust_cache::LifecycleEvent;
use manifest_trust_cache::LifecycleOutcome;
use manifest_trust_cache::ManifestCache;
use manifest_trust_cache::ManifestVerifier;
use manifest_trust_cache::RecordStore;
use manifest_trust_cache::WarmReport;
use manifest_trust_config::ManifestTrustConfig;
use manifest_trust_core::AgentId;
use manifest_trust_core::AuditEvent;
use manifest_trust_core::AuditSink;
use manifest_trust_core::CacheKey;
use manifest_trust_core::KeyId;
use manifest_trust_core::ManifestCore;
use manifest_trust_core::ManifestStatus;
use manifest_trust_core::ManifestVersion;
use manifest_trust_core::SignedManifest;
use manifest_trust_core::Timestamp;
use manifest_trust_keys::ExportedKey;
use manifest_trust_keys::FingerprintAlgorithm;
use manifest_trust_keys::HealthStatus;
use manifest_trust_keys::Jwks;
use manifest_trust_keys::KeyFormat;
use manifest_trust_keys::KeyInfo;
use manifest_trust_keys::KeyRecord;
use manifest_trust_keys::KeyRegistry;
use manifest_trust_keys::KeyStatus;
use manifest_trust_keys::KeyType;
use manifest_trust_keys::RegistryHealth;
use manifest_trust_keys::SignatureService;
use manifest_trust_keys::SupportedAlgorithms;
use manifest_trust_keys::VerificationReport;
use serde::Deserialize;
use serde::Serialize;

use crate::auth::AdminPolicy;
use crate::auth::Principal;
use crate::auth::WebhookSecret;
use crate::error::ServiceError;

// ============================================================================
// SECTION: Health
// ============================================================================

/// Combined subsystem health.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceHealth {
    /// Overall classification (degraded when any component is degraded).
    pub status: HealthStatus,
    /// Key registry health.
    pub keys: RegistryHealth,
    /// Cache health.
    pub cache: CacheHealth,
}

// ============================================================================
// SECTION: Service
// ============================================================================

/// Manifest integrity and distribution service.
pub struct ManifestTrustService {
    /// Key registry shared with the signature service.
    registry: Arc<KeyRegistry>,
    /// Signature service.
    signatures: Arc<SignatureService>,
    /// Verified manifest cache.
    cache: Arc<ManifestCache>,
    /// Admin role policy.
    admin: AdminPolicy,
    /// Webhook shared secret.
    webhook_secret: WebhookSecret,
    /// Audit sink.
    audit: Arc<dyn AuditSink>,
}

impl ManifestTrustService {
    /// Builds the service from configuration and starts cache maintenance.
    ///
    /// Loads configured keys, wires the cache to `store`, starts background
    /// sweeping, and when background warming is enabled runs one warming
    /// pass before returning. Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when configuration or key material is invalid.
    pub async fn init(
        config: &ManifestTrustConfig,
        store: Arc<dyn RecordStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, ServiceError> {
        config.validate()?;
        let registry = Arc::new(KeyRegistry::new());
        for record in config.key_records()? {
            let key_id = record.key_id.clone();
            let key_type = record.key_type();
            registry.register(record)?;
            audit.emit(AuditEvent::KeyRegistered {
                key_id: key_id.to_string(),
                key_type: key_type.as_str().to_string(),
            });
        }
        let signatures =
            Arc::new(SignatureService::new(Arc::clone(&registry), config.verification_policy()));
        let settings = config.cache_settings();
        let background_warming = settings.background_warming;
        let cache = Arc::new(ManifestCache::new(
            settings,
            store,
            Arc::clone(&signatures) as Arc<dyn ManifestVerifier>,
            Arc::clone(&audit),
        ));
        cache.start();
        if background_warming {
            cache.warm(None).await;
        }
        Ok(Self {
            registry,
            signatures,
            cache,
            admin: AdminPolicy::new(config.admin.roles.iter().cloned()),
            webhook_secret: WebhookSecret::new(config.webhook_secret()),
            audit,
        })
    }

    /// Replaces the webhook secret sourced from configuration.
    #[must_use]
    pub fn with_webhook_secret(mut self, secret: WebhookSecret) -> Self {
        self.webhook_secret = secret;
        self
    }

    /// Stops background maintenance and rejects further cache lookups.
    pub async fn shutdown(&self) {
        self.cache.shutdown().await;
    }

    /// Returns the underlying cache.
    #[must_use]
    pub const fn cache(&self) -> &Arc<ManifestCache> {
        &self.cache
    }

    /// Returns the underlying key registry.
    #[must_use]
    pub const fn registry(&self) -> &Arc<KeyRegistry> {
        &self.registry
    }

    // ------------------------------------------------------------------------
    // Manifests
    // ------------------------------------------------------------------------

    /// Returns a verified manifest through the cache.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Cache`] when the manifest cannot be served.
    pub async fn get_manifest(
        &self,
        agent_id: &AgentId,
        version: Option<&ManifestVersion>,
    ) -> Result<Arc<SignedManifest>, ServiceError> {
        Ok(self.cache.get_manifest(agent_id, version).await?)
    }

    /// Verifies a caller-supplied signed manifest.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Verification`] when verification fails.
    pub fn verify_manifest(
        &self,
        manifest: &SignedManifest,
    ) -> Result<VerificationReport, ServiceError> {
        Ok(self.signatures.verify(manifest, Timestamp::now())?)
    }

    /// Signs and approves a manifest on behalf of an admin principal.
    ///
    /// The principal's subject is recorded as signer and approver.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when unauthorized, invalid, or signing fails.
    pub fn approve_manifest(
        &self,
        principal: &Principal,
        core: ManifestCore,
        key_id: &KeyId,
    ) -> Result<SignedManifest, ServiceError> {
        self.require_admin(principal, "approve_manifest")?;
        let now = Timestamp::now();
        let mut signed = self.signatures.sign_manifest(core, key_id, &principal.subject, now)?;
        signed
            .transition(ManifestStatus::Approved, &principal.subject, now)
            .map_err(|err| ServiceError::Transition(err.to_string()))?;
        self.audit.emit(AuditEvent::ManifestSigned {
            manifest: CacheKey::exact(
                signed.manifest.agent_id.clone(),
                signed.manifest.version.clone(),
            )
            .to_string(),
            key_id: key_id.to_string(),
            signed_by: principal.subject.clone(),
        });
        Ok(signed)
    }

    // ------------------------------------------------------------------------
    // Keys
    // ------------------------------------------------------------------------

    /// Lists public keys, optionally filtered by type label and validity.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidFormat`] for unknown key type labels.
    pub fn list_keys(
        &self,
        key_type: Option<&str>,
        active_only: bool,
    ) -> Result<Vec<KeyInfo>, ServiceError> {
        let key_type = key_type
            .map(|label| {
                KeyType::from_label(label)
                    .ok_or_else(|| ServiceError::InvalidFormat(format!("key type {label}")))
            })
            .transpose()?;
        Ok(self.registry.list(key_type, active_only, Timestamp::now())?)
    }

    /// Exports a public key in the requested format (`pem`, `jwk`, `der`).
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidFormat`] for unknown formats or
    /// [`ServiceError::Key`] for unknown keys.
    pub fn get_key(&self, key_id: &KeyId, format: &str) -> Result<ExportedKey, ServiceError> {
        let format = KeyFormat::from_label(format)?;
        Ok(self.registry.get(key_id, format)?)
    }

    /// Returns the JSON Web Key Set of valid verification keys.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Key`] when a key cannot be encoded.
    pub fn jwks(&self) -> Result<Jwks, ServiceError> {
        Ok(self.signatures.jwks(Timestamp::now())?)
    }

    /// Returns key status flags.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Key`] for unknown keys.
    pub fn key_status(&self, key_id: &KeyId) -> Result<KeyStatus, ServiceError> {
        Ok(self.signatures.key_status(key_id, Timestamp::now())?)
    }

    /// Computes a key fingerprint (`sha256`, `sha1`, `md5`).
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidFormat`] for unknown algorithms or
    /// [`ServiceError::Key`] for unknown keys.
    pub fn fingerprint(&self, key_id: &KeyId, algorithm: &str) -> Result<String, ServiceError> {
        let algorithm = FingerprintAlgorithm::from_label(algorithm)?;
        Ok(self.registry.fingerprint(key_id, algorithm)?)
    }

    /// Returns supported algorithm, key type, and format labels.
    #[must_use]
    pub fn supported_algorithms(&self) -> SupportedAlgorithms {
        SignatureService::supported_algorithms()
    }

    /// Registers a key.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when unauthorized or the key id is taken.
    pub fn register_key(
        &self,
        principal: &Principal,
        record: KeyRecord,
    ) -> Result<(), ServiceError> {
        self.require_admin(principal, "register_key")?;
        let key_id = record.key_id.to_string();
        let key_type = record.key_type().as_str().to_string();
        self.registry.register(record)?;
        self.audit.emit(AuditEvent::KeyRegistered {
            key_id,
            key_type,
        });
        Ok(())
    }

    /// Registers `next` and deactivates `previous` atomically.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when unauthorized or either key is invalid.
    pub fn rotate_key(
        &self,
        principal: &Principal,
        previous: &KeyId,
        next: KeyRecord,
    ) -> Result<(), ServiceError> {
        self.require_admin(principal, "rotate_key")?;
        let next_id = next.key_id.to_string();
        let key_type = next.key_type().as_str().to_string();
        self.registry.rotate(previous, next)?;
        self.audit.emit(AuditEvent::KeyRegistered {
            key_id: next_id,
            key_type,
        });
        self.audit.emit(AuditEvent::KeyDeactivated {
            key_id: previous.to_string(),
        });
        Ok(())
    }

    /// Revokes a key permanently and purges every cached manifest it signed.
    ///
    /// Returns the number of cache slots removed.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when unauthorized or the key is unknown.
    pub fn revoke_key(&self, principal: &Principal, key_id: &KeyId) -> Result<usize, ServiceError> {
        self.require_admin(principal, "revoke_key")?;
        self.registry.revoke(key_id, Timestamp::now())?;
        self.audit.emit(AuditEvent::KeyRevoked {
            key_id: key_id.to_string(),
        });
        Ok(self.cache.invalidate_signed_by(key_id, "key_revoked"))
    }

    // ------------------------------------------------------------------------
    // Cache Administration
    // ------------------------------------------------------------------------

    /// Returns cache statistics.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Unauthorized`] for non-admin principals.
    pub fn cache_stats(&self, principal: &Principal) -> Result<CacheStats, ServiceError> {
        self.require_admin(principal, "cache_stats")?;
        Ok(self.cache.stats())
    }

    /// Returns the read-only cache configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Unauthorized`] for non-admin principals.
    pub fn cache_config(&self, principal: &Principal) -> Result<CacheConfigView, ServiceError> {
        self.require_admin(principal, "cache_config")?;
        Ok(self.cache.config_view())
    }

    /// Warms the listed keys (`sa-x@1.0.0` or `sa-x@latest`), or the most
    /// requested keys when `keys` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Unauthorized`] for non-admin principals.
    pub async fn warm_cache(
        &self,
        principal: &Principal,
        keys: Option<&[CacheKey]>,
    ) -> Result<WarmReport, ServiceError> {
        self.require_admin(principal, "warm_cache")?;
        Ok(self.cache.warm(keys).await)
    }

    /// Invalidates cached entries for an agent.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Unauthorized`] for non-admin principals.
    pub fn invalidate(
        &self,
        principal: &Principal,
        agent_id: &AgentId,
        version: Option<&ManifestVersion>,
        reason: &str,
    ) -> Result<usize, ServiceError> {
        self.require_admin(principal, "invalidate")?;
        Ok(self.cache.invalidate(agent_id, version, reason))
    }

    /// Clears the whole cache.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Unauthorized`] for non-admin principals.
    pub fn clear_cache(&self, principal: &Principal, reason: &str) -> Result<usize, ServiceError> {
        self.require_admin(principal, "clear_cache")?;
        Ok(self.cache.clear(reason))
    }

    /// Applies a lifecycle event submitted by an admin.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Unauthorized`] for non-admin principals.
    pub async fn lifecycle_event(
        &self,
        principal: &Principal,
        event: &LifecycleEvent,
    ) -> Result<LifecycleOutcome, ServiceError> {
        self.require_admin(principal, "lifecycle_event")?;
        Ok(self.cache.handle_lifecycle_event(event).await)
    }

    /// Applies a lifecycle event delivered by webhook.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Unauthorized`] when no secret is configured or
    /// the presented secret does not match.
    pub async fn lifecycle_webhook(
        &self,
        presented_secret: &str,
        event: &LifecycleEvent,
    ) -> Result<LifecycleOutcome, ServiceError> {
        if !self.webhook_secret.is_configured() {
            return Err(self.deny(None, "lifecycle_webhook", "webhook secret not configured"));
        }
        if !self.webhook_secret.matches(presented_secret) {
            return Err(self.deny(None, "lifecycle_webhook", "webhook secret mismatch"));
        }
        Ok(self.cache.handle_lifecycle_event(event).await)
    }

    // ------------------------------------------------------------------------
    // Health
    // ------------------------------------------------------------------------

    /// Reports combined key registry and cache health.
    #[must_use]
    pub fn health(&self) -> ServiceHealth {
        let keys = self.registry.health(Timestamp::now());
        let cache = self.cache.stats().health;
        let healthy =
            keys.status == HealthStatus::Healthy && cache.status == HealthStatus::Healthy;
        let status = if healthy { HealthStatus::Healthy } else { HealthStatus::Degraded };
        ServiceHealth {
            status,
            keys,
            cache,
        }
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    /// Rejects non-admin principals, auditing the denial.
    fn require_admin(&self, principal: &Principal, operation: &str) -> Result<(), ServiceError> {
        if self.admin.is_admin(principal) {
            Ok(())
        } else {
            Err(self.deny(Some(&principal.subject), operation, "admin role required"))
        }
    }

    /// Audits a denial and returns the matching error.
    fn deny(&self, subject: Option<&str>, operation: &str, reason: &str) -> ServiceError {
        self.audit.emit(AuditEvent::AdminDenied {
            subject: subject.map(ToString::to_string),
            operation: operation.to_string(),
            reason: reason.to_string(),
        });
        ServiceError::Unauthorized(format!("{operation}: {reason}"))
    }
}
