// crates/manifest-trust-keys/src/registry.rs
// ============================================================================
// Module: Key Registry
// Description: In-process store of signing and verification keys.
// Purpose: Own key lifecycle (register, rotate, deactivate, revoke) and lookups.
// Dependencies: crate::{codec, key}
// ============================================================================

//! ## Overview
//! The registry is the single owner of key records. All mutation goes through
//! its typed operations; readers receive clones or encoded exports. Lock
//! poisoning is surfaced as [`KeyError::Unavailable`] and reported through
//! [`KeyRegistry::health`] instead of crashing the process.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;

use manifest_trust_core::KeyId;
use manifest_trust_core::Timestamp;
use serde::Deserialize;
use serde::Serialize;

use crate::codec::ExportedKey;
use crate::codec::FingerprintAlgorithm;
use crate::key::KeyError;
use crate::key::KeyFormat;
use crate::key::KeyInfo;
use crate::key::KeyRecord;
use crate::key::KeyStatus;
use crate::key::KeyType;

// ============================================================================
// SECTION: Health
// ============================================================================

/// Health classification shared by registry and cache reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Fully operational.
    Healthy,
    /// Operational with reduced guarantees.
    Degraded,
}

/// Key registry health report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryHealth {
    /// Health classification.
    pub status: HealthStatus,
    /// Registered key count.
    pub total_keys: usize,
    /// Keys that are active and unexpired.
    pub valid_keys: usize,
    /// Keys that can currently sign.
    pub signing_keys: usize,
    /// Reasons for a degraded classification.
    pub reasons: Vec<String>,
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Process-local key registry.
#[derive(Debug, Default)]
pub struct KeyRegistry {
    /// Key records keyed by identifier.
    keys: RwLock<BTreeMap<KeyId, KeyRecord>>,
}

impl KeyRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new key record.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::DuplicateKey`] when the identifier is already present.
    pub fn register(&self, record: KeyRecord) -> Result<(), KeyError> {
        let mut keys = self.write()?;
        if keys.contains_key(&record.key_id) {
            return Err(KeyError::DuplicateKey(record.key_id));
        }
        keys.insert(record.key_id.clone(), record);
        Ok(())
    }

    /// Returns a clone of the key record.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::KeyNotFound`] for unknown identifiers.
    pub fn record(&self, key_id: &KeyId) -> Result<KeyRecord, KeyError> {
        self.read()?.get(key_id).cloned().ok_or_else(|| KeyError::KeyNotFound(key_id.clone()))
    }

    /// Returns the public key encoded in the requested format.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::KeyNotFound`] for unknown identifiers or a codec
    /// error when encoding fails.
    pub fn get(&self, key_id: &KeyId, format: KeyFormat) -> Result<ExportedKey, KeyError> {
        let keys = self.read()?;
        let record = keys.get(key_id).ok_or_else(|| KeyError::KeyNotFound(key_id.clone()))?;
        record.public_key.export(key_id, format)
    }

    /// Lists key descriptions, optionally filtered by type and validity.
    ///
    /// `active_only` keeps keys that are active, unexpired, and unrevoked at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] when the registry is unavailable or a key cannot be encoded.
    pub fn list(
        &self,
        key_type: Option<KeyType>,
        active_only: bool,
        now: Timestamp,
    ) -> Result<Vec<KeyInfo>, KeyError> {
        self.read()?
            .values()
            .filter(|record| key_type.is_none_or(|key_type| record.key_type() == key_type))
            .filter(|record| !active_only || record.status(now).is_valid)
            .map(describe)
            .collect()
    }

    /// Returns records that are valid at `now`, for JWKS publication.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Unavailable`] when the registry lock is poisoned.
    pub fn valid_records(&self, now: Timestamp) -> Result<Vec<KeyRecord>, KeyError> {
        Ok(self
            .read()?
            .values()
            .filter(|record| record.status(now).is_valid)
            .cloned()
            .collect())
    }

    /// Computes a fingerprint of the key's SPKI DER encoding.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::KeyNotFound`] for unknown identifiers.
    pub fn fingerprint(
        &self,
        key_id: &KeyId,
        algorithm: FingerprintAlgorithm,
    ) -> Result<String, KeyError> {
        let keys = self.read()?;
        let record = keys.get(key_id).ok_or_else(|| KeyError::KeyNotFound(key_id.clone()))?;
        record.public_key.fingerprint(algorithm)
    }

    /// Returns key status flags at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::KeyNotFound`] for unknown identifiers.
    pub fn status(&self, key_id: &KeyId, now: Timestamp) -> Result<KeyStatus, KeyError> {
        self.read()?
            .get(key_id)
            .map(|record| record.status(now))
            .ok_or_else(|| KeyError::KeyNotFound(key_id.clone()))
    }

    /// Marks a key inactive. The record is retained for verification.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::KeyNotFound`] for unknown identifiers.
    pub fn deactivate(&self, key_id: &KeyId) -> Result<(), KeyError> {
        let mut keys = self.write()?;
        let record = keys.get_mut(key_id).ok_or_else(|| KeyError::KeyNotFound(key_id.clone()))?;
        record.active = false;
        Ok(())
    }

    /// Revokes a key. Revocation is permanent.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::KeyNotFound`] for unknown identifiers.
    pub fn revoke(&self, key_id: &KeyId, at: Timestamp) -> Result<(), KeyError> {
        let mut keys = self.write()?;
        let record = keys.get_mut(key_id).ok_or_else(|| KeyError::KeyNotFound(key_id.clone()))?;
        record.active = false;
        record.revoked_at.get_or_insert(at);
        Ok(())
    }

    /// Registers `next` and deactivates `previous` under a single write lock.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::KeyNotFound`] when `previous` is unknown or
    /// [`KeyError::DuplicateKey`] when `next` is already registered. Neither
    /// change is applied on error.
    pub fn rotate(&self, previous: &KeyId, next: KeyRecord) -> Result<(), KeyError> {
        let mut keys = self.write()?;
        if !keys.contains_key(previous) {
            return Err(KeyError::KeyNotFound(previous.clone()));
        }
        if keys.contains_key(&next.key_id) {
            return Err(KeyError::DuplicateKey(next.key_id));
        }
        keys.insert(next.key_id.clone(), next);
        if let Some(record) = keys.get_mut(previous) {
            record.active = false;
        }
        Ok(())
    }

    /// Returns the number of registered keys.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Unavailable`] when the registry lock is poisoned.
    pub fn len(&self) -> Result<usize, KeyError> {
        Ok(self.read()?.len())
    }

    /// Returns true when no keys are registered.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Unavailable`] when the registry lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, KeyError> {
        Ok(self.read()?.is_empty())
    }

    /// Reports registry health at `now`.
    #[must_use]
    pub fn health(&self, now: Timestamp) -> RegistryHealth {
        let Ok(keys) = self.read() else {
            return RegistryHealth {
                status: HealthStatus::Degraded,
                total_keys: 0,
                valid_keys: 0,
                signing_keys: 0,
                reasons: vec!["key registry lock poisoned".to_string()],
            };
        };
        let statuses: Vec<KeyStatus> = keys.values().map(|record| record.status(now)).collect();
        let valid_keys = statuses.iter().filter(|status| status.is_valid).count();
        let signing_keys = statuses.iter().filter(|status| status.can_sign).count();
        let mut reasons = Vec::new();
        if valid_keys == 0 {
            reasons.push("no valid verification keys".to_string());
        }
        RegistryHealth {
            status: if reasons.is_empty() { HealthStatus::Healthy } else { HealthStatus::Degraded },
            total_keys: statuses.len(),
            valid_keys,
            signing_keys,
            reasons,
        }
    }

    /// Acquires the read lock.
    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<KeyId, KeyRecord>>, KeyError> {
        self.keys
            .read()
            .map_err(|_| KeyError::Unavailable("key registry lock poisoned".to_string()))
    }

    /// Acquires the write lock.
    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<KeyId, KeyRecord>>, KeyError> {
        self.keys
            .write()
            .map_err(|_| KeyError::Unavailable("key registry lock poisoned".to_string()))
    }
}

/// Builds the public description of a record.
fn describe(record: &KeyRecord) -> Result<KeyInfo, KeyError> {
    Ok(KeyInfo {
        key_id: record.key_id.clone(),
        key_type: record.key_type(),
        algorithm: record.algorithm(),
        created_at: record.created_at,
        expires_at: record.expires_at,
        active: record.active,
        revoked_at: record.revoked_at,
        usages: record.usages.clone(),
        fingerprint: record.public_key.fingerprint(FingerprintAlgorithm::Sha256)?,
    })
}
