// crates/manifest-trust-cache/src/store.rs
// ============================================================================
// Module: Record Store Interface
// Description: Source-of-truth manifest fetch and usage frequency contracts.
// Purpose: Abstract manifest persistence behind an async trait.
// Dependencies: async-trait, manifest-trust-core, thiserror
// ============================================================================

//! ## Overview
//! The cache never owns manifests; it reads them through [`RecordStore`].
//! [`InMemoryRecordStore`] is a process-local implementation for embedding
//! and tests. It resolves `latest` to the highest semantic version whose
//! status is approved.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use manifest_trust_core::AgentId;
use manifest_trust_core::CacheKey;
use manifest_trust_core::ManifestStatus;
use manifest_trust_core::ManifestVersion;
use manifest_trust_core::SignedManifest;
use manifest_trust_core::VersionSelector;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Record store failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordStoreError {
    /// Agent or version does not exist.
    #[error("manifest not found")]
    NotFound,
    /// Store is temporarily unreachable; the caller may retry.
    #[error("record store unavailable: {0}")]
    Unavailable(String),
    /// Stored record is malformed; retrying will not help.
    #[error("record store corrupt: {0}")]
    Corrupt(String),
}

// ============================================================================
// SECTION: Types
// ============================================================================

/// Request frequency reported by the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Agent identifier.
    pub agent_id: AgentId,
    /// Version selector that was requested.
    pub version: VersionSelector,
    /// Request count.
    pub count: u64,
}

impl UsageRecord {
    /// Returns the cache key for this usage record.
    #[must_use]
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(self.agent_id.clone(), self.version.clone())
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Source of truth for signed manifests.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetches the signed manifest for an agent version.
    ///
    /// # Errors
    ///
    /// Returns [`RecordStoreError`] when the manifest is missing or unreachable.
    async fn fetch_manifest(
        &self,
        agent_id: &AgentId,
        version: &VersionSelector,
    ) -> Result<SignedManifest, RecordStoreError>;

    /// Returns request frequencies used to select warming candidates.
    ///
    /// # Errors
    ///
    /// Returns [`RecordStoreError`] when the store is unreachable.
    async fn fetch_usage_frequency(&self) -> Result<Vec<UsageRecord>, RecordStoreError>;
}

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// Manifests keyed by agent then version.
type ManifestTable = BTreeMap<AgentId, BTreeMap<ManifestVersion, SignedManifest>>;

/// In-memory record store.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    /// Stored manifests.
    manifests: Mutex<ManifestTable>,
    /// Usage counts keyed by cache key.
    usage: Mutex<BTreeMap<CacheKey, u64>>,
    /// Number of manifest fetches served.
    fetches: AtomicU64,
}

impl InMemoryRecordStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a manifest.
    pub fn insert(&self, manifest: SignedManifest) {
        let mut table = lock(&self.manifests);
        table
            .entry(manifest.manifest.agent_id.clone())
            .or_default()
            .insert(manifest.manifest.version.clone(), manifest);
    }

    /// Updates a manifest in place. Returns false when it does not exist.
    pub fn update(
        &self,
        agent_id: &AgentId,
        version: &ManifestVersion,
        apply: impl FnOnce(&mut SignedManifest),
    ) -> bool {
        let mut table = lock(&self.manifests);
        match table.get_mut(agent_id).and_then(|versions| versions.get_mut(version)) {
            Some(manifest) => {
                apply(manifest);
                true
            }
            None => false,
        }
    }

    /// Records request usage for warming selection.
    pub fn record_usage(&self, key: CacheKey, count: u64) {
        let mut usage = lock(&self.usage);
        let entry = usage.entry(key).or_default();
        *entry = entry.saturating_add(count);
    }

    /// Returns the number of manifest fetches served.
    #[must_use]
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn fetch_manifest(
        &self,
        agent_id: &AgentId,
        version: &VersionSelector,
    ) -> Result<SignedManifest, RecordStoreError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let table = lock(&self.manifests);
        let versions = table.get(agent_id).ok_or(RecordStoreError::NotFound)?;
        let found = match version {
            VersionSelector::Exact(version) => versions.get(version),
            VersionSelector::Latest => versions
                .values()
                .filter(|manifest| manifest.status == ManifestStatus::Approved)
                .max_by(|left, right| {
                    let left_version = left.manifest.version.parse_semver().ok();
                    let right_version = right.manifest.version.parse_semver().ok();
                    left_version.cmp(&right_version)
                }),
        };
        found.cloned().ok_or(RecordStoreError::NotFound)
    }

    async fn fetch_usage_frequency(&self) -> Result<Vec<UsageRecord>, RecordStoreError> {
        Ok(lock(&self.usage)
            .iter()
            .map(|(key, count)| UsageRecord {
                agent_id: key.agent_id.clone(),
                version: key.version.clone(),
                count: *count,
            })
            .collect())
    }
}

/// Locks a store mutex, recovering the data if a writer panicked.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
