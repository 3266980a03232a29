// crates/manifest-trust-cache/src/cache.rs
// ============================================================================
// Module: Manifest Cache
// Description: Sharded, single-flight cache of verified signed manifests.
// Purpose: Serve verified manifests quickly while honoring invalidation.
// Dependencies: manifest-trust-core, manifest-trust-keys, tokio, thiserror
// ============================================================================

//! ## Overview
//! Entries are spread over independently locked shards keyed by agent, so a
//! slow fetch for one agent never blocks lookups of another. Each slot is
//! either a ready entry or an in-flight fetch. The first caller for a cold key
//! installs a flight and performs fetch plus verification outside any lock;
//! concurrent callers for the same key wait on that flight's watch channel.
//!
//! Security posture: only verified content is stored, verification failures
//! are never cached or retried, and invalidation removes in-flight slots too.
//! A flight installs its result only if its slot is still present, so a `get`
//! issued after `invalidate` returns can never observe pre-invalidation
//! content. Revoking a signing key purges every entry it signed, because hits
//! are served without re-verification.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::hash::BuildHasher;
use std::hash::RandomState;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use manifest_trust_core::AgentId;
use manifest_trust_core::AuditEvent;
use manifest_trust_core::AuditSink;
use manifest_trust_core::CacheKey;
use manifest_trust_core::KeyId;
use manifest_trust_core::ManifestStatus;
use manifest_trust_core::ManifestVersion;
use manifest_trust_core::SignedManifest;
use manifest_trust_core::Timestamp;
use manifest_trust_core::VersionSelector;
use manifest_trust_keys::VerificationError;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::lifecycle::Retirement;
use crate::settings::CacheConfigView;
use crate::settings::CacheSettings;
use crate::stats::CacheStats;
use crate::stats::Counters;
use crate::stats::Occupancy;
use crate::stats::snapshot;
use crate::store::RecordStore;
use crate::store::RecordStoreError;
use crate::verifier::ManifestVerifier;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors returned by cache lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// Agent or version does not exist upstream.
    #[error("manifest not found: {0}")]
    NotFound(CacheKey),
    /// Manifest failed verification.
    #[error("manifest verification failed: {0}")]
    Verification(#[from] VerificationError),
    /// Upstream stayed unreachable after bounded retries.
    #[error("upstream unavailable for {key} after {attempts} attempts: {reason}")]
    UpstreamUnavailable {
        /// Requested key.
        key: CacheKey,
        /// Attempts made.
        attempts: u32,
        /// Last failure.
        reason: String,
    },
    /// Upstream returned a malformed record.
    #[error("upstream record invalid: {0}")]
    Upstream(String),
    /// Agent manifest has been revoked.
    #[error("agent manifest revoked: {0}")]
    AgentRevoked(CacheKey),
    /// Manifest exists but has not been approved.
    #[error("manifest {key} is not approved (status {status})")]
    NotApproved {
        /// Requested key.
        key: CacheKey,
        /// Current status.
        status: ManifestStatus,
    },
    /// Waiting on another caller's fetch exceeded the flight timeout.
    #[error("timed out waiting for in-flight fetch of {0}")]
    FlightTimeout(CacheKey),
    /// Cache has been shut down.
    #[error("manifest cache is shut down")]
    ShuttingDown,
}

impl CacheError {
    /// Returns a stable label for the error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Verification(err) => err.kind(),
            Self::UpstreamUnavailable { .. } => "upstream_unavailable",
            Self::Upstream(_) => "upstream_invalid",
            Self::AgentRevoked(_) => "agent_revoked",
            Self::NotApproved { .. } => "not_approved",
            Self::FlightTimeout(_) => "flight_timeout",
            Self::ShuttingDown => "shutting_down",
        }
    }
}

// ============================================================================
// SECTION: Slots
// ============================================================================

/// Result broadcast to callers waiting on a flight.
type FlightResult = Result<Arc<SignedManifest>, CacheError>;

/// Verified cache entry.
#[derive(Debug)]
pub(crate) struct CacheEntry {
    /// Verified manifest.
    manifest: Arc<SignedManifest>,
    /// Wall-clock fetch time.
    fetched_at: Timestamp,
    /// Monotonic expiry instant.
    expires_at: Instant,
    /// Hits served from this entry.
    hits: u64,
    /// Access tick for LRU ordering.
    last_access: u64,
    /// Estimated serialized size.
    size_bytes: usize,
}

/// In-flight fetch marker.
#[derive(Debug)]
struct Flight {
    /// Flight identifier, unique per cache.
    id: u64,
    /// Receiver cloned by callers that attach to this flight.
    receiver: watch::Receiver<Option<FlightResult>>,
}

/// Cache slot state.
#[derive(Debug)]
enum Slot {
    /// Verified entry.
    Ready(CacheEntry),
    /// Fetch in progress.
    Loading(Flight),
}

/// One independently locked partition.
#[derive(Debug, Default)]
pub(crate) struct Shard {
    /// Slots keyed by cache key.
    slots: HashMap<CacheKey, Slot>,
}

/// Public view of a ready entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySnapshot {
    /// Cache key.
    pub key: CacheKey,
    /// Resolved manifest version.
    pub version: ManifestVersion,
    /// Wall-clock fetch time.
    pub fetched_at: Timestamp,
    /// Hits served from this entry.
    pub hits: u64,
    /// Estimated serialized size.
    pub size_bytes: usize,
    /// Entry has passed its TTL but not yet been swept.
    pub expired: bool,
}

/// How a caller reached the load path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Origin {
    /// Consumer request; counted in hit/miss statistics and request counts.
    Request,
    /// Warming; not counted as a request.
    Warm,
}

/// Lookup outcome for a single pass over a shard.
enum Lookup {
    /// Fresh ready entry.
    Hit(Arc<SignedManifest>),
    /// Become the leader of a new flight.
    Lead(watch::Sender<Option<FlightResult>>, u64),
    /// Wait on an existing flight.
    Follow(watch::Receiver<Option<FlightResult>>),
}

// ============================================================================
// SECTION: Cache
// ============================================================================

/// Sharded single-flight manifest cache.
pub struct ManifestCache {
    /// Entry shards.
    shards: Box<[Mutex<Shard>]>,
    /// Hasher used to pick shards.
    hasher: RandomState,
    /// Source of truth.
    pub(crate) store: Arc<dyn RecordStore>,
    /// Manifest verifier.
    verifier: Arc<dyn ManifestVerifier>,
    /// Audit sink.
    pub(crate) audit: Arc<dyn AuditSink>,
    /// Runtime settings.
    pub(crate) settings: CacheSettings,
    /// Statistics counters.
    pub(crate) counters: Counters,
    /// Request counts per key, retained across invalidation for warming.
    ///
    /// Deprecation and revocation drop the affected agent's counts.
    pub(crate) request_counts: Mutex<HashMap<CacheKey, u64>>,
    /// Agents and versions excluded from warming by lifecycle events.
    pub(crate) retired: Mutex<HashMap<AgentId, Retirement>>,
    /// Global access tick for LRU ordering.
    tick: AtomicU64,
    /// Flight identifier source.
    next_flight: AtomicU64,
    /// Set once the cache has been shut down.
    pub(crate) closed: AtomicBool,
    /// Background task handles.
    pub(crate) maintenance: Mutex<Option<crate::maintenance::MaintenanceHandle>>,
}

impl ManifestCache {
    /// Creates a cache over the given store and verifier.
    #[must_use]
    pub fn new(
        settings: CacheSettings,
        store: Arc<dyn RecordStore>,
        verifier: Arc<dyn ManifestVerifier>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let shard_count = settings.shards.max(1);
        let shards = (0 .. shard_count).map(|_| Mutex::new(Shard::default())).collect();
        Self {
            shards,
            hasher: RandomState::new(),
            store,
            verifier,
            audit,
            settings,
            counters: Counters::default(),
            request_counts: Mutex::new(HashMap::new()),
            retired: Mutex::new(HashMap::new()),
            tick: AtomicU64::new(0),
            next_flight: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            maintenance: Mutex::new(None),
        }
    }

    /// Returns the runtime settings.
    #[must_use]
    pub const fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Returns a verified manifest, fetching and verifying on a miss.
    ///
    /// Hits never re-verify. Concurrent misses for the same key share one
    /// upstream fetch and one verification.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the manifest is missing, unverifiable,
    /// revoked, or upstream stays unavailable.
    pub async fn get(&self, key: &CacheKey) -> Result<Arc<SignedManifest>, CacheError> {
        self.get_with_origin(key, Origin::Request).await
    }

    /// Convenience wrapper for `get` with an agent and optional version.
    ///
    /// # Errors
    ///
    /// See [`ManifestCache::get`].
    pub async fn get_manifest(
        &self,
        agent_id: &AgentId,
        version: Option<&ManifestVersion>,
    ) -> Result<Arc<SignedManifest>, CacheError> {
        let key = CacheKey::new(agent_id.clone(), VersionSelector::from(version.cloned()));
        self.get(&key).await
    }

    /// Shared lookup path for requests and warming.
    pub(crate) async fn get_with_origin(
        &self,
        key: &CacheKey,
        origin: Origin,
    ) -> Result<Arc<SignedManifest>, CacheError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CacheError::ShuttingDown);
        }
        if origin == Origin::Request {
            self.record_request(key);
        }
        let deadline = Instant::now() + self.settings.flight_wait_timeout;
        let mut counted = false;
        loop {
            let lookup = self.lookup(key);
            if origin == Origin::Request && !counted {
                match &lookup {
                    Lookup::Hit(_) => Counters::bump(&self.counters.hits),
                    Lookup::Lead(..) => Counters::bump(&self.counters.misses),
                    Lookup::Follow(_) => {
                        Counters::bump(&self.counters.misses);
                        Counters::bump(&self.counters.coalesced);
                    }
                }
                counted = true;
            }
            match lookup {
                Lookup::Hit(manifest) => return Ok(manifest),
                Lookup::Lead(sender, id) => return self.lead(key, sender, id, origin).await,
                Lookup::Follow(receiver) => {
                    match tokio::time::timeout_at(deadline, wait_for_flight(receiver)).await {
                        Ok(Some(result)) => return result,
                        Ok(None) => {}
                        Err(_) => return Err(CacheError::FlightTimeout(key.clone())),
                    }
                }
            }
        }
    }

    /// Inspects the slot for `key` under its shard lock.
    fn lookup(&self, key: &CacheKey) -> Lookup {
        let mut shard = self.lock_shard(&key.agent_id);
        let now = Instant::now();
        match shard.slots.get_mut(key) {
            Some(Slot::Ready(entry)) if entry.expires_at > now => {
                entry.hits = entry.hits.saturating_add(1);
                entry.last_access = self.next_tick();
                return Lookup::Hit(Arc::clone(&entry.manifest));
            }
            Some(Slot::Loading(flight)) => return Lookup::Follow(flight.receiver.clone()),
            Some(Slot::Ready(_)) => {
                shard.slots.remove(key);
                Counters::bump(&self.counters.expirations);
            }
            None => {}
        }
        self.begin_flight(&mut shard, key)
    }

    /// Installs a loading slot and returns the leader's sender.
    fn begin_flight(&self, shard: &mut MutexGuard<'_, Shard>, key: &CacheKey) -> Lookup {
        let id = self.next_flight.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = watch::channel(None);
        shard.slots.insert(
            key.clone(),
            Slot::Loading(Flight {
                id,
                receiver,
            }),
        );
        Lookup::Lead(sender, id)
    }

    /// Performs fetch and verification as flight leader, then publishes the result.
    ///
    /// Warming never installs a deprecated manifest; waiting consumers still
    /// receive it.
    async fn lead(
        &self,
        key: &CacheKey,
        sender: watch::Sender<Option<FlightResult>>,
        id: u64,
        origin: Origin,
    ) -> FlightResult {
        let mut guard = FlightGuard {
            cache: self,
            key,
            id,
            armed: true,
        };
        let loaded = self.load(key).await;
        let installed = {
            let mut shard = self.lock_shard(&key.agent_id);
            guard.armed = false;
            let owns_slot =
                matches!(shard.slots.get(key), Some(Slot::Loading(flight)) if flight.id == id);
            let cacheable = loaded.as_ref().is_ok_and(|(manifest, _)| {
                origin == Origin::Request || manifest.status != ManifestStatus::Deprecated
            });
            match (&loaded, owns_slot) {
                (Ok((manifest, size_bytes)), true) if cacheable => {
                    shard.slots.insert(
                        key.clone(),
                        Slot::Ready(CacheEntry {
                            manifest: Arc::clone(manifest),
                            fetched_at: Timestamp::now(),
                            expires_at: Instant::now() + self.settings.ttl,
                            hits: 0,
                            last_access: self.next_tick(),
                            size_bytes: *size_bytes,
                        }),
                    );
                    true
                }
                (_, true) => {
                    shard.slots.remove(key);
                    false
                }
                (_, false) => false,
            }
        };
        if installed {
            self.enforce_capacity();
        }
        let result = loaded.map(|(manifest, _)| manifest);
        sender.send_replace(Some(result.clone()));
        result
    }

    /// Fetches with retries, checks status, and verifies.
    async fn load(&self, key: &CacheKey) -> Result<(Arc<SignedManifest>, usize), CacheError> {
        let manifest = self.fetch_with_retry(key).await?;
        match manifest.status {
            ManifestStatus::Revoked => return Err(CacheError::AgentRevoked(key.clone())),
            ManifestStatus::Draft => {
                return Err(CacheError::NotApproved {
                    key: key.clone(),
                    status: manifest.status,
                });
            }
            ManifestStatus::Approved | ManifestStatus::Deprecated => {}
        }
        if let Err(err) = manifest.validate_approval() {
            return Err(CacheError::Upstream(err.to_string()));
        }

        Counters::bump(&self.counters.verifications);
        let report = match self.verifier.verify(&manifest, Timestamp::now()) {
            Ok(report) => report,
            Err(err) => {
                Counters::bump(&self.counters.verification_failures);
                self.audit.emit(AuditEvent::VerificationFailed {
                    manifest: key.to_string(),
                    error_kind: err.kind().to_string(),
                });
                return Err(CacheError::Verification(err));
            }
        };
        for warning in &report.warnings {
            self.audit.emit(AuditEvent::VerificationWarning {
                manifest: key.to_string(),
                key_id: report.key_id.to_string(),
                warning: warning.as_str().to_string(),
            });
        }
        let size_bytes = serde_json::to_vec(&manifest).map_or(0, |bytes| bytes.len());
        Ok((Arc::new(manifest), size_bytes))
    }

    /// Fetches from the record store with a per-attempt timeout and bounded retries.
    async fn fetch_with_retry(&self, key: &CacheKey) -> Result<SignedManifest, CacheError> {
        let mut attempt: u32 = 0;
        loop {
            Counters::bump(&self.counters.upstream_fetches);
            let outcome = tokio::time::timeout(
                self.settings.fetch_timeout,
                self.store.fetch_manifest(&key.agent_id, &key.version),
            )
            .await;
            let reason = match outcome {
                Ok(Ok(manifest)) => return Ok(manifest),
                Ok(Err(RecordStoreError::NotFound)) => {
                    return Err(CacheError::NotFound(key.clone()));
                }
                Ok(Err(RecordStoreError::Corrupt(reason))) => {
                    return Err(CacheError::Upstream(reason));
                }
                Ok(Err(RecordStoreError::Unavailable(reason))) => reason,
                Err(_) => "upstream fetch timed out".to_string(),
            };
            Counters::bump(&self.counters.upstream_failures);
            if attempt >= self.settings.max_fetch_retries {
                return Err(CacheError::UpstreamUnavailable {
                    key: key.clone(),
                    attempts: attempt.saturating_add(1),
                    reason,
                });
            }
            tokio::time::sleep(self.settings.backoff_for(attempt)).await;
            attempt = attempt.saturating_add(1);
        }
    }

    // ------------------------------------------------------------------------
    // Invalidation
    // ------------------------------------------------------------------------

    /// Removes cached entries for an agent.
    ///
    /// With a version, removes that exact entry plus a `latest` entry that
    /// resolved to it (or is still loading). Without a version, removes every
    /// entry for the agent. In-flight fetches are detached so their results
    /// are never installed. Returns the number of slots removed.
    pub fn invalidate(
        &self,
        agent_id: &AgentId,
        version: Option<&ManifestVersion>,
        reason: &str,
    ) -> usize {
        let removed = self.remove_for_agent(agent_id, version, false);
        self.audit.emit(AuditEvent::CacheInvalidated {
            agent_id: agent_id.to_string(),
            version: version.map(ToString::to_string),
            reason: reason.to_string(),
            removed,
        });
        removed
    }

    /// Removes slots for an agent. `force_latest` always drops the latest slot.
    pub(crate) fn remove_for_agent(
        &self,
        agent_id: &AgentId,
        version: Option<&ManifestVersion>,
        force_latest: bool,
    ) -> usize {
        let mut shard = self.lock_shard(agent_id);
        let before = shard.slots.len();
        shard.slots.retain(|key, slot| {
            if &key.agent_id != agent_id {
                return true;
            }
            let Some(version) = version else {
                return false;
            };
            match &key.version {
                VersionSelector::Exact(exact) => exact != version,
                VersionSelector::Latest => {
                    if force_latest {
                        return false;
                    }
                    match slot {
                        Slot::Ready(entry) => &entry.manifest.manifest.version != version,
                        Slot::Loading(_) => false,
                    }
                }
            }
        });
        let removed = before - shard.slots.len();
        drop(shard);
        Counters::add(&self.counters.invalidations, removed);
        removed
    }

    /// Removes every entry signed with `key_id` and detaches all in-flight fetches.
    ///
    /// A fetch in progress may have verified against the key before it
    /// changed, so none is installed. Returns the number of slots removed.
    pub fn invalidate_signed_by(&self, key_id: &KeyId, reason: &str) -> usize {
        let mut removed = 0;
        for shard in &self.shards {
            let mut shard = lock(shard);
            let before = shard.slots.len();
            shard.slots.retain(|_, slot| match slot {
                Slot::Ready(entry) => entry
                    .manifest
                    .signature
                    .as_ref()
                    .is_none_or(|signature| &signature.key_id != key_id),
                Slot::Loading(_) => false,
            });
            removed += before - shard.slots.len();
        }
        Counters::add(&self.counters.invalidations, removed);
        self.audit.emit(AuditEvent::CacheKeyPurged {
            key_id: key_id.to_string(),
            reason: reason.to_string(),
            removed,
        });
        removed
    }

    /// Removes every slot, including in-flight fetches.
    pub fn clear(&self, reason: &str) -> usize {
        let mut removed = 0;
        for shard in &self.shards {
            let mut shard = lock(shard);
            removed += shard.slots.len();
            shard.slots.clear();
        }
        Counters::add(&self.counters.invalidations, removed);
        self.audit.emit(AuditEvent::CacheCleared {
            reason: reason.to_string(),
            removed,
        });
        removed
    }

    // ------------------------------------------------------------------------
    // Expiry and Bounds
    // ------------------------------------------------------------------------

    /// Removes ready entries past their TTL. Returns the number removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        for shard in &self.shards {
            let mut shard = lock(shard);
            let before = shard.slots.len();
            shard.slots.retain(|_, slot| match slot {
                Slot::Ready(entry) => entry.expires_at > now,
                Slot::Loading(_) => true,
            });
            removed += before - shard.slots.len();
        }
        Counters::add(&self.counters.expirations, removed);
        removed
    }

    /// Evicts least-recently-used ready entries until within the bound.
    fn enforce_capacity(&self) {
        while self.occupancy().entries > self.settings.max_entries {
            let Some((index, key, tick)) = self.least_recent() else {
                return;
            };
            let Some(shard) = self.shards.get(index) else {
                return;
            };
            let mut shard = lock(shard);
            let still_oldest = matches!(
                shard.slots.get(&key),
                Some(Slot::Ready(entry)) if entry.last_access == tick
            );
            if still_oldest {
                shard.slots.remove(&key);
                Counters::bump(&self.counters.evictions);
            }
        }
    }

    /// Finds the least-recently-used ready entry across shards.
    fn least_recent(&self) -> Option<(usize, CacheKey, u64)> {
        let mut oldest: Option<(usize, CacheKey, u64)> = None;
        for (index, shard) in self.shards.iter().enumerate() {
            let shard = lock(shard);
            for (key, slot) in &shard.slots {
                if let Slot::Ready(entry) = slot
                    && oldest.as_ref().is_none_or(|(_, _, tick)| entry.last_access < *tick)
                {
                    oldest = Some((index, key.clone(), entry.last_access));
                }
            }
        }
        oldest
    }

    // ------------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------------

    /// Returns true when a fresh ready entry exists for `key`.
    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        let shard = self.lock_shard(&key.agent_id);
        matches!(
            shard.slots.get(key),
            Some(Slot::Ready(entry)) if entry.expires_at > Instant::now()
        )
    }

    /// Returns a snapshot of a ready entry.
    #[must_use]
    pub fn entry(&self, key: &CacheKey) -> Option<EntrySnapshot> {
        let shard = self.lock_shard(&key.agent_id);
        match shard.slots.get(key) {
            Some(Slot::Ready(entry)) => Some(EntrySnapshot {
                key: key.clone(),
                version: entry.manifest.manifest.version.clone(),
                fetched_at: entry.fetched_at,
                hits: entry.hits,
                size_bytes: entry.size_bytes,
                expired: entry.expires_at <= Instant::now(),
            }),
            _ => None,
        }
    }

    /// Returns current statistics and health.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        snapshot(&self.counters, self.occupancy(), &self.settings)
    }

    /// Returns the read-only configuration view.
    #[must_use]
    pub fn config_view(&self) -> CacheConfigView {
        CacheConfigView {
            ttl_seconds: self.settings.ttl.as_secs(),
            max_entries: self.settings.max_entries,
            warming_threshold: self.settings.warming_threshold,
            warm_top_n: self.settings.warm_top_n,
            cleanup_interval_seconds: self.settings.cleanup_interval.as_secs(),
            warm_interval_seconds: self.settings.warm_interval.as_secs(),
            running: self.is_running(),
        }
    }

    /// Scans shards for occupancy.
    fn occupancy(&self) -> Occupancy {
        let mut occupancy = Occupancy::default();
        for shard in &self.shards {
            let shard = lock(shard);
            for slot in shard.slots.values() {
                match slot {
                    Slot::Ready(entry) => {
                        occupancy.entries += 1;
                        occupancy.memory_bytes += entry.size_bytes;
                    }
                    Slot::Loading(_) => occupancy.in_flight += 1,
                }
            }
        }
        occupancy
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    /// Records one consumer request for warming selection.
    fn record_request(&self, key: &CacheKey) {
        let mut counts = lock(&self.request_counts);
        let count = counts.entry(key.clone()).or_default();
        *count = count.saturating_add(1);
        let limit = self.settings.max_entries.saturating_mul(4).max(64);
        if counts.len() > limit {
            prune_counts(&mut counts, limit / 2);
        }
    }

    /// Returns the next LRU tick.
    fn next_tick(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::Relaxed)
    }

    /// Locks the shard that owns `agent_id`.
    fn lock_shard(&self, agent_id: &AgentId) -> MutexGuard<'_, Shard> {
        let hash = self.hasher.hash_one(agent_id);
        let count = u64::try_from(self.shards.len()).unwrap_or(1).max(1);
        let index = usize::try_from(hash % count).unwrap_or(0);
        // index < shards.len(), which is at least one
        lock(&self.shards[index])
    }
}

// ============================================================================
// SECTION: Flight Guard
// ============================================================================

/// Removes the leader's loading slot if the leader is cancelled mid-fetch.
///
/// Dropping the sender wakes followers, which then retry and elect a new leader.
struct FlightGuard<'a> {
    /// Owning cache.
    cache: &'a ManifestCache,
    /// Flight key.
    key: &'a CacheKey,
    /// Flight identifier.
    id: u64,
    /// Cleared once the leader reaches the install step.
    armed: bool,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut shard = self.cache.lock_shard(&self.key.agent_id);
        if matches!(shard.slots.get(self.key), Some(Slot::Loading(flight)) if flight.id == self.id)
        {
            shard.slots.remove(self.key);
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Waits for a flight result. Returns `None` when the leader went away.
async fn wait_for_flight(
    mut receiver: watch::Receiver<Option<FlightResult>>,
) -> Option<FlightResult> {
    let value = receiver.wait_for(Option::is_some).await.ok()?;
    value.clone()
}

/// Locks a mutex, recovering from poisoning.
///
/// Shard mutations are single inserts or removals, so a panicked holder
/// cannot leave a partially written slot behind.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Keeps the `keep` most requested keys.
fn prune_counts(counts: &mut HashMap<CacheKey, u64>, keep: usize) {
    let mut ranked: Vec<(CacheKey, u64)> = counts.drain().collect();
    ranked.sort_by(|left, right| right.1.cmp(&left.1).then_with(|| left.0.cmp(&right.0)));
    ranked.truncate(keep);
    counts.extend(ranked);
}
