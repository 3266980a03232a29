// crates/manifest-trust-cache/src/warming.rs
// ============================================================================
// Module: Cache Warming
// Description: Preloads frequently requested manifests into the cache.
// Purpose: Keep hot manifests verified and resident before consumers ask.
// Dependencies: manifest-trust-core, crate::cache, crate::store
// ============================================================================

//! ## Overview
//! Warming goes through the same single-flight load path as consumer
//! requests, so a warm never races a concurrent `get` into a second fetch.
//! Warming loads do not count as requests. Candidate keys come from observed
//! request counts merged with the store's usage frequency, filtered by the
//! warming threshold and capped at the configured top-N. Keys retired by a
//! `deprecated` or `revoked` event are skipped, and a warm never installs a
//! deprecated manifest.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use manifest_trust_core::AuditEvent;
use manifest_trust_core::CacheKey;
use serde::Deserialize;
use serde::Serialize;

use crate::cache::ManifestCache;
use crate::cache::Origin;
use crate::cache::lock;

// ============================================================================
// SECTION: Reports
// ============================================================================

/// Failure to warm a single key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarmFailure {
    /// Key that failed.
    pub key: CacheKey,
    /// Stable error kind label.
    pub error_kind: String,
    /// Error message.
    pub message: String,
}

/// Outcome of a warming pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarmReport {
    /// Keys considered.
    pub requested: usize,
    /// Keys newly loaded.
    pub warmed: usize,
    /// Keys that were already resident.
    pub already_cached: usize,
    /// Keys retired by lifecycle events or resolving to a deprecated manifest.
    #[serde(default)]
    pub skipped: usize,
    /// Keys that failed to load.
    pub failed: Vec<WarmFailure>,
}

// ============================================================================
// SECTION: Warming
// ============================================================================

impl ManifestCache {
    /// Warms the given keys, or the most requested keys when `keys` is `None`.
    ///
    /// Failures are reported per key and never abort the pass.
    pub async fn warm(&self, keys: Option<&[CacheKey]>) -> WarmReport {
        let candidates = match keys {
            Some(keys) => keys.to_vec(),
            None => self.warm_candidates().await,
        };
        let mut report = WarmReport {
            requested: candidates.len(),
            ..WarmReport::default()
        };
        for key in candidates {
            if self.is_retired(&key) {
                report.skipped += 1;
                continue;
            }
            if self.contains(&key) {
                report.already_cached += 1;
                continue;
            }
            match self.get_with_origin(&key, Origin::Warm).await {
                Ok(_) if self.contains(&key) => report.warmed += 1,
                Ok(_) => report.skipped += 1,
                Err(err) => report.failed.push(WarmFailure {
                    key,
                    error_kind: err.kind().to_string(),
                    message: err.to_string(),
                }),
            }
        }
        self.audit.emit(AuditEvent::CacheWarmed {
            requested: report.requested,
            warmed: report.warmed,
            failed: report.failed.len(),
        });
        report
    }

    /// Selects keys whose combined request count meets the warming threshold.
    ///
    /// Store usage is best effort; an unavailable store contributes nothing.
    pub async fn warm_candidates(&self) -> Vec<CacheKey> {
        let mut counts: BTreeMap<CacheKey, u64> = BTreeMap::new();
        for (key, count) in lock(&self.request_counts).iter() {
            counts.insert(key.clone(), *count);
        }
        if let Ok(usage) = self.store.fetch_usage_frequency().await {
            for record in usage {
                let count = counts.entry(record.cache_key()).or_default();
                *count = count.saturating_add(record.count);
            }
        }
        counts.retain(|key, _| !self.is_retired(key));
        rank_candidates(counts, self.settings.warming_threshold, self.settings.warm_top_n)
    }
}

/// Filters by threshold and orders by count descending, then key.
fn rank_candidates(counts: BTreeMap<CacheKey, u64>, threshold: u64, top_n: usize) -> Vec<CacheKey> {
    let mut ranked: Vec<(CacheKey, u64)> =
        counts.into_iter().filter(|(_, count)| *count >= threshold).collect();
    ranked.sort_by(|left, right| right.1.cmp(&left.1).then_with(|| left.0.cmp(&right.0)));
    ranked.into_iter().take(top_n).map(|(key, _)| key).collect()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
