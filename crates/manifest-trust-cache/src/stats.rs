// crates/manifest-trust-cache/src/stats.rs
// ============================================================================
// Module: Cache Statistics
// Description: Counters, snapshots, and health classification for the cache.
// Purpose: Report cache effectiveness and degradation without locking entries.
// Dependencies: manifest-trust-keys, serde
// ============================================================================

//! ## Overview
//! Counters are relaxed atomics updated on the request path. A
//! [`CacheStats`] snapshot combines them with an entry scan and classifies
//! health from the hit rate and fill ratio thresholds in the settings.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use manifest_trust_keys::HealthStatus;
use serde::Deserialize;
use serde::Serialize;

use crate::settings::CacheSettings;

// ============================================================================
// SECTION: Counters
// ============================================================================

/// Monotonic cache counters.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    /// Requests served from a ready entry.
    pub(crate) hits: AtomicU64,
    /// Requests that required or awaited a fetch.
    pub(crate) misses: AtomicU64,
    /// Misses that attached to another caller's fetch.
    pub(crate) coalesced: AtomicU64,
    /// Entries removed by the LRU bound.
    pub(crate) evictions: AtomicU64,
    /// Entries removed after their TTL elapsed.
    pub(crate) expirations: AtomicU64,
    /// Slots removed by invalidation or clear.
    pub(crate) invalidations: AtomicU64,
    /// Upstream fetch attempts.
    pub(crate) upstream_fetches: AtomicU64,
    /// Upstream attempts that failed or timed out.
    pub(crate) upstream_failures: AtomicU64,
    /// Signature verifications performed.
    pub(crate) verifications: AtomicU64,
    /// Verifications that failed.
    pub(crate) verification_failures: AtomicU64,
}

impl Counters {
    /// Increments a counter by one.
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments a counter by `amount`.
    pub(crate) fn add(counter: &AtomicU64, amount: usize) {
        counter.fetch_add(u64::try_from(amount).unwrap_or(u64::MAX), Ordering::Relaxed);
    }

    /// Reads a counter.
    pub(crate) fn read(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

// ============================================================================
// SECTION: Snapshots
// ============================================================================

/// Cache health report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheHealth {
    /// Health classification.
    pub status: HealthStatus,
    /// Reasons for a degraded classification.
    pub reasons: Vec<String>,
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Requests served from a ready entry.
    pub hits: u64,
    /// Requests that required or awaited a fetch.
    pub misses: u64,
    /// Hit ratio over all requests (0 when idle).
    pub hit_rate: f64,
    /// Ready entries.
    pub entries: usize,
    /// In-flight fetches.
    pub in_flight: usize,
    /// Configured entry bound.
    pub max_entries: usize,
    /// Misses that attached to another caller's fetch.
    pub coalesced: u64,
    /// Entries removed by the LRU bound.
    pub evictions: u64,
    /// Entries removed after their TTL elapsed.
    pub expirations: u64,
    /// Slots removed by invalidation or clear.
    pub invalidations: u64,
    /// Upstream fetch attempts.
    pub upstream_fetches: u64,
    /// Upstream attempts that failed or timed out.
    pub upstream_failures: u64,
    /// Signature verifications performed.
    pub verifications: u64,
    /// Verifications that failed.
    pub verification_failures: u64,
    /// Estimated bytes held by ready entries (serialized manifest size).
    pub memory_bytes: usize,
    /// Health classification.
    pub health: CacheHealth,
}

/// Entry occupancy gathered from a shard scan.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Occupancy {
    /// Ready entries.
    pub(crate) entries: usize,
    /// In-flight fetches.
    pub(crate) in_flight: usize,
    /// Estimated bytes held by ready entries.
    pub(crate) memory_bytes: usize,
}

/// Builds a statistics snapshot from counters and occupancy.
pub(crate) fn snapshot(
    counters: &Counters,
    occupancy: Occupancy,
    settings: &CacheSettings,
) -> CacheStats {
    let hits = Counters::read(&counters.hits);
    let misses = Counters::read(&counters.misses);
    let requests = hits.saturating_add(misses);
    let hit_rate = ratio(hits, requests);
    let fill_ratio = ratio(
        u64::try_from(occupancy.entries).unwrap_or(u64::MAX),
        u64::try_from(settings.max_entries).unwrap_or(u64::MAX),
    );

    let mut reasons = Vec::new();
    if requests >= settings.degraded_min_requests && hit_rate < settings.degraded_hit_rate {
        reasons.push(format!(
            "hit rate {hit_rate:.2} below {:.2}",
            settings.degraded_hit_rate
        ));
    }
    if fill_ratio >= settings.degraded_fill_ratio {
        reasons.push(format!(
            "cache {} of {} entries full",
            occupancy.entries, settings.max_entries
        ));
    }

    CacheStats {
        hits,
        misses,
        hit_rate,
        entries: occupancy.entries,
        in_flight: occupancy.in_flight,
        max_entries: settings.max_entries,
        coalesced: Counters::read(&counters.coalesced),
        evictions: Counters::read(&counters.evictions),
        expirations: Counters::read(&counters.expirations),
        invalidations: Counters::read(&counters.invalidations),
        upstream_fetches: Counters::read(&counters.upstream_fetches),
        upstream_failures: Counters::read(&counters.upstream_failures),
        verifications: Counters::read(&counters.verifications),
        verification_failures: Counters::read(&counters.verification_failures),
        memory_bytes: occupancy.memory_bytes,
        health: CacheHealth {
            status: if reasons.is_empty() { HealthStatus::Healthy } else { HealthStatus::Degraded },
            reasons,
        },
    }
}

/// Returns `part / whole`, or 0 when `whole` is 0.
#[allow(clippy::cast_precision_loss, reason = "Ratios only feed health thresholds.")]
fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 { 0.0 } else { part as f64 / whole as f64 }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
