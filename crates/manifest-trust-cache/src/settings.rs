// crates/manifest-trust-cache/src/settings.rs
// ============================================================================
// Module: Cache Settings
// Description: Runtime tuning for TTL, bounds, warming, and upstream retries.
// Purpose: Provide validated knobs consumed by the manifest cache.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`CacheSettings`] is the in-process form of the `[cache]` configuration
//! section. Durations are already resolved; range checks live with the file
//! loader so invalid values never reach the cache.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Manifest cache runtime settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    /// Entry time-to-live.
    pub ttl: Duration,
    /// Maximum number of ready entries before LRU eviction.
    pub max_entries: usize,
    /// Number of independently locked shards.
    pub shards: usize,
    /// Minimum recorded request count for default warming.
    pub warming_threshold: u64,
    /// Number of keys selected by default warming.
    pub warm_top_n: usize,
    /// Interval between background TTL sweeps.
    pub cleanup_interval: Duration,
    /// Interval between background warming passes.
    pub warm_interval: Duration,
    /// Run periodic warming in the background.
    pub background_warming: bool,
    /// Timeout for one upstream fetch attempt.
    pub fetch_timeout: Duration,
    /// Retries after the first failed upstream attempt.
    pub max_fetch_retries: u32,
    /// Base backoff between retries (doubled per attempt).
    pub retry_backoff: Duration,
    /// Maximum time a caller waits on another caller's in-flight fetch.
    pub flight_wait_timeout: Duration,
    /// Maximum time to wait for background tasks at shutdown.
    pub shutdown_timeout: Duration,
    /// Hit rate below which the cache reports degraded.
    pub degraded_hit_rate: f64,
    /// Requests required before the hit rate is judged.
    pub degraded_min_requests: u64,
    /// Fill ratio at or above which the cache reports degraded.
    pub degraded_fill_ratio: f64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            max_entries: 1000,
            shards: 16,
            warming_threshold: 5,
            warm_top_n: 20,
            cleanup_interval: Duration::from_secs(60),
            warm_interval: Duration::from_secs(300),
            background_warming: true,
            fetch_timeout: Duration::from_millis(2000),
            max_fetch_retries: 2,
            retry_backoff: Duration::from_millis(100),
            flight_wait_timeout: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(5),
            degraded_hit_rate: 0.5,
            degraded_min_requests: 100,
            degraded_fill_ratio: 0.95,
        }
    }
}

impl CacheSettings {
    /// Returns the backoff before retry number `attempt` (0-indexed).
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.retry_backoff.saturating_mul(1_u32 << attempt.min(16))
    }
}

/// Read-only view of the cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfigView {
    /// Entry time-to-live in seconds.
    pub ttl_seconds: u64,
    /// Maximum ready entries.
    pub max_entries: usize,
    /// Minimum request count for default warming.
    pub warming_threshold: u64,
    /// Keys selected by default warming.
    pub warm_top_n: usize,
    /// Background sweep interval in seconds.
    pub cleanup_interval_seconds: u64,
    /// Background warming interval in seconds.
    pub warm_interval_seconds: u64,
    /// Background tasks are running.
    pub running: bool,
}
