// crates/manifest-trust-cache/src/lib.rs
// ============================================================================
// Module: Manifest Trust Cache Library
// Description: Verified manifest cache with single-flight loading.
// Purpose: Serve verified agent manifests with bounded staleness.
// Dependencies: crate::{cache, lifecycle, maintenance, settings, stats, store, verifier, warming}
// ============================================================================

//! ## Overview
//! [`ManifestCache`] fronts a [`RecordStore`] and only ever stores manifests
//! that passed [`ManifestVerifier`] checks. Entries expire after a TTL, are
//! bounded by LRU eviction, and are invalidated by lifecycle events.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod cache;
pub mod lifecycle;
mod maintenance;
pub mod settings;
pub mod stats;
pub mod store;
pub mod verifier;
pub mod warming;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use cache::CacheError;
pub use cache::EntrySnapshot;
pub use cache::ManifestCache;
pub use lifecycle::LifecycleEvent;
pub use lifecycle::LifecycleKind;
pub use lifecycle::LifecycleOutcome;
pub use settings::CacheConfigView;
pub use settings::CacheSettings;
pub use stats::CacheHealth;
pub use stats::CacheStats;
pub use store::InMemoryRecordStore;
pub use store::RecordStore;
pub use store::RecordStoreError;
pub use store::UsageRecord;
pub use verifier::ManifestVerifier;
pub use warming::WarmFailure;
pub use warming::WarmReport;
