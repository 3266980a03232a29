// crates/manifest-trust-core/src/audit.rs
// ============================================================================
// Module: Manifest Trust Audit Logging
// Description: Structured audit events for key, cache, and admin activity.
// Purpose: Emit JSON-line audit records without hard logging dependencies.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Audit records are emitted through [`AuditSink`] implementations so hosts can
//! route them to their own pipeline. Records serialize as one JSON object per
//! line with an `event` discriminator and a `timestamp_ms` field. Payloads never
//! include key material or manifest bodies.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use serde::Serialize;

use crate::time::Timestamp;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Audit event payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Cache entries were invalidated.
    CacheInvalidated {
        /// Agent identifier.
        agent_id: String,
        /// Version selector, or `None` for all versions.
        version: Option<String>,
        /// Caller-supplied reason.
        reason: String,
        /// Number of slots removed.
        removed: usize,
    },
    /// Cache was cleared.
    CacheCleared {
        /// Caller-supplied reason.
        reason: String,
        /// Number of slots removed.
        removed: usize,
    },
    /// Cache entries signed by a key were purged.
    CacheKeyPurged {
        /// Signing key identifier.
        key_id: String,
        /// Caller-supplied reason.
        reason: String,
        /// Number of slots removed.
        removed: usize,
    },
    /// Cache warming completed.
    CacheWarmed {
        /// Number of keys requested.
        requested: usize,
        /// Number of keys fetched and cached.
        warmed: usize,
        /// Number of keys that failed.
        failed: usize,
    },
    /// Agent lifecycle event was applied to the cache.
    LifecycleApplied {
        /// Lifecycle event kind label.
        kind: String,
        /// Agent identifier.
        agent_id: String,
        /// Version when provided.
        version: Option<String>,
        /// Number of slots removed.
        invalidated: usize,
        /// Whether a warm fetch succeeded.
        warmed: bool,
    },
    /// Manifest verified with a warning.
    VerificationWarning {
        /// Cache key in `agent@version` form.
        manifest: String,
        /// Signing key identifier.
        key_id: String,
        /// Warning label.
        warning: String,
    },
    /// Manifest failed verification.
    VerificationFailed {
        /// Cache key in `agent@version` form.
        manifest: String,
        /// Stable error kind label.
        error_kind: String,
    },
    /// Key was registered.
    KeyRegistered {
        /// Key identifier.
        key_id: String,
        /// Key type label.
        key_type: String,
    },
    /// Key was deactivated (rotation or manual).
    KeyDeactivated {
        /// Key identifier.
        key_id: String,
    },
    /// Key was revoked.
    KeyRevoked {
        /// Key identifier.
        key_id: String,
    },
    /// Manifest was signed and approved.
    ManifestSigned {
        /// Cache key in `agent@version` form.
        manifest: String,
        /// Signing key identifier.
        key_id: String,
        /// Signer identity.
        signed_by: String,
    },
    /// Administrative request was denied.
    AdminDenied {
        /// Caller subject, if known.
        subject: Option<String>,
        /// Operation label.
        operation: String,
        /// Denial reason label.
        reason: String,
    },
}

/// Timestamped audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: i64,
    /// Event payload.
    #[serde(flatten)]
    pub event: AuditEvent,
}

impl AuditRecord {
    /// Creates a record stamped with the current wall-clock time.
    #[must_use]
    pub fn now(event: AuditEvent) -> Self {
        Self {
            timestamp_ms: Timestamp::now().as_unix_millis(),
            event,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for manifest trust events.
pub trait AuditSink: Send + Sync {
    /// Record an audit record.
    fn record(&self, record: &AuditRecord);

    /// Stamps and records an event.
    fn emit(&self, event: AuditEvent) {
        self.record(&AuditRecord::now(event));
    }
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn record(&self, record: &AuditRecord) {
        if let Ok(payload) = serde_json::to_string(record) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, record: &AuditRecord) {
        if let Ok(payload) = serde_json::to_string(record)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _record: &AuditRecord) {}
}

/// Audit sink that keeps records in memory.
#[derive(Default)]
pub struct MemoryAuditSink {
    /// Captured records.
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    /// Creates an empty in-memory sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of captured events.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.records
            .lock()
            .map(|records| records.iter().map(|record| record.event.clone()).collect())
            .unwrap_or_default()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: &AuditRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record.clone());
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
