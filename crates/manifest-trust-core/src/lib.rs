// crates/manifest-trust-core/src/lib.rs
// ============================================================================
// Module: Manifest Trust Core Library
// Description: Public API surface for the manifest trust core.
// Purpose: Expose manifest types, hashing, validation, and audit interfaces.
// Dependencies: crate::{audit, hashing, identifiers, manifest, signed, time, validation}
// ============================================================================

//! ## Overview
//! The manifest trust core defines the agent manifest content model, its
//! canonical content hash, the signed envelope with lifecycle status, and the
//! validator that gates signing. Key management, caching, and transport live in
//! sibling crates and depend on these types as the single source of truth.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod hashing;
pub mod identifiers;
pub mod manifest;
pub mod signed;
pub mod time;
pub mod validation;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditEvent;
pub use audit::AuditRecord;
pub use audit::AuditSink;
pub use audit::FileAuditSink;
pub use audit::MemoryAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use hashing::HashError;
pub use identifiers::AgentId;
pub use identifiers::CacheKey;
pub use identifiers::CacheKeyParseError;
pub use identifiers::KeyId;
pub use identifiers::ManifestVersion;
pub use identifiers::VersionSelector;
pub use manifest::Capability;
pub use manifest::ManifestCore;
pub use manifest::ManifestMetadata;
pub use manifest::SecurityDescriptor;
pub use manifest::compute_content_hash;
pub use signed::MANIFEST_SCHEMA_VERSION;
pub use signed::ManifestSignature;
pub use signed::ManifestStatus;
pub use signed::SignatureAlgorithm;
pub use signed::SignedManifest;
pub use signed::TransitionError;
pub use time::Timestamp;
pub use time::TimestampError;
pub use validation::ManifestValidationError;
pub use validation::ManifestValidator;
