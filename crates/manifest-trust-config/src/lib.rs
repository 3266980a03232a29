// crates/manifest-trust-config/src/lib.rs
// ============================================================================
// Module: Manifest Trust Config Library
// Description: Configuration model and loader for Manifest Trust.
// Purpose: Expose fail-closed config loading and runtime conversions.
// Dependencies: crate::config
// ============================================================================

//! ## Overview
//! [`ManifestTrustConfig`] is the single configuration entry point. It loads a
//! TOML file, validates every section, and converts into cache settings, key
//! records, the verification policy, and an audit sink.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::AdminConfig;
pub use config::AuditConfig;
pub use config::AuditSinkKind;
pub use config::CONFIG_ENV_VAR;
pub use config::CacheConfig;
pub use config::ConfigError;
pub use config::KeyEntryConfig;
pub use config::KeysConfig;
pub use config::ManifestTrustConfig;
