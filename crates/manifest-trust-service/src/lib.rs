// crates/manifest-trust-service/src/lib.rs
// ============================================================================
// Module: Manifest Trust Service Library
// Description: Transport-agnostic facade for manifest trust operations.
// Purpose: Expose key distribution, verification, and cache administration.
// Dependencies: crate::{auth, error, service}
// ============================================================================

//! ## Overview
//! Transport bindings (HTTP, RPC) authenticate callers, build a
//! [`Principal`], and delegate to [`ManifestTrustService`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod auth;
pub mod error;
pub mod service;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use auth::AdminPolicy;
pub use auth::Principal;
pub use auth::WebhookSecret;
pub use auth::constant_time_eq_str;
pub use error::ServiceError;
pub use service::ManifestTrustService;
pub use service::ServiceHealth;
