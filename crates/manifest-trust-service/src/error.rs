// crates/manifest-trust-service/src/error.rs
// ============================================================================
// Module: Service Errors
// Description: Error taxonomy surfaced by the service facade.
// Purpose: Give transport bindings one typed error with stable kind labels.
// Dependencies: thiserror, manifest-trust-{keys,cache,config}
// ============================================================================

//! ## Overview
//! [`ServiceError`] folds component errors into one type. [`ServiceError::kind`]
//! yields stable labels that transport bindings map to status codes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use manifest_trust_cache::CacheError;
use manifest_trust_config::ConfigError;
use manifest_trust_keys::KeyError;
use manifest_trust_keys::SignError;
use manifest_trust_keys::VerificationError;
use thiserror::Error;

/// Errors returned by [`crate::ManifestTrustService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Caller lacks the required privilege or presented a bad webhook secret.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Unsupported key type, key format, or algorithm label.
    #[error("invalid format: {0}")]
    InvalidFormat(String),
    /// Key registry failure.
    #[error(transparent)]
    Key(KeyError),
    /// Signing failure.
    #[error(transparent)]
    Sign(#[from] SignError),
    /// Verification failure.
    #[error(transparent)]
    Verification(#[from] VerificationError),
    /// Cache failure.
    #[error(transparent)]
    Cache(#[from] CacheError),
    /// Configuration failure during init.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Manifest lifecycle transition failure.
    #[error("manifest transition failed: {0}")]
    Transition(String),
}

impl ServiceError {
    /// Returns a stable label for the error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "unauthorized",
            Self::InvalidFormat(_) => "invalid_format",
            Self::Key(KeyError::KeyNotFound(_)) => "not_found",
            Self::Key(err) => err.kind(),
            Self::Sign(_) => "sign_failed",
            Self::Verification(err) => err.kind(),
            Self::Cache(err) => err.kind(),
            Self::Config(_) => "config",
            Self::Transition(_) => "transition",
        }
    }
}

impl From<KeyError> for ServiceError {
    fn from(err: KeyError) -> Self {
        match err {
            KeyError::Unsupported(message) => Self::InvalidFormat(message),
            other => Self::Key(other),
        }
    }
}
