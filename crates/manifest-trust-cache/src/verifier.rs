// crates/manifest-trust-cache/src/verifier.rs
// ============================================================================
// Module: Manifest Verifier Seam
// Description: Verification interface consumed by the manifest cache.
// Purpose: Decouple the cache from the concrete signature service.
// Dependencies: manifest-trust-keys
// ============================================================================

//! ## Overview
//! The cache verifies every manifest it fetches before storing it. The
//! [`ManifestVerifier`] trait lets hosts and tests substitute the verifier
//! while production wiring uses [`SignatureService`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use manifest_trust_core::SignedManifest;
use manifest_trust_core::Timestamp;
use manifest_trust_keys::SignatureService;
use manifest_trust_keys::VerificationError;
use manifest_trust_keys::VerificationReport;

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Verifies signed manifests on behalf of the cache.
pub trait ManifestVerifier: Send + Sync {
    /// Verifies a signed manifest at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`VerificationError`] when the manifest must not be trusted.
    fn verify(
        &self,
        manifest: &SignedManifest,
        now: Timestamp,
    ) -> Result<VerificationReport, VerificationError>;
}

impl ManifestVerifier for SignatureService {
    fn verify(
        &self,
        manifest: &SignedManifest,
        now: Timestamp,
    ) -> Result<VerificationReport, VerificationError> {
        Self::verify(self, manifest, now)
    }
}
