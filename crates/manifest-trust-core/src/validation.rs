// crates/manifest-trust-core/src/validation.rs
// ============================================================================
// Module: Manifest Validator
// Description: Structural and semantic checks applied before signing.
// Purpose: Reject manifests that violate identifier, version, or capability rules.
// Dependencies: semver, thiserror, crate::manifest
// ============================================================================

//! ## Overview
//! A manifest is eligible for signing only when it passes every check here:
//! well-formed agent identifier, semantic version, required descriptive
//! fields, a non-empty capability list with unique well-formed names, and
//! object-typed capability schemas. [`ManifestValidator::issues`] collects every
//! violation; [`ManifestValidator::validate`] fails on the first one.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde_json::Value;
use thiserror::Error;

use crate::manifest::Capability;
use crate::manifest::ManifestCore;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum number of capabilities a manifest may declare.
pub const MAX_CAPABILITIES: usize = 256;
/// Maximum length of a capability name.
pub const MAX_CAPABILITY_NAME_LENGTH: usize = 128;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Manifest validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestValidationError {
    /// Agent identifier does not match `sa-[a-z0-9-]+`.
    #[error("invalid agent identifier: {0}")]
    InvalidAgentId(String),
    /// Version is not a semantic version.
    #[error("invalid semantic version {0}: {1}")]
    InvalidVersion(String, String),
    /// A required text field is empty.
    #[error("required field is empty: {0}")]
    MissingField(&'static str),
    /// Manifest declares no capabilities.
    #[error("manifest must declare at least one capability")]
    NoCapabilities,
    /// Manifest declares too many capabilities.
    #[error("manifest declares too many capabilities: {0}")]
    TooManyCapabilities(usize),
    /// Capability name is malformed.
    #[error("invalid capability name: '{0}'")]
    InvalidCapabilityName(String),
    /// Capability name appears more than once.
    #[error("duplicate capability name: {0}")]
    DuplicateCapability(String),
    /// Capability schema is not a JSON object.
    #[error("capability {capability} {schema} schema must be a json object")]
    InvalidSchema {
        /// Capability name.
        capability: String,
        /// Schema role (`input` or `output`).
        schema: &'static str,
    },
    /// Capability lists an empty credential name.
    #[error("capability {0} lists an empty credential name")]
    EmptyCredential(String),
    /// Code checksum value is empty.
    #[error("code checksum is empty")]
    MissingChecksum,
}

// ============================================================================
// SECTION: Validator
// ============================================================================

/// Manifest validator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestValidator;

impl ManifestValidator {
    /// Validates a manifest, failing on the first violation.
    ///
    /// # Errors
    ///
    /// Returns the first [`ManifestValidationError`] found.
    pub fn validate(core: &ManifestCore) -> Result<(), ManifestValidationError> {
        match Self::issues(core).into_iter().next() {
            Some(issue) => Err(issue),
            None => Ok(()),
        }
    }

    /// Returns every validation violation in field order.
    #[must_use]
    pub fn issues(core: &ManifestCore) -> Vec<ManifestValidationError> {
        let mut issues = Vec::new();
        if !core.agent_id.is_well_formed() {
            issues.push(ManifestValidationError::InvalidAgentId(core.agent_id.to_string()));
        }
        if let Err(err) = core.version.parse_semver() {
            issues.push(ManifestValidationError::InvalidVersion(
                core.version.to_string(),
                err.to_string(),
            ));
        }
        for (field, value) in [
            ("name", core.name.as_str()),
            ("description", core.description.as_str()),
            ("metadata.author", core.metadata.author.as_str()),
        ] {
            if value.trim().is_empty() {
                issues.push(ManifestValidationError::MissingField(field));
            }
        }
        if core.code_checksum.value.is_empty() {
            issues.push(ManifestValidationError::MissingChecksum);
        }
        check_capabilities(&core.capabilities, &mut issues);
        issues
    }
}

/// Appends capability-level violations.
fn check_capabilities(capabilities: &[Capability], issues: &mut Vec<ManifestValidationError>) {
    if capabilities.is_empty() {
        issues.push(ManifestValidationError::NoCapabilities);
        return;
    }
    if capabilities.len() > MAX_CAPABILITIES {
        issues.push(ManifestValidationError::TooManyCapabilities(capabilities.len()));
    }
    let mut seen = BTreeSet::new();
    for capability in capabilities {
        if !is_capability_name(&capability.name) {
            issues.push(ManifestValidationError::InvalidCapabilityName(capability.name.clone()));
        }
        if !seen.insert(capability.name.as_str()) {
            issues.push(ManifestValidationError::DuplicateCapability(capability.name.clone()));
        }
        for (schema, value) in
            [("input", &capability.input_schema), ("output", &capability.output_schema)]
        {
            if !matches!(value, Value::Object(_)) {
                issues.push(ManifestValidationError::InvalidSchema {
                    capability: capability.name.clone(),
                    schema,
                });
            }
        }
        if capability.required_credentials.iter().any(|name| name.trim().is_empty()) {
            issues.push(ManifestValidationError::EmptyCredential(capability.name.clone()));
        }
    }
}

/// Returns true when the name matches `[a-z][a-z0-9_]*`.
fn is_capability_name(name: &str) -> bool {
    let mut bytes = name.bytes();
    let Some(first) = bytes.next() else {
        return false;
    };
    name.len() <= MAX_CAPABILITY_NAME_LENGTH
        && first.is_ascii_lowercase()
        && bytes.all(|byte| byte.is_ascii_lowercase() || byte.is_ascii_digit() || byte == b'_')
}
