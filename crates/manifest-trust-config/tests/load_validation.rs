// crates/manifest-trust-config/tests/load_validation.rs
// ============================================================================
// Module: Config Load and Validation Tests
// Description: File loading limits, section validation, and key conversion.
// Purpose: Ensure configuration fails closed and converts to runtime types.
// ============================================================================

//! Config load and validation tests for manifest-trust-config.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::fs;
use std::time::Duration;

use manifest_trust_config::AuditSinkKind;
use manifest_trust_config::ConfigError;
use manifest_trust_config::ManifestTrustConfig;
use manifest_trust_core::KeyId;
use manifest_trust_core::Timestamp;
use manifest_trust_keys::KeyType;
use manifest_trust_keys::KeyUsage;
use manifest_trust_keys::generate_signing_key;
use tempfile::TempDir;

type TestResult = Result<(), String>;

fn assert_invalid(result: Result<ManifestTrustConfig, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config".to_string()),
    }
}

/// Writes an Ed25519 key pair and returns (private path, public path) names.
fn write_key_pair(dir: &TempDir, key_id: &str) -> Result<(String, String), String> {
    let generated = generate_signing_key(KeyType::Ed25519, key_id, Timestamp::from_unix_millis(0))
        .map_err(|err| err.to_string())?;
    let public_pem = generated.record.public_key.to_pem().map_err(|err| err.to_string())?;
    let private_name = format!("{key_id}.pem");
    let public_name = format!("{key_id}.pub.pem");
    fs::write(dir.path().join(&private_name), generated.private_key_pem)
        .map_err(|err| err.to_string())?;
    fs::write(dir.path().join(&public_name), public_pem).map_err(|err| err.to_string())?;
    Ok((private_name, public_name))
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

#[test]
fn empty_config_uses_defaults() -> TestResult {
    let config = ManifestTrustConfig::from_toml("").map_err(|err| err.to_string())?;
    let settings = config.cache_settings();
    if settings.ttl != Duration::from_secs(300) || settings.max_entries != 1000 {
        return Err(format!("unexpected defaults: {settings:?}"));
    }
    if config.verification_policy().expired_key_grace_days != 90 {
        return Err("grace period should default to 90 days".to_string());
    }
    if config.admin.roles != vec!["admin".to_string()] {
        return Err("admin roles should default to [admin]".to_string());
    }
    if config.audit.sink != AuditSinkKind::Stderr {
        return Err("audit sink should default to stderr".to_string());
    }
    Ok(())
}

#[test]
fn cache_section_overrides_settings() -> TestResult {
    let config = ManifestTrustConfig::from_toml(
        "[cache]\nttl_seconds = 60\nmax_entries = 50\nwarming_threshold = 3\nfetch_timeout_ms = \
         750\n",
    )
    .map_err(|err| err.to_string())?;
    let settings = config.cache_settings();
    if settings.ttl != Duration::from_secs(60)
        || settings.max_entries != 50
        || settings.warming_threshold != 3
        || settings.fetch_timeout != Duration::from_millis(750)
    {
        return Err(format!("overrides not applied: {settings:?}"));
    }
    Ok(())
}

// ============================================================================
// SECTION: Validation
// ============================================================================

#[test]
fn cache_bounds_are_enforced() -> TestResult {
    assert_invalid(
        ManifestTrustConfig::from_toml("[cache]\nttl_seconds = 0\n"),
        "cache.ttl_seconds",
    )?;
    assert_invalid(
        ManifestTrustConfig::from_toml("[cache]\nmax_entries = 0\n"),
        "cache.max_entries",
    )?;
    assert_invalid(
        ManifestTrustConfig::from_toml("[cache]\nmax_fetch_retries = 11\n"),
        "cache.max_fetch_retries",
    )?;
    assert_invalid(
        ManifestTrustConfig::from_toml("[cache]\ndegraded_hit_rate = 1.5\n"),
        "cache.degraded_hit_rate",
    )?;
    Ok(())
}

#[test]
fn parse_errors_are_reported() -> TestResult {
    match ManifestTrustConfig::from_toml("[cache\n") {
        Err(ConfigError::Parse(_)) => Ok(()),
        other => Err(format!("expected parse error, got {other:?}")),
    }
}

#[test]
fn key_algorithm_must_match_key_type() -> TestResult {
    assert_invalid(
        ManifestTrustConfig::from_toml(
            "[[keys.entries]]\nkey_id = \"k1\"\nkey_type = \"ed25519\"\nalgorithm = \
             \"RS256\"\npublic_key_path = \"k1.pub.pem\"\n",
        ),
        "does not match key_type",
    )
}

#[test]
fn duplicate_key_ids_are_rejected() -> TestResult {
    let entry =
        "[[keys.entries]]\nkey_id = \"k1\"\nkey_type = \"rsa\"\npublic_key_path = \"a.pem\"\n";
    assert_invalid(
        ManifestTrustConfig::from_toml(&format!("{entry}{entry}")),
        "duplicate key_id",
    )
}

#[test]
fn sign_usage_requires_private_key() -> TestResult {
    assert_invalid(
        ManifestTrustConfig::from_toml(
            "[[keys.entries]]\nkey_id = \"k1\"\nkey_type = \"ecdsa\"\npublic_key_path = \
             \"k1.pub.pem\"\nusages = [\"sign\"]\n",
        ),
        "sign usage requires private_key_path",
    )
}

#[test]
fn key_expiry_must_follow_creation() -> TestResult {
    assert_invalid(
        ManifestTrustConfig::from_toml(
            "[[keys.entries]]\nkey_id = \"k1\"\nkey_type = \"rsa\"\npublic_key_path = \
             \"a.pem\"\ncreated_at = \"2025-01-01T00:00:00Z\"\nexpires_at = \
             \"2024-01-01T00:00:00Z\"\n",
        ),
        "expires_at must follow created_at",
    )
}

#[test]
fn file_audit_sink_requires_path() -> TestResult {
    assert_invalid(ManifestTrustConfig::from_toml("[audit]\nsink = \"file\"\n"), "audit.path")?;
    assert_invalid(
        ManifestTrustConfig::from_toml("[audit]\nsink = \"none\"\npath = \"audit.log\"\n"),
        "audit.path is only valid",
    )
}

#[test]
fn admin_roles_must_be_non_empty() -> TestResult {
    assert_invalid(ManifestTrustConfig::from_toml("[admin]\nroles = []\n"), "admin.roles")
}

// ============================================================================
// SECTION: Loading
// ============================================================================

#[test]
fn load_reads_keys_relative_to_config_dir() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let (private_name, public_name) = write_key_pair(&dir, "signer-1")?;
    let (_, verify_only) = write_key_pair(&dir, "verifier-1")?;
    let config_path = dir.path().join("manifest-trust.toml");
    let toml = format!(
        "[keys]\nexpired_key_grace_days = 30\n\n[[keys.entries]]\nkey_id = \
         \"signer-1\"\nkey_type = \"ed25519\"\nalgorithm = \"EdDSA\"\nprivate_key_path = \
         \"{private_name}\"\npublic_key_path = \"{public_name}\"\ncreated_at = \
         \"2024-01-01T00:00:00Z\"\nexpires_at = \"2030-01-01T00:00:00Z\"\n\n\
         [[keys.entries]]\nkey_id = \"verifier-1\"\nkey_type = \"ed25519\"\n\
         public_key_path = \"{verify_only}\"\nactive = false\n\n\
         [audit]\nsink = \"file\"\npath = \"audit.log\"\n"
    );
    fs::write(&config_path, toml).map_err(|err| err.to_string())?;

    let config = ManifestTrustConfig::load(Some(&config_path)).map_err(|err| err.to_string())?;
    if config.verification_policy().expired_key_grace_days != 30 {
        return Err("grace period not applied".to_string());
    }
    let records = config.key_records().map_err(|err| err.to_string())?;
    let [signer, verifier] = records.as_slice() else {
        return Err(format!("expected two records, got {}", records.len()));
    };
    if signer.key_id != KeyId::new("signer-1") || signer.private_key().is_none() {
        return Err("signer record should carry private key".to_string());
    }
    if !signer.usages.contains(&KeyUsage::Sign) || signer.expires_at.is_none() {
        return Err("signer record should permit signing and carry expiry".to_string());
    }
    if verifier.active || verifier.private_key().is_some() {
        return Err("verifier record should be inactive and public-only".to_string());
    }

    config.audit_sink().map_err(|err| err.to_string())?;
    if !dir.path().join("audit.log").exists() {
        return Err("file audit sink should create its log".to_string());
    }
    Ok(())
}

#[test]
fn mismatched_key_pair_is_rejected() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let (private_name, _) = write_key_pair(&dir, "a")?;
    let (_, other_public) = write_key_pair(&dir, "b")?;
    let config_path = dir.path().join("manifest-trust.toml");
    let toml = format!(
        "[[keys.entries]]\nkey_id = \"a\"\nkey_type = \"ed25519\"\nprivate_key_path = \
         \"{private_name}\"\npublic_key_path = \"{other_public}\"\n"
    );
    fs::write(&config_path, toml).map_err(|err| err.to_string())?;
    let config = ManifestTrustConfig::load(Some(&config_path)).map_err(|err| err.to_string())?;
    match config.key_records() {
        Err(ConfigError::Invalid(message)) if message.contains("keys.entries[a]") => Ok(()),
        other => Err(format!("expected key pair mismatch, got {:?}", other.map(|r| r.len()))),
    }
}

#[test]
fn load_rejects_oversized_and_non_utf8_files() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let big = dir.path().join("big.toml");
    fs::write(&big, vec![b'#'; 1024 * 1024 + 1]).map_err(|err| err.to_string())?;
    assert_invalid(ManifestTrustConfig::load(Some(&big)), "exceeds size limit")?;

    let binary = dir.path().join("binary.toml");
    fs::write(&binary, [0xff_u8, 0xfe, 0x00]).map_err(|err| err.to_string())?;
    assert_invalid(ManifestTrustConfig::load(Some(&binary)), "must be utf-8")
}

#[test]
fn missing_file_is_io_error() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    match ManifestTrustConfig::load(Some(&dir.path().join("absent.toml"))) {
        Err(ConfigError::Io(_)) => Ok(()),
        other => Err(format!("expected io error, got {:?}", other.map(|_| ()))),
    }
}
