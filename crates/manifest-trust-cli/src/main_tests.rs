// crates/manifest-trust-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Helpers Tests
// Description: Unit tests for bounded reads, input parsing, and file naming.
// Purpose: Ensure CLI helpers fail closed on untrusted inputs.
// Dependencies: manifest-trust-cli main helpers
// ============================================================================

//! ## Overview
//! Validates `read_bytes_with_limit`, manifest input detection, and key file
//! naming rules.
//!
//! Security posture: CLI inputs are untrusted; size limits must fail closed.

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

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;

use clap::Parser;
use tempfile::TempDir;

use super::Cli;
use super::Commands;
use super::KeyTypeArg;
use super::ManifestCommand;
use super::ManifestInput;
use super::ReadLimitError;
use super::is_safe_file_stem;
use super::parse_manifest_input;
use super::read_bytes_with_limit;
use super::resolve_now;

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn read_bytes_with_limit_rejects_oversized_files() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("big.json");
    fs::write(&path, vec![b'a'; 33]).expect("write");
    match read_bytes_with_limit(&path, 32) {
        Err(ReadLimitError::TooLarge {
            size,
            limit,
        }) => {
            assert_eq!(size, 33);
            assert_eq!(limit, 32);
        }
        other => panic!("expected size error, got {other:?}"),
    }
    assert_eq!(read_bytes_with_limit(&path, 33).expect("read").len(), 33);
}

#[test]
fn read_bytes_with_limit_reports_missing_files() {
    let dir = TempDir::new().expect("temp dir");
    let result = read_bytes_with_limit(&dir.path().join("absent.json"), 32);
    assert!(matches!(result, Err(ReadLimitError::Io(_))));
}

#[test]
fn manifest_input_rejects_unrelated_json() {
    let err = parse_manifest_input(br#"{"hello": "world"}"#).unwrap_err();
    assert!(err.to_string().contains("failed to parse manifest"));
    assert!(parse_manifest_input(b"not json").is_err());
}

#[test]
fn manifest_input_detects_bare_content() {
    let content = serde_json::json!({
        "agent_id": "sa-slack",
        "name": "Slack",
        "description": "Posts messages",
        "version": "1.0.0",
        "capabilities": [],
        "metadata": {"author": "platform", "license": "MIT"},
        "created_at": 0,
        "updated_at": 0,
        "code_checksum": {"algorithm": "sha256", "value": "00"}
    });
    let bytes = serde_json::to_vec(&content).expect("encode");
    match parse_manifest_input(&bytes) {
        Ok(ManifestInput::Content(core)) => assert_eq!(core.agent_id.as_str(), "sa-slack"),
        other => panic!("expected bare content, got {other:?}"),
    }
}

#[test]
fn key_file_stems_reject_traversal() {
    assert!(is_safe_file_stem("authority-2026.q1"));
    assert!(is_safe_file_stem("signer_1"));
    assert!(!is_safe_file_stem(""));
    assert!(!is_safe_file_stem("../escape"));
    assert!(!is_safe_file_stem(".hidden"));
    assert!(!is_safe_file_stem("a/b"));
}

#[test]
fn now_override_is_applied() {
    assert_eq!(resolve_now(Some(42)).as_unix_millis(), 42);
}

#[test]
fn verify_requires_exactly_one_trust_source() {
    let missing = Cli::try_parse_from(["manifest-trust", "manifest", "verify", "--manifest", "m"]);
    assert!(missing.is_err());
    let both = Cli::try_parse_from([
        "manifest-trust",
        "manifest",
        "verify",
        "--manifest",
        "m",
        "--jwks",
        "j",
        "--config",
        "c",
    ]);
    assert!(both.is_err());
    let cli = Cli::try_parse_from([
        "manifest-trust",
        "manifest",
        "sign",
        "--manifest",
        "m",
        "--key-id",
        "k",
        "--key-type",
        "ed25519",
        "--private-key",
        "k.pem",
        "--signed-by",
        "ops",
    ])
    .expect("parse sign");
    match cli.command {
        Some(Commands::Manifest {
            command: ManifestCommand::Sign(command),
        }) => {
            assert_eq!(command.key_type, KeyTypeArg::Ed25519);
            assert!(!command.approve);
        }
        other => panic!("unexpected command {other:?}"),
    }
}
