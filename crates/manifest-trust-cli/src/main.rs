// crates/manifest-trust-cli/src/main.rs
// ============================================================================
// Module: Manifest Trust CLI Entry Point
// Description: Command dispatcher for offline manifest and key workflows.
// Purpose: Hash, validate, sign, and verify manifests and manage key files.
// Dependencies: clap, manifest-trust-{core,keys,config}, serde, thiserror.
// ============================================================================

//! ## Overview
//! The `manifest-trust` CLI runs the integrity pipeline offline: computing
//! canonical content hashes, validating manifest content, signing with a
//! local PKCS#8 key, and verifying against a JWKS document or configured
//! keys. Results are written to stdout as canonical JSON; errors go to
//! stderr with a failure exit code.
//!
//! Security posture: input files are untrusted; every read is size-limited
//! and generated private keys are never overwritten.

// ============================================================================
// SECTION: Modules
// ============================================================================

#[cfg(test)]
mod main_tests;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use manifest_trust_config::ManifestTrustConfig;
use manifest_trust_core::HashDigest;
use manifest_trust_core::KeyId;
use manifest_trust_core::ManifestCore;
use manifest_trust_core::ManifestStatus;
use manifest_trust_core::ManifestValidator;
use manifest_trust_core::SignedManifest;
use manifest_trust_core::Timestamp;
use manifest_trust_keys::FingerprintAlgorithm;
use manifest_trust_keys::Jwk;
use manifest_trust_keys::Jwks;
use manifest_trust_keys::KeyRecord;
use manifest_trust_keys::KeyRegistry;
use manifest_trust_keys::KeyType;
use manifest_trust_keys::PrivateKey;
use manifest_trust_keys::PublicKey;
use manifest_trust_keys::SignatureService;
use manifest_trust_keys::VerificationPolicy;
use manifest_trust_keys::VerificationReport;
use manifest_trust_keys::generate_signing_key;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum manifest file size in bytes.
const MAX_MANIFEST_BYTES: usize = 1024 * 1024;
/// Maximum JWKS document size in bytes.
const MAX_JWKS_BYTES: usize = 1024 * 1024;
/// Maximum PEM key file size in bytes.
const MAX_KEY_BYTES: usize = 64 * 1024;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "manifest-trust", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Manifest hashing, validation, signing, and verification.
    Manifest {
        /// Selected manifest subcommand.
        #[command(subcommand)]
        command: ManifestCommand,
    },
    /// Key generation and publication utilities.
    Keys {
        /// Selected keys subcommand.
        #[command(subcommand)]
        command: KeysCommand,
    },
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Manifest subcommands.
#[derive(Subcommand, Debug)]
enum ManifestCommand {
    /// Compute the canonical content hash of a manifest.
    Hash(ManifestHashCommand),
    /// Validate manifest content and report every issue.
    Validate(ManifestValidateCommand),
    /// Sign manifest content with a local private key.
    Sign(ManifestSignCommand),
    /// Verify a signed manifest against trusted keys.
    Verify(ManifestVerifyCommand),
}

/// Keys subcommands.
#[derive(Subcommand, Debug)]
enum KeysCommand {
    /// Generate a signing key pair as PEM files.
    Generate(KeysGenerateCommand),
    /// Print the JWKS for the configured keys.
    Jwks(KeysJwksCommand),
    /// Compute the fingerprint of a public key.
    Fingerprint(KeysFingerprintCommand),
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate configuration and referenced key files.
    Validate(ConfigValidateCommand),
}

/// Arguments for manifest hashing.
#[derive(Args, Debug)]
struct ManifestHashCommand {
    /// Manifest content or signed manifest JSON file.
    #[arg(long, value_name = "PATH")]
    manifest: PathBuf,
}

/// Arguments for manifest validation.
#[derive(Args, Debug)]
struct ManifestValidateCommand {
    /// Manifest content or signed manifest JSON file.
    #[arg(long, value_name = "PATH")]
    manifest: PathBuf,
}

/// Arguments for manifest signing.
#[derive(Args, Debug)]
struct ManifestSignCommand {
    /// Manifest content or signed manifest JSON file.
    #[arg(long, value_name = "PATH")]
    manifest: PathBuf,
    /// Identifier recorded in the signature.
    #[arg(long, value_name = "KEY_ID")]
    key_id: String,
    /// Type of the private key.
    #[arg(long, value_enum)]
    key_type: KeyTypeArg,
    /// PKCS#8 PEM private key file.
    #[arg(long, value_name = "PATH")]
    private_key: PathBuf,
    /// Signer identity recorded in the signature.
    #[arg(long, value_name = "IDENTITY")]
    signed_by: String,
    /// Approve the manifest with the signer as approver.
    #[arg(long, action = ArgAction::SetTrue)]
    approve: bool,
    /// Write the signed manifest to a file instead of stdout.
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
    /// Override the signing time (unix milliseconds).
    #[arg(long, value_name = "UNIX_MS")]
    now_unix_ms: Option<i64>,
}

/// Arguments for manifest verification.
#[derive(Args, Debug)]
struct ManifestVerifyCommand {
    /// Signed manifest JSON file.
    #[arg(long, value_name = "PATH")]
    manifest: PathBuf,
    /// Trusted key source.
    #[command(flatten)]
    trust: TrustSourceArgs,
    /// Override the expired-key grace period in days.
    #[arg(long, value_name = "DAYS")]
    grace_days: Option<u32>,
    /// Override the verification time (unix milliseconds).
    #[arg(long, value_name = "UNIX_MS")]
    now_unix_ms: Option<i64>,
}

/// Trusted key source for verification.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct TrustSourceArgs {
    /// JWKS document listing trusted public keys.
    #[arg(long, value_name = "PATH")]
    jwks: Option<PathBuf>,
    /// Config file whose key entries are trusted.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Arguments for key generation.
#[derive(Args, Debug)]
struct KeysGenerateCommand {
    /// Type of key to generate.
    #[arg(long, value_enum)]
    key_type: KeyTypeArg,
    /// Identifier used for the key and its file names.
    #[arg(long, value_name = "KEY_ID")]
    key_id: String,
    /// Directory receiving `<key_id>.pem` and `<key_id>.pub.pem`.
    #[arg(long, value_name = "DIR")]
    out_dir: PathBuf,
}

/// Arguments for JWKS export.
#[derive(Args, Debug)]
struct KeysJwksCommand {
    /// Optional config file path (defaults to manifest-trust.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Override the validity time (unix milliseconds).
    #[arg(long, value_name = "UNIX_MS")]
    now_unix_ms: Option<i64>,
}

/// Arguments for fingerprinting.
#[derive(Args, Debug)]
struct KeysFingerprintCommand {
    /// SPKI PEM public key file.
    #[arg(long, value_name = "PATH")]
    public_key: PathBuf,
    /// Type of the public key.
    #[arg(long, value_enum)]
    key_type: KeyTypeArg,
    /// Fingerprint algorithm (`sha256`, `sha1`, `md5`).
    #[arg(long, value_name = "ALGORITHM", default_value = "sha256")]
    algorithm: String,
}

/// Arguments for config validation.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Optional config file path (defaults to manifest-trust.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Key type selector.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum KeyTypeArg {
    /// RSA (RS256).
    Rsa,
    /// ECDSA P-256 (ES256).
    Ecdsa,
    /// Ed25519 (`EdDSA`).
    Ed25519,
}

impl From<KeyTypeArg> for KeyType {
    fn from(value: KeyTypeArg) -> Self {
        match value {
            KeyTypeArg::Rsa => Self::Rsa,
            KeyTypeArg::Ecdsa => Self::Ecdsa,
            KeyTypeArg::Ed25519 => Self::Ed25519,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&format!("manifest-trust {version}"))?;
        return Ok(ExitCode::SUCCESS);
    }
    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };
    match command {
        Commands::Manifest {
            command,
        } => command_manifest(command),
        Commands::Keys {
            command,
        } => command_keys(command),
        Commands::Config {
            command,
        } => command_config(command),
    }
}

/// Prints top-level help.
fn show_help() -> CliResult<()> {
    let help = Cli::command().render_help().to_string();
    write_stdout_line(&help)
}

// ============================================================================
// SECTION: Manifest Commands
// ============================================================================

/// Dispatches manifest subcommands.
fn command_manifest(command: ManifestCommand) -> CliResult<ExitCode> {
    match command {
        ManifestCommand::Hash(command) => command_manifest_hash(&command),
        ManifestCommand::Validate(command) => command_manifest_validate(&command),
        ManifestCommand::Sign(command) => command_manifest_sign(&command),
        ManifestCommand::Verify(command) => command_manifest_verify(&command),
    }
}

/// Output of `manifest hash`.
#[derive(Serialize)]
struct HashOutput {
    /// Agent identifier.
    agent_id: String,
    /// Manifest version.
    version: String,
    /// Recomputed content hash.
    content_hash: HashDigest,
    /// Whether a signed manifest's stored hash matches (absent for content).
    #[serde(skip_serializing_if = "Option::is_none")]
    stored_hash_matches: Option<bool>,
}

/// Executes `manifest hash`.
fn command_manifest_hash(command: &ManifestHashCommand) -> CliResult<ExitCode> {
    let input = load_manifest_input(&command.manifest)?;
    let core = input.core();
    let content_hash = core
        .content_hash()
        .map_err(|err| CliError::new(format!("failed to hash manifest: {err}")))?;
    let stored_hash_matches = match &input {
        ManifestInput::Signed(signed) => Some(signed.content_hash == content_hash),
        ManifestInput::Content(_) => None,
    };
    write_json(&HashOutput {
        agent_id: core.agent_id.to_string(),
        version: core.version.to_string(),
        content_hash,
        stored_hash_matches,
    })?;
    Ok(ExitCode::SUCCESS)
}

/// Output of `manifest validate`.
#[derive(Serialize)]
struct ValidateOutput {
    /// True when no issues were found.
    valid: bool,
    /// Every validation issue.
    issues: Vec<String>,
}

/// Executes `manifest validate`.
fn command_manifest_validate(command: &ManifestValidateCommand) -> CliResult<ExitCode> {
    let input = load_manifest_input(&command.manifest)?;
    let issues: Vec<String> =
        ManifestValidator::issues(input.core()).iter().map(ToString::to_string).collect();
    let valid = issues.is_empty();
    write_json(&ValidateOutput {
        valid,
        issues,
    })?;
    Ok(if valid { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Executes `manifest sign`.
fn command_manifest_sign(command: &ManifestSignCommand) -> CliResult<ExitCode> {
    let core = load_manifest_input(&command.manifest)?.into_core();
    let now = resolve_now(command.now_unix_ms);
    let pem = read_text(&command.private_key, MAX_KEY_BYTES, "private key")?;
    let private_key = PrivateKey::from_pkcs8_pem(command.key_type.into(), &pem)
        .map_err(|err| CliError::new(format!("failed to load private key: {err}")))?;
    let key_id = KeyId::new(command.key_id.clone());
    let registry = Arc::new(KeyRegistry::new());
    registry
        .register(KeyRecord::signer(key_id.clone(), private_key, now))
        .map_err(|err| CliError::new(format!("failed to register key: {err}")))?;
    let service = SignatureService::new(registry, VerificationPolicy::default());
    let mut signed = service
        .sign_manifest(core, &key_id, &command.signed_by, now)
        .map_err(|err| CliError::new(format!("failed to sign manifest: {err}")))?;
    if command.approve {
        signed
            .transition(ManifestStatus::Approved, &command.signed_by, now)
            .map_err(|err| CliError::new(format!("failed to approve manifest: {err}")))?;
    }
    match &command.output {
        Some(path) => {
            let mut bytes = canonical_json(&signed)?;
            bytes.push(b'\n');
            fs::write(path, bytes).map_err(|err| {
                CliError::new(format!("failed to write {}: {err}", path.display()))
            })?;
        }
        None => write_json(&signed)?,
    }
    Ok(ExitCode::SUCCESS)
}

/// Output of `manifest verify`.
#[derive(Serialize)]
struct VerifyOutput {
    /// True when the manifest verified.
    valid: bool,
    /// Verification details on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<VerificationReport>,
    /// Stable error label on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<&'static str>,
    /// Error message on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Executes `manifest verify`.
fn command_manifest_verify(command: &ManifestVerifyCommand) -> CliResult<ExitCode> {
    let bytes = read_bytes(&command.manifest, MAX_MANIFEST_BYTES, "manifest")?;
    let signed: SignedManifest = serde_json::from_slice(&bytes)
        .map_err(|err| CliError::new(format!("failed to parse signed manifest: {err}")))?;
    let (records, mut policy) = load_trusted_keys(&command.trust)?;
    if let Some(days) = command.grace_days {
        policy.expired_key_grace_days = days;
    }
    let registry = Arc::new(KeyRegistry::new());
    for record in records {
        registry
            .register(record)
            .map_err(|err| CliError::new(format!("failed to register key: {err}")))?;
    }
    let service = SignatureService::new(registry, policy);
    let output = match service.verify(&signed, resolve_now(command.now_unix_ms)) {
        Ok(report) => VerifyOutput {
            valid: true,
            report: Some(report),
            error_kind: None,
            error: None,
        },
        Err(err) => VerifyOutput {
            valid: false,
            report: None,
            error_kind: Some(err.kind()),
            error: Some(err.to_string()),
        },
    };
    let valid = output.valid;
    write_json(&output)?;
    Ok(if valid { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Loads trusted verification keys and the policy to apply.
fn load_trusted_keys(
    trust: &TrustSourceArgs,
) -> CliResult<(Vec<KeyRecord>, VerificationPolicy)> {
    if let Some(path) = &trust.jwks {
        let bytes = read_bytes(path, MAX_JWKS_BYTES, "jwks")?;
        let jwks: Jwks = serde_json::from_slice(&bytes)
            .map_err(|err| CliError::new(format!("failed to parse jwks: {err}")))?;
        let records = jwks.keys.iter().map(jwk_record).collect::<CliResult<Vec<_>>>()?;
        return Ok((records, VerificationPolicy::default()));
    }
    let config = load_config(trust.config.as_deref())?;
    let records = config
        .key_records()
        .map_err(|err| CliError::new(format!("failed to load keys: {err}")))?;
    Ok((records, config.verification_policy()))
}

/// Converts a published JWK into a verification-only record.
///
/// JWKS documents carry no validity metadata; published keys are treated as
/// active and unexpired.
fn jwk_record(jwk: &Jwk) -> CliResult<KeyRecord> {
    let public_key = PublicKey::from_jwk(jwk)
        .map_err(|err| CliError::new(format!("invalid jwk {}: {err}", jwk.kid)))?;
    Ok(KeyRecord::verifier(jwk.kid.clone(), public_key, Timestamp::from_unix_millis(0)))
}

// ============================================================================
// SECTION: Keys Commands
// ============================================================================

/// Dispatches keys subcommands.
fn command_keys(command: KeysCommand) -> CliResult<ExitCode> {
    match command {
        KeysCommand::Generate(command) => command_keys_generate(&command),
        KeysCommand::Jwks(command) => command_keys_jwks(&command),
        KeysCommand::Fingerprint(command) => command_keys_fingerprint(&command),
    }
}

/// Output of `keys generate`.
#[derive(Serialize)]
struct GenerateOutput {
    /// Key identifier.
    key_id: String,
    /// Key type label.
    key_type: &'static str,
    /// JOSE algorithm label.
    algorithm: &'static str,
    /// Private key PEM path.
    private_key_path: String,
    /// Public key PEM path.
    public_key_path: String,
    /// SHA-256 fingerprint of the public key.
    fingerprint: String,
}

/// Executes `keys generate`.
fn command_keys_generate(command: &KeysGenerateCommand) -> CliResult<ExitCode> {
    let key_id = KeyId::new(command.key_id.clone());
    if !is_safe_file_stem(key_id.as_str()) {
        return Err(CliError::new(format!("key id {key_id} is not a safe file name")));
    }
    let generated = generate_signing_key(command.key_type.into(), key_id.clone(), Timestamp::now())
        .map_err(|err| CliError::new(format!("failed to generate key: {err}")))?;
    let record = &generated.record;
    let public_pem = record
        .public_key
        .to_pem()
        .map_err(|err| CliError::new(format!("failed to encode public key: {err}")))?;
    let fingerprint = record
        .public_key
        .fingerprint(FingerprintAlgorithm::Sha256)
        .map_err(|err| CliError::new(format!("failed to fingerprint key: {err}")))?;

    fs::create_dir_all(&command.out_dir).map_err(|err| {
        CliError::new(format!("failed to create {}: {err}", command.out_dir.display()))
    })?;
    let private_path = command.out_dir.join(format!("{key_id}.pem"));
    let public_path = command.out_dir.join(format!("{key_id}.pub.pem"));
    write_new_file(&private_path, generated.private_key_pem.as_bytes(), true)?;
    write_new_file(&public_path, public_pem.as_bytes(), false)?;

    write_json(&GenerateOutput {
        key_id: key_id.to_string(),
        key_type: record.key_type().as_str(),
        algorithm: record.algorithm().as_str(),
        private_key_path: private_path.display().to_string(),
        public_key_path: public_path.display().to_string(),
        fingerprint,
    })?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `keys jwks`.
fn command_keys_jwks(command: &KeysJwksCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let registry = Arc::new(KeyRegistry::new());
    for record in config
        .key_records()
        .map_err(|err| CliError::new(format!("failed to load keys: {err}")))?
    {
        registry
            .register(record)
            .map_err(|err| CliError::new(format!("failed to register key: {err}")))?;
    }
    let service = SignatureService::new(registry, config.verification_policy());
    let jwks = service
        .jwks(resolve_now(command.now_unix_ms))
        .map_err(|err| CliError::new(format!("failed to build jwks: {err}")))?;
    write_json(&jwks)?;
    Ok(ExitCode::SUCCESS)
}

/// Output of `keys fingerprint`.
#[derive(Serialize)]
struct FingerprintOutput {
    /// Fingerprint algorithm label.
    algorithm: &'static str,
    /// Colon-free lowercase hex fingerprint.
    fingerprint: String,
}

/// Executes `keys fingerprint`.
fn command_keys_fingerprint(command: &KeysFingerprintCommand) -> CliResult<ExitCode> {
    let algorithm = FingerprintAlgorithm::from_label(&command.algorithm)
        .map_err(|err| CliError::new(err.to_string()))?;
    let pem = read_text(&command.public_key, MAX_KEY_BYTES, "public key")?;
    let public_key = PublicKey::from_pem(command.key_type.into(), &pem)
        .map_err(|err| CliError::new(format!("failed to load public key: {err}")))?;
    let fingerprint = public_key
        .fingerprint(algorithm)
        .map_err(|err| CliError::new(format!("failed to fingerprint key: {err}")))?;
    write_json(&FingerprintOutput {
        algorithm: algorithm.as_str(),
        fingerprint,
    })?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate(command) => command_config_validate(&command),
    }
}

/// Output of `config validate`.
#[derive(Serialize)]
struct ConfigValidateOutput {
    /// Always `ok` when emitted.
    status: &'static str,
    /// Number of key entries loaded.
    keys: usize,
}

/// Executes `config validate`, loading referenced key files as well.
fn command_config_validate(command: &ConfigValidateCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let keys = config
        .key_records()
        .map_err(|err| CliError::new(format!("failed to load keys: {err}")))?
        .len();
    write_json(&ConfigValidateOutput {
        status: "ok",
        keys,
    })?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Inputs
// ============================================================================

/// Manifest file contents: bare content or a signed envelope.
#[derive(Debug)]
enum ManifestInput {
    /// Bare manifest content.
    Content(Box<ManifestCore>),
    /// Signed manifest envelope.
    Signed(Box<SignedManifest>),
}

impl ManifestInput {
    /// Returns the manifest content.
    fn core(&self) -> &ManifestCore {
        match self {
            Self::Content(core) => core,
            Self::Signed(signed) => &signed.manifest,
        }
    }

    /// Consumes the input, returning the manifest content.
    fn into_core(self) -> ManifestCore {
        match self {
            Self::Content(core) => *core,
            Self::Signed(signed) => signed.manifest,
        }
    }
}

/// Parses manifest JSON as a signed envelope first, then as bare content.
fn parse_manifest_input(bytes: &[u8]) -> CliResult<ManifestInput> {
    if let Ok(signed) = serde_json::from_slice::<SignedManifest>(bytes) {
        return Ok(ManifestInput::Signed(Box::new(signed)));
    }
    serde_json::from_slice::<ManifestCore>(bytes)
        .map(|core| ManifestInput::Content(Box::new(core)))
        .map_err(|err| CliError::new(format!("failed to parse manifest: {err}")))
}

/// Reads and parses a manifest file.
fn load_manifest_input(path: &Path) -> CliResult<ManifestInput> {
    let bytes = read_bytes(path, MAX_MANIFEST_BYTES, "manifest")?;
    parse_manifest_input(&bytes)
}

/// Loads configuration, failing closed.
fn load_config(path: Option<&Path>) -> CliResult<ManifestTrustConfig> {
    ManifestTrustConfig::load(path)
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))
}

/// Resolves the effective current time.
fn resolve_now(override_ms: Option<i64>) -> Timestamp {
    override_ms.map_or_else(Timestamp::now, Timestamp::from_unix_millis)
}

/// Returns true when `stem` is usable as a file name without path traversal.
fn is_safe_file_stem(stem: &str) -> bool {
    !stem.is_empty()
        && !stem.starts_with('.')
        && stem.chars().all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'))
}

/// Errors returned by bounded file reads.
#[derive(Debug)]
enum ReadLimitError {
    /// File I/O failure.
    Io(std::io::Error),
    /// File size exceeds the configured limit.
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

/// Reads a file from disk while enforcing a hard size limit.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let size = file.metadata().map_err(ReadLimitError::Io)?.len();
    let limit = u64::try_from(max_bytes).map_err(|_| ReadLimitError::TooLarge {
        size,
        limit: max_bytes,
    })?;
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }
    let mut bytes = Vec::new();
    file.take(limit.saturating_add(1)).read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        return Err(ReadLimitError::TooLarge {
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

/// Reads a bounded file, mapping failures to CLI errors.
fn read_bytes(path: &Path, max_bytes: usize, label: &str) -> CliResult<Vec<u8>> {
    read_bytes_with_limit(path, max_bytes).map_err(|err| match err {
        ReadLimitError::Io(err) => {
            CliError::new(format!("failed to read {label} {}: {err}", path.display()))
        }
        ReadLimitError::TooLarge {
            size,
            limit,
        } => CliError::new(format!(
            "{label} {} exceeds size limit ({size} > {limit} bytes)",
            path.display()
        )),
    })
}

/// Reads a bounded UTF-8 file.
fn read_text(path: &Path, max_bytes: usize, label: &str) -> CliResult<String> {
    let bytes = read_bytes(path, max_bytes, label)?;
    String::from_utf8(bytes)
        .map_err(|_| CliError::new(format!("{label} {} must be utf-8", path.display())))
}

// ============================================================================
// SECTION: Output
// ============================================================================

/// Writes a new file, refusing to overwrite existing files.
fn write_new_file(path: &Path, contents: &[u8], private: bool) -> CliResult<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    restrict_permissions(&mut options, private);
    let mut file = options
        .open(path)
        .map_err(|err| CliError::new(format!("failed to create {}: {err}", path.display())))?;
    file.write_all(contents)
        .map_err(|err| CliError::new(format!("failed to write {}: {err}", path.display())))
}

/// Restricts private key files to the owner.
#[cfg(unix)]
fn restrict_permissions(options: &mut OpenOptions, private: bool) {
    use std::os::unix::fs::OpenOptionsExt;
    if private {
        options.mode(0o600);
    }
}

/// Restricts private key files to the owner.
#[cfg(not(unix))]
const fn restrict_permissions(_options: &mut OpenOptions, _private: bool) {}

/// Serializes a value as RFC 8785 canonical JSON.
fn canonical_json<T: Serialize>(value: &T) -> CliResult<Vec<u8>> {
    serde_jcs::to_vec(value).map_err(|err| CliError::new(format!("failed to encode json: {err}")))
}

/// Writes canonical JSON to stdout with a trailing newline.
fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let mut bytes = canonical_json(value)?;
    bytes.push(b'\n');
    let mut stdout = std::io::stdout();
    stdout.write_all(&bytes).map_err(|err| output_error("stdout", &err))
}

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}").map_err(|err| output_error("stdout", &err))
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Builds an output failure error.
fn output_error(stream: &str, error: &std::io::Error) -> CliError {
    CliError::new(format!("failed to write to {stream}: {error}"))
}

/// Emits an error message and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
