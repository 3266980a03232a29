// crates/manifest-trust-config/src/config.rs
// ============================================================================
// Module: Manifest Trust Configuration
// Description: Configuration loading and validation for Manifest Trust.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: manifest-trust-{core,keys,cache}, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing or invalid configuration fails closed. Key material is referenced by
//! path and read at conversion time; relative paths resolve against the
//! directory containing the config file.
//! Security posture: config inputs and referenced key files are untrusted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use manifest_trust_cache::CacheSettings;
use manifest_trust_core::AuditSink;
use manifest_trust_core::FileAuditSink;
use manifest_trust_core::KeyId;
use manifest_trust_core::NoopAuditSink;
use manifest_trust_core::SignatureAlgorithm;
use manifest_trust_core::StderrAuditSink;
use manifest_trust_core::Timestamp;
use manifest_trust_keys::KeyRecord;
use manifest_trust_keys::KeyType;
use manifest_trust_keys::KeyUsage;
use manifest_trust_keys::PrivateKey;
use manifest_trust_keys::PublicKey;
use manifest_trust_keys::VerificationPolicy;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "manifest-trust.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "MANIFEST_TRUST_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum key file size in bytes.
pub(crate) const MAX_KEY_FILE_SIZE: usize = 64 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum number of configured keys.
pub(crate) const MAX_KEY_ENTRIES: usize = 256;
/// Maximum number of admin roles.
pub(crate) const MAX_ADMIN_ROLES: usize = 64;
/// Maximum cache TTL in seconds (seven days).
pub(crate) const MAX_TTL_SECONDS: u64 = 7 * 24 * 60 * 60;
/// Maximum cache entry bound.
pub(crate) const MAX_CACHE_ENTRIES: usize = 1_000_000;
/// Maximum shard count.
pub(crate) const MAX_SHARDS: usize = 1024;
/// Minimum timeout in milliseconds.
pub(crate) const MIN_TIMEOUT_MS: u64 = 10;
/// Maximum timeout in milliseconds.
pub(crate) const MAX_TIMEOUT_MS: u64 = 60_000;
/// Maximum upstream fetch retries.
pub(crate) const MAX_FETCH_RETRIES: u32 = 10;
/// Maximum background interval in seconds (one day).
pub(crate) const MAX_INTERVAL_SECONDS: u64 = 24 * 60 * 60;
/// Maximum expired-key grace period in days.
pub(crate) const MAX_GRACE_DAYS: u32 = 3650;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Manifest Trust configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifestTrustConfig {
    /// Manifest cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Key registry configuration.
    #[serde(default)]
    pub keys: KeysConfig,
    /// Administrative access configuration.
    #[serde(default)]
    pub admin: AdminConfig,
    /// Audit sink configuration.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Directory used to resolve relative key and audit paths.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl ManifestTrustConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// Resolution order: explicit path, then `MANIFEST_TRUST_CONFIG`, then
    /// `manifest-trust.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let content = read_limited(&resolved, MAX_CONFIG_FILE_SIZE, "config file")?;
        let mut config = Self::from_toml(&content)?;
        config.base_dir = resolved.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if content.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cache.validate()?;
        self.keys.validate()?;
        self.admin.validate()?;
        self.audit.validate()?;
        Ok(())
    }

    /// Returns cache runtime settings.
    #[must_use]
    pub fn cache_settings(&self) -> CacheSettings {
        self.cache.settings()
    }

    /// Returns the signature verification policy.
    #[must_use]
    pub const fn verification_policy(&self) -> VerificationPolicy {
        VerificationPolicy {
            expired_key_grace_days: self.keys.expired_key_grace_days,
        }
    }

    /// Reads configured key material into registry records.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a key file is unreadable or malformed.
    pub fn key_records(&self) -> Result<Vec<KeyRecord>, ConfigError> {
        self.keys
            .entries
            .iter()
            .map(|entry| entry.load(self.base_dir.as_deref()))
            .collect()
    }

    /// Builds the configured audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when a file sink cannot be opened.
    pub fn audit_sink(&self) -> Result<Arc<dyn AuditSink>, ConfigError> {
        match self.audit.sink {
            AuditSinkKind::Stderr => Ok(Arc::new(StderrAuditSink)),
            AuditSinkKind::None => Ok(Arc::new(NoopAuditSink)),
            AuditSinkKind::File => {
                let path = self
                    .audit
                    .path
                    .as_deref()
                    .ok_or_else(|| ConfigError::Invalid("audit.path required".to_string()))?;
                let resolved = resolve_relative(self.base_dir.as_deref(), path);
                let sink = FileAuditSink::new(&resolved)
                    .map_err(|err| ConfigError::Io(err.to_string()))?;
                Ok(Arc::new(sink))
            }
        }
    }

    /// Reads the webhook secret from the configured environment variable.
    ///
    /// Returns `None` when no variable is configured, unset, or empty.
    #[must_use]
    pub fn webhook_secret(&self) -> Option<String> {
        let name = self.admin.webhook_secret_env.as_deref()?;
        env::var(name).ok().filter(|secret| !secret.is_empty())
    }
}

// ============================================================================
// SECTION: Cache
// ============================================================================

/// Manifest cache configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entry time-to-live in seconds.
    pub ttl_seconds: u64,
    /// Maximum ready entries.
    pub max_entries: usize,
    /// Number of shards.
    pub shards: usize,
    /// Minimum request count for default warming.
    pub warming_threshold: u64,
    /// Keys selected by default warming.
    pub warm_top_n: usize,
    /// Background sweep interval in seconds.
    pub cleanup_interval_seconds: u64,
    /// Background warming interval in seconds.
    pub warm_interval_seconds: u64,
    /// Enables periodic background warming.
    pub background_warming: bool,
    /// Upstream fetch timeout per attempt in milliseconds.
    pub fetch_timeout_ms: u64,
    /// Retries after the first failed upstream attempt.
    pub max_fetch_retries: u32,
    /// Base retry backoff in milliseconds.
    pub retry_backoff_ms: u64,
    /// Maximum wait on another caller's fetch in milliseconds.
    pub flight_wait_timeout_ms: u64,
    /// Background task shutdown timeout in milliseconds.
    pub shutdown_timeout_ms: u64,
    /// Hit rate below which the cache reports degraded.
    pub degraded_hit_rate: f64,
    /// Requests required before the hit rate is judged.
    pub degraded_min_requests: u64,
    /// Fill ratio at or above which the cache reports degraded.
    pub degraded_fill_ratio: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let settings = CacheSettings::default();
        Self {
            ttl_seconds: settings.ttl.as_secs(),
            max_entries: settings.max_entries,
            shards: settings.shards,
            warming_threshold: settings.warming_threshold,
            warm_top_n: settings.warm_top_n,
            cleanup_interval_seconds: settings.cleanup_interval.as_secs(),
            warm_interval_seconds: settings.warm_interval.as_secs(),
            background_warming: settings.background_warming,
            fetch_timeout_ms: duration_ms(settings.fetch_timeout),
            max_fetch_retries: settings.max_fetch_retries,
            retry_backoff_ms: duration_ms(settings.retry_backoff),
            flight_wait_timeout_ms: duration_ms(settings.flight_wait_timeout),
            shutdown_timeout_ms: duration_ms(settings.shutdown_timeout),
            degraded_hit_rate: settings.degraded_hit_rate,
            degraded_min_requests: settings.degraded_min_requests,
            degraded_fill_ratio: settings.degraded_fill_ratio,
        }
    }
}

impl CacheConfig {
    /// Validates cache bounds.
    fn validate(&self) -> Result<(), ConfigError> {
        check_range("cache.ttl_seconds", self.ttl_seconds, 1, MAX_TTL_SECONDS)?;
        check_range("cache.max_entries", self.max_entries, 1, MAX_CACHE_ENTRIES)?;
        check_range("cache.shards", self.shards, 1, MAX_SHARDS)?;
        check_range("cache.warm_top_n", self.warm_top_n, 0, self.max_entries)?;
        check_range(
            "cache.cleanup_interval_seconds",
            self.cleanup_interval_seconds,
            1,
            MAX_INTERVAL_SECONDS,
        )?;
        check_range(
            "cache.warm_interval_seconds",
            self.warm_interval_seconds,
            1,
            MAX_INTERVAL_SECONDS,
        )?;
        check_range(
            "cache.fetch_timeout_ms",
            self.fetch_timeout_ms,
            MIN_TIMEOUT_MS,
            MAX_TIMEOUT_MS,
        )?;
        check_range("cache.max_fetch_retries", self.max_fetch_retries, 0, MAX_FETCH_RETRIES)?;
        check_range(
            "cache.retry_backoff_ms",
            self.retry_backoff_ms,
            MIN_TIMEOUT_MS,
            MAX_TIMEOUT_MS,
        )?;
        check_range(
            "cache.flight_wait_timeout_ms",
            self.flight_wait_timeout_ms,
            MIN_TIMEOUT_MS,
            MAX_TIMEOUT_MS,
        )?;
        check_range(
            "cache.shutdown_timeout_ms",
            self.shutdown_timeout_ms,
            MIN_TIMEOUT_MS,
            MAX_TIMEOUT_MS,
        )?;
        check_ratio("cache.degraded_hit_rate", self.degraded_hit_rate)?;
        check_ratio("cache.degraded_fill_ratio", self.degraded_fill_ratio)?;
        Ok(())
    }

    /// Converts to cache runtime settings.
    #[must_use]
    pub const fn settings(&self) -> CacheSettings {
        CacheSettings {
            ttl: Duration::from_secs(self.ttl_seconds),
            max_entries: self.max_entries,
            shards: self.shards,
            warming_threshold: self.warming_threshold,
            warm_top_n: self.warm_top_n,
            cleanup_interval: Duration::from_secs(self.cleanup_interval_seconds),
            warm_interval: Duration::from_secs(self.warm_interval_seconds),
            background_warming: self.background_warming,
            fetch_timeout: Duration::from_millis(self.fetch_timeout_ms),
            max_fetch_retries: self.max_fetch_retries,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            flight_wait_timeout: Duration::from_millis(self.flight_wait_timeout_ms),
            shutdown_timeout: Duration::from_millis(self.shutdown_timeout_ms),
            degraded_hit_rate: self.degraded_hit_rate,
            degraded_min_requests: self.degraded_min_requests,
            degraded_fill_ratio: self.degraded_fill_ratio,
        }
    }
}

// ============================================================================
// SECTION: Keys
// ============================================================================

/// Key registry configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    /// Days an expired, unrevoked key still verifies with a warning.
    pub expired_key_grace_days: u32,
    /// Keys loaded into the registry at startup.
    pub entries: Vec<KeyEntryConfig>,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            expired_key_grace_days: VerificationPolicy::default().expired_key_grace_days,
            entries: Vec::new(),
        }
    }
}

impl KeysConfig {
    /// Validates key entries.
    fn validate(&self) -> Result<(), ConfigError> {
        check_range("keys.expired_key_grace_days", self.expired_key_grace_days, 0, MAX_GRACE_DAYS)?;
        if self.entries.len() > MAX_KEY_ENTRIES {
            return Err(ConfigError::Invalid(format!(
                "keys.entries exceeds {MAX_KEY_ENTRIES} entries"
            )));
        }
        let mut seen = BTreeSet::new();
        for entry in &self.entries {
            entry.validate()?;
            if !seen.insert(entry.key_id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "keys.entries: duplicate key_id {}",
                    entry.key_id
                )));
            }
        }
        Ok(())
    }
}

/// Single configured key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEntryConfig {
    /// Key identifier.
    pub key_id: String,
    /// Key type.
    pub key_type: KeyType,
    /// Expected signature algorithm; must match the key type when present.
    #[serde(default)]
    pub algorithm: Option<SignatureAlgorithm>,
    /// SPKI PEM public key path.
    #[serde(default)]
    pub public_key_path: Option<PathBuf>,
    /// PKCS#8 PEM private key path for signer keys.
    #[serde(default)]
    pub private_key_path: Option<PathBuf>,
    /// RFC 3339 creation time (defaults to load time).
    #[serde(default)]
    pub created_at: Option<String>,
    /// RFC 3339 expiry time.
    #[serde(default)]
    pub expires_at: Option<String>,
    /// Active flag.
    #[serde(default = "default_true")]
    pub active: bool,
    /// Permitted usages (defaults by key material).
    #[serde(default)]
    pub usages: Option<Vec<KeyUsage>>,
}

impl KeyEntryConfig {
    /// Validates one entry without touching the filesystem.
    fn validate(&self) -> Result<(), ConfigError> {
        let field = format!("keys.entries[{}]", self.key_id);
        if self.key_id.trim().is_empty() {
            return Err(ConfigError::Invalid("keys.entries: key_id must be non-empty".to_string()));
        }
        if let Some(algorithm) = self.algorithm
            && algorithm != self.key_type.algorithm()
        {
            return Err(ConfigError::Invalid(format!(
                "{field}: algorithm {algorithm} does not match key_type {}",
                self.key_type
            )));
        }
        if self.public_key_path.is_none() && self.private_key_path.is_none() {
            return Err(ConfigError::Invalid(format!(
                "{field}: public_key_path or private_key_path required"
            )));
        }
        for path in [&self.public_key_path, &self.private_key_path].into_iter().flatten() {
            validate_path(path)?;
        }
        let created_at = parse_time(&field, "created_at", self.created_at.as_deref())?;
        let expires_at = parse_time(&field, "expires_at", self.expires_at.as_deref())?;
        if let (Some(created_at), Some(expires_at)) = (created_at, expires_at)
            && expires_at <= created_at
        {
            return Err(ConfigError::Invalid(format!("{field}: expires_at must follow created_at")));
        }
        if let Some(usages) = &self.usages {
            if usages.contains(&KeyUsage::Sign) && self.private_key_path.is_none() {
                return Err(ConfigError::Invalid(format!(
                    "{field}: sign usage requires private_key_path"
                )));
            }
            if usages.is_empty() {
                return Err(ConfigError::Invalid(format!("{field}: usages must be non-empty")));
            }
        }
        Ok(())
    }

    /// Reads key files and builds a registry record.
    fn load(&self, base_dir: Option<&Path>) -> Result<KeyRecord, ConfigError> {
        let field = format!("keys.entries[{}]", self.key_id);
        let created_at = parse_time(&field, "created_at", self.created_at.as_deref())?
            .unwrap_or_else(Timestamp::now);
        let expires_at = parse_time(&field, "expires_at", self.expires_at.as_deref())?;
        let key_id = KeyId::new(self.key_id.clone());

        let private_key = match &self.private_key_path {
            Some(path) => {
                let pem = read_key_file(base_dir, path)?;
                Some(
                    PrivateKey::from_pkcs8_pem(self.key_type, &pem)
                        .map_err(|err| ConfigError::Invalid(format!("{field}: {err}")))?,
                )
            }
            None => None,
        };
        let public_key = match &self.public_key_path {
            Some(path) => {
                let pem = read_key_file(base_dir, path)?;
                Some(
                    PublicKey::from_pem(self.key_type, &pem)
                        .map_err(|err| ConfigError::Invalid(format!("{field}: {err}")))?,
                )
            }
            None => None,
        };

        let record = match (public_key, private_key) {
            (Some(public_key), Some(private_key)) => {
                KeyRecord::verifier(key_id, public_key, created_at)
                    .with_private_key(private_key)
                    .map_err(|err| ConfigError::Invalid(format!("{field}: {err}")))?
                    .with_usages([KeyUsage::Sign, KeyUsage::Verify])
            }
            (Some(public_key), None) => KeyRecord::verifier(key_id, public_key, created_at),
            (None, Some(private_key)) => KeyRecord::signer(key_id, private_key, created_at),
            (None, None) => {
                return Err(ConfigError::Invalid(format!(
                    "{field}: public_key_path or private_key_path required"
                )));
            }
        };
        let record = record.with_expiry(expires_at).with_active(self.active);
        Ok(match &self.usages {
            Some(usages) => record.with_usages(usages.iter().copied()),
            None => record,
        })
    }
}

// ============================================================================
// SECTION: Admin and Audit
// ============================================================================

/// Administrative access configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Roles granting administrative privilege.
    pub roles: Vec<String>,
    /// Environment variable holding the lifecycle webhook secret.
    pub webhook_secret_env: Option<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            roles: vec!["admin".to_string()],
            webhook_secret_env: None,
        }
    }
}

impl AdminConfig {
    /// Validates admin settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.roles.is_empty() {
            return Err(ConfigError::Invalid("admin.roles must be non-empty".to_string()));
        }
        if self.roles.len() > MAX_ADMIN_ROLES {
            return Err(ConfigError::Invalid(format!(
                "admin.roles exceeds {MAX_ADMIN_ROLES} entries"
            )));
        }
        if self.roles.iter().any(|role| role.trim().is_empty()) {
            return Err(ConfigError::Invalid("admin.roles entries must be non-empty".to_string()));
        }
        if let Some(name) = &self.webhook_secret_env
            && (name.is_empty() || name.contains('=') || name.contains('\0'))
        {
            return Err(ConfigError::Invalid(
                "admin.webhook_secret_env must be a valid variable name".to_string(),
            ));
        }
        Ok(())
    }
}

/// Audit sink selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// JSON lines to stderr.
    #[default]
    Stderr,
    /// JSON lines appended to a file.
    File,
    /// Discard audit events.
    None,
}

/// Audit configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Sink kind.
    pub sink: AuditSinkKind,
    /// Log path for file sinks.
    pub path: Option<PathBuf>,
}

impl AuditConfig {
    /// Validates audit settings.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("audit.sink=file requires audit.path".to_string()))
            }
            (AuditSinkKind::File, Some(path)) => validate_path(path),
            (_, Some(_)) => Err(ConfigError::Invalid(
                "audit.path is only valid with audit.sink=file".to_string(),
            )),
            (_, None) => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Serde default for boolean flags that default on.
const fn default_true() -> bool {
    true
}

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates a path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.trim().is_empty() {
        return Err(ConfigError::Invalid("path must be non-empty".to_string()));
    }
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("path component too long".to_string()));
        }
    }
    Ok(())
}

/// Resolves `path` against `base_dir` when relative.
fn resolve_relative(base_dir: Option<&Path>, path: &Path) -> PathBuf {
    match base_dir {
        Some(base) if path.is_relative() => base.join(path),
        _ => path.to_path_buf(),
    }
}

/// Reads a UTF-8 file with a size limit.
fn read_limited(path: &Path, limit: usize, label: &str) -> Result<String, ConfigError> {
    let bytes =
        fs::read(path).map_err(|err| ConfigError::Io(format!("{}: {err}", path.display())))?;
    if bytes.len() > limit {
        return Err(ConfigError::Invalid(format!("{label} exceeds size limit")));
    }
    String::from_utf8(bytes).map_err(|_| ConfigError::Invalid(format!("{label} must be utf-8")))
}

/// Reads a PEM key file.
fn read_key_file(base_dir: Option<&Path>, path: &Path) -> Result<String, ConfigError> {
    let resolved = resolve_relative(base_dir, path);
    validate_path(&resolved)?;
    read_limited(&resolved, MAX_KEY_FILE_SIZE, "key file")
}

/// Parses an optional RFC 3339 timestamp field.
fn parse_time(
    field: &str,
    name: &str,
    value: Option<&str>,
) -> Result<Option<Timestamp>, ConfigError> {
    value
        .map(|text| {
            Timestamp::parse_rfc3339(text)
                .map_err(|err| ConfigError::Invalid(format!("{field}.{name}: {err}")))
        })
        .transpose()
}

/// Checks an inclusive numeric range.
fn check_range<T>(field: &str, value: T, min: T, max: T) -> Result<(), ConfigError>
where
    T: PartialOrd + std::fmt::Display,
{
    if value < min || value > max {
        return Err(ConfigError::Invalid(format!("{field} must be between {min} and {max}")));
    }
    Ok(())
}

/// Checks a ratio in `(0, 1]`.
fn check_ratio(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!("{field} must be in (0, 1]")))
    }
}

/// Converts a duration to whole milliseconds, saturating.
fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
