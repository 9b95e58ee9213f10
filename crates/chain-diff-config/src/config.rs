// crates/chain-diff-config/src/config.rs
// ============================================================================
// Module: Chain Diff Configuration
// Description: Configuration loading and validation for Chain Diff.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: chain-diff-core, serde, toml, url
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Unknown fields are rejected and every section is validated before the
//! configuration is handed to the runtime.
//! Invariants:
//! - A config returned by [`ChainDiffConfig::load`] has passed validation.
//! - Argument encodings only ever apply to the candidate target.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use chain_diff_core::DEFAULT_MINER;
use chain_diff_core::DispatcherConfig;
use chain_diff_core::EventLevel;
use chain_diff_core::SchedulerConfig;
use chain_diff_core::core::fixtures::is_id_address;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "chain-diff.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "CHAIN_DIFF_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum length of a bearer token.
pub(crate) const MAX_TOKEN_LENGTH: usize = 4096;
/// Maximum length of a target label.
pub(crate) const MAX_LABEL_LENGTH: usize = 64;
/// Default target connect timeout in milliseconds.
pub(crate) const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 2_000;
/// Minimum target connect timeout in milliseconds.
pub(crate) const MIN_CONNECT_TIMEOUT_MS: u64 = 100;
/// Maximum target connect timeout in milliseconds.
pub(crate) const MAX_CONNECT_TIMEOUT_MS: u64 = 10_000;
/// Default target request timeout in milliseconds.
pub(crate) const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
/// Minimum target request timeout in milliseconds.
pub(crate) const MIN_REQUEST_TIMEOUT_MS: u64 = 500;
/// Maximum target request timeout in milliseconds.
pub(crate) const MAX_REQUEST_TIMEOUT_MS: u64 = 120_000;
/// Default dispatcher concurrency.
pub(crate) const DEFAULT_CONCURRENCY: usize = 5;
/// Maximum dispatcher concurrency.
pub(crate) const MAX_CONCURRENCY: usize = 256;
/// Maximum per-comparison deadline in milliseconds.
pub(crate) const MAX_COMPARISON_TIMEOUT_MS: u64 = 600_000;
/// Default confidence lag in checkpoints.
pub(crate) const DEFAULT_CONFIDENCE: u64 = 5;
/// Maximum confidence lag in checkpoints.
pub(crate) const MAX_CONFIDENCE: u64 = 900;
/// Default trigger channel capacity.
pub(crate) const DEFAULT_TRIGGER_CAPACITY: usize = 1;
/// Maximum trigger channel capacity.
pub(crate) const MAX_TRIGGER_CAPACITY: usize = 64;
/// Default head poll interval in milliseconds.
pub(crate) const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
/// Minimum head poll interval in milliseconds.
pub(crate) const MIN_POLL_INTERVAL_MS: u64 = 100;
/// Maximum head poll interval in milliseconds.
pub(crate) const MAX_POLL_INTERVAL_MS: u64 = 60_000;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Chain Diff configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChainDiffConfig {
    /// Trusted reference implementation.
    #[serde(default)]
    pub reference: TargetConfig,
    /// Implementation under test.
    #[serde(default)]
    pub candidate: TargetConfig,
    /// Dispatcher settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// Scheduler settings.
    #[serde(default)]
    pub scheduler: ScheduleConfig,
    /// Fixture settings.
    #[serde(default)]
    pub fixtures: FixturesConfig,
    /// Event log settings.
    #[serde(default)]
    pub log: LogConfig,
}

impl ChainDiffConfig {
    /// Loads and validates configuration using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses configuration without validating it.
    ///
    /// Callers that apply overrides validate afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed.
    pub fn read(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path, env::var(CONFIG_ENV_VAR).ok())?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved)
            .map_err(|err| ConfigError::Io(format!("{}: {err}", resolved.display())))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses configuration from TOML text without validating it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the text is not a valid config.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.reference.validate("reference")?;
        self.candidate.validate("candidate")?;
        if self.reference.quantity_encoding != QuantityEncoding::Hex
            || self.reference.key_encoding != KeyEncoding::CidLinks
            || self.reference.address_encoding != AddressEncoding::Preserve
        {
            return Err(ConfigError::Invalid(
                "reference must use native argument encodings".to_string(),
            ));
        }
        self.dispatch.validate()?;
        self.scheduler.validate()?;
        self.fixtures.validate()?;
        self.log.validate()?;
        Ok(())
    }
}

/// Candidate-side quantity encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantityEncoding {
    /// `0x`-prefixed hex (native).
    #[default]
    Hex,
    /// Plain decimal integers.
    Decimal,
}

/// Candidate-side checkpoint key encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyEncoding {
    /// `{"/": cid}` links (native).
    #[default]
    CidLinks,
    /// Bare identifier strings.
    Strings,
}

/// Candidate-side address encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressEncoding {
    /// Addresses are sent as written (native).
    #[default]
    Preserve,
    /// Addresses are lowercased.
    Lowercase,
}

/// One JSON-RPC target.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    /// JSON-RPC endpoint URL.
    #[serde(default)]
    pub url: String,
    /// Optional bearer token.
    #[serde(default)]
    pub token: Option<String>,
    /// Optional display label.
    #[serde(default)]
    pub label: Option<String>,
    /// Connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Quantity encoding expected by the target.
    #[serde(default)]
    pub quantity_encoding: QuantityEncoding,
    /// Checkpoint key encoding expected by the target.
    #[serde(default)]
    pub key_encoding: KeyEncoding,
    /// Address encoding expected by the target.
    #[serde(default)]
    pub address_encoding: AddressEncoding,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: None,
            label: None,
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            quantity_encoding: QuantityEncoding::default(),
            key_encoding: KeyEncoding::default(),
            address_encoding: AddressEncoding::default(),
        }
    }
}

impl TargetConfig {
    /// Returns the configured label or the section name.
    #[must_use]
    pub fn label_or<'a>(&'a self, section: &'a str) -> &'a str {
        self.label.as_deref().unwrap_or(section)
    }

    /// Returns the connect timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Returns the request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Validates one target section.
    fn validate(&self, section: &str) -> Result<(), ConfigError> {
        let trimmed = self.url.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::Invalid(format!("{section}.url must be set")));
        }
        let url = Url::parse(trimmed)
            .map_err(|err| ConfigError::Invalid(format!("{section}.url is invalid: {err}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!("{section}.url must use http or https")));
        }
        if let Some(token) = &self.token {
            if token.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{section}.token must be non-empty")));
            }
            if token.len() > MAX_TOKEN_LENGTH {
                return Err(ConfigError::Invalid(format!("{section}.token exceeds max length")));
            }
        }
        if let Some(label) = &self.label {
            if label.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{section}.label must be non-empty")));
            }
            if label.len() > MAX_LABEL_LENGTH {
                return Err(ConfigError::Invalid(format!("{section}.label exceeds max length")));
            }
        }
        check_range(
            &format!("{section}.connect_timeout_ms"),
            self.connect_timeout_ms,
            MIN_CONNECT_TIMEOUT_MS,
            MAX_CONNECT_TIMEOUT_MS,
        )?;
        check_range(
            &format!("{section}.request_timeout_ms"),
            self.request_timeout_ms,
            MIN_REQUEST_TIMEOUT_MS,
            MAX_REQUEST_TIMEOUT_MS,
        )
    }
}

/// Dispatcher settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Maximum comparisons in flight.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Optional per-comparison deadline in milliseconds.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self { concurrency: default_concurrency(), request_timeout_ms: None }
    }
}

impl DispatchConfig {
    /// Converts the section into dispatcher settings.
    #[must_use]
    pub fn to_dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            concurrency: self.concurrency,
            request_timeout: self.request_timeout_ms.map(Duration::from_millis),
        }
    }

    /// Validates dispatcher settings.
    fn validate(&self) -> Result<(), ConfigError> {
        check_range("dispatch.concurrency", self.concurrency, 1, MAX_CONCURRENCY)?;
        if let Some(timeout) = self.request_timeout_ms {
            check_range("dispatch.request_timeout_ms", timeout, 1, MAX_COMPARISON_TIMEOUT_MS)?;
        }
        Ok(())
    }
}

/// Scheduler settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleConfig {
    /// Checkpoints to lag behind the head.
    #[serde(default = "default_confidence")]
    pub confidence: u64,
    /// Explicit first height (clamped to the head at startup).
    #[serde(default)]
    pub start_height: Option<u64>,
    /// Pending trigger capacity.
    #[serde(default = "default_trigger_capacity")]
    pub trigger_capacity: usize,
    /// Head poll interval in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            confidence: default_confidence(),
            start_height: None,
            trigger_capacity: default_trigger_capacity(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl ScheduleConfig {
    /// Converts the section into scheduler settings.
    #[must_use]
    pub const fn to_scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            confidence: self.confidence,
            start_height: self.start_height,
            trigger_capacity: self.trigger_capacity,
        }
    }

    /// Returns the head poll interval.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Validates scheduler settings.
    fn validate(&self) -> Result<(), ConfigError> {
        check_range("scheduler.confidence", self.confidence, 0, MAX_CONFIDENCE)?;
        check_range(
            "scheduler.trigger_capacity",
            self.trigger_capacity,
            1,
            MAX_TRIGGER_CAPACITY,
        )?;
        check_range(
            "scheduler.poll_interval_ms",
            self.poll_interval_ms,
            MIN_POLL_INTERVAL_MS,
            MAX_POLL_INTERVAL_MS,
        )
    }
}

/// Fixture settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FixturesConfig {
    /// ID address used when a checkpoint yields none.
    #[serde(default = "default_miner")]
    pub default_miner: String,
}

impl Default for FixturesConfig {
    fn default() -> Self {
        Self { default_miner: default_miner() }
    }
}

impl FixturesConfig {
    /// Validates fixture settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if !is_id_address(&self.default_miner) {
            return Err(ConfigError::Invalid(
                "fixtures.default_miner must be an id address".to_string(),
            ));
        }
        Ok(())
    }
}

/// Event log destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogOutput {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to `log.path`.
    File,
}

/// Event log settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Minimum level recorded.
    #[serde(default)]
    pub level: EventLevel,
    /// Destination.
    #[serde(default)]
    pub output: LogOutput,
    /// Log file path when `output = "file"`.
    #[serde(default)]
    pub path: Option<String>,
}

impl LogConfig {
    /// Validates log settings.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.output, &self.path) {
            (LogOutput::File, Some(path)) => validate_path_string("log.path", path),
            (LogOutput::File, None) => {
                Err(ConfigError::Invalid("log.path is required when output=file".to_string()))
            }
            (LogOutput::Stderr, Some(_)) => {
                Err(ConfigError::Invalid("log.path requires output=file".to_string()))
            }
            (LogOutput::Stderr, None) => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
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

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>, env_path: Option<String>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Some(env_path) = env_path {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Checks that a value lies within an inclusive range.
fn check_range<T>(field: &str, value: T, min: T, max: T) -> Result<(), ConfigError>
where
    T: PartialOrd + std::fmt::Display,
{
    if value < min || value > max {
        return Err(ConfigError::Invalid(format!("{field} must be between {min} and {max}")));
    }
    Ok(())
}

/// Default connect timeout.
const fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

/// Default request timeout.
const fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

/// Default dispatcher concurrency.
const fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

/// Default confidence lag.
const fn default_confidence() -> u64 {
    DEFAULT_CONFIDENCE
}

/// Default trigger capacity.
const fn default_trigger_capacity() -> usize {
    DEFAULT_TRIGGER_CAPACITY
}

/// Default poll interval.
const fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

/// Default miner address.
fn default_miner() -> String {
    DEFAULT_MINER.to_string()
}
