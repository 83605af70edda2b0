//! Configuration module for Stratus.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::ResourceType;
use crate::ports::MAX_BATCH_SIZE;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Stratus.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub recycle: RecycleConfig,
    pub retry: RetryConfig,
    pub leader: LeaderConfig,
    pub gateway: GatewayConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub telemetry: TelemetryConfig,
    pub supervisor: SupervisorConfig,
}

/// Reconciliation sweep settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Minutes between two sweeps.
    pub interval_minutes: u64,
    /// Accounts fetched per page while sweeping.
    pub account_page_size: u32,
    /// Items per store batch call (at most 500).
    pub batch_size: usize,
    /// Vendor sweeps allowed to run at the same time.
    pub max_concurrent_vendors: usize,
    /// Upper bound, in seconds, for any single cloud or store call.
    pub call_timeout_secs: u64,
}

/// Recycle bin lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecycleConfig {
    /// Seconds to sleep when no record is due.
    pub idle_interval_secs: u64,
    /// Due records fetched per page.
    pub page_size: u32,
    /// Resource types with a destruction loop.
    pub resource_types: Vec<ResourceType>,
}

/// Retry policy shared by every loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total invocations allowed before giving up.
    pub max_attempts: u32,
    /// Lower bound of the randomized backoff, in milliseconds.
    pub min_backoff_ms: u64,
    /// Upper bound of the randomized backoff, in milliseconds.
    pub max_backoff_ms: u64,
}

/// Leader election settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaderConfig {
    /// `lease` (shared database lease) or `standalone` (always leader).
    pub mode: String,
    /// Name of the lease row contended for.
    pub lease_name: String,
    /// Seconds a lease stays valid without renewal.
    pub lease_ttl_secs: u64,
    /// Seconds a non-leader waits before asking again.
    pub standby_sleep_secs: u64,
}

/// Cloud gateway client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL of the cloud gateway service.
    pub base_url: String,
    /// Bearer token sent with every request. `None` disables the header.
    pub token: Option<String>,
    /// Items requested per listing page.
    pub page_size: u32,
    /// Sustained request rate allowed towards the gateway.
    pub requests_per_second: u32,
    /// Retries for HTTP 429 responses.
    pub max_retries: u32,
}

/// Database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    pub path: PathBuf,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Output format: `text` or `json`.
    pub format: String,
}

/// Metrics exposition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Whether to serve `/metrics`.
    pub metrics_enabled: bool,
    /// Address to bind the metrics server to.
    pub metrics_endpoint: String,
}

/// Background task supervision settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Seconds to wait before restarting a crashed loop.
    pub restart_delay_secs: u64,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/stratus/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("stratus")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 30,
            account_page_size: 100,
            batch_size: 100,
            max_concurrent_vendors: 5,
            call_timeout_secs: 120,
        }
    }
}

impl Default for RecycleConfig {
    fn default() -> Self {
        Self {
            idle_interval_secs: 600,
            page_size: 50,
            resource_types: vec![ResourceType::Cvm, ResourceType::Disk, ResourceType::Eip],
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_backoff_ms: 10_000,
            max_backoff_ms: 15_000,
        }
    }
}

impl Default for LeaderConfig {
    fn default() -> Self {
        Self {
            mode: "lease".to_string(),
            lease_name: "stratus-control-loops".to_string(),
            lease_ttl_secs: 30,
            standby_sleep_secs: 10,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080/api/v1".to_string(),
            token: None,
            page_size: 100,
            requests_per_second: 20,
            max_retries: 5,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("stratus")
                .join("stratus.db"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_endpoint: "127.0.0.1:9464".to_string(),
        }
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            restart_delay_secs: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.batch_size"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

/// Valid values for `leader.mode`.
const VALID_LEADER_MODES: &[&str] = &["lease", "standalone"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut positive = |field: &str, value: u64| {
            if value == 0 {
                errors.push(ValidationError {
                    field: field.into(),
                    message: "must be greater than 0".into(),
                });
            }
        };

        // --- sync ---
        positive("sync.interval_minutes", self.sync.interval_minutes);
        positive("sync.account_page_size", self.sync.account_page_size.into());
        positive("sync.max_concurrent_vendors", self.sync.max_concurrent_vendors as u64);
        positive("sync.call_timeout_secs", self.sync.call_timeout_secs);

        // --- recycle ---
        positive("recycle.idle_interval_secs", self.recycle.idle_interval_secs);
        positive("recycle.page_size", self.recycle.page_size.into());

        // --- retry ---
        positive("retry.max_attempts", self.retry.max_attempts.into());

        // --- leader ---
        positive("leader.lease_ttl_secs", self.leader.lease_ttl_secs);
        positive("leader.standby_sleep_secs", self.leader.standby_sleep_secs);

        // --- gateway ---
        positive("gateway.page_size", self.gateway.page_size.into());
        positive("gateway.requests_per_second", self.gateway.requests_per_second.into());

        if self.sync.batch_size == 0 || self.sync.batch_size > MAX_BATCH_SIZE {
            errors.push(ValidationError {
                field: "sync.batch_size".into(),
                message: format!("must be between 1 and {MAX_BATCH_SIZE}"),
            });
        }

        if self.recycle.resource_types.iter().any(|t| t.is_public()) {
            errors.push(ValidationError {
                field: "recycle.resource_types".into(),
                message: "public resource types cannot be recycled".into(),
            });
        }

        if self.retry.min_backoff_ms > self.retry.max_backoff_ms {
            errors.push(ValidationError {
                field: "retry.min_backoff_ms".into(),
                message: format!(
                    "must not exceed retry.max_backoff_ms ({})",
                    self.retry.max_backoff_ms
                ),
            });
        }

        if !VALID_LEADER_MODES.contains(&self.leader.mode.as_str()) {
            errors.push(ValidationError {
                field: "leader.mode".into(),
                message: format!(
                    "invalid mode '{}', expected one of: {}",
                    self.leader.mode,
                    VALID_LEADER_MODES.join(", ")
                ),
            });
        }
        if self.leader.lease_name.trim().is_empty() {
            errors.push(ValidationError {
                field: "leader.lease_name".into(),
                message: "must not be empty".into(),
            });
        }

        if !self.gateway.base_url.starts_with("http://")
            && !self.gateway.base_url.starts_with("https://")
        {
            errors.push(ValidationError {
                field: "gateway.base_url".into(),
                message: format!("must be an http(s) URL: {}", self.gateway.base_url),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}', expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            errors.push(ValidationError {
                field: "logging.format".into(),
                message: format!(
                    "invalid format '{}', expected one of: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            });
        }

        // --- telemetry ---
        if self.telemetry.metrics_enabled
            && self
                .telemetry
                .metrics_endpoint
                .parse::<std::net::SocketAddr>()
                .is_err()
        {
            errors.push(ValidationError {
                field: "telemetry.metrics_endpoint".into(),
                message: format!("not a socket address: {}", self.telemetry.metrics_endpoint),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use stratus_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .sync_interval_minutes(10)
///     .retry_max_attempts(5)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- sync ---

    pub fn sync_interval_minutes(mut self, minutes: u64) -> Self {
        self.config.sync.interval_minutes = minutes;
        self
    }

    pub fn sync_account_page_size(mut self, n: u32) -> Self {
        self.config.sync.account_page_size = n;
        self
    }

    pub fn sync_batch_size(mut self, n: usize) -> Self {
        self.config.sync.batch_size = n;
        self
    }

    pub fn sync_max_concurrent_vendors(mut self, n: usize) -> Self {
        self.config.sync.max_concurrent_vendors = n;
        self
    }

    pub fn sync_call_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.sync.call_timeout_secs = seconds;
        self
    }

    // --- recycle ---

    pub fn recycle_idle_interval_secs(mut self, seconds: u64) -> Self {
        self.config.recycle.idle_interval_secs = seconds;
        self
    }

    pub fn recycle_page_size(mut self, n: u32) -> Self {
        self.config.recycle.page_size = n;
        self
    }

    pub fn recycle_resource_types(mut self, types: Vec<ResourceType>) -> Self {
        self.config.recycle.resource_types = types;
        self
    }

    // --- retry ---

    pub fn retry_max_attempts(mut self, n: u32) -> Self {
        self.config.retry.max_attempts = n;
        self
    }

    pub fn retry_backoff_ms(mut self, min: u64, max: u64) -> Self {
        self.config.retry.min_backoff_ms = min;
        self.config.retry.max_backoff_ms = max;
        self
    }

    // --- leader ---

    pub fn leader_mode(mut self, mode: impl Into<String>) -> Self {
        self.config.leader.mode = mode.into();
        self
    }

    pub fn leader_lease_ttl_secs(mut self, seconds: u64) -> Self {
        self.config.leader.lease_ttl_secs = seconds;
        self
    }

    pub fn leader_standby_sleep_secs(mut self, seconds: u64) -> Self {
        self.config.leader.standby_sleep_secs = seconds;
        self
    }

    // --- gateway ---

    pub fn gateway_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.gateway.base_url = url.into();
        self
    }

    pub fn gateway_token(mut self, token: impl Into<String>) -> Self {
        self.config.gateway.token = Some(token.into());
        self
    }

    // --- database ---

    pub fn database_path(mut self, path: PathBuf) -> Self {
        self.config.database.path = path;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    // --- telemetry ---

    pub fn telemetry_metrics(mut self, enabled: bool, endpoint: impl Into<String>) -> Self {
        self.config.telemetry.metrics_enabled = enabled;
        self.config.telemetry.metrics_endpoint = endpoint.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
