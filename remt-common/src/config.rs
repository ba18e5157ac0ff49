//! Bootstrap configuration loading
//!
//! Configuration file resolution follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. `REMT_CONFIG` environment variable
//! 3. `<config dir>/remt/<module>.toml`
//!
//! A missing file is not fatal: built-in defaults are used and the returned
//! [`ConfigSource`] says so, to be logged once tracing is up. A file that
//! exists but cannot be parsed is an error.
//!
//! API keys are resolved separately by [`resolve_secret`] with the
//! environment taking priority over TOML.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "REMT_CONFIG";

/// Longest accepted window cache TTL (100 years)
pub const MAX_CACHE_TTL_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Default public endpoint of the apartment trade report service
pub const DEFAULT_UPSTREAM_URL: &str =
    "https://apis.data.go.kr/1613000/RTMSDataSvcAptTrade/getRTMSDataSvcAptTrade";

/// Default Kakao local address search endpoint
pub const DEFAULT_GEOCODER_URL: &str = "https://dapi.kakao.com/v2/local/search/address.json";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Interface to bind
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub geocoder: GeocoderConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            logging: LoggingConfig::default(),
            upstream: UpstreamConfig::default(),
            geocoder: GeocoderConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Transaction report provider settings
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_upstream_url")]
    pub base_url: String,

    /// data.go.kr service key; `DATA_GO_KR_API_KEY` overrides it
    #[serde(default)]
    pub service_key: Option<String>,

    /// Rows requested for page 1; rows beyond this are not fetched
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default = "default_upstream_timeout_secs")]
    pub timeout_secs: u64,

    /// Offset used to decide which month is "current"
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_upstream_url(),
            service_key: None,
            page_size: default_page_size(),
            timeout_secs: default_upstream_timeout_secs(),
            utc_offset_hours: default_utc_offset_hours(),
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Address geocoder settings
#[derive(Debug, Clone, Deserialize)]
pub struct GeocoderConfig {
    #[serde(default = "default_geocoder_url")]
    pub base_url: String,

    /// Kakao REST key; `KAKAO_REST_API_KEY` overrides it
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_geocoder_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: default_geocoder_url(),
            api_key: None,
            timeout_secs: default_geocoder_timeout_secs(),
        }
    }
}

impl GeocoderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Window cache settings
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.ttl_secs.min(MAX_CACHE_TTL_SECS) as i64)
    }
}

fn default_port() -> u16 {
    3001
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_upstream_url() -> String {
    DEFAULT_UPSTREAM_URL.to_string()
}

fn default_page_size() -> u32 {
    1000
}

fn default_upstream_timeout_secs() -> u64 {
    15
}

fn default_utc_offset_hours() -> i32 {
    9
}

fn default_geocoder_url() -> String {
    DEFAULT_GEOCODER_URL.to_string()
}

fn default_geocoder_timeout_secs() -> u64 {
    10
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

/// Locate the config file for `module_name`
///
/// Returns `None` when no candidate can be determined at all.
pub fn resolve_config_path(cli_arg: Option<&Path>, module_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    dirs::config_dir().map(|d| d.join("remt").join(format!("{}.toml", module_name)))
}

/// Where the loaded configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// Resolved path does not exist; defaults in use
    Missing(PathBuf),
    /// No config directory on this platform; defaults in use
    NoConfigDir,
}

impl ConfigSource {
    pub fn is_default(&self) -> bool {
        !matches!(self, ConfigSource::File(_))
    }

    /// Report the source; call after the subscriber is installed
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded configuration from {}", path.display()),
            ConfigSource::Missing(path) => warn!(
                "Config file {} not found, using built-in defaults",
                path.display()
            ),
            ConfigSource::NoConfigDir => {
                warn!("Could not determine config directory, using built-in defaults")
            }
        }
    }
}

/// Load configuration, falling back to defaults when the file is absent
///
/// Nothing is logged here: configuration is read before tracing exists.
pub fn load_config(
    cli_arg: Option<&Path>,
    module_name: &str,
) -> Result<(TomlConfig, ConfigSource)> {
    let Some(path) = resolve_config_path(cli_arg, module_name) else {
        return Ok((TomlConfig::default(), ConfigSource::NoConfigDir));
    };

    if !path.exists() {
        return Ok((TomlConfig::default(), ConfigSource::Missing(path)));
    }

    let config = load_config_file(&path)?;
    Ok((config, ConfigSource::File(path)))
}

/// Parse one TOML config file
pub fn load_config_file(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Resolve a secret from the environment, then TOML
///
/// Blank values are ignored. Warns when both sources carry a value.
pub fn resolve_secret(env_var: &str, toml_value: Option<&str>) -> Option<String> {
    let env_value = std::env::var(env_var).ok().filter(|v| is_valid_key(v));
    let toml_value = toml_value.filter(|v| is_valid_key(v));

    if env_value.is_some() && toml_value.is_some() {
        warn!(
            "{} set in both environment and TOML config. Using environment (highest priority).",
            env_var
        );
    }

    if let Some(key) = env_value {
        info!("{} loaded from environment variable", env_var);
        return Some(key);
    }

    toml_value.map(|key| {
        info!("{} loaded from TOML config", env_var);
        key.to_string()
    })
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
