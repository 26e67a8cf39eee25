//! Configuration loading and resolution
//!
//! Settings are resolved per key in this priority order:
//! 1. Command-line argument (highest priority, clap also folds `VMIX_*` env vars in here)
//! 2. Environment variable (`PORT` for the listen port)
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file is not an error: a warning is logged and defaults are
//! used. A TOML file that exists but does not parse is a `Config` error.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "VMIX_CONFIG";

/// Environment variable for the listen port (hosting platforms set this)
pub const PORT_ENV_VAR: &str = "PORT";

/// Compiled defaults used when no other source provides a value
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub host: String,
    pub port: u16,
    pub scratch_dir: PathBuf,
    pub ffmpeg_path: PathBuf,
    pub fetch_timeout_seconds: u64,
    pub output_bitrate: String,
    pub unbounded_duration_seconds: u64,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            scratch_dir: std::env::temp_dir(),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            fetch_timeout_seconds: 60,
            output_bitrate: "128k".to_string(),
            // 6 hours: longer than any realistic voice/music source
            unbounded_duration_seconds: 6 * 60 * 60,
            log_level: "info".to_string(),
        }
    }
}

/// Logging section of the TOML file
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Bootstrap configuration as read from the TOML file
///
/// Every key is optional; absent keys fall through to compiled defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub scratch_dir: Option<PathBuf>,
    pub ffmpeg_path: Option<PathBuf>,
    pub fetch_timeout_seconds: Option<u64>,
    pub output_bitrate: Option<String>,
    pub unbounded_duration_seconds: Option<u64>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TomlConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }
}

/// Values supplied on the command line (or via clap's env fallbacks)
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub scratch_dir: Option<PathBuf>,
    pub ffmpeg_path: Option<PathBuf>,
    pub log_level: Option<String>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub scratch_dir: PathBuf,
    pub ffmpeg_path: PathBuf,
    pub fetch_timeout: Duration,
    pub output_bitrate: String,
    pub unbounded_duration_seconds: u64,
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let defaults = CompiledDefaults::for_current_platform();
        Self {
            host: defaults.host,
            port: defaults.port,
            scratch_dir: defaults.scratch_dir,
            ffmpeg_path: defaults.ffmpeg_path,
            fetch_timeout: Duration::from_secs(defaults.fetch_timeout_seconds),
            output_bitrate: defaults.output_bitrate,
            unbounded_duration_seconds: defaults.unbounded_duration_seconds,
            log_level: defaults.log_level,
        }
    }
}

/// Locates the TOML file and merges all configuration sources
pub struct ConfigResolver {
    explicit_path: Option<PathBuf>,
}

impl ConfigResolver {
    /// `explicit_path` is the `--config` argument, if any
    pub fn new(explicit_path: Option<PathBuf>) -> Self {
        Self { explicit_path }
    }

    /// Find the config file: explicit path → `VMIX_CONFIG` → user config dir → /etc
    pub fn locate_config_file(&self) -> Option<PathBuf> {
        if let Some(path) = &self.explicit_path {
            return Some(path.clone());
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        let user_config = dirs::config_dir().map(|d| d.join("vmix").join("config.toml"));
        if let Some(path) = user_config {
            if path.exists() {
                return Some(path);
            }
        }

        if cfg!(target_os = "linux") {
            let system_config = PathBuf::from("/etc/vmix/config.toml");
            if system_config.exists() {
                return Some(system_config);
            }
        }

        None
    }

    /// Load the TOML file, or defaults if there is none
    pub fn load_toml(&self) -> Result<TomlConfig> {
        let Some(path) = self.locate_config_file() else {
            info!("No config file found, using defaults");
            return Ok(TomlConfig::default());
        };
        load_toml_file(&path)
    }

    /// Merge CLI overrides, environment, TOML and compiled defaults
    pub fn resolve(&self, overrides: &ConfigOverrides) -> Result<ServiceConfig> {
        let toml_config = self.load_toml()?;
        let env_port = port_from_env()?;
        merge(overrides, env_port, toml_config)
    }
}

fn load_toml_file(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file not found: {} (continuing with defaults)",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config = TomlConfig::from_toml_str(&content)?;
    info!("Loaded config file: {}", path.display());
    Ok(config)
}

fn port_from_env() -> Result<Option<u16>> {
    match std::env::var(PORT_ENV_VAR) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<u16>()
            .map(Some)
            .map_err(|_| Error::Config(format!("{} is not a valid port: {}", PORT_ENV_VAR, value))),
        _ => Ok(None),
    }
}

/// Apply the priority order to already-gathered sources
pub fn merge(
    overrides: &ConfigOverrides,
    env_port: Option<u16>,
    toml_config: TomlConfig,
) -> Result<ServiceConfig> {
    let defaults = CompiledDefaults::for_current_platform();

    let fetch_timeout_seconds = toml_config
        .fetch_timeout_seconds
        .unwrap_or(defaults.fetch_timeout_seconds);
    if fetch_timeout_seconds == 0 {
        return Err(Error::Config("fetch_timeout_seconds must be positive".to_string()));
    }

    let unbounded_duration_seconds = toml_config
        .unbounded_duration_seconds
        .unwrap_or(defaults.unbounded_duration_seconds);
    if unbounded_duration_seconds == 0 {
        return Err(Error::Config(
            "unbounded_duration_seconds must be positive".to_string(),
        ));
    }

    let output_bitrate = toml_config
        .output_bitrate
        .unwrap_or(defaults.output_bitrate);
    if output_bitrate.trim().is_empty() {
        return Err(Error::Config("output_bitrate must not be empty".to_string()));
    }

    Ok(ServiceConfig {
        host: overrides
            .host
            .clone()
            .or(toml_config.host)
            .unwrap_or(defaults.host),
        port: overrides
            .port
            .or(env_port)
            .or(toml_config.port)
            .unwrap_or(defaults.port),
        scratch_dir: overrides
            .scratch_dir
            .clone()
            .or(toml_config.scratch_dir)
            .unwrap_or(defaults.scratch_dir),
        ffmpeg_path: overrides
            .ffmpeg_path
            .clone()
            .or(toml_config.ffmpeg_path)
            .unwrap_or(defaults.ffmpeg_path),
        fetch_timeout: Duration::from_secs(fetch_timeout_seconds),
        output_bitrate,
        unbounded_duration_seconds,
        log_level: overrides
            .log_level
            .clone()
            .unwrap_or(toml_config.logging.level),
    })
}
