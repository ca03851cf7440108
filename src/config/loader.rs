//! Configuration loading from disk and the environment.
//!
//! # Data Flow
//! ```text
//! --config / APP_CONFIG → TOML file (defaults when absent)
//!     → environment overrides (SERVER_HOST, SERVER_PORT, API_PREFIX, WORKER_POOL_SIZE)
//!     → validation
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable naming the config file when no path is given.
pub const CONFIG_ENV: &str = "APP_CONFIG";

pub const SERVER_HOST_ENV: &str = "SERVER_HOST";
pub const SERVER_PORT_ENV: &str = "SERVER_PORT";
pub const API_PREFIX_ENV: &str = "API_PREFIX";
pub const WORKER_POOL_SIZE_ENV: &str = "WORKER_POOL_SIZE";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid {var}={value:?}: {reason}")]
    Env {
        var: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

/// Load from `path`, falling back to `APP_CONFIG`, then to defaults.
///
/// A named file that does not exist is not an error: the defaults are used
/// and a warning is logged. Environment overrides apply either way, before
/// validation.
pub fn load_or_default(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
    let mut config = match path.map(Path::to_path_buf).or(from_env) {
        Some(path) if !path.exists() => {
            tracing::warn!(path = %path.display(), "Configuration file not found, using defaults");
            AppConfig::default()
        }
        Some(path) => {
            let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            let config: AppConfig = toml::from_str(&content)?;
            tracing::info!(path = %path.display(), "Configuration loaded");
            config
        }
        None => {
            tracing::info!("No configuration file given, using defaults");
            AppConfig::default()
        }
    };

    apply_env_overrides(&mut config)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply overrides from the process environment.
pub fn apply_env_overrides(config: &mut AppConfig) -> Result<(), ConfigError> {
    apply_overrides(config, |var| std::env::var(var).ok())
}

/// Apply overrides from `lookup`. Unset variables leave the config untouched.
pub fn apply_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let (mut host, mut port) = split_bind_address(&config.server.bind_address);
    let mut rebind = false;

    if let Some(value) = lookup(SERVER_HOST_ENV) {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(env_error(SERVER_HOST_ENV, value, "must not be empty"));
        }
        host = if trimmed.contains(':') && !trimmed.starts_with('[') {
            format!("[{}]", trimmed)
        } else {
            trimmed.to_string()
        };
        rebind = true;
        tracing::info!(host = %host, "Override server host from environment");
    }

    if let Some(value) = lookup(SERVER_PORT_ENV) {
        port = match value.trim().parse::<u16>() {
            Ok(p) if p > 0 => p.to_string(),
            _ => return Err(env_error(SERVER_PORT_ENV, value, "must be between 1 and 65535")),
        };
        rebind = true;
        tracing::info!(port = %port, "Override server port from environment");
    }
    if rebind {
        config.server.bind_address = format!("{}:{}", host, port);
    }

    if let Some(value) = lookup(API_PREFIX_ENV) {
        tracing::info!(api_prefix = %value, "Override API prefix from environment");
        config.server.api_prefix = value;
    }

    if let Some(value) = lookup(WORKER_POOL_SIZE_ENV) {
        config.worker.pool_size = match value.trim().parse::<usize>() {
            Ok(size) if size >= 1 => size,
            _ => return Err(env_error(WORKER_POOL_SIZE_ENV, value, "must be an integer of at least 1")),
        };
        tracing::info!(pool_size = config.worker.pool_size, "Override worker pool size from environment");
    }

    Ok(())
}

fn split_bind_address(address: &str) -> (String, String) {
    match address.rsplit_once(':') {
        Some((host, port)) => (host.to_string(), port.to_string()),
        None => (address.to_string(), "8080".to_string()),
    }
}

fn env_error(var: &'static str, value: String, reason: &'static str) -> ConfigError {
    ConfigError::Env { var, value, reason }
}
