//! Server configuration.
//!
//! Configuration is loaded from multiple sources with precedence:
//! 1. Command-line flags (which also read `SESSIOND_*` environment variables)
//! 2. Config file (`$SESSIOND_DIR/config.toml`)
//! 3. Default values

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sessiond_core::types::{DEFAULT_MAX_DURATION_MS, DEFAULT_MAX_IDLE_TIME_MS};
use std::path::{Path, PathBuf};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP server binds to
    pub bind: String,
    /// Database path, relative paths resolve against the data directory
    pub database_path: PathBuf,
    /// Control-plane callback settings
    pub control_plane: ControlPlaneConfig,
    /// Session lifecycle defaults
    pub session: SessionDefaults,
    /// Path to configuration file
    #[serde(skip)]
    pub config_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlPlaneConfig {
    /// Base URL; notifications are skipped when unset
    pub url: Option<String>,
    /// Service token sent as the Authorization header
    pub token: Option<String>,
    /// File holding the service token, used when `token` is unset
    pub token_file: Option<PathBuf>,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionDefaults {
    /// Absolute session lifetime when the caller does not pass one
    pub max_duration_ms: i64,
    /// Inactivity window when the caller does not pass one
    pub max_idle_time_ms: i64,
    /// Arm the first alarm at the sooner of the idle and max-duration deadlines
    pub prompt_max_duration: bool,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            token_file: None,
            timeout_ms: 10_000,
        }
    }
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            max_duration_ms: DEFAULT_MAX_DURATION_MS,
            max_idle_time_ms: DEFAULT_MAX_IDLE_TIME_MS,
            prompt_max_duration: false,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".sessiond")
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            bind: "127.0.0.1:8787".to_string(),
            database_path: PathBuf::from("sessions.db"),
            control_plane: ControlPlaneConfig::default(),
            session: SessionDefaults::default(),
            config_path: data_dir.join("config.toml"),
        }
    }
}

impl Config {
    /// Load configuration from the data directory
    ///
    /// Standard directory structure:
    /// ```text
    /// ~/.sessiond/
    /// ├── config.toml           # Main configuration (optional)
    /// ├── sessions.db           # Session state and alarms
    /// └── control-plane-token   # Service token (optional)
    /// ```
    ///
    /// `SESSIOND_DIR` overrides the directory when `data_dir` is `None`.
    pub fn load(data_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = data_dir
            .or_else(|| std::env::var("SESSIOND_DIR").ok().map(PathBuf::from))
            .unwrap_or_else(default_data_dir);

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let config_path = data_dir.join("config.toml");
        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {:?}", config_path))?;
            toml::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse {:?}", config_path))?
        } else {
            Config::default()
        };

        if config.database_path.is_relative() {
            config.database_path = data_dir.join(&config.database_path);
        }
        if config.control_plane.token.is_none() && config.control_plane.token_file.is_none() {
            let token_file = data_dir.join("control-plane-token");
            if token_file.exists() {
                config.control_plane.token_file = Some(token_file);
            }
        }
        config.config_path = config_path;

        Ok(config)
    }

    /// Service token for the control plane, from config or token file
    pub fn control_plane_token(&self) -> Result<Option<String>> {
        if let Some(token) = &self.control_plane.token {
            return Ok(Some(token.clone()));
        }
        match &self.control_plane.token_file {
            Some(path) => Ok(Some(read_token(path)?)),
            None => Ok(None),
        }
    }
}

fn read_token(path: &Path) -> Result<String> {
    let token = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read token file {:?}", path))?;
    Ok(token.trim().to_string())
}
