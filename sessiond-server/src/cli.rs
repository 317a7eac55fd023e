//! Command-line flags.
//!
//! Every flag can also be supplied through its `SESSIOND_*` environment
//! variable. Flags win over the config file.

use clap::Parser;
use std::path::PathBuf;

use crate::config::Config;

#[derive(Debug, Parser)]
#[command(name = "sessiond-server", version, about = "Agent session lifecycle server")]
pub struct Args {
    /// Data directory holding config.toml and the database
    #[arg(long, env = "SESSIOND_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, env = "SESSIOND_BIND")]
    pub bind: Option<String>,

    /// SQLite database path
    #[arg(long, env = "SESSIOND_DATABASE_PATH")]
    pub database_path: Option<PathBuf>,

    /// Control-plane base URL
    #[arg(long, env = "SESSIOND_CONTROL_PLANE_URL")]
    pub control_plane_url: Option<String>,

    /// Control-plane service token
    #[arg(long, env = "SESSIOND_CONTROL_PLANE_TOKEN", hide_env_values = true)]
    pub control_plane_token: Option<String>,

    /// Control-plane request timeout in milliseconds
    #[arg(long, env = "SESSIOND_NOTIFY_TIMEOUT_MS")]
    pub notify_timeout_ms: Option<u64>,

    /// Default session lifetime in milliseconds
    #[arg(long, env = "SESSIOND_MAX_DURATION_MS")]
    pub max_duration_ms: Option<i64>,

    /// Default inactivity window in milliseconds
    #[arg(long, env = "SESSIOND_MAX_IDLE_TIME_MS")]
    pub max_idle_time_ms: Option<i64>,

    /// Arm the first alarm at the sooner of the idle and max-duration deadlines
    #[arg(long, env = "SESSIOND_PROMPT_MAX_DURATION")]
    pub prompt_max_duration: bool,
}

impl Args {
    /// Overlay flags onto a loaded configuration
    pub fn apply(&self, config: &mut Config) {
        if let Some(bind) = &self.bind {
            config.bind = bind.clone();
        }
        if let Some(path) = &self.database_path {
            config.database_path = path.clone();
        }
        if let Some(url) = &self.control_plane_url {
            config.control_plane.url = Some(url.clone());
        }
        if let Some(token) = &self.control_plane_token {
            config.control_plane.token = Some(token.clone());
        }
        if let Some(timeout) = self.notify_timeout_ms {
            config.control_plane.timeout_ms = timeout;
        }
        if let Some(ms) = self.max_duration_ms {
            config.session.max_duration_ms = ms;
        }
        if let Some(ms) = self.max_idle_time_ms {
            config.session.max_idle_time_ms = ms;
        }
        if self.prompt_max_duration {
            config.session.prompt_max_duration = true;
        }
    }
}
