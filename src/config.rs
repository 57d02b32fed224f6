//! Global configuration parsing and validation.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// Settings for the tmux-backed session adapter.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SessionConfig {
    /// tmux binary to invoke.
    #[serde(default = "default_tmux_binary")]
    pub tmux_binary: String,
    /// Upper bound for any single tmux invocation.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_seconds: u64,
    /// Delay between the interrupt keystroke and `kill-session` on graceful shutdown.
    #[serde(default = "default_graceful_grace")]
    pub graceful_grace_seconds: u64,
    /// Largest scrollback window `read_output` will request.
    #[serde(default = "default_max_capture_lines")]
    pub max_capture_lines: u32,
    /// Instruction typed into a session by `send_home`.
    #[serde(default = "default_wrap_up_message")]
    pub wrap_up_message: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tmux_binary: default_tmux_binary(),
            command_timeout_seconds: default_command_timeout(),
            graceful_grace_seconds: default_graceful_grace(),
            max_capture_lines: default_max_capture_lines(),
            wrap_up_message: default_wrap_up_message(),
        }
    }
}

impl SessionConfig {
    /// Per-invocation timeout as a [`Duration`].
    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_seconds)
    }

    /// Graceful shutdown grace period as a [`Duration`].
    #[must_use]
    pub fn graceful_grace(&self) -> Duration {
        Duration::from_secs(self.graceful_grace_seconds)
    }
}

/// Monitoring scheduler settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct MonitorConfig {
    /// Start the scheduler when the daemon boots.
    #[serde(default = "default_true")]
    pub autostart: bool,
    /// Seconds between ticks.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_seconds: u64,
    /// Heartbeat age after which an active agent is reported stale.
    #[serde(default = "default_stale_threshold")]
    pub stale_threshold_seconds: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            autostart: default_true(),
            tick_interval_seconds: default_tick_interval(),
            stale_threshold_seconds: default_stale_threshold(),
        }
    }
}

impl MonitorConfig {
    /// Tick cadence as a [`Duration`].
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_seconds)
    }

    /// Stale heartbeat threshold as a [`Duration`].
    #[must_use]
    pub fn stale_threshold(&self) -> Duration {
        Duration::from_secs(self.stale_threshold_seconds)
    }
}

fn default_true() -> bool {
    true
}

fn default_tmux_binary() -> String {
    "tmux".into()
}

fn default_command_timeout() -> u64 {
    5
}

fn default_graceful_grace() -> u64 {
    2
}

fn default_max_capture_lines() -> u32 {
    2000
}

fn default_wrap_up_message() -> String {
    "Please wrap up your current work: commit or save what you have, \
     write a short summary of where you left off, and then stop."
        .into()
}

fn default_tick_interval() -> u64 {
    60
}

fn default_stale_threshold() -> u64 {
    600
}

fn default_ipc_name() -> String {
    "agent-foreman".into()
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// `SQLite` database file; `:memory:` keeps everything in process.
    pub db_path: PathBuf,
    /// Named pipe / Unix socket identifier.
    #[serde(default = "default_ipc_name")]
    pub ipc_name: String,
    /// Optional shared secret required on every IPC request.
    #[serde(default)]
    pub ipc_auth_token: Option<String>,
    /// Session adapter settings.
    #[serde(default)]
    pub session: SessionConfig,
    /// Monitoring scheduler settings.
    #[serde(default)]
    pub monitor: MonitorConfig,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Whether the configured database lives only in memory.
    #[must_use]
    pub fn is_memory_db(&self) -> bool {
        self.db_path.as_os_str() == ":memory:"
    }

    fn validate(&mut self) -> Result<()> {
        if self.db_path.as_os_str().is_empty() {
            return Err(AppError::Config("db_path must not be empty".into()));
        }

        if self.ipc_name.trim().is_empty() {
            return Err(AppError::Config("ipc_name must not be empty".into()));
        }

        if self.session.tmux_binary.trim().is_empty() {
            return Err(AppError::Config(
                "session.tmux_binary must not be empty".into(),
            ));
        }

        if self.session.command_timeout_seconds == 0 {
            return Err(AppError::Config(
                "session.command_timeout_seconds must be greater than zero".into(),
            ));
        }

        if self.session.max_capture_lines == 0 {
            return Err(AppError::Config(
                "session.max_capture_lines must be greater than zero".into(),
            ));
        }

        if self.monitor.tick_interval_seconds == 0 {
            return Err(AppError::Config(
                "monitor.tick_interval_seconds must be greater than zero".into(),
            ));
        }

        // Blank tokens are treated as unset.
        if self
            .ipc_auth_token
            .as_deref()
            .is_some_and(|token| token.trim().is_empty())
        {
            self.ipc_auth_token = None;
        }

        Ok(())
    }
}
