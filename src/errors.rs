//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Requested agent, reminder, or content row does not exist.
    NotFound(String),
    /// Missing or malformed input fields.
    InvalidInput(String),
    /// The entity exists but is not in a state that permits the operation.
    InvalidState(String),
    /// Transport failure or timeout talking to a session. Expected, non-fatal.
    SessionUnavailable(String),
    /// The monitoring scheduler was started while already running.
    AlreadyRunning(String),
    /// The monitoring scheduler was stopped while not running.
    NotRunning(String),
    /// Unexpected internal failure.
    Internal(String),
    /// Configuration parsing or validation failure.
    Config(String),
    /// Persistence failure when interacting with `SQLite`.
    Db(String),
    /// IPC communication failure.
    Ipc(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::InvalidState(msg) => write!(f, "invalid state: {msg}"),
            Self::SessionUnavailable(msg) => write!(f, "session unavailable: {msg}"),
            Self::AlreadyRunning(msg) => write!(f, "already running: {msg}"),
            Self::NotRunning(msg) => write!(f, "not running: {msg}"),
            Self::Internal(msg) => write!(f, "internal: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Db(msg) => write!(f, "db: {msg}"),
            Self::Ipc(msg) => write!(f, "ipc: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// Whether this error reports a vanished or unreachable session.
    #[must_use]
    pub fn is_session_unavailable(&self) -> bool {
        matches!(self, Self::SessionUnavailable(_))
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
