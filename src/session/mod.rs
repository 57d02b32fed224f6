//! Session handle abstraction over external interactive sessions.
//!
//! The [`SessionHandle`] trait decouples the supervisor and the reminder
//! dispatcher from the terminal multiplexer. Sessions are addressed purely
//! by name and may vanish at any time; every primitive reports a missing
//! or unreachable session as [`AppError::SessionUnavailable`], never as a
//! panic or an indefinite wait.

pub mod tmux;

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::{AppError, Result};

pub use tmux::TmuxSessions;

/// Boxed future returned by [`SessionHandle`] primitives.
pub type SessionFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Boxed future returned by [`SessionHandle::has_session`].
pub type ProbeFuture<'a> = Pin<Box<dyn Future<Output = bool> + Send + 'a>>;

/// How a session should be terminated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum KillMode {
    /// Interrupt the foreground program, give it a grace period, then close.
    Graceful,
    /// Kill the pane processes outright, then close.
    Forced,
}

/// Primitives the core requires from an interactive session backend.
pub trait SessionHandle: Send + Sync {
    /// Type `text` literally into the session, optionally followed by Enter.
    ///
    /// # Errors
    ///
    /// Returns `AppError::SessionUnavailable` if the session does not exist
    /// or the backend does not answer in time.
    fn send_keys<'a>(
        &'a self,
        session: &'a str,
        text: &'a str,
        press_enter: bool,
    ) -> SessionFuture<'a, ()>;

    /// Capture the most recent `last_n_lines` lines of scrollback.
    ///
    /// # Errors
    ///
    /// Returns `AppError::SessionUnavailable` if the session does not exist
    /// or the backend does not answer in time.
    fn capture_pane<'a>(&'a self, session: &'a str, last_n_lines: u32) -> SessionFuture<'a, String>;

    /// Terminate a session.
    ///
    /// Callers treat failures as informational: a session that is already
    /// gone is the expected outcome of a kill.
    ///
    /// # Errors
    ///
    /// Returns `AppError::SessionUnavailable` if the session could not be
    /// reached.
    fn kill_session<'a>(&'a self, session: &'a str, mode: KillMode) -> SessionFuture<'a, ()>;

    /// Probe whether a session currently exists.
    fn has_session<'a>(&'a self, session: &'a str) -> ProbeFuture<'a>;
}

/// Check that `name` is usable as an exact tmux session target.
///
/// # Errors
///
/// Returns `AppError::InvalidInput` for empty names or names containing
/// target separators (`:`, `.`) or control characters.
pub fn validate_session_name(name: &str) -> Result<()> {
    let bad_char = |c: char| c == ':' || c == '.' || c.is_control();
    if name.is_empty() || name.chars().any(bad_char) {
        return Err(AppError::InvalidInput(format!("invalid session name {name:?}")));
    }
    Ok(())
}
