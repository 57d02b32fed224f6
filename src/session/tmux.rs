//! tmux-backed [`SessionHandle`].
//!
//! Every call is a discrete `tmux` invocation built from an argument
//! vector; agent-supplied text is passed as a single literal argument and
//! never reaches a shell. Targets use tmux's exact-match form (`=name`)
//! so `foo` cannot resolve to `foobar`. A stored name tmux cannot
//! address is reported as `SessionUnavailable`: no such session can exist.

use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::{AppError, Result};

use super::{validate_session_name, KillMode, ProbeFuture, SessionFuture, SessionHandle};

/// Client for driving agent sessions through the tmux CLI.
#[derive(Debug, Clone)]
pub struct TmuxSessions {
    tmux_path: String,
    command_timeout: Duration,
    graceful_grace: Duration,
}

impl TmuxSessions {
    /// Build a client from session configuration.
    #[must_use]
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            tmux_path: config.tmux_binary.clone(),
            command_timeout: config.command_timeout(),
            graceful_grace: config.graceful_grace(),
        }
    }

    /// Run one tmux command, bounded by the configured timeout.
    async fn run(&self, args: &[&str]) -> Result<Output> {
        let child = Command::new(&self.tmux_path)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(self.command_timeout, child).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(err)) => Err(AppError::SessionUnavailable(format!(
                "failed to execute {}: {err}",
                self.tmux_path
            ))),
            Err(_) => Err(AppError::SessionUnavailable(format!(
                "tmux {} timed out after {}s",
                args.first().copied().unwrap_or_default(),
                self.command_timeout.as_secs()
            ))),
        }
    }

    /// Run a command and map a non-zero exit to `SessionUnavailable`.
    async fn run_checked(&self, session: &str, args: &[&str]) -> Result<Output> {
        let output = self.run(args).await?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(unavailable(session, &output))
        }
    }

    async fn send_literal(&self, session: &str, text: &str, press_enter: bool) -> Result<()> {
        addressable(session)?;
        let target = pane_target(session);

        if !text.is_empty() {
            self.run_checked(session, &["send-keys", "-t", &target, "-l", "--", text])
                .await?;
        }
        if press_enter {
            self.run_checked(session, &["send-keys", "-t", &target, "Enter"])
                .await?;
        }
        debug!(session, bytes = text.len(), press_enter, "keys sent");
        Ok(())
    }

    async fn capture(&self, session: &str, last_n_lines: u32) -> Result<String> {
        addressable(session)?;
        let target = pane_target(session);
        let start = format!("-{last_n_lines}");

        let output = self
            .run_checked(session, &["capture-pane", "-p", "-J", "-t", &target, "-S", &start])
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(tail_lines(
            &stdout,
            usize::try_from(last_n_lines).unwrap_or(usize::MAX),
        ))
    }

    async fn kill(&self, session: &str, mode: KillMode) -> Result<()> {
        addressable(session)?;
        let target = session_target(session);

        match mode {
            KillMode::Graceful => {
                // Interrupt the foreground program first; the session may
                // close by itself during the grace period.
                if let Err(err) = self
                    .run_checked(session, &["send-keys", "-t", &pane_target(session), "C-c"])
                    .await
                {
                    debug!(session, %err, "interrupt keystroke not delivered");
                }
                tokio::time::sleep(self.graceful_grace).await;
                if !self.exists(session).await {
                    return Ok(());
                }
            }
            KillMode::Forced => {
                self.signal_panes(session).await?;
            }
        }

        let output = self.run(&["kill-session", "-t", &target]).await?;
        if output.status.success() || (mode == KillMode::Forced && !self.exists(session).await) {
            Ok(())
        } else {
            Err(unavailable(session, &output))
        }
    }

    /// Send `SIGKILL` to the process group of every pane in the session.
    async fn signal_panes(&self, session: &str) -> Result<()> {
        let output = self
            .run_checked(
                session,
                &["list-panes", "-s", "-t", &session_target(session), "-F", "#{pane_pid}"],
            )
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        for pid in stdout.lines().filter_map(|line| line.trim().parse::<i32>().ok()) {
            kill_process_group(session, pid);
        }
        Ok(())
    }

    async fn exists(&self, session: &str) -> bool {
        if validate_session_name(session).is_err() {
            return false;
        }
        self.run(&["has-session", "-t", &session_target(session)])
            .await
            .is_ok_and(|output| output.status.success())
    }
}

impl SessionHandle for TmuxSessions {
    fn send_keys<'a>(
        &'a self,
        session: &'a str,
        text: &'a str,
        press_enter: bool,
    ) -> SessionFuture<'a, ()> {
        Box::pin(self.send_literal(session, text, press_enter))
    }

    fn capture_pane<'a>(&'a self, session: &'a str, last_n_lines: u32) -> SessionFuture<'a, String> {
        Box::pin(self.capture(session, last_n_lines))
    }

    fn kill_session<'a>(&'a self, session: &'a str, mode: KillMode) -> SessionFuture<'a, ()> {
        Box::pin(self.kill(session, mode))
    }

    fn has_session<'a>(&'a self, session: &'a str) -> ProbeFuture<'a> {
        Box::pin(self.exists(session))
    }
}

fn addressable(session: &str) -> Result<()> {
    validate_session_name(session).map_err(|_| {
        AppError::SessionUnavailable(format!("{session:?} is not a valid tmux session name"))
    })
}

fn session_target(session: &str) -> String {
    format!("={session}")
}

fn pane_target(session: &str) -> String {
    format!("={session}:")
}

fn unavailable(session: &str, output: &Output) -> AppError {
    let stderr = String::from_utf8_lossy(&output.stderr);
    AppError::SessionUnavailable(format!("{session}: {}", stderr.trim()))
}

/// Keep the last `n` lines, ignoring the blank padding tmux appends below
/// the cursor.
fn tail_lines(raw: &str, n: usize) -> String {
    let lines: Vec<&str> = raw.lines().collect();
    let end = lines
        .iter()
        .rposition(|line| !line.trim().is_empty())
        .map_or(0, |idx| idx + 1);
    let start = end.saturating_sub(n);
    lines[start..end].join("\n")
}

#[cfg(unix)]
fn kill_process_group(session: &str, pid: i32) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    match killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => debug!(session, pid, "pane process group killed"),
        Err(err) => warn!(session, pid, %err, "failed to kill pane process group"),
    }
}

#[cfg(not(unix))]
fn kill_process_group(session: &str, pid: i32) {
    debug!(session, pid, "process signals unsupported; relying on kill-session");
}
