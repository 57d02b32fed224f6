//! Agent lifecycle supervision: wrap-up, clock-out, force-home, kill,
//! and I/O pass-through.
//!
//! Termination is best-effort then commit: the session kill is attempted
//! and its failure only logged, after which the registry update always
//! runs. Reads and writes that discover a dead session heal the agent's
//! status to `Offline` before returning.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, instrument, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::SessionConfig;
use crate::models::agent::{Agent, AgentPatch, AgentPhase, AgentStatus};
use crate::persistence::agent_repo::AgentRepo;
use crate::persistence::content_repo::ContentRepo;
use crate::persistence::db::Database;
use crate::session::{KillMode, SessionHandle};
use crate::{AppError, Result};

/// Output returned by `read_output` when the agent has no reachable session.
pub const SESSION_UNAVAILABLE_OUTPUT: &str = "[session unavailable: agent is offline]";

/// Scrollback lines returned by `read_output` when the caller does not say.
pub const DEFAULT_OUTPUT_LINES: u32 = 50;

/// Result of `read_output`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutputSnapshot {
    /// Agent the output belongs to.
    pub agent_id: String,
    /// Status after the read, including any self-healing transition.
    pub status: AgentStatus,
    /// Captured text, or [`SESSION_UNAVAILABLE_OUTPUT`].
    pub output: String,
}

/// Result of `kill`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KillReport {
    /// Deleted agent.
    pub agent_id: String,
    /// Content rows that lost their author.
    pub content_reassigned: u64,
}

/// Lifecycle controller over agents and their sessions.
pub struct Supervisor {
    agents: AgentRepo,
    content: ContentRepo,
    sessions: Arc<dyn SessionHandle>,
    clock: Arc<dyn Clock>,
    wrap_up_message: String,
    max_capture_lines: u32,
    /// Agents told to wrap up that are still `Active`.
    wrapping_up: Mutex<HashSet<String>>,
}

impl Supervisor {
    /// Build a supervisor over the given database and session backend.
    #[must_use]
    pub fn new(db: Arc<Database>, sessions: Arc<dyn SessionHandle>, config: &SessionConfig) -> Self {
        Self {
            agents: AgentRepo::new(Arc::clone(&db)),
            content: ContentRepo::new(db),
            sessions,
            clock: Arc::new(SystemClock),
            wrap_up_message: config.wrap_up_message.clone(),
            max_capture_lines: config.max_capture_lines,
            wrapping_up: Mutex::new(HashSet::new()),
        }
    }

    /// Replace the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Ask an agent to finish its work. Status is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown agent,
    /// `AppError::InvalidState` if the agent has no session, or
    /// `AppError::SessionUnavailable` if the message cannot be delivered.
    #[instrument(skip(self))]
    pub async fn send_home(&self, agent_id: &str) -> Result<Agent> {
        let agent = self.load(agent_id).await?;
        let Some(session) = agent.live_session() else {
            return Err(AppError::InvalidState(format!(
                "agent {agent_id} has no session to message"
            )));
        };

        self.sessions
            .send_keys(session, &self.wrap_up_message, true)
            .await?;

        self.wrapping_up.lock().await.insert(agent.id.clone());
        info!(session, "wrap-up instruction sent");
        Ok(agent)
    }

    /// Gracefully end an agent's session and mark it offline.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown agent. Session failures
    /// are logged and never block the status update.
    #[instrument(skip(self))]
    pub async fn clock_out(&self, agent_id: &str) -> Result<Agent> {
        self.retire(agent_id, KillMode::Graceful).await
    }

    /// Forcibly end an unresponsive agent's session and mark it offline.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown agent. Session failures
    /// are logged and never block the status update.
    #[instrument(skip(self))]
    pub async fn force_home(&self, agent_id: &str) -> Result<Agent> {
        self.retire(agent_id, KillMode::Forced).await
    }

    /// Kill the session, orphan the agent's content, and delete the agent.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown agent, or `AppError::Db`
    /// if the reassignment or deletion fails.
    #[instrument(skip(self))]
    pub async fn kill(&self, agent_id: &str) -> Result<KillReport> {
        let agent = self.load(agent_id).await?;

        if let Some(session) = agent.tmux_session.as_deref() {
            self.kill_best_effort(session, KillMode::Forced).await;
        }

        let content_reassigned = self.content.reassign_author(&agent.id).await?;
        self.agents.delete(&agent.id).await?;
        self.wrapping_up.lock().await.remove(&agent.id);

        info!(content_reassigned, "agent killed");
        Ok(KillReport {
            agent_id: agent.id,
            content_reassigned,
        })
    }

    /// Type a command into the agent's session.
    ///
    /// A session that turns out to be gone marks the agent offline before
    /// the error is returned.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidInput` for an empty command,
    /// `AppError::NotFound` for an unknown agent, or
    /// `AppError::SessionUnavailable` if the session cannot be reached.
    #[instrument(skip(self, command), fields(bytes = command.len()))]
    pub async fn send_input(&self, agent_id: &str, command: &str, press_enter: bool) -> Result<()> {
        if command.is_empty() {
            return Err(AppError::InvalidInput("command must not be empty".into()));
        }

        let agent = self.load(agent_id).await?;
        let Some(session) = agent.live_session() else {
            self.heal_detached(&agent).await?;
            return Err(AppError::SessionUnavailable(format!(
                "agent {agent_id} has no live session"
            )));
        };

        match self.sessions.send_keys(session, command, press_enter).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_session_unavailable() => {
                self.mark_session_dead(&agent, session).await?;
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Capture the agent's recent output.
    ///
    /// Never fails because of the session: a dead session marks the agent
    /// offline and yields [`SESSION_UNAVAILABLE_OUTPUT`].
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown agent, or `AppError::Db`
    /// if the self-healing update fails.
    #[instrument(skip(self))]
    pub async fn read_output(&self, agent_id: &str, lines: u32) -> Result<OutputSnapshot> {
        let lines = lines.min(self.max_capture_lines).max(1);
        let agent = self.load(agent_id).await?;

        let Some(session) = agent.live_session() else {
            self.heal_detached(&agent).await?;
            return Ok(unavailable_snapshot(agent.id));
        };

        match self.sessions.capture_pane(session, lines).await {
            Ok(output) => Ok(OutputSnapshot {
                agent_id: agent.id,
                status: agent.status,
                output,
            }),
            Err(err) => {
                warn!(session, %err, "capture failed");
                self.mark_session_dead(&agent, session).await?;
                Ok(unavailable_snapshot(agent.id))
            }
        }
    }

    /// Stamp the agent's heartbeat with the current time.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown agent.
    pub async fn record_heartbeat(&self, agent_id: &str) -> Result<Agent> {
        self.agents.touch_heartbeat(agent_id, self.clock.now()).await
    }

    /// Fetch an agent record.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown agent.
    pub async fn status(&self, agent_id: &str) -> Result<Agent> {
        self.load(agent_id).await
    }

    /// Lifecycle phase including the transient wrap-up phase.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown agent.
    pub async fn phase(&self, agent_id: &str) -> Result<AgentPhase> {
        let agent = self.load(agent_id).await?;
        if agent.status == AgentStatus::Offline {
            return Ok(AgentPhase::Offline);
        }
        if self.wrapping_up.lock().await.contains(&agent.id) {
            Ok(AgentPhase::WrappingUp)
        } else {
            Ok(AgentPhase::Active)
        }
    }

    /// Mark offline every active agent whose session no longer exists.
    ///
    /// Returns the number of agents healed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if listing or updating agents fails.
    #[instrument(skip(self))]
    pub async fn reconcile(&self) -> Result<u64> {
        let mut healed = 0;
        for agent in self.agents.list_all().await? {
            if agent.status != AgentStatus::Active {
                continue;
            }
            let alive = match agent.tmux_session.as_deref() {
                Some(session) => self.sessions.has_session(session).await,
                None => false,
            };
            if !alive {
                self.agents.update(&agent.id, &AgentPatch::offline()).await?;
                self.wrapping_up.lock().await.remove(&agent.id);
                healed += 1;
            }
        }
        info!(healed, "registry reconciled with live sessions");
        Ok(healed)
    }

    async fn load(&self, agent_id: &str) -> Result<Agent> {
        self.agents
            .get_by_id(agent_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("agent {agent_id} not found")))
    }

    async fn retire(&self, agent_id: &str, mode: KillMode) -> Result<Agent> {
        let agent = self.load(agent_id).await?;

        if let Some(session) = agent.tmux_session.as_deref() {
            self.kill_best_effort(session, mode).await;
        }

        let updated = self.agents.update(&agent.id, &AgentPatch::offline()).await?;
        self.wrapping_up.lock().await.remove(&agent.id);
        info!(?mode, "agent offline");
        Ok(updated)
    }

    async fn kill_best_effort(&self, session: &str, mode: KillMode) {
        match self.sessions.kill_session(session, mode).await {
            Ok(()) => info!(session, ?mode, "session terminated"),
            Err(err) => warn!(session, ?mode, %err, "session kill failed; continuing"),
        }
    }

    /// Mark every agent attached to a dead session offline.
    async fn mark_session_dead(&self, agent: &Agent, session: &str) -> Result<()> {
        let affected = self.agents.mark_offline_where_session(session).await?;
        self.wrapping_up.lock().await.remove(&agent.id);
        warn!(session, affected, "session unavailable; agents marked offline");
        Ok(())
    }

    /// Clear an `Active` status that has no session behind it.
    async fn heal_detached(&self, agent: &Agent) -> Result<()> {
        if agent.status == AgentStatus::Active {
            self.agents.update(&agent.id, &AgentPatch::offline()).await?;
            self.wrapping_up.lock().await.remove(&agent.id);
            warn!(agent_id = %agent.id, "active agent without session marked offline");
        }
        Ok(())
    }
}

fn unavailable_snapshot(agent_id: String) -> OutputSnapshot {
    OutputSnapshot {
        agent_id,
        status: AgentStatus::Offline,
        output: SESSION_UNAVAILABLE_OUTPUT.to_owned(),
    }
}

/// Per-agent mutual exclusion for callers that issue concurrent operations.
///
/// The supervisor itself does not serialize operations on the same agent;
/// callers hold the agent's guard for the duration of each call.
#[derive(Clone, Default)]
pub struct AgentLocks {
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl AgentLocks {
    /// Acquire the lock for `agent_id`, waiting if another caller holds it.
    pub async fn lock(&self, agent_id: &str) -> OwnedMutexGuard<()> {
        let entry = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(agent_id.to_owned()).or_default())
        };
        entry.lock_owned().await
    }

    /// Drop the lock entry for a deleted agent.
    pub async fn forget(&self, agent_id: &str) {
        self.locks.lock().await.remove(agent_id);
    }
}
