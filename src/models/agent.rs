//! Agent model and lifecycle helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted lifecycle status for an agent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Agent is attached to a live session.
    Active,
    /// Agent has no live session.
    Offline,
}

impl AgentStatus {
    /// Storage representation used by the `agent.status` column.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Offline => "offline",
        }
    }
}

/// Observable lifecycle phase, including the non-persisted wrap-up phase.
///
/// `WrappingUp` is never stored: it means the agent is still `Active` in
/// the registry but has been asked to finish via `send_home`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentPhase {
    /// Running normally.
    Active,
    /// Running, and has been told to wrap up.
    WrappingUp,
    /// Not running.
    Offline,
}

/// Agent record persisted in `SQLite`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Agent {
    /// Unique record identifier.
    pub id: String,
    /// Owning project.
    pub project_id: String,
    /// Role this agent plays within the project (e.g. `reviewer`).
    pub role_type: String,
    /// Persisted lifecycle status.
    pub status: AgentStatus,
    /// tmux session name backing this agent, if any.
    pub tmux_session: Option<String>,
    /// Last heartbeat reported by the agent.
    pub last_heartbeat: DateTime<Utc>,
    /// Model identifier the agent runs.
    pub model: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    /// Construct a new agent with a generated identifier.
    ///
    /// The agent starts `Active` when a session is supplied and `Offline`
    /// otherwise.
    #[must_use]
    pub fn new(
        project_id: String,
        role_type: String,
        model: String,
        tmux_session: Option<String>,
    ) -> Self {
        let now = Utc::now();
        let status = if tmux_session.is_some() {
            AgentStatus::Active
        } else {
            AgentStatus::Offline
        };
        Self {
            id: Uuid::new_v4().to_string(),
            project_id,
            role_type,
            status,
            tmux_session,
            last_heartbeat: now,
            model,
            created_at: now,
            updated_at: now,
        }
    }

    /// Session name, only when the agent is `Active`.
    #[must_use]
    pub fn live_session(&self) -> Option<&str> {
        match self.status {
            AgentStatus::Active => self.tmux_session.as_deref(),
            AgentStatus::Offline => None,
        }
    }

    /// Seconds since the last heartbeat, floored at zero.
    #[must_use]
    pub fn idle_seconds(&self, now: DateTime<Utc>) -> u64 {
        u64::try_from(now.signed_duration_since(self.last_heartbeat).num_seconds()).unwrap_or(0)
    }
}

/// Partial update applied by [`AgentRepo::update`](crate::persistence::agent_repo::AgentRepo::update).
///
/// `tmux_session` is doubly optional: `Some(None)` clears the column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentPatch {
    /// New status.
    pub status: Option<AgentStatus>,
    /// New session name, or `Some(None)` to clear it.
    pub tmux_session: Option<Option<String>>,
    /// New heartbeat timestamp.
    pub last_heartbeat: Option<DateTime<Utc>>,
    /// New model identifier.
    pub model: Option<String>,
}

impl AgentPatch {
    /// Patch that marks an agent offline and detaches its session.
    #[must_use]
    pub fn offline() -> Self {
        Self {
            status: Some(AgentStatus::Offline),
            tmux_session: Some(None),
            ..Self::default()
        }
    }

    /// Whether the patch touches no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.tmux_session.is_none()
            && self.last_heartbeat.is_none()
            && self.model.is_none()
    }
}
