//! Monitoring scheduler counters and scan results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::agent::AgentStatus;

/// Counters maintained by the monitoring scheduler.
///
/// Only a tick mutates these; callers receive copies. The exception is
/// `missed_ticks`, which counts firings that found the tick gate held and
/// so is bumped by the firing that was skipped. After the scheduler is
/// stopped nothing mutates them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonitoringStats {
    /// Completed ticks.
    pub ticks: u64,
    /// Reminder messages delivered to sessions.
    pub reminders_sent: u64,
    /// Failed deliveries and failed reminder evaluations.
    pub errors: u64,
    /// Interval firings skipped because a tick was still running.
    pub missed_ticks: u64,
    /// Stale agents found by the most recent scan.
    pub stale_agents: u64,
    /// Completion time of the most recent tick.
    pub last_tick_at: Option<DateTime<Utc>>,
}

/// Heartbeat age of one agent, as seen by the latest scan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentIdle {
    /// Agent identifier.
    pub agent_id: String,
    /// Role of the agent.
    pub role_type: String,
    /// Persisted status at scan time.
    pub status: AgentStatus,
    /// Seconds since the last heartbeat.
    pub idle_seconds: u64,
    /// Active and idle past the stale threshold.
    pub stale: bool,
}

/// Snapshot returned by the scheduler's status query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonitorStatus {
    /// Whether the tick loop is running.
    pub running: bool,
    /// Counters as of the last completed tick.
    pub stats: MonitoringStats,
    /// Idle report from the last completed tick.
    pub idle: Vec<AgentIdle>,
}
