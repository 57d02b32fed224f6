//! Delivery of due scheduled reminders to matching agents.
//!
//! A reminder targets every `Active` agent in its project whose role
//! matches `target_role_type`. Delivery failures are counted and logged
//! per agent; they never stop the remaining deliveries, and they never
//! change an agent's status (the supervisor owns self-healing).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::models::reminder::ScheduledReminder;
use crate::persistence::agent_repo::AgentRepo;
use crate::persistence::db::Database;
use crate::persistence::reminder_repo::ReminderRepo;
use crate::session::SessionHandle;
use crate::Result;

/// Outcome of one dispatch pass.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Active reminders considered.
    pub evaluated: u64,
    /// Reminders that were due and fired.
    pub fired: u64,
    /// Messages delivered to sessions.
    pub sent: u64,
    /// Failed deliveries and failed reminder bookkeeping.
    pub errors: u64,
}

/// Sends due reminders into agent sessions.
pub struct ReminderDispatcher {
    agents: AgentRepo,
    reminders: ReminderRepo,
    sessions: Arc<dyn SessionHandle>,
}

impl ReminderDispatcher {
    /// Build a dispatcher over the given database and session backend.
    #[must_use]
    pub fn new(db: Arc<Database>, sessions: Arc<dyn SessionHandle>) -> Self {
        Self {
            agents: AgentRepo::new(Arc::clone(&db)),
            reminders: ReminderRepo::new(db),
            sessions,
        }
    }

    /// Fire every reminder due at `now`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` only if the active reminders cannot be
    /// listed. Per-reminder and per-agent failures are counted in the
    /// summary instead.
    pub async fn dispatch_due(&self, now: DateTime<Utc>) -> Result<DispatchSummary> {
        let mut summary = DispatchSummary::default();

        for reminder in self.reminders.list_active().await? {
            summary.evaluated += 1;
            if !reminder.is_due(now) {
                continue;
            }
            self.fire(&reminder, now, &mut summary).await;
        }

        if summary.fired > 0 {
            info!(
                fired = summary.fired,
                sent = summary.sent,
                errors = summary.errors,
                "reminders dispatched"
            );
        }
        Ok(summary)
    }

    async fn fire(&self, reminder: &ScheduledReminder, now: DateTime<Utc>, summary: &mut DispatchSummary) {
        let targets = match self
            .agents
            .list_active_by_role(&reminder.project_id, &reminder.target_role_type)
            .await
        {
            Ok(targets) => targets,
            Err(err) => {
                summary.errors += 1;
                warn!(reminder_id = %reminder.id, %err, "failed to resolve reminder targets");
                return;
            }
        };

        for agent in &targets {
            let Some(session) = agent.live_session() else {
                continue;
            };
            match self.sessions.send_keys(session, &reminder.message, true).await {
                Ok(()) => {
                    summary.sent += 1;
                    debug!(reminder_id = %reminder.id, agent_id = %agent.id, "reminder delivered");
                }
                Err(err) => {
                    summary.errors += 1;
                    warn!(
                        reminder_id = %reminder.id,
                        agent_id = %agent.id,
                        session,
                        %err,
                        "reminder delivery failed"
                    );
                }
            }
        }

        // Advance even when nobody matched so an empty role does not refire
        // every tick.
        if let Err(err) = self.reminders.mark_fired(&reminder.id, now).await {
            summary.errors += 1;
            warn!(reminder_id = %reminder.id, %err, "failed to record reminder firing");
        }
        summary.fired += 1;
    }
}
