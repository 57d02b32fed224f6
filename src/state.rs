//! Shared application state handed to the IPC layer and the daemon.

use std::sync::Arc;

use crate::clock::Clock;
use crate::config::GlobalConfig;
use crate::forwarding::ForwardingGate;
use crate::orchestrator::monitor::MonitorService;
use crate::orchestrator::reminder_dispatcher::ReminderDispatcher;
use crate::orchestrator::supervisor::{AgentLocks, Supervisor};
use crate::persistence::agent_repo::AgentRepo;
use crate::persistence::db::Database;
use crate::persistence::reminder_repo::ReminderRepo;
use crate::session::SessionHandle;

/// Process-wide services. One instance per daemon.
pub struct AppState {
    /// Global configuration.
    pub config: Arc<GlobalConfig>,
    /// `SQLite` connection pool.
    pub db: Arc<Database>,
    /// Agent lifecycle controller.
    pub supervisor: Arc<Supervisor>,
    /// Monitoring scheduler.
    pub monitor: Arc<MonitorService>,
    /// Per-project forwarding toggle.
    pub forwarding: ForwardingGate,
    /// Per-agent mutual exclusion for IPC commands.
    pub agent_locks: AgentLocks,
}

impl AppState {
    /// Wire every service over one pool, session backend, and clock.
    #[must_use]
    pub fn new(
        config: Arc<GlobalConfig>,
        db: Arc<Database>,
        sessions: Arc<dyn SessionHandle>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let supervisor = Supervisor::new(Arc::clone(&db), Arc::clone(&sessions), &config.session)
            .with_clock(Arc::clone(&clock));
        let dispatcher = ReminderDispatcher::new(Arc::clone(&db), sessions);
        let monitor = MonitorService::from_config(Arc::clone(&db), dispatcher, clock, &config.monitor);

        Self {
            config,
            db,
            supervisor: Arc::new(supervisor),
            monitor: Arc::new(monitor),
            forwarding: ForwardingGate::default(),
            agent_locks: AgentLocks::default(),
        }
    }

    /// Agent registry over the shared pool.
    #[must_use]
    pub fn agents(&self) -> AgentRepo {
        AgentRepo::new(Arc::clone(&self.db))
    }

    /// Reminder store over the shared pool.
    #[must_use]
    pub fn reminders(&self) -> ReminderRepo {
        ReminderRepo::new(Arc::clone(&self.db))
    }
}
