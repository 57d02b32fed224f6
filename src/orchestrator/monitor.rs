//! Monitoring scheduler: a single recurring tick that reports idle agents
//! and fires due reminders.
//!
//! At most one tick runs at a time. When the interval elapses while a tick
//! is still executing, that firing is skipped and counted in
//! [`MonitoringStats::missed_ticks`]; nothing is queued. [`MonitorService::stop`]
//! cancels the loop, waits for an in-flight tick to finish, and returns
//! the counters as of that last completed tick. A stopped scheduler runs
//! no ticks, manual or scheduled, until it is started again.
//!
//! There is one scheduler per process: [`crate::state::AppState`] owns the
//! only instance the daemon builds. Constructing further services is
//! reserved for tests that need a custom period.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, MutexGuard, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::clock::Clock;
use crate::config::MonitorConfig;
use crate::models::agent::AgentStatus;
use crate::models::monitor::{AgentIdle, MonitorStatus, MonitoringStats};
use crate::persistence::agent_repo::AgentRepo;
use crate::persistence::db::Database;
use crate::{AppError, Result};

use super::reminder_dispatcher::{DispatchSummary, ReminderDispatcher};

/// What one tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Idle scan of every registered agent.
    pub idle: Vec<AgentIdle>,
    /// Reminder dispatch outcome.
    pub dispatch: DispatchSummary,
    /// Errors counted by this tick.
    pub errors: u64,
}

struct RunningLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Lifecycle of the tick loop.
enum LoopState {
    /// Never started; manual ticks are accepted.
    Idle,
    Running(RunningLoop),
    /// Stopped by [`MonitorService::stop`]; stats are frozen.
    Stopped,
}

/// State shared between the service handle and the spawned loop.
struct MonitorCore {
    agents: AgentRepo,
    dispatcher: ReminderDispatcher,
    clock: Arc<dyn Clock>,
    stale_threshold: Duration,
    stats: RwLock<MonitoringStats>,
    idle: RwLock<Vec<AgentIdle>>,
    /// Held for the duration of a tick.
    tick_gate: Mutex<()>,
}

/// Process-wide monitoring scheduler.
pub struct MonitorService {
    core: Arc<MonitorCore>,
    period: Duration,
    control: Mutex<LoopState>,
}

impl MonitorService {
    /// Build a stopped scheduler ticking every `period`.
    #[must_use]
    pub fn new(
        db: Arc<Database>,
        dispatcher: ReminderDispatcher,
        clock: Arc<dyn Clock>,
        period: Duration,
        stale_threshold: Duration,
    ) -> Self {
        Self {
            core: Arc::new(MonitorCore {
                agents: AgentRepo::new(db),
                dispatcher,
                clock,
                stale_threshold,
                stats: RwLock::new(MonitoringStats::default()),
                idle: RwLock::new(Vec::new()),
                tick_gate: Mutex::new(()),
            }),
            period,
            control: Mutex::new(LoopState::Idle),
        }
    }

    /// Build a stopped scheduler from configuration.
    #[must_use]
    pub fn from_config(
        db: Arc<Database>,
        dispatcher: ReminderDispatcher,
        clock: Arc<dyn Clock>,
        config: &MonitorConfig,
    ) -> Self {
        Self::new(
            db,
            dispatcher,
            clock,
            config.tick_interval(),
            config.stale_threshold(),
        )
    }

    /// Start the tick loop. The first tick fires immediately.
    ///
    /// # Errors
    ///
    /// Returns `AppError::AlreadyRunning` if a loop is already active, or
    /// `AppError::InvalidInput` if the period is zero.
    pub async fn start(&self) -> Result<()> {
        if self.period.is_zero() {
            return Err(AppError::InvalidInput("tick interval must be non-zero".into()));
        }

        let mut control = self.control.lock().await;
        if matches!(*control, LoopState::Running(_)) {
            return Err(AppError::AlreadyRunning("monitoring scheduler".into()));
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(
            run_loop(Arc::clone(&self.core), self.period, cancel.clone())
                .instrument(info_span!("monitor")),
        );
        *control = LoopState::Running(RunningLoop { cancel, handle });

        info!(period_ms = self.period.as_millis(), "monitoring scheduler started");
        Ok(())
    }

    /// Stop the tick loop and return the final counters.
    ///
    /// The control lock is held until the loop and any manual tick have
    /// finished, so no concurrent `start` can overlap the old loop.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotRunning` if no loop is active.
    pub async fn stop(&self) -> Result<MonitoringStats> {
        let mut control = self.control.lock().await;
        let running = match std::mem::replace(&mut *control, LoopState::Stopped) {
            LoopState::Running(running) => running,
            previous => {
                *control = previous;
                return Err(AppError::NotRunning("monitoring scheduler".into()));
            }
        };

        running.cancel.cancel();
        if let Err(err) = running.handle.await {
            error!(%err, "monitor loop terminated abnormally");
        }
        // Wait out a manual tick that took the gate before we did.
        drop(self.core.tick_gate.lock().await);

        let stats = self.get_stats().await;
        drop(control);
        info!(ticks = stats.ticks, "monitoring scheduler stopped");
        Ok(stats)
    }

    /// Whether the tick loop is active.
    pub async fn is_running(&self) -> bool {
        matches!(*self.control.lock().await, LoopState::Running(_))
    }

    /// Copy of the current counters.
    pub async fn get_stats(&self) -> MonitoringStats {
        self.core.stats.read().await.clone()
    }

    /// Running flag, counters, and the latest idle report.
    pub async fn status(&self) -> MonitorStatus {
        MonitorStatus {
            running: self.is_running().await,
            stats: self.get_stats().await,
            idle: self.core.idle.read().await.clone(),
        }
    }

    /// Run one tick now, alongside the loop or on a scheduler that was
    /// never started.
    ///
    /// Returns `Ok(None)` and counts a missed tick if another tick is in
    /// progress.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotRunning` after [`Self::stop`], until the
    /// scheduler is started again.
    pub async fn run_tick(&self) -> Result<Option<TickReport>> {
        let gate = {
            let control = self.control.lock().await;
            if matches!(*control, LoopState::Stopped) {
                return Err(AppError::NotRunning("monitoring scheduler".into()));
            }
            self.core.try_gate().await
        };
        let Some(_gate) = gate else {
            return Ok(None);
        };
        Ok(Some(self.core.tick().await))
    }
}

async fn run_loop(core: Arc<MonitorCore>, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!("monitor loop cancelled");
                return;
            }
            _ = interval.tick() => {}
        }

        if cancel.is_cancelled() {
            return;
        }

        let started = Instant::now();
        if let Some(_gate) = core.try_gate().await {
            core.tick().await;
        }

        let overrun = started.elapsed().as_nanos() / period.as_nanos().max(1);
        if overrun > 0 {
            let skipped = u64::try_from(overrun).unwrap_or(u64::MAX);
            core.stats.write().await.missed_ticks += skipped;
            warn!(skipped, "tick overran the interval; firings skipped");
        }
    }
}

impl MonitorCore {
    /// Take the tick gate, or record a missed tick if it is held.
    async fn try_gate(&self) -> Option<MutexGuard<'_, ()>> {
        if let Ok(gate) = self.tick_gate.try_lock() {
            return Some(gate);
        }
        self.stats.write().await.missed_ticks += 1;
        debug!("tick already in progress; skipped");
        None
    }

    async fn tick(&self) -> TickReport {
        let now = self.clock.now();
        let mut errors = 0;

        let idle = match self.scan_idle(now).await {
            Ok(idle) => idle,
            Err(err) => {
                errors += 1;
                error!(%err, "idle scan failed");
                Vec::new()
            }
        };

        let dispatch = match self.dispatcher.dispatch_due(now).await {
            Ok(summary) => summary,
            Err(err) => {
                errors += 1;
                error!(%err, "reminder evaluation failed");
                DispatchSummary::default()
            }
        };
        errors += dispatch.errors;

        let stale = idle.iter().filter(|entry| entry.stale).count();
        {
            let mut stats = self.stats.write().await;
            stats.ticks += 1;
            stats.reminders_sent += dispatch.sent;
            stats.errors += errors;
            stats.stale_agents = u64::try_from(stale).unwrap_or(u64::MAX);
            stats.last_tick_at = Some(self.clock.now());
        }
        self.idle.write().await.clone_from(&idle);

        debug!(stale, sent = dispatch.sent, errors, "tick complete");
        TickReport {
            idle,
            dispatch,
            errors,
        }
    }

    async fn scan_idle(&self, now: chrono::DateTime<chrono::Utc>) -> Result<Vec<AgentIdle>> {
        let threshold = self.stale_threshold.as_secs();
        let idle = self
            .agents
            .list_all()
            .await?
            .into_iter()
            .map(|agent| {
                let idle_seconds = agent.idle_seconds(now);
                let stale = agent.status == AgentStatus::Active && idle_seconds >= threshold;
                if stale {
                    warn!(agent_id = %agent.id, idle_seconds, "agent heartbeat is stale");
                }
                AgentIdle {
                    agent_id: agent.id,
                    role_type: agent.role_type,
                    status: agent.status,
                    idle_seconds,
                    stale,
                }
            })
            .collect();
        Ok(idle)
    }
}
