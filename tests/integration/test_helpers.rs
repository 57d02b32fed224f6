//! Shared test helpers for supervisor and scheduler integration tests.
//!
//! Provides a scripted in-memory [`SessionHandle`], a fixed starting
//! instant for the manual clock, and builders for `AppState` and seeded
//! agents so individual test modules can focus on behaviour.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agent_foreman::clock::ManualClock;
use agent_foreman::config::GlobalConfig;
use agent_foreman::models::agent::Agent;
use agent_foreman::persistence::agent_repo::AgentRepo;
use agent_foreman::persistence::db::{self, Database};
use agent_foreman::session::{KillMode, ProbeFuture, SessionFuture, SessionHandle};
use agent_foreman::state::AppState;
use agent_foreman::AppError;
use chrono::{DateTime, TimeZone, Utc};

/// One keystroke delivery recorded by [`FakeSessions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentKeys {
    pub session: String,
    pub text: String,
    pub press_enter: bool,
}

#[derive(Default)]
struct FakeState {
    live: HashSet<String>,
    output: HashMap<String, String>,
    sent: Vec<SentKeys>,
    kills: Vec<(String, KillMode)>,
    failing_kills: bool,
    send_delay: Option<Duration>,
}

/// Scripted session backend: sessions exist only when added with
/// [`FakeSessions::add`].
#[derive(Default, Clone)]
pub struct FakeSessions {
    state: Arc<Mutex<FakeState>>,
}

impl FakeSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, session: &str, output: &str) {
        let mut state = self.state.lock().unwrap();
        state.live.insert(session.to_owned());
        state.output.insert(session.to_owned(), output.to_owned());
    }

    /// Simulate the session dying outside our control.
    pub fn destroy(&self, session: &str) {
        self.state.lock().unwrap().live.remove(session);
    }

    pub fn is_live(&self, session: &str) -> bool {
        self.state.lock().unwrap().live.contains(session)
    }

    pub fn sent(&self) -> Vec<SentKeys> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn kills(&self) -> Vec<(String, KillMode)> {
        self.state.lock().unwrap().kills.clone()
    }

    /// Make every kill report `SessionUnavailable` without removing anything.
    pub fn fail_kills(&self) {
        self.state.lock().unwrap().failing_kills = true;
    }

    /// Delay every `send_keys` call, to hold a tick open.
    pub fn delay_sends(&self, delay: Duration) {
        self.state.lock().unwrap().send_delay = Some(delay);
    }

    fn gone(session: &str) -> AppError {
        AppError::SessionUnavailable(format!("can't find session: {session}"))
    }
}

impl SessionHandle for FakeSessions {
    fn send_keys<'a>(
        &'a self,
        session: &'a str,
        text: &'a str,
        press_enter: bool,
    ) -> SessionFuture<'a, ()> {
        Box::pin(async move {
            let delay = self.state.lock().unwrap().send_delay;
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let mut state = self.state.lock().unwrap();
            if !state.live.contains(session) {
                return Err(Self::gone(session));
            }
            state.sent.push(SentKeys {
                session: session.to_owned(),
                text: text.to_owned(),
                press_enter,
            });
            Ok(())
        })
    }

    fn capture_pane<'a>(&'a self, session: &'a str, last_n_lines: u32) -> SessionFuture<'a, String> {
        Box::pin(async move {
            let state = self.state.lock().unwrap();
            if !state.live.contains(session) {
                return Err(Self::gone(session));
            }
            let raw = state.output.get(session).cloned().unwrap_or_default();
            let lines: Vec<&str> = raw.lines().collect();
            let keep = usize::try_from(last_n_lines).unwrap();
            let start = lines.len().saturating_sub(keep);
            Ok(lines[start..].join("\n"))
        })
    }

    fn kill_session<'a>(&'a self, session: &'a str, mode: KillMode) -> SessionFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.kills.push((session.to_owned(), mode));
            if state.failing_kills {
                return Err(Self::gone(session));
            }
            state.live.remove(session);
            Ok(())
        })
    }

    fn has_session<'a>(&'a self, session: &'a str) -> ProbeFuture<'a> {
        Box::pin(async move { self.state.lock().unwrap().live.contains(session) })
    }
}

/// Fixed origin for manual clocks: t = 0.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap()
}

pub fn test_config() -> GlobalConfig {
    GlobalConfig::from_toml_str(
        r#"
db_path = ":memory:"
ipc_name = "foreman-test"

[session]
max_capture_lines = 100
wrap_up_message = "please wrap up"

[monitor]
autostart = false
tick_interval_seconds = 60
stale_threshold_seconds = 600
"#,
    )
    .expect("valid test config")
}

pub async fn test_db() -> Arc<Database> {
    Arc::new(db::connect_memory().await.expect("db connect"))
}

/// Everything a test needs to drive the services.
pub struct Harness {
    pub state: Arc<AppState>,
    pub sessions: FakeSessions,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: GlobalConfig) -> Self {
        let sessions = FakeSessions::new();
        let clock = Arc::new(ManualClock::new(t0()));
        let state = Arc::new(AppState::new(
            Arc::new(config),
            test_db().await,
            Arc::new(sessions.clone()),
            clock.clone(),
        ));
        Self {
            state,
            sessions,
            clock,
        }
    }

    pub fn agents(&self) -> AgentRepo {
        self.state.agents()
    }

    /// Register an agent; a `Some` session is also made live.
    pub async fn seed_agent(&self, project: &str, role: &str, session: Option<&str>) -> Agent {
        if let Some(name) = session {
            self.sessions.add(name, "line 1\nline 2\nline 3");
        }
        let mut agent = Agent::new(
            project.into(),
            role.into(),
            "model-x".into(),
            session.map(str::to_owned),
        );
        agent.last_heartbeat = t0();
        self.agents().create(&agent).await.expect("seed agent")
    }

    pub async fn reload(&self, id: &str) -> Option<Agent> {
        self.agents().get_by_id(id).await.expect("query agent")
    }
}
