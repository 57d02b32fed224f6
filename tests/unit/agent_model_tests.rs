use agent_foreman::models::agent::{Agent, AgentPatch, AgentStatus};
use chrono::Duration;

fn agent(session: Option<&str>) -> Agent {
    Agent::new(
        "proj".into(),
        "writer".into(),
        "model-x".into(),
        session.map(str::to_owned),
    )
}

#[test]
fn new_agent_with_session_is_active() {
    let a = agent(Some("w1"));
    assert_eq!(a.status, AgentStatus::Active);
    assert_eq!(a.live_session(), Some("w1"));
    assert!(!a.id.is_empty());
}

#[test]
fn new_agent_without_session_is_offline() {
    let a = agent(None);
    assert_eq!(a.status, AgentStatus::Offline);
    assert_eq!(a.live_session(), None);
}

#[test]
fn offline_agent_has_no_live_session_even_with_stale_name() {
    let mut a = agent(Some("w1"));
    a.status = AgentStatus::Offline;
    assert_eq!(a.live_session(), None);
}

#[test]
fn idle_seconds_counts_from_heartbeat() {
    let a = agent(Some("w1"));
    let later = a.last_heartbeat + Duration::seconds(90);
    assert_eq!(a.idle_seconds(later), 90);
}

#[test]
fn idle_seconds_floors_at_zero_for_future_heartbeat() {
    let a = agent(Some("w1"));
    let earlier = a.last_heartbeat - Duration::seconds(5);
    assert_eq!(a.idle_seconds(earlier), 0);
}

#[test]
fn offline_patch_clears_session() {
    let patch = AgentPatch::offline();
    assert_eq!(patch.status, Some(AgentStatus::Offline));
    assert_eq!(patch.tmux_session, Some(None));
    assert!(!patch.is_empty());
    assert!(AgentPatch::default().is_empty());
}

#[test]
fn status_serializes_snake_case() {
    assert_eq!(
        serde_json::to_string(&AgentStatus::Offline).unwrap(),
        "\"offline\""
    );
    assert_eq!(AgentStatus::Active.as_str(), "active");
}
