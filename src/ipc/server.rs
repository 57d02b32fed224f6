//! Local IPC server for `agent-foreman-ctl` commands.
//!
//! Listens on a named pipe (Windows) or Unix domain socket (Linux/macOS)
//! using the `interprocess` crate. Accepts line-delimited JSON commands
//! from `agent-foreman-ctl` and routes them to the supervisor, the
//! monitoring scheduler, the forwarding gate, or the reminder store.
//!
//! ## Protocol
//!
//! Request (one JSON object per line):
//! ```json
//! {"command": "clock-out", "id": "agent-123"}
//! {"command": "send", "id": "agent-123", "text": "ls", "press_enter": true}
//! {"command": "read", "id": "agent-123", "lines": 100}
//! {"command": "forward-set", "project_id": "p1", "enabled": true}
//! ```
//!
//! Response (one JSON object per line):
//! ```json
//! {"ok": true, "data": { ... } }
//! {"ok": false, "error": "not found: agent agent-123 not found"}
//! ```
//!
//! Commands addressing an agent hold that agent's lock from
//! [`AgentLocks`](crate::orchestrator::supervisor::AgentLocks) for their
//! whole duration.

use std::sync::Arc;

use interprocess::local_socket::{tokio::prelude::*, GenericNamespaced, ListenerOptions};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use crate::models::agent::Agent;
use crate::models::reminder::{ReminderPatch, ScheduledReminder};
use crate::orchestrator::supervisor::DEFAULT_OUTPUT_LINES;
use crate::session::validate_session_name;
use crate::state::AppState;
use crate::{AppError, Result};

/// Inbound IPC request from `agent-foreman-ctl`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IpcRequest {
    /// Command verb.
    pub command: String,
    /// Agent or reminder identifier.
    #[serde(default)]
    pub id: Option<String>,
    /// Project scope for forwarding, reminders, and agent registration.
    #[serde(default)]
    pub project_id: Option<String>,
    /// Text to type into a session.
    #[serde(default)]
    pub text: Option<String>,
    /// Whether `send` presses Enter after the text. Defaults to true.
    #[serde(default)]
    pub press_enter: Option<bool>,
    /// Scrollback lines for `read`.
    #[serde(default)]
    pub lines: Option<u32>,
    /// Forwarding flag for `forward-set`.
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Agent role, or reminder target role.
    #[serde(default)]
    pub role_type: Option<String>,
    /// Model identifier for `agent-register`.
    #[serde(default)]
    pub model: Option<String>,
    /// tmux session name for `agent-register`.
    #[serde(default)]
    pub session: Option<String>,
    /// Reminder name.
    #[serde(default)]
    pub name: Option<String>,
    /// Reminder message.
    #[serde(default)]
    pub message: Option<String>,
    /// Reminder frequency.
    #[serde(default)]
    pub frequency_minutes: Option<u32>,
    /// Reminder activation flag.
    #[serde(default)]
    pub is_active: Option<bool>,
    /// Shared-secret authentication token.
    #[serde(default)]
    pub auth_token: Option<String>,
}

/// Outbound IPC response to `agent-foreman-ctl`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IpcResponse {
    /// Whether the command succeeded.
    pub ok: bool,
    /// Payload on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Error message on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IpcResponse {
    fn success(data: serde_json::Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }

    fn from_result<T: Serialize>(result: Result<T>) -> Self {
        match result.and_then(|value| {
            serde_json::to_value(value)
                .map_err(|err| AppError::Internal(format!("failed to encode response: {err}")))
        }) {
            Ok(data) => Self::success(data),
            Err(err) => Self::error(err.to_string()),
        }
    }
}

/// Spawn the IPC server task.
///
/// # Errors
///
/// Returns `AppError::Ipc` if the listener cannot be created.
pub fn spawn_ipc_server(
    state: Arc<AppState>,
    ct: CancellationToken,
) -> Result<tokio::task::JoinHandle<()>> {
    let name = state.config.ipc_name.clone();

    let listener_name = name
        .clone()
        .to_ns_name::<GenericNamespaced>()
        .map_err(|err| AppError::Ipc(format!("invalid ipc socket name '{name}': {err}")))?;

    let listener = ListenerOptions::new()
        .name(listener_name)
        .create_tokio()
        .map_err(|err| AppError::Ipc(format!("failed to create ipc listener: {err}")))?;

    info!(ipc_name = %name, "IPC server listening");

    let span = info_span!("ipc_server", name = %name);
    let handle = tokio::spawn(
        async move {
            loop {
                tokio::select! {
                    () = ct.cancelled() => {
                        info!("IPC server shutting down");
                        break;
                    }
                    accept_result = listener.accept() => {
                        match accept_result {
                            Ok(stream) => {
                                tokio::spawn(handle_connection(stream, Arc::clone(&state)));
                            }
                            Err(err) => warn!(%err, "IPC accept failed"),
                        }
                    }
                }
            }
        }
        .instrument(span),
    );

    Ok(handle)
}

/// Handle a single IPC client connection.
async fn handle_connection(stream: interprocess::local_socket::tokio::Stream, state: Arc<AppState>) {
    async move {
        let (reader, mut writer) = stream.split();
        let mut buf_reader = BufReader::new(reader);
        let mut line = String::new();

        loop {
            line.clear();
            match buf_reader.read_line(&mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    let response = match serde_json::from_str::<IpcRequest>(trimmed) {
                        Ok(request) => dispatch_command(&request, &state).await,
                        Err(err) => IpcResponse::error(format!("invalid json: {err}")),
                    };

                    let mut response_line = serde_json::to_string(&response).unwrap_or_else(|_| {
                        r#"{"ok":false,"error":"serialization failed"}"#.to_owned()
                    });
                    response_line.push('\n');

                    if let Err(err) = writer.write_all(response_line.as_bytes()).await {
                        warn!(%err, "failed to write ipc response");
                        break;
                    }
                }
                Err(err) => {
                    warn!(%err, "ipc read error");
                    break;
                }
            }
        }

        info!("IPC connection closed");
    }
    .instrument(info_span!("ipc_conn"))
    .await;
}

/// Authenticate and route one request.
pub async fn dispatch_command(request: &IpcRequest, state: &AppState) -> IpcResponse {
    async {
        if let Some(ref expected) = state.config.ipc_auth_token {
            match request.auth_token {
                Some(ref provided) if provided == expected => {}
                _ => {
                    warn!("IPC request rejected: invalid auth token");
                    return IpcResponse::error("unauthorized");
                }
            }
        }

        match request.command.as_str() {
            "send-home" | "clock-out" | "force-home" | "kill" | "send" | "read" | "heartbeat"
            | "agent" => handle_agent_command(request, state).await,
            "agent-register" => IpcResponse::from_result(register_agent(request, state).await),
            "agent-list" => IpcResponse::from_result(state.agents().list_all().await),
            "reconcile" => IpcResponse::from_result(
                state
                    .supervisor
                    .reconcile()
                    .await
                    .map(|healed| serde_json::json!({ "healed": healed })),
            ),
            "monitor-start" => IpcResponse::from_result(
                state
                    .monitor
                    .start()
                    .await
                    .map(|()| serde_json::json!({ "running": true })),
            ),
            "monitor-stop" => IpcResponse::from_result(state.monitor.stop().await),
            "monitor-status" => IpcResponse::from_result(Ok(state.monitor.status().await)),
            "monitor-tick" => match state.monitor.run_tick().await {
                Ok(Some(report)) => IpcResponse::success(serde_json::json!({
                    "stale": report.idle.iter().filter(|entry| entry.stale).count(),
                    "dispatch": report.dispatch,
                    "errors": report.errors,
                })),
                Ok(None) => IpcResponse::error("a tick is already in progress"),
                Err(err) => IpcResponse::error(err.to_string()),
            },
            "forward-set" => IpcResponse::from_result(forward_set(request, state)),
            "forward-get" => IpcResponse::from_result(forward_get(request, state)),
            "reminder-create" => IpcResponse::from_result(create_reminder(request, state).await),
            "reminder-list" => IpcResponse::from_result(list_reminders(request, state).await),
            "reminder-update" => IpcResponse::from_result(update_reminder(request, state).await),
            "reminder-delete" => IpcResponse::from_result(delete_reminder(request, state).await),
            other => IpcResponse::error(format!("unknown command: {other}")),
        }
    }
    .instrument(info_span!("ipc_command", command = %request.command))
    .await
}

/// Supervisor verbs, run under the target agent's lock.
async fn handle_agent_command(request: &IpcRequest, state: &AppState) -> IpcResponse {
    let id = match required(request.id.as_deref(), "id") {
        Ok(id) => id,
        Err(err) => return IpcResponse::error(err.to_string()),
    };
    let _guard = state.agent_locks.lock(id).await;
    let supervisor = &state.supervisor;

    match request.command.as_str() {
        "send-home" => IpcResponse::from_result(supervisor.send_home(id).await),
        "clock-out" => IpcResponse::from_result(supervisor.clock_out(id).await),
        "force-home" => IpcResponse::from_result(supervisor.force_home(id).await),
        "kill" => {
            let result = supervisor.kill(id).await;
            if result.is_ok() {
                state.agent_locks.forget(id).await;
            }
            IpcResponse::from_result(result)
        }
        "send" => {
            let text = request.text.as_deref().unwrap_or_default();
            let press_enter = request.press_enter.unwrap_or(true);
            IpcResponse::from_result(
                supervisor
                    .send_input(id, text, press_enter)
                    .await
                    .map(|()| serde_json::json!({ "agent_id": id, "sent": true })),
            )
        }
        "read" => IpcResponse::from_result(
            supervisor
                .read_output(id, request.lines.unwrap_or(DEFAULT_OUTPUT_LINES))
                .await,
        ),
        "heartbeat" => IpcResponse::from_result(supervisor.record_heartbeat(id).await),
        "agent" => IpcResponse::from_result(agent_view(id, state).await),
        other => IpcResponse::error(format!("unknown command: {other}")),
    }
}

async fn agent_view(id: &str, state: &AppState) -> Result<serde_json::Value> {
    let agent = state.supervisor.status(id).await?;
    let phase = state.supervisor.phase(id).await?;
    Ok(serde_json::json!({ "agent": agent, "phase": phase }))
}

async fn register_agent(request: &IpcRequest, state: &AppState) -> Result<Agent> {
    let project_id = required(request.project_id.as_deref(), "project_id")?;
    let role_type = required(request.role_type.as_deref(), "role_type")?;
    let model = request.model.clone().unwrap_or_default();
    if let Some(session) = request.session.as_deref() {
        validate_session_name(session)?;
    }

    let agent = Agent::new(
        project_id.to_owned(),
        role_type.to_owned(),
        model,
        request.session.clone(),
    );
    let created = state.agents().create(&agent).await?;
    info!(agent_id = %created.id, session = ?created.tmux_session, "agent registered");
    Ok(created)
}

fn forward_set(request: &IpcRequest, state: &AppState) -> Result<serde_json::Value> {
    let project_id = required(request.project_id.as_deref(), "project_id")?;
    let enabled = request
        .enabled
        .ok_or_else(|| AppError::InvalidInput("missing required 'enabled' field".into()))?;
    state.forwarding.set(project_id, enabled)?;
    Ok(serde_json::json!({ "project_id": project_id, "enabled": enabled }))
}

fn forward_get(request: &IpcRequest, state: &AppState) -> Result<serde_json::Value> {
    match request.project_id.as_deref() {
        Some(project_id) => Ok(serde_json::json!({
            "project_id": project_id,
            "enabled": state.forwarding.is_enabled(project_id),
        })),
        None => Ok(serde_json::json!({ "projects": state.forwarding.list() })),
    }
}

async fn create_reminder(request: &IpcRequest, state: &AppState) -> Result<ScheduledReminder> {
    let mut reminder = ScheduledReminder::new(
        required(request.project_id.as_deref(), "project_id")?.to_owned(),
        required(request.name.as_deref(), "name")?.to_owned(),
        required(request.role_type.as_deref(), "role_type")?.to_owned(),
        required(request.message.as_deref(), "message")?.to_owned(),
        request
            .frequency_minutes
            .ok_or_else(|| AppError::InvalidInput("missing required 'frequency_minutes' field".into()))?,
    );
    if let Some(is_active) = request.is_active {
        reminder.is_active = is_active;
    }
    state.reminders().create(&reminder).await
}

async fn list_reminders(request: &IpcRequest, state: &AppState) -> Result<Vec<ScheduledReminder>> {
    match request.project_id.as_deref() {
        Some(project_id) => state.reminders().list_by_project(project_id).await,
        None => state.reminders().list_active().await,
    }
}

async fn update_reminder(request: &IpcRequest, state: &AppState) -> Result<ScheduledReminder> {
    let id = required(request.id.as_deref(), "id")?;
    let patch = ReminderPatch {
        name: request.name.clone(),
        target_role_type: request.role_type.clone(),
        message: request.message.clone(),
        frequency_minutes: request.frequency_minutes,
        is_active: request.is_active,
    };
    state.reminders().update(id, &patch).await
}

async fn delete_reminder(request: &IpcRequest, state: &AppState) -> Result<serde_json::Value> {
    let id = required(request.id.as_deref(), "id")?;
    state.reminders().delete(id).await?;
    Ok(serde_json::json!({ "id": id, "deleted": true }))
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::InvalidInput(format!("missing required '{field}' field")))
}
