#![forbid(unsafe_code)]

//! `agent-foreman-ctl`: local CLI companion for `agent-foreman`.
//!
//! Connects to the IPC socket and sends JSON commands to the daemon.

use std::io::{BufRead, BufReader, Write};

use clap::{Parser, Subcommand};
use interprocess::local_socket::{traits::Stream as _, GenericNamespaced, Stream, ToNsName};

#[derive(Debug, Parser)]
#[command(
    name = "agent-foreman-ctl",
    about = "Local CLI for the agent-foreman daemon",
    version,
    long_about = None
)]
struct Cli {
    /// IPC socket name (must match the daemon's `ipc_name` config).
    #[arg(long, default_value = "agent-foreman")]
    ipc_name: String,

    /// Shared secret, when the daemon sets `ipc_auth_token`.
    #[arg(long)]
    auth_token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Ask an agent to wrap up its work.
    SendHome {
        /// Agent ID.
        id: String,
    },

    /// Gracefully end an agent's session and mark it offline.
    ClockOut {
        /// Agent ID.
        id: String,
    },

    /// Forcibly end an agent's session and mark it offline.
    ForceHome {
        /// Agent ID.
        id: String,
    },

    /// Kill an agent's session and delete the agent.
    Kill {
        /// Agent ID.
        id: String,
    },

    /// Type a command into an agent's session.
    Send {
        /// Agent ID.
        id: String,
        /// Text to type.
        text: String,
        /// Do not press Enter after the text.
        #[arg(long)]
        no_enter: bool,
    },

    /// Show an agent's recent output.
    Read {
        /// Agent ID.
        id: String,
        /// Scrollback lines to capture.
        #[arg(long, default_value_t = 50)]
        lines: u32,
    },

    /// Record a heartbeat for an agent.
    Heartbeat {
        /// Agent ID.
        id: String,
    },

    /// Show an agent record and its lifecycle phase.
    Agent {
        /// Agent ID.
        id: String,
    },

    /// Register an agent for an existing tmux session.
    Register {
        /// Project ID.
        #[arg(long)]
        project: String,
        /// Role type.
        #[arg(long)]
        role: String,
        /// Model identifier.
        #[arg(long, default_value = "")]
        model: String,
        /// tmux session name.
        #[arg(long)]
        session: Option<String>,
    },

    /// List every registered agent.
    Agents,

    /// Mark agents whose sessions are gone as offline.
    Reconcile,

    /// Control the monitoring scheduler.
    Monitor {
        #[command(subcommand)]
        action: MonitorAction,
    },

    /// Inspect or toggle per-project forwarding.
    Forward {
        /// Project ID; omit to list every project.
        project: Option<String>,
        /// Set the flag: `on` or `off`.
        #[arg(long)]
        set: Option<Toggle>,
    },

    /// Manage scheduled reminders.
    Reminder {
        #[command(subcommand)]
        action: ReminderAction,
    },
}

#[derive(Debug, Subcommand)]
enum MonitorAction {
    /// Start the tick loop.
    Start,
    /// Stop the tick loop and print the final stats.
    Stop,
    /// Show running state, stats, and the idle report.
    Status,
    /// Run one tick now.
    Tick,
}

#[derive(Debug, Subcommand)]
enum ReminderAction {
    /// Create a reminder.
    Create {
        /// Project ID.
        #[arg(long)]
        project: String,
        /// Reminder name.
        #[arg(long)]
        name: String,
        /// Role whose agents receive the message.
        #[arg(long)]
        role: String,
        /// Message text.
        #[arg(long)]
        message: String,
        /// Minutes between firings.
        #[arg(long)]
        every: u32,
    },
    /// List reminders of a project, or every active reminder.
    List {
        /// Project ID.
        #[arg(long)]
        project: Option<String>,
    },
    /// Update fields of a reminder.
    Update {
        /// Reminder ID.
        id: String,
        /// New name.
        #[arg(long)]
        name: Option<String>,
        /// New target role.
        #[arg(long)]
        role: Option<String>,
        /// New message text.
        #[arg(long)]
        message: Option<String>,
        /// New frequency in minutes.
        #[arg(long)]
        every: Option<u32>,
        /// Enable or disable.
        #[arg(long)]
        active: Option<Toggle>,
    },
    /// Delete a reminder.
    Delete {
        /// Reminder ID.
        id: String,
    },
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, clap::ValueEnum)]
enum Toggle {
    On,
    Off,
}

impl Toggle {
    fn as_bool(self) -> bool {
        self == Self::On
    }
}

fn main() {
    let args = Cli::parse();

    let mut request_json = build_request(&args.command);
    if let Some(token) = &args.auth_token {
        request_json["auth_token"] = serde_json::Value::String(token.clone());
    }

    match send_ipc_command(&args.ipc_name, &request_json) {
        Ok(response) => {
            if let Some(obj) = response.as_object() {
                let ok = obj
                    .get("ok")
                    .and_then(serde_json::Value::as_bool)
                    .unwrap_or(false);
                if ok {
                    if let Some(data) = obj.get("data") {
                        println!("{}", serde_json::to_string_pretty(data).unwrap_or_default());
                    } else {
                        println!("OK");
                    }
                } else {
                    let err_msg = obj
                        .get("error")
                        .and_then(|v| v.as_str())
                        .unwrap_or("unknown error");
                    eprintln!("Error: {err_msg}");
                    std::process::exit(1);
                }
            } else {
                println!("{response}");
            }
        }
        Err(err) => {
            eprintln!("Failed to connect to daemon: {err}");
            eprintln!("Is agent-foreman running with ipc_name '{}'?", args.ipc_name);
            std::process::exit(1);
        }
    }
}

fn build_request(command: &Command) -> serde_json::Value {
    use serde_json::json;

    match command {
        Command::SendHome { id } => json!({ "command": "send-home", "id": id }),
        Command::ClockOut { id } => json!({ "command": "clock-out", "id": id }),
        Command::ForceHome { id } => json!({ "command": "force-home", "id": id }),
        Command::Kill { id } => json!({ "command": "kill", "id": id }),
        Command::Send { id, text, no_enter } => json!({
            "command": "send",
            "id": id,
            "text": text,
            "press_enter": !no_enter,
        }),
        Command::Read { id, lines } => json!({ "command": "read", "id": id, "lines": lines }),
        Command::Heartbeat { id } => json!({ "command": "heartbeat", "id": id }),
        Command::Agent { id } => json!({ "command": "agent", "id": id }),
        Command::Register {
            project,
            role,
            model,
            session,
        } => json!({
            "command": "agent-register",
            "project_id": project,
            "role_type": role,
            "model": model,
            "session": session,
        }),
        Command::Agents => json!({ "command": "agent-list" }),
        Command::Reconcile => json!({ "command": "reconcile" }),
        Command::Monitor { action } => match action {
            MonitorAction::Start => json!({ "command": "monitor-start" }),
            MonitorAction::Stop => json!({ "command": "monitor-stop" }),
            MonitorAction::Status => json!({ "command": "monitor-status" }),
            MonitorAction::Tick => json!({ "command": "monitor-tick" }),
        },
        Command::Forward { project, set } => match set {
            Some(toggle) => json!({
                "command": "forward-set",
                "project_id": project,
                "enabled": toggle.as_bool(),
            }),
            None => json!({ "command": "forward-get", "project_id": project }),
        },
        Command::Reminder { action } => match action {
            ReminderAction::Create {
                project,
                name,
                role,
                message,
                every,
            } => json!({
                "command": "reminder-create",
                "project_id": project,
                "name": name,
                "role_type": role,
                "message": message,
                "frequency_minutes": every,
            }),
            ReminderAction::List { project } => {
                json!({ "command": "reminder-list", "project_id": project })
            }
            ReminderAction::Update {
                id,
                name,
                role,
                message,
                every,
                active,
            } => json!({
                "command": "reminder-update",
                "id": id,
                "name": name,
                "role_type": role,
                "message": message,
                "frequency_minutes": every,
                "is_active": active.map(Toggle::as_bool),
            }),
            ReminderAction::Delete { id } => json!({ "command": "reminder-delete", "id": id }),
        },
    }
}

/// Connect to the IPC socket, send a JSON command, and read the response.
fn send_ipc_command(
    ipc_name: &str,
    request: &serde_json::Value,
) -> std::result::Result<serde_json::Value, Box<dyn std::error::Error>> {
    let name = ipc_name.to_ns_name::<GenericNamespaced>()?;
    let mut stream = Stream::connect(name)?;

    let mut request_line = serde_json::to_string(request)?;
    request_line.push('\n');
    stream.write_all(request_line.as_bytes())?;
    stream.flush()?;

    let mut reader = BufReader::new(&stream);
    let mut response_line = String::new();
    reader.read_line(&mut response_line)?;

    let response: serde_json::Value = serde_json::from_str(response_line.trim())?;
    Ok(response)
}
