//! `SQLite` schema bootstrap logic.
//!
//! All table definitions use `CREATE TABLE IF NOT EXISTS`, so this is
//! safe to re-run on every startup.

use sqlx::SqlitePool;

use crate::Result;

/// Apply all table definitions to the connected `SQLite` database.
///
/// # Errors
///
/// Returns `AppError::Db` if any DDL statement fails.
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = r"
CREATE TABLE IF NOT EXISTS agent (
    id              TEXT PRIMARY KEY NOT NULL,
    project_id      TEXT NOT NULL,
    role_type       TEXT NOT NULL,
    status          TEXT NOT NULL CHECK(status IN ('active','offline')),
    tmux_session    TEXT,
    last_heartbeat  TEXT NOT NULL,
    model           TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS scheduled_reminder (
    id                TEXT PRIMARY KEY NOT NULL,
    project_id        TEXT NOT NULL,
    name              TEXT NOT NULL,
    target_role_type  TEXT NOT NULL,
    message           TEXT NOT NULL,
    frequency_minutes INTEGER NOT NULL CHECK(frequency_minutes > 0),
    is_active         INTEGER NOT NULL DEFAULT 1,
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL,
    last_fired_at     TEXT
);

CREATE TABLE IF NOT EXISTS content (
    id              TEXT PRIMARY KEY NOT NULL,
    project_id      TEXT NOT NULL,
    author_agent_id TEXT,
    title           TEXT NOT NULL,
    body            TEXT NOT NULL,
    created_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_agent_role ON agent(project_id, role_type);
CREATE INDEX IF NOT EXISTS idx_agent_session ON agent(tmux_session);
CREATE INDEX IF NOT EXISTS idx_reminder_project ON scheduled_reminder(project_id);
CREATE INDEX IF NOT EXISTS idx_content_author ON content(author_agent_id);
";

    sqlx::raw_sql(ddl).execute(pool).await?;
    Ok(())
}
