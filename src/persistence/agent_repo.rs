//! Agent registry repository for `SQLite` persistence.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::models::agent::{Agent, AgentPatch, AgentStatus};
use crate::{AppError, Result};

use super::db::Database;
use super::parse_timestamp;

/// Repository wrapper around `SQLite` for agent records.
#[derive(Clone)]
pub struct AgentRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct AgentRow {
    id: String,
    project_id: String,
    role_type: String,
    status: String,
    tmux_session: Option<String>,
    last_heartbeat: String,
    model: String,
    created_at: String,
    updated_at: String,
}

impl AgentRow {
    fn into_agent(self) -> Result<Agent> {
        Ok(Agent {
            status: parse_status(&self.status)?,
            last_heartbeat: parse_timestamp("last_heartbeat", &self.last_heartbeat)?,
            created_at: parse_timestamp("created_at", &self.created_at)?,
            updated_at: parse_timestamp("updated_at", &self.updated_at)?,
            id: self.id,
            project_id: self.project_id,
            role_type: self.role_type,
            tmux_session: self.tmux_session,
            model: self.model,
        })
    }
}

fn parse_status(s: &str) -> Result<AgentStatus> {
    match s {
        "active" => Ok(AgentStatus::Active),
        "offline" => Ok(AgentStatus::Offline),
        other => Err(AppError::Db(format!("invalid agent status: {other}"))),
    }
}

const SELECT_COLUMNS: &str = "SELECT id, project_id, role_type, status, tmux_session, \
     last_heartbeat, model, created_at, updated_at FROM agent";

impl AgentRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new agent record.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the database insert fails.
    pub async fn create(&self, agent: &Agent) -> Result<Agent> {
        sqlx::query(
            "INSERT INTO agent (id, project_id, role_type, status, tmux_session,
             last_heartbeat, model, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&agent.id)
        .bind(&agent.project_id)
        .bind(&agent.role_type)
        .bind(agent.status.as_str())
        .bind(&agent.tmux_session)
        .bind(agent.last_heartbeat.to_rfc3339())
        .bind(&agent.model)
        .bind(agent.created_at.to_rfc3339())
        .bind(agent.updated_at.to_rfc3339())
        .execute(self.db.as_ref())
        .await?;

        Ok(agent.clone())
    }

    /// Retrieve an agent by identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Agent>> {
        let row: Option<AgentRow> = sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(self.db.as_ref())
            .await?;
        row.map(AgentRow::into_agent).transpose()
    }

    /// List every agent, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Agent>> {
        let rows: Vec<AgentRow> =
            sqlx::query_as(&format!("{SELECT_COLUMNS} ORDER BY created_at ASC"))
                .fetch_all(self.db.as_ref())
                .await?;
        rows.into_iter().map(AgentRow::into_agent).collect()
    }

    /// List active agents with a session for a project role.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_active_by_role(&self, project_id: &str, role_type: &str) -> Result<Vec<Agent>> {
        let rows: Vec<AgentRow> = sqlx::query_as(&format!(
            "{SELECT_COLUMNS} WHERE project_id = ?1 AND role_type = ?2 \
             AND status = 'active' AND tmux_session IS NOT NULL \
             ORDER BY created_at ASC"
        ))
        .bind(project_id)
        .bind(role_type)
        .fetch_all(self.db.as_ref())
        .await?;
        rows.into_iter().map(AgentRow::into_agent).collect()
    }

    /// Apply a partial update in a single statement and return the new row.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no agent has this id, or
    /// `AppError::Db` if the update fails.
    pub async fn update(&self, id: &str, patch: &AgentPatch) -> Result<Agent> {
        let (touch_session, session) = match patch.tmux_session {
            Some(ref value) => (true, value.clone()),
            None => (false, None),
        };

        let result = sqlx::query(
            "UPDATE agent SET
                status = COALESCE(?1, status),
                tmux_session = CASE WHEN ?2 THEN ?3 ELSE tmux_session END,
                last_heartbeat = COALESCE(?4, last_heartbeat),
                model = COALESCE(?5, model),
                updated_at = ?6
             WHERE id = ?7",
        )
        .bind(patch.status.map(AgentStatus::as_str))
        .bind(touch_session)
        .bind(session)
        .bind(patch.last_heartbeat.map(|ts| ts.to_rfc3339()))
        .bind(&patch.model)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(self.db.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("agent {id} not found")));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("agent {id} not found")))
    }

    /// Mark every agent attached to `session` offline and clear the session.
    ///
    /// Returns the number of rows updated.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn mark_offline_where_session(&self, session: &str) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE agent SET status = 'offline', tmux_session = NULL, updated_at = ?1
             WHERE tmux_session = ?2",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(session)
        .execute(self.db.as_ref())
        .await?;
        Ok(result.rows_affected())
    }

    /// Record a heartbeat for an agent.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the agent does not exist.
    pub async fn touch_heartbeat(&self, id: &str, at: DateTime<Utc>) -> Result<Agent> {
        let patch = AgentPatch {
            last_heartbeat: Some(at),
            ..AgentPatch::default()
        };
        self.update(id, &patch).await
    }

    /// Delete an agent record.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no row was deleted.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM agent WHERE id = ?1")
            .bind(id)
            .execute(self.db.as_ref())
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("agent {id} not found")));
        }
        Ok(())
    }
}
