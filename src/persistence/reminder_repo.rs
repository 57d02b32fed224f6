//! Scheduled reminder repository for `SQLite` persistence.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::models::reminder::{ReminderPatch, ScheduledReminder};
use crate::{AppError, Result};

use super::db::Database;
use super::parse_timestamp;

/// Repository for scheduled reminder records.
#[derive(Clone)]
pub struct ReminderRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct ReminderRow {
    id: String,
    project_id: String,
    name: String,
    target_role_type: String,
    message: String,
    frequency_minutes: i64,
    is_active: i64,
    created_at: String,
    updated_at: String,
    last_fired_at: Option<String>,
}

impl ReminderRow {
    fn into_reminder(self) -> Result<ScheduledReminder> {
        let frequency_minutes = u32::try_from(self.frequency_minutes)
            .map_err(|e| AppError::Db(format!("invalid frequency_minutes: {e}")))?;
        let last_fired_at = self
            .last_fired_at
            .as_deref()
            .map(|raw| parse_timestamp("last_fired_at", raw))
            .transpose()?;

        Ok(ScheduledReminder {
            created_at: parse_timestamp("created_at", &self.created_at)?,
            updated_at: parse_timestamp("updated_at", &self.updated_at)?,
            id: self.id,
            project_id: self.project_id,
            name: self.name,
            target_role_type: self.target_role_type,
            message: self.message,
            frequency_minutes,
            is_active: self.is_active != 0,
            last_fired_at,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT id, project_id, name, target_role_type, message, \
     frequency_minutes, is_active, created_at, updated_at, last_fired_at \
     FROM scheduled_reminder";

impl ReminderRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Validate and insert a new reminder.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidInput` if validation fails, or
    /// `AppError::Db` if the insert fails.
    pub async fn create(&self, reminder: &ScheduledReminder) -> Result<ScheduledReminder> {
        reminder.validate()?;

        sqlx::query(
            "INSERT INTO scheduled_reminder (id, project_id, name, target_role_type, message,
             frequency_minutes, is_active, created_at, updated_at, last_fired_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&reminder.id)
        .bind(&reminder.project_id)
        .bind(&reminder.name)
        .bind(&reminder.target_role_type)
        .bind(&reminder.message)
        .bind(i64::from(reminder.frequency_minutes))
        .bind(i64::from(reminder.is_active))
        .bind(reminder.created_at.to_rfc3339())
        .bind(reminder.updated_at.to_rfc3339())
        .bind(reminder.last_fired_at.map(|ts| ts.to_rfc3339()))
        .execute(self.db.as_ref())
        .await?;

        Ok(reminder.clone())
    }

    /// Retrieve a reminder by identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<ScheduledReminder>> {
        let row: Option<ReminderRow> =
            sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE id = ?1"))
                .bind(id)
                .fetch_optional(self.db.as_ref())
                .await?;
        row.map(ReminderRow::into_reminder).transpose()
    }

    /// List all reminders of a project, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_by_project(&self, project_id: &str) -> Result<Vec<ScheduledReminder>> {
        let rows: Vec<ReminderRow> = sqlx::query_as(&format!(
            "{SELECT_COLUMNS} WHERE project_id = ?1 ORDER BY created_at ASC"
        ))
        .bind(project_id)
        .fetch_all(self.db.as_ref())
        .await?;
        rows.into_iter().map(ReminderRow::into_reminder).collect()
    }

    /// List every active reminder across projects.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_active(&self) -> Result<Vec<ScheduledReminder>> {
        let rows: Vec<ReminderRow> = sqlx::query_as(&format!(
            "{SELECT_COLUMNS} WHERE is_active = 1 ORDER BY created_at ASC"
        ))
        .fetch_all(self.db.as_ref())
        .await?;
        rows.into_iter().map(ReminderRow::into_reminder).collect()
    }

    /// Apply a partial update and return the stored result.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown id,
    /// `AppError::InvalidInput` if the patched reminder is invalid, or
    /// `AppError::Db` if the update fails.
    pub async fn update(&self, id: &str, patch: &ReminderPatch) -> Result<ScheduledReminder> {
        let mut current = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("reminder {id} not found")))?;
        current.apply(patch);
        current.validate()?;
        current.updated_at = Utc::now();

        sqlx::query(
            "UPDATE scheduled_reminder SET name = ?1, target_role_type = ?2, message = ?3,
             frequency_minutes = ?4, is_active = ?5, updated_at = ?6
             WHERE id = ?7",
        )
        .bind(&current.name)
        .bind(&current.target_role_type)
        .bind(&current.message)
        .bind(i64::from(current.frequency_minutes))
        .bind(i64::from(current.is_active))
        .bind(current.updated_at.to_rfc3339())
        .bind(id)
        .execute(self.db.as_ref())
        .await?;

        Ok(current)
    }

    /// Record that a reminder fired at `at`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the reminder no longer exists.
    pub async fn mark_fired(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query("UPDATE scheduled_reminder SET last_fired_at = ?1 WHERE id = ?2")
            .bind(at.to_rfc3339())
            .bind(id)
            .execute(self.db.as_ref())
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("reminder {id} not found")));
        }
        Ok(())
    }

    /// Delete a reminder.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no row was deleted.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM scheduled_reminder WHERE id = ?1")
            .bind(id)
            .execute(self.db.as_ref())
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("reminder {id} not found")));
        }
        Ok(())
    }
}
