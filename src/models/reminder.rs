//! Scheduled reminder model and due-ness evaluation.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppError, Result};

/// A recurring message delivered to every agent of a given role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ScheduledReminder {
    /// Unique record identifier.
    pub id: String,
    /// Owning project; only agents of this project receive the reminder.
    pub project_id: String,
    /// Operator-facing name.
    pub name: String,
    /// Role whose agents receive the message.
    pub target_role_type: String,
    /// Text typed into each matching session.
    pub message: String,
    /// Minimum minutes between two firings.
    pub frequency_minutes: u32,
    /// Inactive reminders are never evaluated.
    pub is_active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
    /// When the reminder last fired; `None` until the first firing.
    pub last_fired_at: Option<DateTime<Utc>>,
}

impl ScheduledReminder {
    /// Construct a new active reminder with a generated identifier.
    #[must_use]
    pub fn new(
        project_id: String,
        name: String,
        target_role_type: String,
        message: String,
        frequency_minutes: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            project_id,
            name,
            target_role_type,
            message,
            frequency_minutes,
            is_active: true,
            created_at: now,
            updated_at: now,
            last_fired_at: None,
        }
    }

    /// Check field constraints.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidInput` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.project_id.trim().is_empty() {
            return Err(AppError::InvalidInput("project_id must not be empty".into()));
        }
        if self.name.trim().is_empty() {
            return Err(AppError::InvalidInput("name must not be empty".into()));
        }
        if self.target_role_type.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "target_role_type must not be empty".into(),
            ));
        }
        if self.message.is_empty() {
            return Err(AppError::InvalidInput("message must not be empty".into()));
        }
        if self.frequency_minutes == 0 {
            return Err(AppError::InvalidInput(
                "frequency_minutes must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Whether at least `frequency_minutes` have elapsed since the last
    /// firing (or since creation, if it never fired).
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if !self.is_active || self.frequency_minutes == 0 {
            return false;
        }
        let anchor = self.last_fired_at.unwrap_or(self.created_at);
        now.signed_duration_since(anchor) >= Duration::minutes(i64::from(self.frequency_minutes))
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, patch: &ReminderPatch) {
        if let Some(ref name) = patch.name {
            name.clone_into(&mut self.name);
        }
        if let Some(ref role) = patch.target_role_type {
            role.clone_into(&mut self.target_role_type);
        }
        if let Some(ref message) = patch.message {
            message.clone_into(&mut self.message);
        }
        if let Some(minutes) = patch.frequency_minutes {
            self.frequency_minutes = minutes;
        }
        if let Some(active) = patch.is_active {
            self.is_active = active;
        }
    }
}

/// Partial update for a reminder; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReminderPatch {
    /// New name.
    pub name: Option<String>,
    /// New target role.
    pub target_role_type: Option<String>,
    /// New message text.
    pub message: Option<String>,
    /// New frequency.
    pub frequency_minutes: Option<u32>,
    /// Enable or disable.
    pub is_active: Option<bool>,
}
