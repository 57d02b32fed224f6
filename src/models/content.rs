//! Agent-authored content rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A piece of project content, optionally attributed to an agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentItem {
    /// Unique record identifier.
    pub id: String,
    /// Owning project.
    pub project_id: String,
    /// Authoring agent; `None` once the author has been killed.
    pub author_agent_id: Option<String>,
    /// Short title.
    pub title: String,
    /// Body text.
    pub body: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl ContentItem {
    /// Construct a new content item with a generated identifier.
    #[must_use]
    pub fn new(
        project_id: String,
        author_agent_id: Option<String>,
        title: String,
        body: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            project_id,
            author_agent_id,
            title,
            body,
            created_at: Utc::now(),
        }
    }
}
