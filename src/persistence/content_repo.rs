//! Content repository: the narrow slice of the content store the
//! supervisor needs when an agent is killed.

use std::sync::Arc;

use crate::models::content::ContentItem;
use crate::Result;

use super::db::Database;
use super::parse_timestamp;

/// Repository for content records.
#[derive(Clone)]
pub struct ContentRepo {
    db: Arc<Database>,
}

#[derive(sqlx::FromRow)]
struct ContentRow {
    id: String,
    project_id: String,
    author_agent_id: Option<String>,
    title: String,
    body: String,
    created_at: String,
}

impl ContentRow {
    fn into_item(self) -> Result<ContentItem> {
        Ok(ContentItem {
            created_at: parse_timestamp("created_at", &self.created_at)?,
            id: self.id,
            project_id: self.project_id,
            author_agent_id: self.author_agent_id,
            title: self.title,
            body: self.body,
        })
    }
}

impl ContentRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new content item.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn create(&self, item: &ContentItem) -> Result<ContentItem> {
        sqlx::query(
            "INSERT INTO content (id, project_id, author_agent_id, title, body, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&item.id)
        .bind(&item.project_id)
        .bind(&item.author_agent_id)
        .bind(&item.title)
        .bind(&item.body)
        .bind(item.created_at.to_rfc3339())
        .execute(self.db.as_ref())
        .await?;
        Ok(item.clone())
    }

    /// Retrieve a content item by identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<ContentItem>> {
        let row: Option<ContentRow> = sqlx::query_as(
            "SELECT id, project_id, author_agent_id, title, body, created_at
             FROM content WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(self.db.as_ref())
        .await?;
        row.map(ContentRow::into_item).transpose()
    }

    /// List content authored by an agent.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_by_author(&self, agent_id: &str) -> Result<Vec<ContentItem>> {
        let rows: Vec<ContentRow> = sqlx::query_as(
            "SELECT id, project_id, author_agent_id, title, body, created_at
             FROM content WHERE author_agent_id = ?1 ORDER BY created_at ASC",
        )
        .bind(agent_id)
        .fetch_all(self.db.as_ref())
        .await?;
        rows.into_iter().map(ContentRow::into_item).collect()
    }

    /// Detach every content row from `agent_id`, leaving it authorless.
    ///
    /// Returns the number of rows reassigned.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn reassign_author(&self, agent_id: &str) -> Result<u64> {
        let result =
            sqlx::query("UPDATE content SET author_agent_id = NULL WHERE author_agent_id = ?1")
                .bind(agent_id)
                .execute(self.db.as_ref())
                .await?;
        Ok(result.rows_affected())
    }
}
