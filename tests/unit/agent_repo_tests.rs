use std::sync::Arc;

use agent_foreman::models::agent::{Agent, AgentPatch, AgentStatus};
use agent_foreman::persistence::{agent_repo::AgentRepo, db};
use agent_foreman::AppError;
use chrono::{Duration, Utc};

async fn repo() -> AgentRepo {
    let db = db::connect_memory().await.expect("db connect");
    AgentRepo::new(Arc::new(db))
}

fn agent(project: &str, role: &str, session: Option<&str>) -> Agent {
    Agent::new(
        project.into(),
        role.into(),
        "model-x".into(),
        session.map(str::to_owned),
    )
}

#[tokio::test]
async fn in_memory_connect_creates_tables() {
    let pool = db::connect_memory().await.expect("db connect");
    for table in ["agent", "scheduled_reminder", "content"] {
        let row: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&pool)
            .await
            .unwrap_or_else(|e| panic!("table '{table}' should be queryable: {e}"));
        assert_eq!(row.0, 0);
    }
}

#[tokio::test]
async fn create_and_fetch_round_trips_fields() {
    let repo = repo().await;
    let created = repo
        .create(&agent("p1", "writer", Some("w1")))
        .await
        .expect("create");

    let fetched = repo
        .get_by_id(&created.id)
        .await
        .expect("fetch")
        .expect("present");
    assert_eq!(fetched.project_id, "p1");
    assert_eq!(fetched.role_type, "writer");
    assert_eq!(fetched.status, AgentStatus::Active);
    assert_eq!(fetched.tmux_session.as_deref(), Some("w1"));
    assert_eq!(fetched.model, "model-x");
}

#[tokio::test]
async fn get_unknown_is_none() {
    let repo = repo().await;
    assert!(repo.get_by_id("missing").await.expect("query").is_none());
}

#[tokio::test]
async fn offline_patch_clears_session_and_status() {
    let repo = repo().await;
    let created = repo
        .create(&agent("p1", "writer", Some("w1")))
        .await
        .expect("create");

    let updated = repo
        .update(&created.id, &AgentPatch::offline())
        .await
        .expect("update");
    assert_eq!(updated.status, AgentStatus::Offline);
    assert!(updated.tmux_session.is_none());
    assert_eq!(updated.model, "model-x");
}

#[tokio::test]
async fn patch_without_session_leaves_session() {
    let repo = repo().await;
    let created = repo
        .create(&agent("p1", "writer", Some("w1")))
        .await
        .expect("create");

    let updated = repo
        .update(
            &created.id,
            &AgentPatch {
                model: Some("model-y".into()),
                ..AgentPatch::default()
            },
        )
        .await
        .expect("update");
    assert_eq!(updated.model, "model-y");
    assert_eq!(updated.tmux_session.as_deref(), Some("w1"));
    assert_eq!(updated.status, AgentStatus::Active);
}

#[tokio::test]
async fn update_unknown_is_not_found() {
    let repo = repo().await;
    let result = repo.update("missing", &AgentPatch::offline()).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn list_active_by_role_filters_project_role_and_status() {
    let repo = repo().await;
    let hit = repo.create(&agent("p1", "writer", Some("w1"))).await.unwrap();
    repo.create(&agent("p1", "editor", Some("e1"))).await.unwrap();
    repo.create(&agent("p2", "writer", Some("w2"))).await.unwrap();
    repo.create(&agent("p1", "writer", None)).await.unwrap();

    let found = repo.list_active_by_role("p1", "writer").await.expect("list");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, hit.id);
}

#[tokio::test]
async fn mark_offline_where_session_hits_every_holder() {
    let repo = repo().await;
    let a = repo.create(&agent("p1", "writer", Some("shared"))).await.unwrap();
    let b = repo.create(&agent("p1", "editor", Some("shared"))).await.unwrap();
    let c = repo.create(&agent("p1", "writer", Some("other"))).await.unwrap();

    let affected = repo.mark_offline_where_session("shared").await.expect("mark");
    assert_eq!(affected, 2);

    for id in [&a.id, &b.id] {
        let row = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(row.status, AgentStatus::Offline);
        assert!(row.tmux_session.is_none());
    }
    let untouched = repo.get_by_id(&c.id).await.unwrap().unwrap();
    assert_eq!(untouched.status, AgentStatus::Active);
}

#[tokio::test]
async fn touch_heartbeat_sets_timestamp() {
    let repo = repo().await;
    let created = repo.create(&agent("p1", "writer", Some("w1"))).await.unwrap();
    let at = Utc::now() + Duration::minutes(3);

    let updated = repo.touch_heartbeat(&created.id, at).await.expect("touch");
    assert_eq!(updated.last_heartbeat, at);
}

#[tokio::test]
async fn delete_removes_row_and_second_delete_is_not_found() {
    let repo = repo().await;
    let created = repo.create(&agent("p1", "writer", None)).await.unwrap();

    repo.delete(&created.id).await.expect("delete");
    assert!(repo.get_by_id(&created.id).await.unwrap().is_none());
    assert!(matches!(
        repo.delete(&created.id).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn list_all_returns_every_agent() {
    let repo = repo().await;
    repo.create(&agent("p1", "writer", None)).await.unwrap();
    repo.create(&agent("p2", "editor", Some("e1"))).await.unwrap();

    assert_eq!(repo.list_all().await.expect("list").len(), 2);
}
