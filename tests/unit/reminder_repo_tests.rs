use std::sync::Arc;

use agent_foreman::models::reminder::{ReminderPatch, ScheduledReminder};
use agent_foreman::persistence::{db, reminder_repo::ReminderRepo};
use agent_foreman::AppError;
use chrono::{Duration, Utc};

async fn repo() -> ReminderRepo {
    let db = db::connect_memory().await.expect("db connect");
    ReminderRepo::new(Arc::new(db))
}

fn reminder(project: &str, frequency_minutes: u32) -> ScheduledReminder {
    ScheduledReminder::new(
        project.into(),
        "standup".into(),
        "writer".into(),
        "post your status".into(),
        frequency_minutes,
    )
}

#[tokio::test]
async fn create_and_fetch() {
    let repo = repo().await;
    let created = repo.create(&reminder("p1", 5)).await.expect("create");

    let fetched = repo.get_by_id(&created.id).await.unwrap().expect("present");
    assert_eq!(fetched.name, "standup");
    assert_eq!(fetched.frequency_minutes, 5);
    assert!(fetched.is_active);
    assert!(fetched.last_fired_at.is_none());
}

#[tokio::test]
async fn create_rejects_invalid_reminder() {
    let repo = repo().await;
    let result = repo.create(&reminder("p1", 0)).await;
    assert!(matches!(result, Err(AppError::InvalidInput(_))));
    assert!(repo.list_by_project("p1").await.unwrap().is_empty());
}

#[tokio::test]
async fn list_active_skips_disabled() {
    let repo = repo().await;
    let active = repo.create(&reminder("p1", 5)).await.unwrap();
    let mut disabled = reminder("p1", 5);
    disabled.is_active = false;
    repo.create(&disabled).await.unwrap();

    let listed = repo.list_active().await.expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, active.id);
    assert_eq!(repo.list_by_project("p1").await.unwrap().len(), 2);
    assert!(repo.list_by_project("p2").await.unwrap().is_empty());
}

#[tokio::test]
async fn update_applies_patch_and_validates() {
    let repo = repo().await;
    let created = repo.create(&reminder("p1", 5)).await.unwrap();

    let updated = repo
        .update(
            &created.id,
            &ReminderPatch {
                message: Some("ship it".into()),
                is_active: Some(false),
                ..ReminderPatch::default()
            },
        )
        .await
        .expect("update");
    assert_eq!(updated.message, "ship it");
    assert!(!updated.is_active);

    let stored = repo.get_by_id(&created.id).await.unwrap().unwrap();
    assert_eq!(stored.message, "ship it");
    assert!(!stored.is_active);

    let invalid = repo
        .update(
            &created.id,
            &ReminderPatch {
                frequency_minutes: Some(0),
                ..ReminderPatch::default()
            },
        )
        .await;
    assert!(matches!(invalid, Err(AppError::InvalidInput(_))));
    assert_eq!(
        repo.get_by_id(&created.id).await.unwrap().unwrap().frequency_minutes,
        5
    );
}

#[tokio::test]
async fn update_unknown_is_not_found() {
    let repo = repo().await;
    let result = repo.update("missing", &ReminderPatch::default()).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn mark_fired_persists_timestamp() {
    let repo = repo().await;
    let created = repo.create(&reminder("p1", 5)).await.unwrap();
    let at = Utc::now() + Duration::minutes(6);

    repo.mark_fired(&created.id, at).await.expect("mark fired");
    let stored = repo.get_by_id(&created.id).await.unwrap().unwrap();
    assert_eq!(stored.last_fired_at, Some(at));

    assert!(matches!(
        repo.mark_fired("missing", at).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn delete_removes_reminder() {
    let repo = repo().await;
    let created = repo.create(&reminder("p1", 5)).await.unwrap();

    repo.delete(&created.id).await.expect("delete");
    assert!(repo.get_by_id(&created.id).await.unwrap().is_none());
    assert!(matches!(
        repo.delete(&created.id).await,
        Err(AppError::NotFound(_))
    ));
}
