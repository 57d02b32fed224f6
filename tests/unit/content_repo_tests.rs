use std::sync::Arc;

use agent_foreman::models::content::ContentItem;
use agent_foreman::persistence::{content_repo::ContentRepo, db};

async fn repo() -> ContentRepo {
    let db = db::connect_memory().await.expect("db connect");
    ContentRepo::new(Arc::new(db))
}

fn item(author: Option<&str>, title: &str) -> ContentItem {
    ContentItem::new(
        "p1".into(),
        author.map(str::to_owned),
        title.into(),
        "body".into(),
    )
}

#[tokio::test]
async fn create_and_list_by_author() {
    let repo = repo().await;
    repo.create(&item(Some("a1"), "one")).await.expect("create");
    repo.create(&item(Some("a1"), "two")).await.expect("create");
    repo.create(&item(Some("a2"), "three")).await.expect("create");

    let by_a1 = repo.list_by_author("a1").await.expect("list");
    assert_eq!(by_a1.len(), 2);
    assert!(by_a1.iter().all(|c| c.author_agent_id.as_deref() == Some("a1")));
}

#[tokio::test]
async fn reassign_author_orphans_only_that_author() {
    let repo = repo().await;
    let mine = repo.create(&item(Some("a1"), "mine")).await.unwrap();
    let theirs = repo.create(&item(Some("a2"), "theirs")).await.unwrap();

    let moved = repo.reassign_author("a1").await.expect("reassign");
    assert_eq!(moved, 1);
    assert!(repo.list_by_author("a1").await.unwrap().is_empty());

    let orphan = repo.get_by_id(&mine.id).await.unwrap().expect("kept");
    assert!(orphan.author_agent_id.is_none());
    let other = repo.get_by_id(&theirs.id).await.unwrap().expect("kept");
    assert_eq!(other.author_agent_id.as_deref(), Some("a2"));
}

#[tokio::test]
async fn reassign_with_no_content_is_zero() {
    let repo = repo().await;
    assert_eq!(repo.reassign_author("nobody").await.expect("reassign"), 0);
}
