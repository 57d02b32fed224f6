use std::sync::Arc;

use agent_foreman::forwarding::{ForwardingGate, ForwardingStore, InMemoryForwardingStore};
use agent_foreman::AppError;

#[test]
fn unknown_project_is_disabled() {
    let gate = ForwardingGate::default();
    assert!(!gate.is_enabled("p1"));
}

#[test]
fn set_and_read_back() {
    let gate = ForwardingGate::default();
    gate.set("p1", true).expect("set");
    gate.set("p2", false).expect("set");

    assert!(gate.is_enabled("p1"));
    assert!(!gate.is_enabled("p2"));

    gate.set("p1", false).expect("set");
    assert!(!gate.is_enabled("p1"));
}

#[test]
fn blank_project_is_rejected() {
    let gate = ForwardingGate::default();
    assert!(matches!(gate.set(" ", true), Err(AppError::InvalidInput(_))));
    assert!(gate.list().is_empty());
}

#[test]
fn list_is_ordered_by_project() {
    let gate = ForwardingGate::default();
    gate.set("zeta", true).unwrap();
    gate.set("alpha", false).unwrap();

    let listed: Vec<_> = gate.list().into_iter().collect();
    assert_eq!(
        listed,
        vec![("alpha".to_owned(), false), ("zeta".to_owned(), true)]
    );
}

#[test]
fn clones_share_the_store() {
    let store = Arc::new(InMemoryForwardingStore::default());
    let gate = ForwardingGate::new(store.clone());
    let other = gate.clone();

    gate.set("p1", true).unwrap();
    assert!(other.is_enabled("p1"));
    assert_eq!(store.get("p1"), Some(true));

    other.clear();
    assert!(!gate.is_enabled("p1"));
}
