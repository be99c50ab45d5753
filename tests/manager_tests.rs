use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use tasktree::models::{
    AttrKey, Criteria, Kind, Manager, NodeDraft, NodeRecord, TreeError, MAX_PRIORITY,
};

#[test]
fn test_workspace_flow() {
    let mut manager = Manager::new("Project".to_string());

    // Build a small backlog under the root
    assert!(manager.create("Backlog".to_string(), Kind::Container));
    assert!(manager.create("In progress".to_string(), Kind::Container));

    assert!(manager.step_into(0));
    assert!(manager.create("Write parser".to_string(), Kind::Leaf));
    assert!(manager.create("Add CLI flags".to_string(), Kind::Leaf));
    assert_eq!(manager.children_snapshots().len(), 2);

    // Move the first backlog item into "In progress"
    assert!(manager.step_into(0));
    assert_eq!(manager.cursor_snapshot().name(), "Write parser");
    assert!(manager.move_to(vec![1]));
    assert_eq!(manager.path().to_vec(), vec![1, 0]);

    // Complete it and verify the fold reaches its new parent
    manager.set_complete(true);
    manager.step_up();
    assert_eq!(manager.cursor_snapshot().name(), "In progress");
    assert!(manager.is_complete());

    // The backlog still holds the remaining item
    manager.home();
    let backlog = manager.children_snapshots_of(vec![0]).unwrap();
    assert_eq!(backlog.len(), 1);
    assert_eq!(backlog[0].name(), "Add CLI flags");

    // The root stays open while the backlog has open work
    assert!(!manager.is_complete());
}

#[test]
fn test_priority_validation() {
    let mut manager = Manager::new("Project".to_string());

    // Every value in the allowed range is accepted
    for priority in 0..=MAX_PRIORITY {
        assert!(manager.set_priority(priority).is_ok());
    }
    assert_eq!(manager.cursor_snapshot().priority(), MAX_PRIORITY);

    // Values past the bound are rejected and leave the node untouched
    let result = manager.set_priority(MAX_PRIORITY + 1);
    assert_eq!(result, Err(TreeError::InvalidPriority(MAX_PRIORITY + 1)));
    assert_eq!(manager.cursor_snapshot().priority(), MAX_PRIORITY);
}

#[test]
fn test_conversion_requires_empty_container() {
    let mut manager = Manager::new("Project".to_string());
    manager.create("Notes".to_string(), Kind::Container);
    manager.step_into(0);
    manager.create("Draft outline".to_string(), Kind::Leaf);
    manager.create("Collect links".to_string(), Kind::Leaf);

    // A container holding children cannot become a leaf
    assert_eq!(manager.set_kind(Kind::Leaf), Err(TreeError::InvalidConversion));
    assert_eq!(manager.cursor_snapshot().kind(), Kind::Container);

    // Once emptied it converts both ways
    assert!(manager.delete_child(1));
    assert!(manager.delete_child(0));
    assert!(manager.set_kind(Kind::Leaf).is_ok());
    assert_eq!(manager.cursor_snapshot().kind(), Kind::Leaf);
    assert!(manager.set_kind(Kind::Container).is_ok());
}

#[test]
fn test_persistence_round_trip() {
    let mut manager = Manager::new("Project".to_string());
    manager.set_description("Top level".to_string());
    manager.set_due_date(Utc.with_ymd_and_hms(2026, 9, 1, 12, 0, 0).unwrap());
    manager.set_priority(3).unwrap();

    manager.create("Backlog".to_string(), Kind::Container);
    manager.step_into(0);
    manager.create("Write parser".to_string(), Kind::Leaf);
    manager.step_into(0);
    manager.set_complete(true);

    // Serialize the tree and load it back
    let record = manager.to_record();
    let json = serde_json::to_string(&record).unwrap();
    let decoded: NodeRecord = serde_json::from_str(&json).unwrap();
    let restored = Manager::from_record(decoded).unwrap();

    let root = restored.cursor_snapshot();
    assert_eq!(root.name(), "Project");
    assert_eq!(root.description(), "Top level");
    assert_eq!(root.due_date(), Utc.with_ymd_and_hms(2026, 9, 1, 12, 0, 0).unwrap());
    assert_eq!(root.priority(), 3);
    assert_eq!(root.child_count(), 1);

    let leaf = restored.snapshot_of(vec![0, 0]).unwrap();
    assert_eq!(leaf.name(), "Write parser");
    assert_eq!(leaf.kind(), Kind::Leaf);
    assert!(leaf.is_complete());
}

#[test]
fn test_create_from_draft() {
    let mut manager = Manager::new("Project".to_string());

    // An empty draft falls back to the stock defaults
    assert!(manager.create_from(NodeDraft::default()));

    // A populated draft carries its fields through
    let draft = NodeDraft {
        name: Some("Ship release".to_string()),
        priority: Some(7),
        complete: Some(true),
        kind: Some(Kind::Leaf),
        ..NodeDraft::default()
    };
    assert!(manager.create_from(draft));

    let children = manager.children_snapshots();
    assert_eq!(children[0].name(), "Default");
    assert_eq!(children[0].description(), "Default Description");
    assert_eq!(children[0].kind(), Kind::Container);
    assert_eq!(children[1].name(), "Ship release");
    assert_eq!(children[1].priority(), 7);
    assert!(children[1].is_complete());
    assert_eq!(children[1].kind(), Kind::Leaf);
}

#[test]
fn test_search_across_the_tree() {
    let mut manager = Manager::new("Project".to_string());
    manager.create("Backlog".to_string(), Kind::Container);
    manager.create("Done".to_string(), Kind::Container);
    manager.step_into(0);
    manager.create("Fix login".to_string(), Kind::Leaf);
    manager.home();
    manager.step_into(1);
    manager.create("Fix login".to_string(), Kind::Leaf);
    manager.step_into(0);
    manager.set_complete(true);
    manager.home();

    // Name matches are case-insensitive and reach every branch
    let criteria = Criteria::new().with(AttrKey::Name, "fix login");
    let hits = manager.search(&criteria);
    assert_eq!(hits.len(), 2);

    // Adding a second field narrows the result to the completed copy
    let criteria = criteria.with(AttrKey::Complete, "true");
    let hits = manager.search(&criteria);
    assert_eq!(hits.len(), 1);
    assert!(hits[0].is_complete());
}
