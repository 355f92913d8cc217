use biograph::core::{Row, Scalar};
use biograph::execution::regroup::regroup;
use biograph::parsing::schema_config::SchemaRegistry;
use biograph::stats::taxonomy::{
    build_tree, entries_from_grouped, OccupationCount, TaxonomyNode, UnresolvedReason, DEFAULT_MAX_DEPTH,
    ROOT_ID,
};
use std::collections::HashSet;

fn occupation(id: &str, label: &str, count: i64, broader: Option<&str>) -> Row {
    let mut row = Row::from_pairs([
        ("occupation", Scalar::from(id)),
        ("occupationLabel", Scalar::from(label)),
        ("count", Scalar::Integer(count)),
    ]);
    if let Some(broader) = broader {
        row.insert("broader", broader);
        row.insert("broaderLabel", format!("label of {}", broader));
    }
    row
}

fn schemas() -> SchemaRegistry {
    SchemaRegistry::from_file(concat!(env!("CARGO_MANIFEST_DIR"), "/config/schemas.json")).unwrap()
}

fn assert_rooted(root: &TaxonomyNode) {
    let ids = root.ids();
    let unique: HashSet<&str> = ids.iter().copied().collect();
    assert_eq!(ids.len(), unique.len(), "a node appears twice: {:?}", ids);
    assert_eq!(root.size(), ids.len());
}

#[test]
fn test_doctor_surgeon_from_rows() {
    let rows = vec![
        occupation("o1", "Doctor", 5, None),
        occupation("o2", "Surgeon", 2, Some("o1")),
    ];
    let grouped = regroup(&rows, schemas().get("statistics_occupations").unwrap(), None).unwrap();
    let tree = build_tree(entries_from_grouped(&grouped).unwrap(), DEFAULT_MAX_DEPTH);

    assert!(tree.unresolved.is_empty());
    assert_eq!(tree.root.id, ROOT_ID);
    assert_eq!(tree.root.children.len(), 1);

    let doctor = &tree.root.children[0];
    assert_eq!((doctor.id.as_str(), doctor.label.as_str(), doctor.count), ("o1", "Doctor", 5));
    assert_eq!(doctor.children.len(), 1);
    assert_eq!(doctor.children[0].id, "o2");
    assert_eq!(doctor.children[0].label, "Surgeon");
    assert_eq!(doctor.children[0].count, 2);
    assert!(doctor.children[0].children.is_empty());
}

#[test]
fn test_child_listed_before_parent() {
    let entries = vec![
        OccupationCount::new("o3", "Cardiac surgeon", 1).with_broader("o2"),
        OccupationCount::new("o2", "Surgeon", 2).with_broader("o1"),
        OccupationCount::new("o1", "Doctor", 5),
        OccupationCount::new("p1", "Painter", 7),
    ];
    let tree = build_tree(entries, DEFAULT_MAX_DEPTH);

    assert!(tree.unresolved.is_empty());
    assert_eq!(tree.root.ids(), vec![ROOT_ID, "o1", "o2", "o3", "p1"]);
    assert_rooted(&tree.root);
}

#[test]
fn test_orphans_and_cycles_terminate() {
    let entries = vec![
        OccupationCount::new("o1", "Doctor", 5),
        OccupationCount::new("x", "Orphan", 1).with_broader("nowhere"),
        OccupationCount::new("a", "A", 1).with_broader("b"),
        OccupationCount::new("b", "B", 1).with_broader("a"),
    ];
    let tree = build_tree(entries, DEFAULT_MAX_DEPTH);

    assert_eq!(tree.root.size(), 2);
    assert_eq!(tree.unresolved.len(), 3);
    assert!(tree.unresolved.iter().all(|e| e.reason == UnresolvedReason::MissingParent));
    assert_rooted(&tree.root);
}

#[test]
fn test_deep_chain_beyond_budget() {
    let mut entries = vec![OccupationCount::new("l0", "Level 0", 1)];
    for level in 1..10 {
        entries.push(
            OccupationCount::new(format!("l{}", level), format!("Level {}", level).as_str(), 1)
                .with_broader(format!("l{}", level - 1)),
        );
    }
    entries.reverse();

    let tree = build_tree(entries, 4);
    assert_eq!(tree.root.size(), 1 + 5);
    assert_eq!(tree.unresolved.len(), 5);
    assert!(tree.unresolved.iter().all(|e| e.reason == UnresolvedReason::DepthExceeded));
}

#[test]
fn test_hierarchical_labels_from_rows() {
    let rows = vec![
        occupation("o1", "Health >> Medicine >> Doctor", 5, None),
        occupation("o1", "Arzt", 5, None),
    ];
    let grouped = regroup(&rows, schemas().get("statistics_occupations").unwrap(), None).unwrap();
    let tree = build_tree(entries_from_grouped(&grouped).unwrap(), DEFAULT_MAX_DEPTH);
    assert_eq!(tree.root.children[0].label, "Health >> Medicine >> Doctor / Arzt");

    let tree = build_tree(vec![OccupationCount::new("o1", "Health >> Medicine >> Doctor", 5)], 1);
    assert_eq!(tree.root.children[0].label, "Doctor");
}

#[test]
fn test_tree_serialization_omits_empty_children() {
    let tree = build_tree(vec![OccupationCount::new("o1", "Doctor", 5)], DEFAULT_MAX_DEPTH);
    let json = serde_json::to_value(&tree.root).unwrap();
    assert_eq!(json["children"][0]["id"], "o1");
    assert!(json["children"][0].get("children").is_none());
}
