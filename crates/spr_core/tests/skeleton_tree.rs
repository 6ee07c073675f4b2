mod support;

use spr_core::model::skeleton::{child_path, leaf_paths, path_depth, visit_paths};
use spr_core::{compute_stats, find_node_by_path, parent_paths, NodeKind, SkeletonNode, SyncData};
use support::sample_skeleton;

fn wide_tree() -> SkeletonNode {
    SkeletonNode::new("Book", NodeKind::Root).with_children(vec![
        SkeletonNode::new("Part 1", NodeKind::Part).with_children(vec![
            SkeletonNode::new("Ch 1", NodeKind::Chapter).with_children(vec![
                SkeletonNode::new("Term", NodeKind::ConceptSlot),
                SkeletonNode::new("Cause", NodeKind::LogicSlot),
                SkeletonNode::new("Do it", NodeKind::ActionSlot),
            ]),
            SkeletonNode::new("Ch 2", NodeKind::Chapter).with_children(vec![SkeletonNode::new(
                "Term",
                NodeKind::ConceptSlot,
            )]),
        ]),
        SkeletonNode::new("Part 2", NodeKind::Part),
    ])
}

#[test]
fn toggle_then_stats_counts_half() {
    let root = sample_skeleton();
    let completed = vec!["root > chapter > A".to_string()];

    let stats = compute_stats(&root, "root", &completed);
    assert_eq!((stats.total, stats.completed, stats.percentage), (2, 1, 50));
}

#[test]
fn stats_ignore_paths_not_in_tree() {
    let root = wide_tree();
    let completed = [
        "Book > Part 1 > Ch 1 > Term",
        "Book > Part 1 > Ch 2 > Term",
        "Book > Part 1 > Ch 9 > Ghost",
        "Book > Part 1",
    ];

    let stats = compute_stats(&root, "Book", &completed);
    assert_eq!(stats.total, 4);
    assert_eq!(stats.completed, 2);
    assert_eq!(stats.percentage, 50);
}

#[test]
fn subtree_stats_use_the_subtree_path() {
    let root = wide_tree();
    let chapter = find_node_by_path(&root, "Book > Part 1 > Ch 1").unwrap();
    let completed = ["Book > Part 1 > Ch 1 > Cause"];

    let stats = compute_stats(chapter, "Book > Part 1 > Ch 1", &completed);
    assert_eq!((stats.total, stats.completed, stats.percentage), (3, 1, 33));
}

#[test]
fn every_node_is_found_by_its_own_path() {
    let root = wide_tree();
    let mut visited = 0;
    visit_paths(&root, &root.label, &mut |path, node| {
        let found = find_node_by_path(&root, path).unwrap();
        assert!(std::ptr::eq(found, node), "path {path} resolved elsewhere");
        visited += 1;
    });
    assert_eq!(visited, 9);
}

#[test]
fn parent_paths_has_one_prefix_per_level() {
    let path = child_path(&child_path(&child_path("Book", "Part 1"), "Ch 1"), "Term");
    let prefixes = parent_paths(&path);

    assert_eq!(prefixes.len(), path_depth(&path));
    assert_eq!(prefixes.last(), Some(&path));
    assert_eq!(prefixes[0], "Book");
    for pair in prefixes.windows(2) {
        assert_eq!(path_depth(&pair[1]), path_depth(&pair[0]) + 1);
        assert!(pair[1].starts_with(&pair[0]));
    }
}

#[test]
fn leaf_paths_list_slots_depth_first() {
    assert_eq!(
        leaf_paths(&wide_tree()),
        vec![
            "Book > Part 1 > Ch 1 > Term",
            "Book > Part 1 > Ch 1 > Cause",
            "Book > Part 1 > Ch 1 > Do it",
            "Book > Part 1 > Ch 2 > Term",
        ]
    );
}

#[test]
fn sync_data_stats_follow_skeleton() {
    let mut data = SyncData::fresh("md", sample_skeleton());
    data.completed_paths = vec!["root > chapter > A".to_string(), "root > chapter > B".to_string()];
    assert_eq!(data.stats().percentage, 100);

    let empty = SyncData::default();
    assert_eq!(empty.stats().total, 0);
    assert_eq!(empty.stats().percentage, 0);
}
