//! Recall skeleton tree model.
//!
//! # Responsibility
//! - Define the recursive outline node produced by skeleton generation.
//! - Derive completion statistics and path utilities without mutation.
//!
//! # Invariants
//! - A node path is the root label followed by child labels joined with
//!   [`PATH_SEPARATOR`]; it is the only identity of a node.
//! - Stats traversal builds paths with exactly the same rule as
//!   [`child_path`], otherwise recorded completions silently stop matching.
//! - Only slot kinds count toward statistics.
//! - An unrecognized node kind never fails a load; it reads as [`NodeKind::Unknown`].

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Separator between labels in a node path.
pub const PATH_SEPARATOR: &str = " > ";

/// Category of one skeleton node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    #[serde(rename = "root")]
    Root,
    #[serde(rename = "part")]
    Part,
    #[serde(rename = "chapter")]
    Chapter,
    /// Definition or term to recall.
    #[serde(rename = "slot_concept")]
    ConceptSlot,
    /// Mechanism or causal chain to recall.
    #[serde(rename = "slot_logic")]
    LogicSlot,
    /// Concrete method or advice to recall.
    #[serde(rename = "slot_action")]
    ActionSlot,
    /// Any other `type` string; structural, so stats skip it but count its children.
    #[serde(rename = "unknown")]
    #[serde(other)]
    Unknown,
}

impl NodeKind {
    /// Returns whether this kind is a recallable leaf unit.
    pub fn is_leaf(self) -> bool {
        matches!(self, Self::ConceptSlot | Self::LogicSlot | Self::ActionSlot)
    }
}

/// Returns whether `kind` is one of the slot kinds.
pub fn is_leaf(kind: NodeKind) -> bool {
    kind.is_leaf()
}

/// One level of document structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkeletonNode {
    /// Display text, also the path segment for this node.
    pub label: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SkeletonNode>,
}

impl SkeletonNode {
    pub fn new(label: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            label: label.into(),
            kind,
            children: Vec::new(),
        }
    }

    /// Builder-style helper used when assembling trees by hand.
    pub fn with_children(mut self, children: Vec<SkeletonNode>) -> Self {
        self.children = children;
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.kind.is_leaf()
    }
}

/// Completion statistics for one subtree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStats {
    pub total: u32,
    pub completed: u32,
    pub percentage: u32,
}

impl NodeStats {
    fn from_counts(total: u32, completed: u32) -> Self {
        Self {
            total,
            completed,
            percentage: percentage_of(completed, total),
        }
    }
}

/// Rounded percentage of `part / whole`, `0` when `whole == 0`.
pub fn percentage_of(part: u32, whole: u32) -> u32 {
    if whole == 0 {
        return 0;
    }
    ((f64::from(part) / f64::from(whole)) * 100.0).round() as u32
}

/// Builds the path of a child under `parent_path`.
pub fn child_path(parent_path: &str, label: &str) -> String {
    format!("{parent_path}{PATH_SEPARATOR}{label}")
}

/// Number of labels in `path`.
pub fn path_depth(path: &str) -> usize {
    path.split(PATH_SEPARATOR).count()
}

/// Computes leaf completion statistics for `node` and all descendants.
///
/// `path` is the path of `node` itself; for a root this is its label.
pub fn compute_stats<S: AsRef<str>>(node: &SkeletonNode, path: &str, completed: &[S]) -> NodeStats {
    let completed: HashSet<&str> = completed.iter().map(AsRef::as_ref).collect();
    let mut total = 0;
    let mut done = 0;
    visit_paths(node, path, &mut |node_path, visited| {
        if visited.is_leaf() {
            total += 1;
            if completed.contains(node_path) {
                done += 1;
            }
        }
    });
    NodeStats::from_counts(total, done)
}

/// Returns every prefix of `path` from the root segment to `path` itself.
pub fn parent_paths(path: &str) -> Vec<String> {
    let parts: Vec<&str> = path.split(PATH_SEPARATOR).collect();
    (1..=parts.len())
        .map(|end| parts[..end].join(PATH_SEPARATOR))
        .collect()
}

/// Resolves `path` against `root`, ignoring the root segment itself.
///
/// Any missing segment yields `None`; there is no partial match.
pub fn find_node_by_path<'a>(root: &'a SkeletonNode, path: &str) -> Option<&'a SkeletonNode> {
    let mut current = root;
    for segment in path.split(PATH_SEPARATOR).skip(1) {
        current = current
            .children
            .iter()
            .find(|child| child.label == segment)?;
    }
    Some(current)
}

/// Paths of every slot node, in depth-first order.
pub fn leaf_paths(root: &SkeletonNode) -> Vec<String> {
    let mut paths = Vec::new();
    visit_paths(root, &root.label, &mut |path, node| {
        if node.is_leaf() {
            paths.push(path.to_string());
        }
    });
    paths
}

/// Every slot node, in depth-first order.
pub fn leaf_nodes(root: &SkeletonNode) -> Vec<&SkeletonNode> {
    let mut leaves = Vec::new();
    collect_leaves(root, &mut leaves);
    leaves
}

/// Every label in the tree, root first, depth-first.
pub fn all_labels(root: &SkeletonNode) -> Vec<String> {
    let mut labels = Vec::new();
    visit_paths(root, &root.label, &mut |_, node| labels.push(node.label.clone()));
    labels
}

/// Depth-first walk passing each node together with its path.
pub fn visit_paths<'a>(
    node: &'a SkeletonNode,
    path: &str,
    f: &mut impl FnMut(&str, &'a SkeletonNode),
) {
    f(path, node);
    for child in &node.children {
        visit_paths(child, &child_path(path, &child.label), f);
    }
}

fn collect_leaves<'a>(node: &'a SkeletonNode, out: &mut Vec<&'a SkeletonNode>) {
    if node.is_leaf() {
        out.push(node);
    }
    for child in &node.children {
        collect_leaves(child, out);
    }
}
