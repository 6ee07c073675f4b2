//! Session state persisted as one unit across all storage tiers.
//!
//! # Responsibility
//! - Define `SyncData` and the annotation records it carries.
//! - Keep the JSON shape compatible with state saved by earlier versions.
//!
//! # Invariants
//! - Absent fields deserialize to defaults; unknown fields are ignored.
//! - `completed_paths` has set semantics even though it is stored ordered.
//! - `note_categories` never holds duplicates when mutated through the
//!   session controller.

use crate::model::retrieval::{NodeRetrievalStats, RetrievalSession};
use crate::model::skeleton::{compute_stats, NodeStats, SkeletonNode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Categories seeded into every new session.
pub const DEFAULT_NOTE_CATEGORIES: [&str; 4] = [
    "Concept anchor",
    "Logic principle",
    "Action directive",
    "Blind spot",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

/// Free-text annotation attached to one node path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub content: String,
    /// Text as first entered, before any correction pass.
    pub original_content: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrections: Option<String>,
}

/// Canvas document drawn for one node. Contents are opaque to the core.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DrawingDocument {
    pub elements: Vec<serde_json::Value>,
    pub app_state: serde_json::Value,
    pub files: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MenuAction {
    OpenSettings,
    ToggleExpand,
    ToggleTheme,
    Refresh,
    ToggleMarkdownPanel,
    Reparse,
    ApiSettings,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MenuPosition {
    Top,
    Bottom,
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: String,
    pub label: String,
    pub icon: String,
    pub action: MenuAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuGroup {
    pub id: String,
    pub label: String,
    pub items: Vec<MenuItem>,
    pub position: MenuPosition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuConfig {
    pub groups: Vec<MenuGroup>,
}

impl Default for MenuConfig {
    fn default() -> Self {
        let item = |id: &str, label: &str, icon: &str, action: MenuAction| MenuItem {
            id: id.to_string(),
            label: label.to_string(),
            icon: icon.to_string(),
            action,
            visible: Some(true),
        };
        Self {
            groups: vec![MenuGroup {
                id: "radial".to_string(),
                label: "Quick actions".to_string(),
                position: MenuPosition::Top,
                items: vec![
                    item("settings", "Categories", "Settings", MenuAction::OpenSettings),
                    item("expand", "Expand logic", "Maximize2", MenuAction::ToggleExpand),
                    item("theme", "Theme", "Sun", MenuAction::ToggleTheme),
                    item("markdown", "Preview panel", "BookOpen", MenuAction::ToggleMarkdownPanel),
                    item("reparse", "Re-parse", "RefreshCw", MenuAction::Reparse),
                    item("refresh", "Refresh data", "RotateCcw", MenuAction::Refresh),
                    item("apiSettings", "API settings", "Key", MenuAction::ApiSettings),
                ],
            }],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MindMapKind {
    Center,
    Main,
    Sub,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MindMapNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: MindMapKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<MindMapNode>,
}

/// Summary generated for a group of markdown paragraphs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParagraphSummary {
    pub id: String,
    pub paragraph_indices: Vec<usize>,
    pub title: String,
    pub mind_map: MindMapNode,
    pub key_points: Vec<String>,
    pub created_at: i64,
}

/// Complete session state; the unit of persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncData {
    pub markdown: String,
    #[serde(rename = "analysis")]
    pub skeleton: Option<SkeletonNode>,
    #[serde(rename = "completedSlots")]
    pub completed_paths: Vec<String>,
    #[serde(rename = "notes")]
    pub notes_by_path: BTreeMap<String, Vec<Note>>,
    pub note_categories: Vec<String>,
    pub theme: Theme,
    pub menu_config: MenuConfig,
    #[serde(rename = "nodeParagraphs")]
    pub node_paragraph_links: BTreeMap<String, Vec<usize>>,
    pub node_drawings: BTreeMap<String, DrawingDocument>,
    pub paragraph_summaries: Vec<ParagraphSummary>,
    pub retrieval_sessions: Vec<RetrievalSession>,
    pub last_study_time: Option<i64>,
    pub next_review_time: Option<i64>,
    #[serde(rename = "nodeRetrievalStats")]
    pub retrieval_stats_by_path: BTreeMap<String, NodeRetrievalStats>,
}

impl Default for SyncData {
    fn default() -> Self {
        Self {
            markdown: String::new(),
            skeleton: None,
            completed_paths: Vec::new(),
            notes_by_path: BTreeMap::new(),
            note_categories: DEFAULT_NOTE_CATEGORIES
                .iter()
                .map(|name| (*name).to_string())
                .collect(),
            theme: Theme::default(),
            menu_config: MenuConfig::default(),
            node_paragraph_links: BTreeMap::new(),
            node_drawings: BTreeMap::new(),
            paragraph_summaries: Vec::new(),
            retrieval_sessions: Vec::new(),
            last_study_time: None,
            next_review_time: None,
            retrieval_stats_by_path: BTreeMap::new(),
        }
    }
}

impl SyncData {
    /// Fresh state for a newly generated skeleton.
    pub fn fresh(markdown: impl Into<String>, skeleton: SkeletonNode) -> Self {
        Self {
            markdown: markdown.into(),
            skeleton: Some(skeleton),
            ..Self::default()
        }
    }

    pub fn has_skeleton(&self) -> bool {
        self.skeleton.is_some()
    }

    pub fn is_completed(&self, path: &str) -> bool {
        self.completed_paths.iter().any(|completed| completed == path)
    }

    /// Whole-tree completion statistics; zeros without a skeleton.
    pub fn stats(&self) -> NodeStats {
        match self.skeleton.as_ref() {
            Some(root) => compute_stats(root, &root.label, &self.completed_paths),
            None => NodeStats::default(),
        }
    }

    pub fn notes_for(&self, path: &str) -> &[Note] {
        self.notes_by_path.get(path).map_or(&[], Vec::as_slice)
    }

    pub fn linked_paragraphs(&self, path: &str) -> &[usize] {
        self.node_paragraph_links
            .get(path)
            .map_or(&[], Vec::as_slice)
    }

    /// Reverse index from paragraph to the node path that links it.
    ///
    /// When several nodes link the same paragraph the last path in key order wins.
    pub fn paragraph_owners(&self) -> BTreeMap<usize, String> {
        let mut owners = BTreeMap::new();
        for (path, indices) in &self.node_paragraph_links {
            for index in indices {
                owners.insert(*index, path.clone());
            }
        }
        owners
    }

    /// Whether any field that drives persistence differs from `other`.
    ///
    /// `markdown`, `paragraph_summaries`, `retrieval_sessions` and the study
    /// timestamps ride along with the next tracked change.
    pub fn tracked_fields_differ(&self, other: &SyncData) -> bool {
        self.skeleton != other.skeleton
            || self.completed_paths != other.completed_paths
            || self.notes_by_path != other.notes_by_path
            || self.note_categories != other.note_categories
            || self.theme != other.theme
            || self.node_paragraph_links != other.node_paragraph_links
            || self.menu_config != other.menu_config
            || self.node_drawings != other.node_drawings
            || self.retrieval_stats_by_path != other.retrieval_stats_by_path
    }
}
