use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::BookmarkError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Left,
    Right,
    Merged,
}

impl From<Side> for Origin {
    fn from(side: Side) -> Self {
        match side {
            Side::Left => Origin::Left,
            Side::Right => Origin::Right,
        }
    }
}

/// A folder or a bookmark. Folders carry `children` (possibly empty),
/// bookmarks carry `url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkNode {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<BookmarkNode>>,
    /// Titles from the top level down to this node, inclusive.
    pub path: Vec<String>,
    pub origin: Origin,
    /// Milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl BookmarkNode {
    pub fn bookmark(
        id: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        parent_path: &[String],
        origin: Origin,
    ) -> Self {
        let title = title.into();
        let mut path = parent_path.to_vec();
        path.push(title.clone());
        Self {
            id: id.into(),
            title,
            url: Some(url.into()),
            children: None,
            path,
            origin,
            created_at: None,
            icon: None,
            description: None,
        }
    }

    pub fn folder(
        id: impl Into<String>,
        title: impl Into<String>,
        parent_path: &[String],
        origin: Origin,
    ) -> Self {
        let title = title.into();
        let mut path = parent_path.to_vec();
        path.push(title.clone());
        Self {
            id: id.into(),
            title,
            url: None,
            children: Some(Vec::new()),
            path,
            origin,
            created_at: None,
            icon: None,
            description: None,
        }
    }

    /// Appends `child`, re-stamping its path and origin under this folder.
    pub fn with_child(mut self, mut child: BookmarkNode) -> Self {
        child.restamp(&self.path, self.origin);
        self.children.get_or_insert_with(Vec::new).push(child);
        self
    }

    pub fn is_folder(&self) -> bool {
        self.children.is_some()
    }

    pub fn is_bookmark(&self) -> bool {
        self.url.is_some()
    }

    pub fn parent_path(&self) -> &[String] {
        match self.path.split_last() {
            Some((_, parent)) => parent,
            None => &[],
        }
    }

    /// Rewrites `path` and `origin` of this node and every descendant so they
    /// sit under `parent_path`.
    pub fn restamp(&mut self, parent_path: &[String], origin: Origin) {
        let mut path = parent_path.to_vec();
        path.push(self.title.clone());
        self.path = path;
        self.origin = origin;

        if let Some(children) = self.children.as_mut() {
            for child in children.iter_mut() {
                child.restamp(&self.path, origin);
            }
        }
    }

    pub fn descendant_count(&self) -> usize {
        self.children
            .as_ref()
            .map(|children| children.iter().map(|c| 1 + c.descendant_count()).sum())
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkTree {
    pub root_id: String,
    pub origin: Origin,
    /// Top-level folders and bookmarks.
    pub nodes: Vec<BookmarkNode>,
}

impl BookmarkTree {
    pub fn new(root_id: impl Into<String>, origin: Origin, nodes: Vec<BookmarkNode>) -> Self {
        Self {
            root_id: root_id.into(),
            origin,
            nodes,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.iter().map(|n| 1 + n.descendant_count()).sum()
    }

    pub fn find_by_id(&self, id: &str) -> Option<&BookmarkNode> {
        fn walk<'a>(nodes: &'a [BookmarkNode], id: &str) -> Option<&'a BookmarkNode> {
            for node in nodes {
                if node.id == id {
                    return Some(node);
                }
                if let Some(found) = node.children.as_deref().and_then(|c| walk(c, id)) {
                    return Some(found);
                }
            }
            None
        }
        walk(&self.nodes, id)
    }

    /// Follows `path` title by title (exact match).
    pub fn find_by_path(&self, path: &[String]) -> Option<&BookmarkNode> {
        let (first, rest) = path.split_first()?;
        let mut current = self.nodes.iter().find(|n| &n.title == first)?;
        for segment in rest {
            current = current
                .children
                .as_deref()?
                .iter()
                .find(|n| &n.title == segment)?;
        }
        Some(current)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffType {
    Added,
    Deleted,
    Modified,
    Duplicated,
}

impl DiffType {
    pub const ALL: [DiffType; 4] = [
        DiffType::Added,
        DiffType::Deleted,
        DiffType::Modified,
        DiffType::Duplicated,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DiffType::Added => "added",
            DiffType::Deleted => "deleted",
            DiffType::Modified => "modified",
            DiffType::Duplicated => "duplicated",
        }
    }

    pub fn status_char(self) -> char {
        match self {
            DiffType::Added => '+',
            DiffType::Deleted => '-',
            DiffType::Modified => '~',
            DiffType::Duplicated => '=',
        }
    }
}

impl fmt::Display for DiffType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiffAction {
    CopyLeftToRight,
    CopyRightToLeft,
    Delete,
    Accept,
    Rename,
    ResolveDuplicate,
}

impl DiffAction {
    pub fn as_str(self) -> &'static str {
        match self {
            DiffAction::CopyLeftToRight => "copy-left-to-right",
            DiffAction::CopyRightToLeft => "copy-right-to-left",
            DiffAction::Delete => "delete",
            DiffAction::Accept => "accept",
            DiffAction::Rename => "rename",
            DiffAction::ResolveDuplicate => "resolve-duplicate",
        }
    }
}

impl fmt::Display for DiffAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiffAction {
    type Err = BookmarkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "copy-left-to-right" => Ok(DiffAction::CopyLeftToRight),
            "copy-right-to-left" => Ok(DiffAction::CopyRightToLeft),
            "delete" => Ok(DiffAction::Delete),
            "accept" => Ok(DiffAction::Accept),
            "rename" => Ok(DiffAction::Rename),
            "resolve-duplicate" => Ok(DiffAction::ResolveDuplicate),
            other => Err(BookmarkError::UnknownAction(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffOperation {
    pub action: DiffAction,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
}

impl DiffOperation {
    pub fn new(action: DiffAction, label: impl Into<String>) -> Self {
        Self {
            action,
            label: label.into(),
            confirm: None,
            tooltip: None,
        }
    }

    pub fn confirmed(mut self) -> Self {
        self.confirm = Some(true);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_paths: Option<Vec<Vec<String>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffResult {
    #[serde(rename = "type")]
    pub diff_type: DiffType,
    pub path: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_item: Option<BookmarkNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_item: Option<BookmarkNode>,
    pub change_summary: String,
    pub operations: Vec<DiffOperation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<DiffMeta>,
}

impl DiffResult {
    pub fn item(&self, side: Side) -> Option<&BookmarkNode> {
        match side {
            Side::Left => self.left_item.as_ref(),
            Side::Right => self.right_item.as_ref(),
        }
    }

    pub fn offers(&self, action: DiffAction) -> bool {
        self.operations.iter().any(|op| op.action == action)
    }

    pub fn duplicate_paths(&self) -> &[Vec<String>] {
        self.meta
            .as_ref()
            .and_then(|meta| meta.duplicate_paths.as_deref())
            .unwrap_or(&[])
    }

    pub fn display_path(&self) -> String {
        self.path.join(" / ")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub added: usize,
    pub deleted: usize,
    pub modified: usize,
    pub duplicated: usize,
    pub total: usize,
}

impl DiffSummary {
    pub fn from_diffs(diffs: &[DiffResult]) -> Self {
        let mut summary = Self::default();
        for diff in diffs {
            match diff.diff_type {
                DiffType::Added => summary.added += 1,
                DiffType::Deleted => summary.deleted += 1,
                DiffType::Modified => summary.modified += 1,
                DiffType::Duplicated => summary.duplicated += 1,
            }
        }
        summary.total = summary.added + summary.deleted + summary.modified + summary.duplicated;
        summary
    }

    pub fn count(&self, diff_type: DiffType) -> usize {
        match diff_type {
            DiffType::Added => self.added,
            DiffType::Deleted => self.deleted,
            DiffType::Modified => self.modified,
            DiffType::Duplicated => self.duplicated,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// A user's decision about one diff, waiting to be applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedDiffOperation {
    pub diff: DiffResult,
    pub action: DiffAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_side: Option<Side>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<BTreeMap<String, serde_json::Value>>,
}

impl QueuedDiffOperation {
    pub fn new(diff: DiffResult, action: DiffAction) -> Self {
        Self {
            diff,
            action,
            target_side: None,
            context: None,
        }
    }

    pub fn on_side(mut self, side: Side) -> Self {
        self.target_side = Some(side);
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value);
        self
    }

    pub fn context_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.context.as_ref().and_then(|ctx| ctx.get(key))
    }
}
