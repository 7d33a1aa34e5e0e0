use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::model::{
    BookmarkNode, BookmarkTree, DiffAction, DiffMeta, DiffOperation, DiffResult, DiffSummary,
    DiffType, Severity,
};

pub const PATH_SEPARATOR: &str = " > ";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareBy {
    Title,
    Url,
    #[default]
    Both,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiffOptions {
    pub include_duplicates: bool,
    pub compare_by: CompareBy,
    pub case_sensitive: bool,
    /// Has no effect. Segments, titles and URLs are always trimmed; the field
    /// only keeps the option readable from serialized requests.
    pub trim_whitespace: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            include_duplicates: false,
            compare_by: CompareBy::Both,
            case_sensitive: false,
            trim_whitespace: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffOutcome {
    pub diffs: Vec<DiffResult>,
    pub summary: DiffSummary,
}

struct FlatEntry<'a> {
    node: &'a BookmarkNode,
    path_key: String,
}

/// Path key → node, iterated in first-insertion order. Re-inserting a key
/// replaces the node but keeps its position.
#[derive(Default)]
struct PathIndex<'a> {
    order: Vec<String>,
    nodes: HashMap<String, &'a BookmarkNode>,
}

impl<'a> PathIndex<'a> {
    fn from_entries(entries: &[FlatEntry<'a>]) -> Self {
        let mut index = Self::default();
        for entry in entries {
            if index
                .nodes
                .insert(entry.path_key.clone(), entry.node)
                .is_none()
            {
                index.order.push(entry.path_key.clone());
            }
        }
        index
    }

    fn get(&self, key: &str) -> Option<&'a BookmarkNode> {
        self.nodes.get(key).copied()
    }

    fn contains(&self, key: &str) -> bool {
        self.nodes.contains_key(key)
    }

    fn iter(&self) -> impl Iterator<Item = (&str, &'a BookmarkNode)> + '_ {
        self.order
            .iter()
            .map(move |key| (key.as_str(), self.nodes[key.as_str()]))
    }
}

fn normalise(value: &str, case_sensitive: bool) -> String {
    let trimmed = value.trim();
    if case_sensitive {
        trimmed.to_string()
    } else {
        trimmed.to_lowercase()
    }
}

pub fn path_key(path: &[String], case_sensitive: bool) -> String {
    path.iter()
        .map(|segment| normalise(segment, case_sensitive))
        .collect::<Vec<_>>()
        .join(PATH_SEPARATOR)
}

fn flatten_tree(tree: &BookmarkTree, case_sensitive: bool) -> Vec<FlatEntry<'_>> {
    fn visit<'a>(node: &'a BookmarkNode, case_sensitive: bool, out: &mut Vec<FlatEntry<'a>>) {
        out.push(FlatEntry {
            node,
            path_key: path_key(&node.path, case_sensitive),
        });
        if let Some(children) = &node.children {
            for child in children {
                visit(child, case_sensitive, out);
            }
        }
    }

    let mut entries = Vec::new();
    for node in &tree.nodes {
        visit(node, case_sensitive, &mut entries);
    }
    entries
}

fn is_same_node(
    left: &BookmarkNode,
    right: &BookmarkNode,
    compare_by: CompareBy,
    case_sensitive: bool,
) -> bool {
    let text = |value: Option<&str>| {
        value
            .map(|v| normalise(v, case_sensitive))
            .unwrap_or_default()
    };

    let same_title = || text(Some(left.title.as_str())) == text(Some(right.title.as_str()));
    let same_url = || text(left.url.as_deref()) == text(right.url.as_deref());

    match compare_by {
        CompareBy::Title => same_title(),
        CompareBy::Url => same_url(),
        CompareBy::Both => same_title() && same_url(),
    }
}

fn describe_modification(left: &BookmarkNode, right: &BookmarkNode) -> String {
    let mut changes = Vec::new();
    if left.url.as_deref().unwrap_or("") != right.url.as_deref().unwrap_or("") {
        changes.push("URL changed");
    }
    if left.title != right.title {
        changes.push("title changed");
    }
    if changes.is_empty() {
        changes.push("node content changed");
    }
    changes.join(", ")
}

fn modification_operations() -> Vec<DiffOperation> {
    vec![
        DiffOperation::new(DiffAction::CopyLeftToRight, "Keep left"),
        DiffOperation::new(DiffAction::CopyRightToLeft, "Keep right"),
        DiffOperation::new(DiffAction::Accept, "Accept right change"),
    ]
}

fn collect_duplicates(entries: &[FlatEntry<'_>], case_sensitive: bool) -> Vec<DiffResult> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<&BookmarkNode>> = HashMap::new();

    for entry in entries {
        let Some(url) = entry.node.url.as_deref().filter(|url| !url.trim().is_empty()) else {
            continue;
        };
        let key = normalise(url, case_sensitive);
        let group = groups.entry(key.clone()).or_default();
        if group.is_empty() {
            order.push(key);
        }
        group.push(entry.node);
    }

    let mut diffs = Vec::new();
    for key in order {
        let group = &groups[&key];
        if group.len() <= 1 {
            continue;
        }
        let first = group[0];
        diffs.push(DiffResult {
            diff_type: DiffType::Duplicated,
            path: first.path.clone(),
            left_item: Some(first.clone()),
            right_item: None,
            change_summary: format!("{} duplicate entries found", group.len()),
            operations: vec![
                DiffOperation::new(DiffAction::ResolveDuplicate, "Remove duplicates").confirmed(),
            ],
            meta: Some(DiffMeta {
                severity: Some(Severity::Warning),
                duplicate_paths: Some(group.iter().map(|node| node.path.clone()).collect()),
            }),
        });
    }
    diffs
}

/// Matches both trees by normalized path and classifies every difference.
///
/// Diffs come out in a fixed order: left-map entries (modified or deleted)
/// in pre-order, then right-only additions, then duplicate groups of the
/// left tree followed by those of the right tree.
pub fn compute_diff(
    left: &BookmarkTree,
    right: &BookmarkTree,
    options: &DiffOptions,
) -> DiffOutcome {
    let case_sensitive = options.case_sensitive;

    let left_entries = flatten_tree(left, case_sensitive);
    let right_entries = flatten_tree(right, case_sensitive);
    let left_index = PathIndex::from_entries(&left_entries);
    let right_index = PathIndex::from_entries(&right_entries);

    debug!(
        left_nodes = left_entries.len(),
        right_nodes = right_entries.len(),
        compare_by = ?options.compare_by,
        "Computing bookmark diff"
    );

    let mut diffs = Vec::new();

    // Modifications and deletions
    for (key, left_node) in left_index.iter() {
        match right_index.get(key) {
            Some(right_node) => {
                if is_same_node(left_node, right_node, options.compare_by, case_sensitive) {
                    continue;
                }
                diffs.push(DiffResult {
                    diff_type: DiffType::Modified,
                    path: right_node.path.clone(),
                    left_item: Some(left_node.clone()),
                    right_item: Some(right_node.clone()),
                    change_summary: describe_modification(left_node, right_node),
                    operations: modification_operations(),
                    meta: None,
                });
            }
            None => {
                diffs.push(DiffResult {
                    diff_type: DiffType::Deleted,
                    path: left_node.path.clone(),
                    left_item: Some(left_node.clone()),
                    right_item: None,
                    change_summary: "Only on the left".to_string(),
                    operations: vec![
                        DiffOperation::new(DiffAction::CopyLeftToRight, "Copy to right"),
                        DiffOperation::new(DiffAction::Delete, "Keep deleted").confirmed(),
                    ],
                    meta: None,
                });
            }
        }
    }

    // Additions
    for (key, right_node) in right_index.iter() {
        if left_index.contains(key) {
            continue;
        }
        diffs.push(DiffResult {
            diff_type: DiffType::Added,
            path: right_node.path.clone(),
            left_item: None,
            right_item: Some(right_node.clone()),
            change_summary: "Only on the right".to_string(),
            operations: vec![
                DiffOperation::new(DiffAction::CopyRightToLeft, "Copy to left"),
                DiffOperation::new(DiffAction::Delete, "Ignore addition").confirmed(),
            ],
            meta: None,
        });
    }

    if options.include_duplicates {
        diffs.extend(collect_duplicates(&left_entries, case_sensitive));
        diffs.extend(collect_duplicates(&right_entries, case_sensitive));
    }

    let summary = DiffSummary::from_diffs(&diffs);
    debug!(
        added = summary.added,
        deleted = summary.deleted,
        modified = summary.modified,
        duplicated = summary.duplicated,
        "Diff complete"
    );

    DiffOutcome { diffs, summary }
}
