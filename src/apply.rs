use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::diff::{compute_diff, DiffOptions};
use crate::error::{BookmarkError, Result};
use crate::model::{
    BookmarkNode, BookmarkTree, DiffAction, DiffResult, DiffSummary, DiffType, Origin,
    QueuedDiffOperation, Side,
};
use crate::utils::generate_id;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplyOptions {
    /// Side used by `delete` on a modified diff when the operation names none.
    pub default_target_side: Option<Side>,
    pub diff_options: DiffOptions,
    pub recompute_diff: bool,
    pub cleanup_empty_folders: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ApplyRequest<'a> {
    pub left: &'a BookmarkTree,
    pub right: &'a BookmarkTree,
    pub operations: &'a [QueuedDiffOperation],
    pub options: &'a ApplyOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedOperation {
    pub operation: QueuedDiffOperation,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyOutcome {
    pub left: BookmarkTree,
    pub right: BookmarkTree,
    pub applied: Vec<QueuedDiffOperation>,
    pub failed: Vec<FailedOperation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diffs: Option<Vec<DiffResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<DiffSummary>,
}

/// Applies `operations` in order to deep copies of both trees.
///
/// The input trees are never touched. Each operation succeeds or fails on
/// its own; failures are reported in `failed` and the rest of the batch
/// still commits.
pub fn apply_operations(request: ApplyRequest<'_>) -> ApplyOutcome {
    let ApplyRequest {
        left,
        right,
        operations,
        options,
    } = request;

    let mut left = left.clone();
    let mut right = right.clone();
    let mut applied = Vec::new();
    let mut failed = Vec::new();

    for operation in operations {
        match apply_one(operation, &mut left, &mut right, options) {
            Ok(()) => {
                debug!(
                    action = %operation.action,
                    path = %operation.diff.display_path(),
                    "Operation applied"
                );
                applied.push(operation.clone());
            }
            Err(e) => {
                warn!(
                    action = %operation.action,
                    path = %operation.diff.display_path(),
                    error = %e,
                    "Operation failed"
                );
                failed.push(FailedOperation {
                    operation: operation.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    if options.cleanup_empty_folders {
        left.nodes = prune_empty_folders(std::mem::take(&mut left.nodes));
        right.nodes = prune_empty_folders(std::mem::take(&mut right.nodes));
    }

    let (diffs, summary) = if options.recompute_diff {
        let outcome = compute_diff(&left, &right, &options.diff_options);
        (Some(outcome.diffs), Some(outcome.summary))
    } else {
        (None, None)
    };

    info!(
        applied = applied.len(),
        failed = failed.len(),
        "Operations processed"
    );

    ApplyOutcome {
        left,
        right,
        applied,
        failed,
        diffs,
        summary,
    }
}

fn tree_mut<'t>(
    side: Side,
    left: &'t mut BookmarkTree,
    right: &'t mut BookmarkTree,
) -> &'t mut BookmarkTree {
    match side {
        Side::Left => left,
        Side::Right => right,
    }
}

fn apply_one(
    operation: &QueuedDiffOperation,
    left: &mut BookmarkTree,
    right: &mut BookmarkTree,
    options: &ApplyOptions,
) -> Result<()> {
    let diff = &operation.diff;

    match operation.action {
        DiffAction::CopyLeftToRight => copy_node_to_target(
            diff.left_item.as_ref().or(diff.right_item.as_ref()),
            right,
            &diff.path,
            Side::Right,
        ),
        DiffAction::CopyRightToLeft => copy_node_to_target(
            diff.right_item.as_ref().or(diff.left_item.as_ref()),
            left,
            &diff.path,
            Side::Left,
        ),
        DiffAction::Delete => {
            let side = delete_side(
                diff,
                operation.target_side.or(options.default_target_side),
            );
            let id = diff.item(side).map(|node| node.id.clone());
            let tree = tree_mut(side, left, right);
            match id.as_deref() {
                Some(id) if remove_node_by_id(&mut tree.nodes, id) => Ok(()),
                _ => Err(BookmarkError::NodeNotFound { side, id }),
            }
        }
        DiffAction::Accept => accept(diff, left),
        DiffAction::ResolveDuplicate => {
            let side = operation
                .target_side
                .or(options.default_target_side)
                .unwrap_or(Side::Left);
            remove_duplicates(diff, tree_mut(side, left, right));
            Ok(())
        }
        DiffAction::Rename => {
            let side = operation.target_side.unwrap_or(Side::Right);
            let new_title = new_title(operation)?;
            let id = diff
                .item(side)
                .map(|node| node.id.clone())
                .ok_or(BookmarkError::NodeNotFound { side, id: None })?;
            let tree = tree_mut(side, left, right);
            if rename_node_by_id(&mut tree.nodes, &id, &new_title, side.into()) {
                Ok(())
            } else {
                Err(BookmarkError::NodeNotFound { side, id: Some(id) })
            }
        }
    }
}

fn delete_side(diff: &DiffResult, requested: Option<Side>) -> Side {
    match diff.diff_type {
        DiffType::Added => Side::Right,
        DiffType::Deleted => Side::Left,
        DiffType::Modified | DiffType::Duplicated => requested.unwrap_or(Side::Right),
    }
}

fn accept(diff: &DiffResult, left: &mut BookmarkTree) -> Result<()> {
    match diff.diff_type {
        DiffType::Added | DiffType::Modified => {
            copy_node_to_target(diff.right_item.as_ref(), left, &diff.path, Side::Left)
        }
        DiffType::Deleted => {
            let id = diff.left_item.as_ref().map(|node| node.id.clone());
            match id.as_deref() {
                Some(id) if remove_node_by_id(&mut left.nodes, id) => Ok(()),
                _ => Err(BookmarkError::NodeNotFound {
                    side: Side::Left,
                    id,
                }),
            }
        }
        DiffType::Duplicated => {
            remove_duplicates(diff, left);
            Ok(())
        }
    }
}

fn new_title(operation: &QueuedDiffOperation) -> Result<String> {
    let title = match operation.context_value("newTitle") {
        Some(serde_json::Value::String(s)) => s.trim().to_string(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    if title.is_empty() {
        return Err(BookmarkError::MissingNewTitle);
    }
    Ok(title)
}

/// Keeps the first duplicate path and removes the others. Paths that no
/// longer resolve are skipped.
fn remove_duplicates(diff: &DiffResult, tree: &mut BookmarkTree) {
    for path in diff.duplicate_paths().iter().skip(1) {
        if let Some(id) = find_node_id_by_path(&tree.nodes, path) {
            remove_node_by_id(&mut tree.nodes, &id);
        }
    }
}

/// Walks `parent_path` from the top level, creating any missing folder, and
/// returns the children list of the last folder.
fn ensure_folder_hierarchy<'a>(
    mut nodes: &'a mut Vec<BookmarkNode>,
    parent_path: &[String],
    origin: Origin,
) -> &'a mut Vec<BookmarkNode> {
    let mut walking: Vec<String> = Vec::new();

    for part in parent_path {
        let index = match nodes
            .iter()
            .position(|node| &node.title == part && node.children.is_some())
        {
            Some(index) => index,
            None => {
                debug!(folder = %part, "Creating missing folder");
                nodes.push(BookmarkNode::folder(
                    generate_id("folder"),
                    part.clone(),
                    &walking,
                    origin,
                ));
                nodes.len() - 1
            }
        };

        let current = nodes;
        let folder = &mut current[index];
        let mut path = walking.clone();
        path.push(folder.title.clone());
        folder.path = path;
        folder.origin = origin;
        walking.push(part.clone());
        nodes = folder.children.get_or_insert_with(Vec::new);
    }

    nodes
}

fn copy_node_to_target(
    source: Option<&BookmarkNode>,
    target: &mut BookmarkTree,
    path: &[String],
    side: Side,
) -> Result<()> {
    let source = source.ok_or(BookmarkError::MissingSource)?;
    let origin = Origin::from(side);

    let (leaf_title, parent_path) = match path.split_last() {
        Some((leaf, parent)) => (leaf.clone(), parent),
        None => (source.title.clone(), &[][..]),
    };

    let siblings = ensure_folder_hierarchy(&mut target.nodes, parent_path, origin);

    let mut cloned = source.clone();
    cloned.title = leaf_title;
    cloned.restamp(parent_path, origin);

    match siblings.iter().position(|node| node.title == cloned.title) {
        Some(index) => siblings[index] = cloned,
        None => siblings.push(cloned),
    }
    Ok(())
}

/// Removes the node with `id` anywhere in `nodes`. A folder left without
/// children loses its `children` list altogether.
pub fn remove_node_by_id(nodes: &mut Vec<BookmarkNode>, id: &str) -> bool {
    if let Some(index) = nodes.iter().position(|node| node.id == id) {
        nodes.remove(index);
        return true;
    }

    for node in nodes.iter_mut() {
        let Some(children) = node.children.as_mut() else {
            continue;
        };
        if remove_node_by_id(children, id) {
            if children.is_empty() {
                node.children = None;
            }
            return true;
        }
    }
    false
}

pub fn find_node_id_by_path(nodes: &[BookmarkNode], path: &[String]) -> Option<String> {
    let (first, rest) = path.split_first()?;
    let mut found = nodes.iter().find(|node| &node.title == first)?;
    for segment in rest {
        found = found
            .children
            .as_deref()
            .unwrap_or(&[])
            .iter()
            .find(|node| &node.title == segment)?;
    }
    Some(found.id.clone())
}

fn rename_node_by_id(
    nodes: &mut [BookmarkNode],
    id: &str,
    new_title: &str,
    origin: Origin,
) -> bool {
    for node in nodes.iter_mut() {
        if node.id == id {
            node.title = new_title.to_string();
            match node.path.last_mut() {
                Some(last) => *last = new_title.to_string(),
                None => node.path.push(new_title.to_string()),
            }
            if let Some(children) = node.children.as_mut() {
                for child in children.iter_mut() {
                    child.restamp(&node.path, origin);
                }
            }
            return true;
        }
        if let Some(children) = node.children.as_mut() {
            if rename_node_by_id(children, id, new_title, origin) {
                return true;
            }
        }
    }
    false
}

/// Drops folders that end up with no children once their own empty
/// sub-folders are gone.
pub fn prune_empty_folders(nodes: Vec<BookmarkNode>) -> Vec<BookmarkNode> {
    nodes
        .into_iter()
        .filter_map(|mut node| {
            if let Some(children) = node.children.take() {
                let pruned = prune_empty_folders(children);
                if !pruned.is_empty() {
                    node.children = Some(pruned);
                }
            }
            (node.children.is_some() || node.url.is_some()).then_some(node)
        })
        .collect()
}
