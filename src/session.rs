use tracing::info;

use crate::apply::{apply_operations, ApplyOptions, ApplyOutcome, ApplyRequest};
use crate::diff::{compute_diff, DiffOptions, DiffOutcome};
use crate::error::{BookmarkError, Result};
use crate::model::{BookmarkTree, QueuedDiffOperation, Side};

/// The two trees being reconciled. Owned by whoever drives the comparison
/// and replaced wholesale after every successful apply.
#[derive(Debug, Clone, Default)]
pub struct Session {
    left: Option<BookmarkTree>,
    right: Option<BookmarkTree>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trees(left: BookmarkTree, right: BookmarkTree) -> Self {
        Self {
            left: Some(left),
            right: Some(right),
        }
    }

    pub fn load(&mut self, side: Side, tree: BookmarkTree) {
        info!(side = %side, nodes = tree.node_count(), "Tree loaded");
        match side {
            Side::Left => self.left = Some(tree),
            Side::Right => self.right = Some(tree),
        }
    }

    pub fn tree(&self, side: Side) -> Option<&BookmarkTree> {
        match side {
            Side::Left => self.left.as_ref(),
            Side::Right => self.right.as_ref(),
        }
    }

    fn trees(&self) -> Result<(&BookmarkTree, &BookmarkTree)> {
        let left = self.left.as_ref().ok_or(BookmarkError::MissingTree(Side::Left))?;
        let right = self.right.as_ref().ok_or(BookmarkError::MissingTree(Side::Right))?;
        Ok((left, right))
    }

    pub fn compute_diff(&self, options: &DiffOptions) -> Result<DiffOutcome> {
        let (left, right) = self.trees()?;
        Ok(compute_diff(left, right, options))
    }

    /// Applies `operations` and swaps in the resulting trees.
    pub fn apply(
        &mut self,
        operations: &[QueuedDiffOperation],
        options: &ApplyOptions,
    ) -> Result<ApplyOutcome> {
        let (left, right) = self.trees()?;
        let outcome = apply_operations(ApplyRequest {
            left,
            right,
            operations,
            options,
        });
        self.left = Some(outcome.left.clone());
        self.right = Some(outcome.right.clone());
        Ok(outcome)
    }

    pub fn reset(&mut self) {
        self.left = None;
        self.right = None;
    }
}
