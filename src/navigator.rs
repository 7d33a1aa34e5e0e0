use std::fmt;

use crate::model::{DiffResult, DiffSummary, DiffType};

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum DiffFilter {
    #[default]
    All,
    Only(DiffType),
}

impl DiffFilter {
    /// In toolbar order.
    pub const CHOICES: [DiffFilter; 5] = [
        DiffFilter::All,
        DiffFilter::Only(DiffType::Added),
        DiffFilter::Only(DiffType::Deleted),
        DiffFilter::Only(DiffType::Modified),
        DiffFilter::Only(DiffType::Duplicated),
    ];

    pub fn matches(self, diff: &DiffResult) -> bool {
        match self {
            DiffFilter::All => true,
            DiffFilter::Only(diff_type) => diff.diff_type == diff_type,
        }
    }
}

impl fmt::Display for DiffFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffFilter::All => f.write_str("all"),
            DiffFilter::Only(diff_type) => write!(f, "{}", diff_type),
        }
    }
}

/// Cursor over a diff list that can be narrowed to one diff type.
///
/// The summary always covers the unfiltered list. When the filtered list
/// changes the cursor is only clamped, never moved to "the same" diff; use
/// [`DiffNavigator::locate`] for that.
#[derive(Debug, Clone, Default)]
pub struct DiffNavigator {
    diffs: Vec<DiffResult>,
    filter: DiffFilter,
    filtered: Vec<usize>,
    active_index: Option<usize>,
    summary: DiffSummary,
}

impl DiffNavigator {
    pub fn new(diffs: Vec<DiffResult>) -> Self {
        let mut navigator = Self::default();
        navigator.set_diffs(diffs);
        navigator
    }

    pub fn diffs(&self) -> &[DiffResult] {
        &self.diffs
    }

    pub fn filter(&self) -> DiffFilter {
        self.filter
    }

    pub fn summary(&self) -> DiffSummary {
        self.summary
    }

    pub fn filtered_diffs(&self) -> impl Iterator<Item = &DiffResult> + '_ {
        self.filtered.iter().map(move |&i| &self.diffs[i])
    }

    pub fn filtered_len(&self) -> usize {
        self.filtered.len()
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active_index
    }

    pub fn active_diff(&self) -> Option<&DiffResult> {
        self.active_index
            .and_then(|i| self.filtered.get(i))
            .map(|&i| &self.diffs[i])
    }

    pub fn set_diffs(&mut self, diffs: Vec<DiffResult>) {
        self.summary = DiffSummary::from_diffs(&diffs);
        self.diffs = diffs;
        self.refilter();
    }

    pub fn set_filter(&mut self, filter: DiffFilter) {
        self.filter = filter;
        self.refilter();
    }

    pub fn select_diff(&mut self, index: usize) {
        if self.filtered.is_empty() {
            return;
        }
        self.active_index = Some(index.min(self.filtered.len() - 1));
    }

    pub fn go_next(&mut self) {
        let len = self.filtered.len();
        if len == 0 {
            return;
        }
        self.active_index = Some(match self.active_index {
            None => 0,
            Some(i) => (i + 1) % len,
        });
    }

    pub fn go_previous(&mut self) {
        let len = self.filtered.len();
        if len == 0 {
            return;
        }
        self.active_index = Some(match self.active_index {
            None | Some(0) => len - 1,
            Some(i) => i - 1,
        });
    }

    /// Moves the cursor to the first filtered diff at `path`.
    pub fn locate(&mut self, path: &[String]) -> bool {
        let found = self.filtered_diffs().position(|diff| diff.path == path);
        match found {
            Some(index) => {
                self.active_index = Some(index);
                true
            }
            None => false,
        }
    }

    fn refilter(&mut self) {
        let filter = self.filter;
        self.filtered = self
            .diffs
            .iter()
            .enumerate()
            .filter(|(_, diff)| filter.matches(diff))
            .map(|(i, _)| i)
            .collect();

        let len = self.filtered.len();
        self.active_index = match self.active_index {
            _ if len == 0 => None,
            None => Some(0),
            Some(i) if i >= len => Some(len - 1),
            Some(i) => Some(i),
        };
    }
}
