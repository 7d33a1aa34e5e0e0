use anyhow::{Context, Result};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::widgets::{ListState, ScrollbarState};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::apply::{ApplyOptions, FailedOperation};
use crate::diff::DiffOptions;
use crate::export::save_tree;
use crate::import::BookmarkFileFormat;
use crate::model::{DiffAction, DiffResult, Origin, QueuedDiffOperation, Side};
use crate::navigator::{DiffFilter, DiffNavigator};
use crate::session::Session;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum AppMode {
    Review,
    /// An operation marked `confirm` waits for Enter or Esc.
    Confirm,
}

/// Where `w` writes one side of the session.
#[derive(Debug, Clone)]
pub struct OutputTarget {
    pub path: PathBuf,
    pub format: BookmarkFileFormat,
    pub pretty: bool,
}

pub struct App {
    pub session: Session,
    pub navigator: DiffNavigator,
    pub diff_options: DiffOptions,
    pub mode: AppMode,
    pub queue: Vec<QueuedDiffOperation>,
    pub pending: Option<QueuedDiffOperation>,
    pub failed: Vec<FailedOperation>,
    pub status_message: String,
    pub left_label: String,
    pub right_label: String,
    pub list_state: ListState,
    pub scrollbar_state: ScrollbarState,
    pub viewport_height: u16,
    outputs: Option<(OutputTarget, OutputTarget)>,
}

impl App {
    pub fn new(session: Session, diff_options: DiffOptions) -> Result<Self> {
        let mut app = Self {
            session,
            navigator: DiffNavigator::default(),
            diff_options,
            mode: AppMode::Review,
            queue: Vec::new(),
            pending: None,
            failed: Vec::new(),
            status_message: String::new(),
            left_label: Side::Left.to_string(),
            right_label: Side::Right.to_string(),
            list_state: ListState::default(),
            scrollbar_state: ScrollbarState::default(),
            viewport_height: 24,
            outputs: None,
        };

        app.refresh_diffs()?;
        Ok(app)
    }

    pub fn with_labels(mut self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.left_label = left.into();
        self.right_label = right.into();
        self
    }

    pub fn with_outputs(mut self, left: OutputTarget, right: OutputTarget) -> Self {
        self.outputs = Some((left, right));
        self
    }

    pub fn refresh_diffs(&mut self) -> Result<()> {
        let outcome = self
            .session
            .compute_diff(&self.diff_options)
            .context("Failed to compare bookmark trees")?;
        debug!(diffs = outcome.diffs.len(), "Diff list refreshed");
        self.navigator.set_diffs(outcome.diffs);
        self.sync_list_state();
        Ok(())
    }

    fn sync_list_state(&mut self) {
        let selected = self.navigator.active_index();
        self.list_state.select(selected);
        self.scrollbar_state = self
            .scrollbar_state
            .content_length(self.navigator.filtered_len())
            .position(selected.unwrap_or(0));
    }

    pub fn calculate_half_page(&self) -> i32 {
        let content_height = self.viewport_height.saturating_sub(6);
        (content_height / 2).max(1) as i32
    }

    /// Single steps wrap around; larger jumps stop at either end.
    pub fn move_selection(&mut self, delta: i32) {
        match delta {
            1 => self.navigator.go_next(),
            -1 => self.navigator.go_previous(),
            _ => {
                let current = self.navigator.active_index().unwrap_or(0) as i32;
                self.navigator.select_diff((current + delta).max(0) as usize);
            }
        }
        self.sync_list_state();
    }

    pub fn scroll_to_top(&mut self) {
        self.navigator.select_diff(0);
        self.sync_list_state();
    }

    pub fn scroll_to_bottom(&mut self) {
        self.navigator.select_diff(usize::MAX);
        self.sync_list_state();
    }

    pub fn set_filter(&mut self, filter: DiffFilter) {
        self.navigator.set_filter(filter);
        self.sync_list_state();
    }

    pub fn active_diff(&self) -> Option<&DiffResult> {
        self.navigator.active_diff()
    }

    pub fn is_queued(&self, diff: &DiffResult) -> bool {
        self.queue
            .iter()
            .any(|op| op.diff.path == diff.path && op.diff.diff_type == diff.diff_type)
    }

    /// Queues `action` for the active diff, asking first when the diff marks
    /// that operation as needing confirmation.
    pub fn queue_action(&mut self, action: DiffAction) {
        let Some(diff) = self.navigator.active_diff() else {
            self.status_message = "No diff selected".to_string();
            return;
        };

        let Some(offered) = diff.operations.iter().find(|op| op.action == action) else {
            self.status_message = format!("'{}' is not available for this diff", action);
            return;
        };
        let confirm = offered.confirm.unwrap_or(false);

        let mut operation = QueuedDiffOperation::new(diff.clone(), action);
        if action == DiffAction::ResolveDuplicate {
            let side = match diff.left_item.as_ref().map(|node| node.origin) {
                Some(Origin::Right) => Side::Right,
                _ => Side::Left,
            };
            operation = operation.on_side(side);
        }

        if confirm {
            self.status_message =
                format!("Confirm '{}'? Enter to queue, Esc to cancel", offered.label);
            self.pending = Some(operation);
            self.mode = AppMode::Confirm;
        } else {
            self.push_operation(operation);
        }
    }

    fn push_operation(&mut self, operation: QueuedDiffOperation) {
        debug!(
            action = %operation.action,
            path = %operation.diff.display_path(),
            "Operation queued"
        );
        self.status_message = format!(
            "Queued {} for {}",
            operation.action,
            operation.diff.display_path()
        );
        self.queue.push(operation);
    }

    pub fn confirm_pending(&mut self) {
        if let Some(operation) = self.pending.take() {
            self.push_operation(operation);
        }
        self.mode = AppMode::Review;
    }

    pub fn cancel_pending(&mut self) {
        self.pending = None;
        self.mode = AppMode::Review;
        self.status_message = "Cancelled".to_string();
    }

    pub fn unqueue_last(&mut self) {
        match self.queue.pop() {
            Some(operation) => {
                self.status_message = format!(
                    "Removed {} for {}",
                    operation.action,
                    operation.diff.display_path()
                );
            }
            None => self.status_message = "Queue is empty".to_string(),
        }
    }

    /// Runs the queue against the session and reloads the diff list from the
    /// recomputed result.
    pub fn apply_queue(&mut self) -> Result<()> {
        if self.queue.is_empty() {
            self.status_message = "Nothing queued".to_string();
            return Ok(());
        }

        let options = ApplyOptions {
            diff_options: self.diff_options.clone(),
            recompute_diff: true,
            ..ApplyOptions::default()
        };
        let operations = std::mem::take(&mut self.queue);
        let outcome = self
            .session
            .apply(&operations, &options)
            .context("Failed to apply queued operations")?;

        for failure in &outcome.failed {
            warn!(
                action = %failure.operation.action,
                path = %failure.operation.diff.display_path(),
                error = %failure.error,
                "Queued operation failed"
            );
        }

        self.status_message = format!(
            "Applied {} operation(s), {} failed",
            outcome.applied.len(),
            outcome.failed.len()
        );
        self.failed = outcome.failed;
        self.navigator.set_diffs(outcome.diffs.unwrap_or_default());
        self.sync_list_state();
        Ok(())
    }

    pub fn save(&mut self) -> Result<()> {
        let Some((left_target, right_target)) = self.outputs.as_ref() else {
            self.status_message = "No output files configured".to_string();
            return Ok(());
        };

        for (side, target) in [(Side::Left, left_target), (Side::Right, right_target)] {
            let Some(tree) = self.session.tree(side) else {
                continue;
            };
            save_tree(&target.path, tree, target.format, target.pretty)
                .with_context(|| format!("Failed to write {}", target.path.display()))?;
        }

        info!(
            left = %left_target.path.display(),
            right = %right_target.path.display(),
            "Session saved"
        );
        self.status_message = format!(
            "Wrote {} and {}",
            left_target.path.display(),
            right_target.path.display()
        );
        Ok(())
    }

    fn report<T>(&mut self, result: Result<T>) {
        if let Err(e) = result {
            warn!(error = %e, "Command failed");
            self.status_message = format!("{:#}", e);
        }
    }

    /// Returns `true` when the app should exit.
    pub fn handle_key_event(&mut self, key: KeyEvent) -> Result<bool> {
        if key.kind != KeyEventKind::Press {
            return Ok(false);
        }

        if self.mode == AppMode::Confirm {
            match key.code {
                KeyCode::Enter | KeyCode::Char('y') => self.confirm_pending(),
                KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('q') => self.cancel_pending(),
                _ => {}
            }
            return Ok(false);
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(true),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(true),
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
            KeyCode::PageUp => {
                let half_page = self.calculate_half_page();
                self.move_selection(-half_page);
            }
            KeyCode::PageDown => {
                let half_page = self.calculate_half_page();
                self.move_selection(half_page);
            }
            KeyCode::Home => self.scroll_to_top(),
            KeyCode::End => self.scroll_to_bottom(),
            KeyCode::Char(c @ '1'..='5') => {
                let index = c as usize - '1' as usize;
                self.set_filter(DiffFilter::CHOICES[index]);
            }
            KeyCode::Char('l') => self.queue_action(DiffAction::CopyLeftToRight),
            KeyCode::Char('r') => self.queue_action(DiffAction::CopyRightToLeft),
            KeyCode::Char('a') => self.queue_action(DiffAction::Accept),
            KeyCode::Char('d') => self.queue_action(DiffAction::Delete),
            KeyCode::Char('u') => self.queue_action(DiffAction::ResolveDuplicate),
            KeyCode::Char('x') => self.unqueue_last(),
            KeyCode::Enter => {
                let result = self.apply_queue();
                self.report(result);
            }
            KeyCode::Char('w') => {
                let result = self.save();
                self.report(result);
            }
            _ => {}
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BookmarkNode, BookmarkTree, DiffType};
    use pretty_assertions::assert_eq;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app() -> App {
        let left = BookmarkTree::new(
            "l",
            Origin::Left,
            vec![
                BookmarkNode::bookmark("l1", "Home", "https://a.example", &[], Origin::Left),
                BookmarkNode::bookmark("l2", "Old", "https://old.example", &[], Origin::Left),
            ],
        );
        let right = BookmarkTree::new(
            "r",
            Origin::Right,
            vec![
                BookmarkNode::bookmark("r1", "Home", "https://b.example", &[], Origin::Right),
                BookmarkNode::bookmark("r2", "New", "https://new.example", &[], Origin::Right),
            ],
        );
        App::new(Session::with_trees(left, right), DiffOptions::default()).unwrap()
    }

    #[test]
    fn starts_with_diff_list_and_first_selection() {
        let app = app();
        let types: Vec<DiffType> = app.navigator.diffs().iter().map(|d| d.diff_type).collect();
        assert_eq!(types, vec![DiffType::Modified, DiffType::Deleted, DiffType::Added]);
        assert_eq!(app.list_state.selected(), Some(0));
    }

    #[test]
    fn navigation_keys_wrap() {
        let mut app = app();
        app.handle_key_event(press(KeyCode::Char('k'))).unwrap();
        assert_eq!(app.list_state.selected(), Some(2));
        app.handle_key_event(press(KeyCode::Down)).unwrap();
        assert_eq!(app.list_state.selected(), Some(0));
    }

    #[test]
    fn number_keys_switch_filter() {
        let mut app = app();
        app.handle_key_event(press(KeyCode::Char('2'))).unwrap();
        assert_eq!(app.navigator.filter(), DiffFilter::Only(DiffType::Added));
        assert_eq!(app.navigator.filtered_len(), 1);
        app.handle_key_event(press(KeyCode::Char('5'))).unwrap();
        assert_eq!(app.list_state.selected(), None);
    }

    #[test]
    fn unavailable_action_is_not_queued() {
        let mut app = app();
        app.handle_key_event(press(KeyCode::Char('u'))).unwrap();
        assert!(app.queue.is_empty());
        assert!(app.status_message.contains("not available"));
    }

    #[test]
    fn confirmed_operations_wait_for_enter() {
        let mut app = app();
        app.move_selection(1);
        app.handle_key_event(press(KeyCode::Char('d'))).unwrap();
        assert_eq!(app.mode, AppMode::Confirm);
        assert!(app.queue.is_empty());

        app.handle_key_event(press(KeyCode::Esc)).unwrap();
        assert_eq!(app.mode, AppMode::Review);
        assert!(app.queue.is_empty());

        app.handle_key_event(press(KeyCode::Char('d'))).unwrap();
        app.handle_key_event(press(KeyCode::Enter)).unwrap();
        assert_eq!(app.queue.len(), 1);
        assert_eq!(app.queue[0].action, DiffAction::Delete);
    }

    #[test]
    fn enter_applies_queue_and_refreshes() {
        let mut app = app();
        app.handle_key_event(press(KeyCode::Char('a'))).unwrap();
        app.handle_key_event(press(KeyCode::Char('j'))).unwrap();
        app.handle_key_event(press(KeyCode::Char('l'))).unwrap();
        app.handle_key_event(press(KeyCode::Char('x'))).unwrap();
        app.handle_key_event(press(KeyCode::Char('l'))).unwrap();
        assert_eq!(app.queue.len(), 2);

        app.handle_key_event(press(KeyCode::Enter)).unwrap();

        assert!(app.queue.is_empty());
        assert!(app.failed.is_empty());
        let types: Vec<DiffType> = app.navigator.diffs().iter().map(|d| d.diff_type).collect();
        assert_eq!(types, vec![DiffType::Added]);
        assert_eq!(app.status_message, "Applied 2 operation(s), 0 failed");
    }

    #[test]
    fn save_without_outputs_only_reports() {
        let mut app = app();
        app.handle_key_event(press(KeyCode::Char('w'))).unwrap();
        assert_eq!(app.status_message, "No output files configured");
    }

    #[test]
    fn quit_keys_exit() {
        let mut app = app();
        assert!(app.handle_key_event(press(KeyCode::Char('q'))).unwrap());
        assert!(app
            .handle_key_event(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL))
            .unwrap());
    }
}
