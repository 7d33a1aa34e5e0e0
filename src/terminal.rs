use anyhow::Result;
use crossterm::event::{self, Event};
use ratatui::{backend::Backend, Terminal};
use std::io::Write;
use std::time::Duration;

use crate::app::App;
use crate::diff::DiffOutcome;
use crate::model::DiffType;
use crate::ui::draw_ui;

#[derive(Clone)]
pub struct TerminalState;

impl TerminalState {
    pub fn save() -> Result<Self> {
        Ok(Self)
    }

    pub fn restore(&self) -> Result<()> {
        crossterm::terminal::disable_raw_mode().ok();

        crossterm::execute!(std::io::stdout(), crossterm::cursor::Show)?;

        print!("\x1b[?25h");
        print!("\x1b[?12h");
        std::io::stdout().flush().ok();

        Ok(())
    }
}

/// Raw mode and the alternate screen for the lifetime of the review screen.
/// A panic hook puts the terminal back before the message is printed.
pub struct TerminalManager {
    original_state: TerminalState,
}

impl TerminalManager {
    pub fn new() -> Result<Self> {
        let original_state = TerminalState::save()?;

        let restore_state = original_state.clone();
        std::panic::set_hook(Box::new(move |panic_info| {
            let _ = crossterm::terminal::disable_raw_mode();
            let _ = crossterm::execute!(
                std::io::stdout(),
                crossterm::terminal::LeaveAlternateScreen,
                crossterm::terminal::Clear(crossterm::terminal::ClearType::All)
            );
            let _ = restore_state.restore();

            println!("{}", panic_info);
        }));

        crossterm::terminal::enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        crossterm::execute!(
            stdout,
            crossterm::terminal::EnterAlternateScreen,
            crossterm::terminal::Clear(crossterm::terminal::ClearType::All),
            crossterm::cursor::Hide
        )?;

        print!("\x1b[?12l");
        stdout.flush()?;

        Ok(Self { original_state })
    }

    pub fn restore(self) -> Result<()> {
        crossterm::terminal::disable_raw_mode()?;
        crossterm::execute!(
            std::io::stdout(),
            crossterm::terminal::LeaveAlternateScreen,
            crossterm::terminal::Clear(crossterm::terminal::ClearType::All)
        )?;

        self.original_state.restore()?;

        let _ = std::panic::take_hook();

        Ok(())
    }
}

pub fn run_tui(app: App) -> Result<()> {
    let terminal_manager = TerminalManager::new()?;

    let backend = ratatui::backend::CrosstermBackend::new(std::io::stdout());
    let mut terminal = ratatui::Terminal::new(backend)?;

    terminal.clear()?;

    let result = run_app(&mut terminal, app);

    terminal_manager.restore()?;
    ensure_cursor_visible();

    result
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, mut app: App) -> Result<()> {
    loop {
        draw_ui(terminal, &mut app)?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if app.handle_key_event(key)? {
                    return Ok(());
                }
            }
        }
    }
}

pub fn ensure_cursor_visible() {
    let _ = crossterm::execute!(std::io::stdout(), crossterm::cursor::Show);
    print!("\x1b[?25h");
    print!("\x1b[?12h");
    let _ = std::io::stdout().flush();
}

/// Plain text rendering of a diff list: the unfiltered summary followed by
/// one line per diff.
pub fn write_report<W: Write>(
    out: &mut W,
    left_label: &str,
    right_label: &str,
    outcome: &DiffOutcome,
) -> std::io::Result<()> {
    let summary = &outcome.summary;

    writeln!(out, "Bookmark Comparison Results:")?;
    writeln!(out, "Left:  {}", left_label)?;
    writeln!(out, "Right: {}", right_label)?;
    writeln!(out)?;
    writeln!(out, "Legend: [+] Added, [-] Deleted, [~] Modified, [=] Duplicated")?;
    writeln!(
        out,
        "Total: {}  added: {}  deleted: {}  modified: {}  duplicated: {}",
        summary.total,
        summary.count(DiffType::Added),
        summary.count(DiffType::Deleted),
        summary.count(DiffType::Modified),
        summary.count(DiffType::Duplicated)
    )?;
    writeln!(out)?;

    if outcome.diffs.is_empty() {
        writeln!(out, "No differences found.")?;
        return Ok(());
    }

    for diff in &outcome.diffs {
        writeln!(
            out,
            "[{}] {}  ({})",
            diff.diff_type.status_char(),
            diff.display_path(),
            diff.change_summary
        )?;
    }
    Ok(())
}

pub fn simple_report(left_label: &str, right_label: &str, outcome: &DiffOutcome) -> Result<()> {
    crossterm::execute!(std::io::stdout(), crossterm::cursor::Show).ok();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    write_report(&mut out, left_label, right_label, outcome)?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{compute_diff, DiffOptions};
    use crate::model::{BookmarkNode, BookmarkTree, Origin};
    use pretty_assertions::assert_eq;

    #[test]
    fn report_lists_summary_and_diffs() {
        let left = BookmarkTree::new(
            "l",
            Origin::Left,
            vec![BookmarkNode::folder("f", "Dev", &[], Origin::Left).with_child(
                BookmarkNode::bookmark("b", "Docs", "https://docs.rs", &[], Origin::Left),
            )],
        );
        let right = BookmarkTree::new(
            "r",
            Origin::Right,
            vec![BookmarkNode::folder("f", "Dev", &[], Origin::Right)],
        );
        let outcome = compute_diff(&left, &right, &DiffOptions::default());

        let mut out = Vec::new();
        write_report(&mut out, "a.html", "b.html", &outcome).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("Left:  a.html"));
        assert!(text.contains("Total: 1  added: 0  deleted: 1"));
        assert!(text.ends_with("[-] Dev / Docs  (Only on the left)\n"));
    }

    #[test]
    fn report_for_identical_trees() {
        let tree = BookmarkTree::new("t", Origin::Left, Vec::new());
        let outcome = compute_diff(&tree, &tree, &DiffOptions::default());

        let mut out = Vec::new();
        write_report(&mut out, "x", "x", &outcome).unwrap();
        assert_eq!(String::from_utf8(out).unwrap().lines().last(), Some("No differences found."));
    }
}
